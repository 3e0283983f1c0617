//! Telegram update handlers.
//!
//! Each handler is a small adapter that checks auth, pulls the text to scan
//! out of the update and hands it to the shared check flow in [`check`].

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use lvb_core::domain::UserId;
use lvb_core::security::is_authorized;

use crate::router::AppState;

mod callback;
pub mod check;
mod commands;
mod document;
mod text;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = msg.chat.id.0;
    let user_id = msg.from().map(|u| u.id.0);

    if !is_authorized(
        user_id.map(|id| UserId(id as i64)),
        &state.cfg.telegram_allowed_users,
    ) {
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
    }

    if msg.text().is_some() {
        // Sequentialize checks per chat so reports don't interleave.
        let _guard = state.chat_locks.lock_chat(chat_id).await;
        return text::handle_text(bot, msg, state).await;
    }

    if msg.document().is_some() {
        let _guard = state.chat_locks.lock_chat(chat_id).await;
        return document::handle_document(bot, msg, state).await;
    }

    let _ = bot
        .send_message(
            msg.chat.id,
            "Send links as text or a .txt file with one link per line.",
        )
        .await;

    Ok(())
}
