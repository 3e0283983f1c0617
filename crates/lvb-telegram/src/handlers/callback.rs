use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use lvb_core::domain::{ChatId, MessageId, MessageRef, UserId};

use crate::router::AppState;

use super::commands::{settings_html, settings_keyboard, TOGGLE_INVALID_CALLBACK};

pub async fn handle_callback(
    _bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let messenger = state.messenger.clone();
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();

    // Always answer the callback query, even when ignoring it.
    let Some(message) = q.message.as_ref() else {
        let _ = messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    };
    let msg_ref = MessageRef {
        chat_id: ChatId(message.chat.id.0),
        message_id: MessageId(message.id.0),
    };

    let user_id = q.from.id.0 as i64;
    if !lvb_core::security::is_authorized(
        Some(UserId(user_id)),
        &state.cfg.telegram_allowed_users,
    ) {
        let _ = messenger
            .answer_callback_query(&cb_id, Some("Unauthorized"))
            .await;
        return Ok(());
    }

    if data != TOGGLE_INVALID_CALLBACK {
        let _ = messenger.answer_callback_query(&cb_id, None).await;
        return Ok(());
    }

    match state.settings.toggle_show_invalid(msg_ref.chat_id).await {
        Ok(settings) => {
            let note = if settings.show_invalid {
                "Invalid links will be shown"
            } else {
                "Invalid links will be hidden"
            };
            let _ = messenger.answer_callback_query(&cb_id, Some(note)).await;
            let _ = messenger
                .edit_inline_keyboard(
                    msg_ref,
                    &settings_html(settings),
                    settings_keyboard(settings),
                )
                .await;
        }
        Err(e) => {
            warn!(chat_id = msg_ref.chat_id.0, error = %e, "failed to toggle settings");
            let _ = messenger
                .answer_callback_query(&cb_id, Some("Could not save settings"))
                .await;
        }
    }

    Ok(())
}
