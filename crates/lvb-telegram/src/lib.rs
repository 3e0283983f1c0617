//! Telegram adapter (teloxide).
//!
//! [`TelegramMessenger`] implements the `lvb-core` messaging port over the
//! Bot API; [`router`] and [`handlers`] turn updates into link checks.

use std::{future::IntoFuture, time::Duration};

use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    ApiError, RequestError,
};
use tokio::time::sleep;
use tracing::debug;

pub mod handlers;
pub mod router;

use lvb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

/// Telegram's hard cap on message text length.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// How many flood-control waits a single call sits out before giving up.
const FLOOD_WAIT_ATTEMPTS: u32 = 2;

fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(chat_id.0)
}

fn tg_message(msg: MessageRef) -> (teloxide::types::ChatId, teloxide::types::MessageId) {
    (tg_chat(msg.chat_id), teloxide::types::MessageId(msg.message_id.0))
}

fn telegram_error(what: &str, e: RequestError) -> Error {
    Error::External(format!("telegram {what} failed: {e}"))
}

fn keyboard_markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        keyboard
            .buttons
            .into_iter()
            .map(|b| [InlineKeyboardButton::callback(b.label, b.callback_data)]),
    )
}

/// Outgoing body of a new or edited message.
#[derive(Clone, Copy)]
enum Body<'a> {
    Plain(&'a str),
    Html(&'a str),
}

impl Body<'_> {
    fn text(self) -> String {
        match self {
            Body::Plain(t) | Body::Html(t) => t.to_string(),
        }
    }

    fn parse_mode(self) -> Option<ParseMode> {
        match self {
            Body::Plain(_) => None,
            Body::Html(_) => Some(ParseMode::Html),
        }
    }
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Run `call`, sitting out Telegram flood-control waits.
    async fn call<T, R>(
        &self,
        what: &'static str,
        call: impl Fn() -> R,
    ) -> std::result::Result<T, RequestError>
    where
        R: IntoFuture<Output = std::result::Result<T, RequestError>>,
        R::IntoFuture: Send,
    {
        let mut waits = 0;
        loop {
            match call().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(wait)) if waits < FLOOD_WAIT_ATTEMPTS => {
                    waits += 1;
                    debug!(call = what, ?wait, "telegram flood control, waiting");
                    sleep(wait.max(Duration::from_millis(100))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post(
        &self,
        chat_id: ChatId,
        body: Body<'_>,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageRef> {
        let sent = self
            .call("send_message", || {
                let mut req = self
                    .bot
                    .send_message(tg_chat(chat_id), body.text())
                    .disable_web_page_preview(true);
                if let Some(mode) = body.parse_mode() {
                    req = req.parse_mode(mode);
                }
                if let Some(m) = markup.clone() {
                    req = req.reply_markup(m);
                }
                req
            })
            .await
            .map_err(|e| telegram_error("send_message", e))?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(sent.id.0),
        })
    }

    /// Edit a message in place. Re-sending identical content is not an error.
    async fn revise(
        &self,
        msg: MessageRef,
        body: Body<'_>,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let (chat, id) = tg_message(msg);
        let attempt = self
            .call("edit_message_text", || {
                let mut req = self
                    .bot
                    .edit_message_text(chat, id, body.text())
                    .disable_web_page_preview(true);
                if let Some(mode) = body.parse_mode() {
                    req = req.parse_mode(mode);
                }
                if let Some(m) = markup.clone() {
                    req = req.reply_markup(m);
                }
                req
            })
            .await;

        match attempt {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(telegram_error("edit_message_text", e)),
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_chat_actions: true,
            supports_inline_keyboards: true,
            max_message_len: TELEGRAM_MESSAGE_LIMIT,
        }
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.post(chat_id, Body::Plain(text), None).await
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.post(chat_id, Body::Html(html), None).await
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.revise(msg, Body::Plain(text), None).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        let (chat, id) = tg_message(msg);
        self.call("delete_message", || self.bot.delete_message(chat, id))
            .await
            .map(|_| ())
            .map_err(|e| telegram_error("delete_message", e))
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
        };
        self.call("send_chat_action", || {
            self.bot.send_chat_action(tg_chat(chat_id), action)
        })
        .await
        .map(|_| ())
        .map_err(|e| telegram_error("send_chat_action", e))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.post(chat_id, Body::Html(html), Some(keyboard_markup(keyboard)))
            .await
    }

    async fn edit_inline_keyboard(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()> {
        self.revise(msg, Body::Html(html), Some(keyboard_markup(keyboard)))
            .await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.call("answer_callback_query", || {
            let req = self.bot.answer_callback_query(callback_id.to_string());
            match text {
                Some(t) => req.text(t.to_string()),
                None => req,
            }
        })
        .await
        .map(|_| ())
        .map_err(|e| telegram_error("answer_callback_query", e))
    }
}
