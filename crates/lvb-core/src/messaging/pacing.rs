//! Outbound pacing for report delivery.
//!
//! A large report goes out as several consecutive chunks. Telegram answers
//! bursts with 429s, so every call is given a time slot: at least
//! `per_chat` after the previous call to the same chat and `global` after
//! the previous call overall.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::Mutex,
    time::{sleep_until, Instant},
};

use crate::{
    config::Config,
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{ChatAction, InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

/// Chats with no pending slot are forgotten once the table grows past this.
const MAX_TRACKED_CHATS: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    pub per_chat: Duration,
    pub global: Duration,
}

impl Pacing {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            per_chat: cfg.report_chunk_interval,
            global: cfg.telegram_global_interval,
        }
    }
}

/// Next free slot, globally and per chat.
#[derive(Debug)]
struct Schedule {
    global_next: Instant,
    chat_next: HashMap<ChatId, Instant>,
}

impl Schedule {
    fn new(now: Instant) -> Self {
        Self {
            global_next: now,
            chat_next: HashMap::new(),
        }
    }

    /// Book the earliest slot that respects both spacings and return it.
    fn book(&mut self, chat: Option<ChatId>, pacing: Pacing, now: Instant) -> Instant {
        let chat_ready = chat
            .and_then(|c| self.chat_next.get(&c).copied())
            .unwrap_or(now);
        let slot = now.max(self.global_next).max(chat_ready);

        self.global_next = slot + pacing.global;
        if let Some(c) = chat {
            if self.chat_next.len() >= MAX_TRACKED_CHATS {
                self.chat_next.retain(|_, next| *next > now);
            }
            self.chat_next.insert(c, slot + pacing.per_chat);
        }
        slot
    }
}

/// [`MessagingPort`] decorator that spaces outbound calls per [`Pacing`].
pub struct PacedMessenger {
    inner: Arc<dyn MessagingPort>,
    pacing: Pacing,
    schedule: Mutex<Schedule>,
}

impl PacedMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, pacing: Pacing) -> Self {
        Self {
            inner,
            pacing,
            schedule: Mutex::new(Schedule::new(Instant::now())),
        }
    }

    async fn wait_turn(&self, chat: Option<ChatId>) {
        let slot = self
            .schedule
            .lock()
            .await
            .book(chat, self.pacing, Instant::now());
        sleep_until(slot).await;
    }
}

#[async_trait]
impl MessagingPort for PacedMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_text(chat_id, text).await
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_html(chat_id, html).await
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.wait_turn(Some(msg.chat_id)).await;
        self.inner.edit_text(msg, text).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.wait_turn(Some(msg.chat_id)).await;
        self.inner.delete_message(msg).await
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_chat_action(chat_id, action).await
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_inline_keyboard(chat_id, html, keyboard).await
    }

    async fn edit_inline_keyboard(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<()> {
        self.wait_turn(Some(msg.chat_id)).await;
        self.inner.edit_inline_keyboard(msg, html, keyboard).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // Callback answers carry no chat.
        self.wait_turn(None).await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::fake::FakeMessenger;

    const PACING: Pacing = Pacing {
        per_chat: Duration::from_millis(500),
        global: Duration::from_millis(10),
    };

    #[tokio::test(start_paused = true)]
    async fn report_chunks_to_one_chat_are_spaced() {
        let inner = Arc::new(FakeMessenger::default());
        let paced = PacedMessenger::new(inner.clone(), PACING);

        let start = Instant::now();
        for i in 0..3 {
            paced
                .send_text(ChatId(1), &format!("chunk {i}"))
                .await
                .unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(inner.sent_texts(), vec!["chunk 0", "chunk 1", "chunk 2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn other_chats_only_wait_for_the_global_gap() {
        let inner = Arc::new(FakeMessenger::default());
        let paced = PacedMessenger::new(inner.clone(), PACING);

        let start = Instant::now();
        paced.send_text(ChatId(1), "a").await.unwrap();
        paced.send_text(ChatId(2), "b").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn booking_respects_both_gaps() {
        let now = Instant::now();
        let mut schedule = Schedule::new(now);

        assert_eq!(schedule.book(Some(ChatId(1)), PACING, now), now);
        assert_eq!(
            schedule.book(Some(ChatId(2)), PACING, now),
            now + PACING.global
        );
        assert_eq!(
            schedule.book(Some(ChatId(1)), PACING, now),
            now + PACING.per_chat
        );
        assert_eq!(
            schedule.book(None, PACING, now),
            now + PACING.per_chat + PACING.global
        );
    }

    #[test]
    fn idle_chats_are_forgotten() {
        let now = Instant::now();
        let mut schedule = Schedule::new(now);
        for id in 0..MAX_TRACKED_CHATS as i64 {
            schedule.book(Some(ChatId(id)), PACING, now);
        }
        assert_eq!(schedule.chat_next.len(), MAX_TRACKED_CHATS);

        let later = now + Duration::from_secs(3600);
        schedule.book(Some(ChatId(-1)), PACING, later);
        assert_eq!(schedule.chat_next.len(), 1);
    }
}
