use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use lvb_core::{
    config::Config,
    messaging::{
        pacing::{PacedMessenger, Pacing},
        port::MessagingPort,
    },
    security::RateLimiter,
    settings::SettingsStore,
    validation::LinkValidator,
};

use crate::handlers;
use crate::TelegramMessenger;

/// Per-request context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub validator: LinkValidator,
    pub settings: Arc<SettingsStore>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub chat_locks: Arc<ChatLocks>,
}

impl AppState {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        validator: LinkValidator,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let rate_limiter = RateLimiter::from_config(&cfg);
        Self {
            cfg,
            messenger,
            validator,
            settings,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
            chat_locks: Arc::new(ChatLocks::default()),
        }
    }
}

/// Serializes link checks within one chat.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    validator: LinkValidator,
    settings: Arc<SettingsStore>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "link validator bot started"),
        Err(e) => warn!(error = %e, "get_me failed; continuing"),
    }
    info!(
        api = %cfg.api_base_url,
        allowed_users = cfg.telegram_allowed_users.len(),
        settings_file = %settings.path().display(),
        "configuration loaded"
    );

    let pacing = Pacing::from_config(&cfg);
    info!(
        per_chat_ms = pacing.per_chat.as_millis() as u64,
        global_ms = pacing.global.as_millis() as u64,
        "outbound pacing"
    );
    let messenger: Arc<dyn MessagingPort> = Arc::new(PacedMessenger::new(
        Arc::new(TelegramMessenger::new(bot.clone())),
        pacing,
    ));

    let state = Arc::new(AppState::new(cfg, messenger, validator, settings));

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
