use tracing::{info, warn};

use lvb_core::{
    domain::{ChatId, UserId},
    formatting::plural,
    links::prepare_request,
    messaging::{delivery::deliver_report, types::ChatAction},
    security::Admission,
};

use crate::router::AppState;

pub const NO_LINKS_HINT: &str =
    "No links found. Send http(s):// URLs or t.me/ handles, separated by spaces or commas.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    RateLimited,
    NoLinks,
    Delivered { links: usize, messages: usize },
    DeliveryFailed,
}

/// Full link-check flow for one piece of user text.
///
/// rate limit -> extract + dedup -> validate (bulk, then per-link fallback) -> report.
pub async fn run_check(state: &AppState, chat_id: i64, user_id: i64, text: &str) -> CheckOutcome {
    let chat = ChatId(chat_id);
    let messenger = state.messenger.as_ref();

    let admission = state.rate_limiter.lock().await.check(UserId(user_id));
    if let Admission::Limited { retry_after } = admission {
        let notice = match retry_after {
            Some(wait) => format!(
                "⏳ Rate limited. Please wait {:.1} seconds.",
                wait.as_secs_f64()
            ),
            None => "⏳ Rate limited. Link checks are currently disabled.".to_string(),
        };
        info!(user_id, ?retry_after, "rate limited");
        let _ = messenger.send_text(chat, &notice).await;
        return CheckOutcome::RateLimited;
    }

    let (links, dropped) = prepare_request(text, state.cfg.max_links_per_message);
    if links.is_empty() {
        let _ = messenger.send_text(chat, NO_LINKS_HINT).await;
        return CheckOutcome::NoLinks;
    }
    if dropped > 0 {
        let _ = messenger
            .send_text(
                chat,
                &format!(
                    "⚠️ Only the first {} are checked; {} skipped.",
                    plural(links.len(), "link"),
                    dropped
                ),
            )
            .await;
    }

    if messenger.capabilities().supports_chat_actions {
        let _ = messenger.send_chat_action(chat, ChatAction::Typing).await;
    }
    let progress = messenger
        .send_text(
            chat,
            &format!("🔎 Checking {}...", plural(links.len(), "link")),
        )
        .await
        .ok();

    let results = state.validator.validate(&links).await;
    let opts = state.settings.get(chat).await.report_options();

    if let Some(p) = progress {
        if messenger.delete_message(p).await.is_err() {
            let _ = messenger.edit_text(p, "✔️ Done.").await;
        }
    }

    match deliver_report(
        messenger,
        chat,
        &results,
        opts,
        state.cfg.telegram_safe_limit,
    )
    .await
    {
        Ok(messages) => {
            info!(chat_id, links = results.len(), messages, "report delivered");
            CheckOutcome::Delivered {
                links: results.len(),
                messages,
            }
        }
        Err(e) => {
            warn!(chat_id, error = %e, "report delivery failed");
            CheckOutcome::DeliveryFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{path::PathBuf, sync::Arc, time::Duration};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use lvb_core::{
        config::Config,
        messaging::fake::FakeMessenger,
        settings::{ChatSettings, SettingsStore},
        validation::{LinkValidator, ValidationApi},
        Result,
    };

    /// Bulk endpoint answers with buckets; `dead` links are invalid.
    struct BucketApi;

    #[async_trait]
    impl ValidationApi for BucketApi {
        async fn validate_bulk(&self, links: &[String]) -> Result<Value> {
            let (invalid, valid): (Vec<&String>, Vec<&String>) =
                links.iter().partition(|l| l.contains("dead"));
            Ok(json!({ "valid": valid, "invalid": invalid }))
        }

        async fn validate_one(&self, _link: &str) -> Result<Value> {
            Ok(json!({ "status": "unknown" }))
        }
    }

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        PathBuf::from(format!("/tmp/{prefix}-{}-{ts}.json", std::process::id()))
    }

    fn test_config(rate_limit_requests: u32) -> Config {
        // Hand-rolled to avoid Config::load() env dependency.
        Config {
            telegram_bot_token: "x".to_string(),
            telegram_allowed_users: vec![],
            telegram_safe_limit: 4000,
            api_base_url: "http://localhost".to_string(),
            api_key: None,
            api_bulk_path: "/bulk".to_string(),
            api_single_path: "/one".to_string(),
            api_timeout: Duration::from_secs(1),
            api_max_retries: 0,
            api_retry_base_delay: Duration::from_millis(1),
            bulk_batch_size: 100,
            max_links_per_message: 3,
            settings_file: tmp_file("lvb-check-settings"),
            default_show_invalid: true,
            report_chunk_interval: Duration::ZERO,
            telegram_global_interval: Duration::ZERO,
            rate_limit_enabled: true,
            rate_limit_requests,
            rate_limit_window: Duration::from_secs(60),
        }
    }

    fn test_state(cfg: Config, messenger: Arc<FakeMessenger>) -> AppState {
        let settings = Arc::new(SettingsStore::open(
            cfg.settings_file.clone(),
            ChatSettings {
                show_invalid: cfg.default_show_invalid,
            },
        ));
        let validator = LinkValidator::new(Arc::new(BucketApi), cfg.bulk_batch_size);
        AppState::new(Arc::new(cfg), messenger, validator, settings)
    }

    #[tokio::test]
    async fn checks_links_and_delivers_ordered_report() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state(test_config(10), messenger.clone());

        let outcome = run_check(&state, 1, 1, "t.me/dead https://ok.example t.me/dead").await;
        assert_eq!(
            outcome,
            CheckOutcome::Delivered {
                links: 2,
                messages: 1
            }
        );

        let texts = messenger.sent_texts();
        assert_eq!(texts[0], "🔎 Checking 2 links...");
        assert_eq!(
            texts[1],
            "Total: 2\nValid: 1\nInvalid: 1\nUnknown: 0\n\n✅ https://ok.example\n❌ t.me/dead"
        );
        // Progress message removed once the report is ready.
        assert_eq!(messenger.deleted().len(), 1);
        assert!(messenger.edited_texts().is_empty());
    }

    #[tokio::test]
    async fn undeletable_progress_message_is_marked_done() {
        let messenger = Arc::new(FakeMessenger::with_failing_deletes());
        let state = test_state(test_config(10), messenger.clone());

        run_check(&state, 1, 1, "t.me/a").await;
        assert!(messenger.deleted().is_empty());
        assert_eq!(messenger.edited_texts(), vec!["✔️ Done."]);
    }

    #[tokio::test]
    async fn hidden_invalid_setting_is_applied() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state(test_config(10), messenger.clone());
        state
            .settings
            .set_show_invalid(ChatId(9), false)
            .await
            .unwrap();

        run_check(&state, 9, 1, "t.me/dead t.me/alive").await;
        let texts = messenger.sent_texts();
        let report = texts.last().unwrap();
        assert!(report.contains("Invalid: 1 (hidden)"));
        assert!(!report.contains("❌"));

        let _ = std::fs::remove_file(&state.cfg.settings_file);
    }

    #[tokio::test]
    async fn text_without_links_gets_a_hint() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state(test_config(10), messenger.clone());
        assert_eq!(
            run_check(&state, 1, 1, "hello").await,
            CheckOutcome::NoLinks
        );
        assert_eq!(messenger.sent_texts(), vec![NO_LINKS_HINT]);
    }

    #[tokio::test]
    async fn too_many_links_are_capped_with_notice() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state(test_config(10), messenger.clone());
        let outcome = run_check(&state, 1, 1, "t.me/a t.me/b t.me/c t.me/d t.me/e").await;
        assert!(matches!(outcome, CheckOutcome::Delivered { links: 3, .. }));
        assert_eq!(
            messenger.sent_texts()[0],
            "⚠️ Only the first 3 links are checked; 2 skipped."
        );
    }

    #[tokio::test]
    async fn rate_limit_stops_before_validation() {
        let messenger = Arc::new(FakeMessenger::default());
        let state = test_state(test_config(1), messenger.clone());
        run_check(&state, 1, 1, "t.me/a").await;
        assert_eq!(
            run_check(&state, 1, 1, "t.me/a").await,
            CheckOutcome::RateLimited
        );
        let texts = messenger.sent_texts();
        assert!(texts.last().unwrap().starts_with("⏳ Rate limited. Please wait"));
    }
}
