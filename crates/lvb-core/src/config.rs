use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    /// Empty means the bot is open to everyone.
    pub telegram_allowed_users: Vec<i64>,
    pub telegram_safe_limit: usize,

    // Upstream validation API
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub api_bulk_path: String,
    pub api_single_path: String,
    pub api_timeout: Duration,
    pub api_max_retries: u32,
    pub api_retry_base_delay: Duration,

    // Request shaping
    pub bulk_batch_size: usize,
    pub max_links_per_message: usize,

    // Persistence
    pub settings_file: PathBuf,
    pub default_show_invalid: bool,

    // Outbound pacing (report chunks arrive as bursts of messages)
    pub report_chunk_interval: Duration,
    pub telegram_global_interval: Duration,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        let api_base_url = env_str("VALIDATOR_API_URL")
            .and_then(non_empty)
            .map(|s| s.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                Error::Config("VALIDATOR_API_URL environment variable is required".to_string())
            })?;
        let api_key = env_str("VALIDATOR_API_KEY").and_then(non_empty);
        let api_bulk_path = env_path_segment("VALIDATOR_BULK_PATH", "/v1/check/bulk");
        let api_single_path = env_path_segment("VALIDATOR_SINGLE_PATH", "/v1/check");
        let api_timeout = env_millis("VALIDATOR_TIMEOUT_MS", 15_000);
        let api_max_retries = env_u32("VALIDATOR_MAX_RETRIES").unwrap_or(2);
        let api_retry_base_delay = env_millis("VALIDATOR_RETRY_BASE_MS", 500);

        let bulk_batch_size = env_usize("BULK_BATCH_SIZE").unwrap_or(100).max(1);
        let max_links_per_message = env_usize("MAX_LINKS_PER_MESSAGE").unwrap_or(500).max(1);

        // Telegram hard limit is 4096; leave headroom.
        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000).min(4096);

        let settings_file = PathBuf::from(
            env_str("SETTINGS_FILE")
                .unwrap_or("/tmp/link-validator-bot-settings.json".to_string()),
        );
        let default_show_invalid = env_bool("DEFAULT_SHOW_INVALID").unwrap_or(true);

        // Telegram allows roughly one message per second per chat.
        let report_chunk_interval = env_millis("REPORT_CHUNK_INTERVAL_MS", 1050);
        let telegram_global_interval = env_millis("TELEGRAM_GLOBAL_INTERVAL_MS", 40);

        let rate_limit_enabled = env_bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env_u32("RATE_LIMIT_REQUESTS").unwrap_or(10);
        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW").unwrap_or(60));

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            telegram_safe_limit,
            api_base_url,
            api_key,
            api_bulk_path,
            api_single_path,
            api_timeout,
            api_max_retries,
            api_retry_base_delay,
            bulk_batch_size,
            max_links_per_message,
            settings_file,
            default_show_invalid,
            report_chunk_interval,
            telegram_global_interval,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_millis(key: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_u64(key).unwrap_or(default_ms))
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path_segment(key: &str, default: &str) -> String {
    let raw = env_str(key)
        .and_then(non_empty)
        .unwrap_or_else(|| default.to_string());
    let trimmed = raw.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
