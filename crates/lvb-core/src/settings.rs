//! Per-chat display settings, persisted as a small JSON file.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::{domain::ChatId, report::ReportOptions, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub show_invalid: bool,
}

impl ChatSettings {
    pub fn report_options(self) -> ReportOptions {
        ReportOptions {
            show_invalid: self.show_invalid,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SettingsFileData {
    #[serde(default)]
    chats: BTreeMap<String, ChatSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<String>,
}

/// In-memory settings cache backed by a JSON file.
///
/// Every change rewrites the whole file; the file is tiny.
pub struct SettingsStore {
    path: PathBuf,
    defaults: ChatSettings,
    state: Mutex<SettingsFileData>,
}

impl SettingsStore {
    /// Load from `path`. A missing or unreadable file starts from defaults.
    pub fn open(path: impl Into<PathBuf>, defaults: ChatSettings) -> Self {
        let path = path.into();
        let data = match load_settings_file(&path) {
            Ok(Some(d)) => d,
            Ok(None) => SettingsFileData::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable settings file");
                SettingsFileData::default()
            }
        };
        Self {
            path,
            defaults,
            state: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, chat_id: ChatId) -> ChatSettings {
        let st = self.state.lock().await;
        st.chats
            .get(&chat_id.0.to_string())
            .copied()
            .unwrap_or(self.defaults)
    }

    /// Apply `change` to one chat's settings and persist, under a single lock.
    pub async fn update(
        &self,
        chat_id: ChatId,
        change: impl FnOnce(&mut ChatSettings),
    ) -> Result<ChatSettings> {
        let mut st = self.state.lock().await;
        let mut settings = st
            .chats
            .get(&chat_id.0.to_string())
            .copied()
            .unwrap_or(self.defaults);
        change(&mut settings);

        st.chats.insert(chat_id.0.to_string(), settings);
        st.saved_at = Some(Utc::now().to_rfc3339());
        save_settings_file(&self.path, &st).await?;
        Ok(settings)
    }

    pub async fn set_show_invalid(&self, chat_id: ChatId, show_invalid: bool) -> Result<ChatSettings> {
        self.update(chat_id, |s| s.show_invalid = show_invalid).await
    }

    pub async fn toggle_show_invalid(&self, chat_id: ChatId) -> Result<ChatSettings> {
        self.update(chat_id, |s| s.show_invalid = !s.show_invalid)
            .await
    }
}

fn load_settings_file(path: &Path) -> Result<Option<SettingsFileData>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    let data: SettingsFileData = serde_json::from_str(&txt)?;
    Ok(Some(data))
}

async fn save_settings_file(path: &Path, data: &SettingsFileData) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let txt = serde_json::to_string_pretty(data)?;
    tokio::fs::write(path, txt).await?;
    Ok(())
}
