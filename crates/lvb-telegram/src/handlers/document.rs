use std::sync::Arc;

use teloxide::{net::Download, prelude::*, types::Document};
use tracing::{debug, warn};

use lvb_core::domain::ChatId;

use crate::handlers::check::run_check;
use crate::router::AppState;

const MAX_FILE_SIZE: u32 = 1024 * 1024; // 1MB
const MAX_TEXT_CHARS: usize = 200_000;

const TEXT_EXTENSIONS: &[&str] = &[".txt", ".csv", ".md", ".log", ".json", ".html"];

fn is_text_file(name: &str, mime: Option<&str>) -> bool {
    if mime.is_some_and(|m| m.starts_with("text/")) {
        return true;
    }
    let lower = name.to_lowercase();
    TEXT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Decode a downloaded document. Invalid UTF-8 is replaced, not rejected.
fn document_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(MAX_TEXT_CHARS)
        .collect()
}

/// Fetch the document into memory; it is capped at [`MAX_FILE_SIZE`].
async fn download_text(bot: &Bot, doc: &Document) -> anyhow::Result<String> {
    let file = bot.get_file(doc.file.id.clone()).await?;
    let mut buf: Vec<u8> = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;
    debug!(bytes = buf.len(), "document downloaded");
    Ok(document_text(&buf))
}

pub async fn handle_document(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(doc) = msg.document() else {
        return Ok(());
    };

    let user_id = user.id.0 as i64;
    let chat_id = msg.chat.id.0;
    let chat = ChatId(chat_id);
    let messenger = state.messenger.clone();

    let file_name = doc
        .file_name
        .clone()
        .unwrap_or_else(|| "document".to_string());
    let mime = doc.mime_type.as_ref().map(|m| m.essence_str().to_string());
    if !is_text_file(&file_name, mime.as_deref()) {
        let _ = messenger
            .send_text(chat, "❌ Only text files (.txt, .csv, ...) can be scanned for links.")
            .await;
        return Ok(());
    }

    if doc.file.size > MAX_FILE_SIZE {
        let _ = messenger
            .send_text(chat, "❌ File too large. Maximum size is 1MB.")
            .await;
        return Ok(());
    }

    let mut text = match download_text(&bot, doc).await {
        Ok(t) => t,
        Err(e) => {
            warn!(chat_id, error = %e, "document download failed");
            let _ = messenger
                .send_text(
                    chat,
                    &format!(
                        "❌ Failed to download document: {}",
                        e.to_string().chars().take(100).collect::<String>()
                    ),
                )
                .await;
            return Ok(());
        }
    };

    // Links in the caption count too.
    if let Some(caption) = msg.caption() {
        text.push('\n');
        text.push_str(caption);
    }

    run_check(&state, chat_id, user_id, &text).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_text_files() {
        assert!(is_text_file("links.TXT", None));
        assert!(is_text_file("export.csv", None));
        assert!(is_text_file("noext", Some("text/plain")));
        assert!(!is_text_file("photo.jpg", Some("image/jpeg")));
    }

    #[test]
    fn document_text_is_lossy_and_bounded() {
        assert_eq!(document_text(b"t.me/a\xff t.me/b"), "t.me/a\u{fffd} t.me/b");

        let big = "x".repeat(MAX_TEXT_CHARS + 10);
        assert_eq!(document_text(big.as_bytes()).chars().count(), MAX_TEXT_CHARS);
    }
}
