use tracing::warn;

use crate::{
    domain::{ChatId, LinkResult},
    messaging::port::MessagingPort,
    report::{render_chunks, ReportOptions},
    Result,
};

/// Render `results` and send every chunk in order. Returns the number of messages sent.
///
/// `max_len` is clamped to what the messenger accepts.
pub async fn deliver_report(
    messenger: &dyn MessagingPort,
    chat_id: ChatId,
    results: &[LinkResult],
    opts: ReportOptions,
    max_len: usize,
) -> Result<usize> {
    let max_len = max_len.min(messenger.capabilities().max_message_len).max(1);
    let chunks = render_chunks(results, opts, max_len);
    for (i, chunk) in chunks.iter().enumerate() {
        if let Err(e) = messenger.send_text(chat_id, chunk).await {
            warn!(chunk = i, total = chunks.len(), error = %e, "report delivery aborted");
            return Err(e);
        }
    }
    Ok(chunks.len())
}
