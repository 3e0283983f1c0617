//! Validation service: bulk request, reconciliation, per-link fallback.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::{
    domain::LinkResult,
    links::dedup,
    normalize::normalize,
    reconcile::reconcile,
    Result,
};

/// Hexagonal port for the upstream validation API.
///
/// Payloads are returned untyped; interpreting them is the reconciler's job.
#[async_trait]
pub trait ValidationApi: Send + Sync {
    async fn validate_bulk(&self, links: &[String]) -> Result<Value>;
    async fn validate_one(&self, link: &str) -> Result<Value>;
}

#[derive(Clone)]
pub struct LinkValidator {
    api: Arc<dyn ValidationApi>,
    batch_size: usize,
}

impl LinkValidator {
    pub fn new(api: Arc<dyn ValidationApi>, batch_size: usize) -> Self {
        Self {
            api,
            batch_size: batch_size.max(1),
        }
    }

    /// One result per unique link, in request order. Never fails as a whole.
    pub async fn validate(&self, links: &[String]) -> Vec<LinkResult> {
        let links = dedup(links.iter().cloned());
        let mut out = Vec::with_capacity(links.len());
        for batch in links.chunks(self.batch_size) {
            out.extend(self.validate_batch(batch).await);
        }
        out
    }

    async fn validate_batch(&self, batch: &[String]) -> Vec<LinkResult> {
        match self.api.validate_bulk(batch).await {
            Ok(payload) => {
                if let Some(results) = reconcile(&payload, batch) {
                    debug!(links = batch.len(), "bulk response reconciled");
                    return results;
                }
                info!(
                    links = batch.len(),
                    "bulk response shape unrecognized, checking links one by one"
                );
            }
            Err(e) => {
                warn!(links = batch.len(), error = %e, "bulk request failed, checking links one by one");
            }
        }
        self.validate_each(batch).await
    }

    /// Fallback: one independent call per link, all awaited, failures kept per link.
    async fn validate_each(&self, batch: &[String]) -> Vec<LinkResult> {
        let mut set = JoinSet::new();
        for (idx, link) in batch.iter().enumerate() {
            let api = Arc::clone(&self.api);
            let link = link.clone();
            set.spawn(async move {
                let result = match api.validate_one(&link).await {
                    Ok(payload) => interpret_single(&payload, &link),
                    Err(e) => LinkResult::unknown(link, e.to_string()),
                };
                (idx, result)
            });
        }

        let mut slots: Vec<Option<LinkResult>> = vec![None; batch.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!(error = %e, "single-link validation task failed"),
            }
        }

        slots
            .into_iter()
            .zip(batch)
            .map(|(slot, link)| {
                slot.unwrap_or_else(|| LinkResult::unknown(link.clone(), "Validation task failed"))
            })
            .collect()
    }
}

/// Read a single-link payload. The requested link always labels the result.
pub fn interpret_single(payload: &Value, link: &str) -> LinkResult {
    let requested = [link.to_string()];
    let mut result = reconcile(payload, &requested)
        .and_then(|rs| rs.into_iter().next())
        .unwrap_or_else(|| normalize(payload));
    result.link = link.to_string();
    result
}
