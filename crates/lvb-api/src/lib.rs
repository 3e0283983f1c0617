//! Upstream validation API adapter.
//!
//! Bulk checks are `POST {base}{bulk_path}` with `{"links": [...]}`; single
//! checks are `GET {base}{single_path}?link=...`. Responses are passed on as
//! untyped JSON for the core reconciler to interpret.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use lvb_core::{
    config::Config, errors::Error, formatting::truncate_text, validation::ValidationApi, Result,
};

const ERROR_BODY_MAX: usize = 200;

#[derive(Clone, Debug)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub bulk_path: String,
    pub single_path: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl From<&Config> for ApiSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            base_url: cfg.api_base_url.clone(),
            api_key: cfg.api_key.clone(),
            bulk_path: cfg.api_bulk_path.clone(),
            single_path: cfg.api_single_path.clone(),
            timeout: cfg.api_timeout,
            max_retries: cfg.api_max_retries,
            retry_base_delay: cfg.api_retry_base_delay,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpValidationApi {
    settings: ApiSettings,
    http: reqwest::Client,
}

/// Outcome of one attempt, before retry policy is applied.
enum Attempt {
    Done(Value),
    Retry(Error),
    Fail(Error),
}

impl HttpValidationApi {
    pub fn new(settings: ApiSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build error: {e}")))?;
        Ok(Self { settings, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.settings.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn with_retry<F, Fut>(&self, what: &str, mut op: F) -> Result<Value>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Attempt>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Attempt::Done(v) => return Ok(v),
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(e) if attempt < self.settings.max_retries => {
                    let delay = backoff_delay(self.settings.retry_base_delay, attempt);
                    warn!(request = what, attempt = attempt + 1, ?delay, error = %e, "retrying upstream call");
                    attempt += 1;
                    sleep(delay).await;
                }
                Attempt::Retry(e) => return Err(e),
            }
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Attempt {
        let resp = match self.authorize(req).send().await {
            Ok(r) => r,
            Err(e) => return Attempt::Retry(Error::External(format!("request error: {e}"))),
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = Error::Upstream {
                status: status.as_u16(),
                body: truncate_text(body.trim(), ERROR_BODY_MAX),
            };
            return if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Fail(err)
            };
        }

        match resp.json::<Value>().await {
            Ok(v) => Attempt::Done(v),
            Err(e) => Attempt::Fail(Error::External(format!("invalid json from upstream: {e}"))),
        }
    }
}

#[async_trait]
impl ValidationApi for HttpValidationApi {
    async fn validate_bulk(&self, links: &[String]) -> Result<Value> {
        debug!(links = links.len(), "bulk validation request");
        let url = self.url(&self.settings.bulk_path);
        let body = json!({ "links": links });
        self.with_retry("bulk", || self.send(self.http.post(&url).json(&body)))
            .await
    }

    async fn validate_one(&self, link: &str) -> Result<Value> {
        let url = self.url(&self.settings.single_path);
        self.with_retry("single", || {
            self.send(self.http.get(&url).query(&[("link", link)]))
        })
        .await
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// `base * 2^attempt`, capped to keep a stuck upstream from stalling a chat.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    const MAX_DELAY: Duration = Duration::from_secs(30);
    let factor = 2u32.saturating_pow(attempt.min(16));
    base.saturating_mul(factor).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ApiSettings {
        ApiSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: Some("k".to_string()),
            bulk_path: "/v1/check/bulk".to_string(),
            single_path: "/v1/check".to_string(),
            timeout: Duration::from_millis(200),
            max_retries: 0,
            retry_base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 20), Duration::from_secs(30));
    }

    #[test]
    fn retry_policy_covers_throttling_and_server_errors() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn urls_join_base_and_path() {
        let api = HttpValidationApi::new(settings()).unwrap();
        assert_eq!(api.url("/v1/check"), "http://127.0.0.1:9/v1/check");
    }

    #[tokio::test]
    async fn connection_failure_surfaces_as_error() {
        let api = HttpValidationApi::new(settings()).unwrap();
        let err = api.validate_one("t.me/a").await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let api = HttpValidationApi::new(ApiSettings {
            max_retries: 2,
            ..settings()
        })
        .unwrap();
        let mut calls = 0u32;
        let out = api
            .with_retry("test", || {
                calls += 1;
                async { Attempt::Retry(Error::External("down".to_string())) }
            })
            .await;
        assert!(out.is_err());
        assert_eq!(calls, 3);
    }
}
