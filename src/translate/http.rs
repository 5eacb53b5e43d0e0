//! HTTP translation engine.
//! Plain JSON POST contract: {"text", "source", "target"} in,
//! {"translated"} out. Retry logic: 429 honors Retry-After (max 3),
//! 5xx exponential backoff (max 2), timeout retried once.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use tracing::warn;

use super::{EngineError, TranslationEngine};

pub struct HttpEngine {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpEngine {
    pub fn new(endpoint: &str) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::Api(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    async fn send_with_retry(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, EngineError> {
        let mut attempt: u32 = 0;
        let max_429_retries: u32 = 3;
        let max_5xx_retries: u32 = 2;
        let mut timeout_retried = false;

        loop {
            let result = self.http.post(&self.endpoint).json(body).send().await;

            match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status().as_u16() == 429 => {
                    if attempt >= max_429_retries {
                        return Err(EngineError::RateLimited { retry_after_ms: 0 });
                    }
                    let wait = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| Duration::from_secs(1 << attempt));
                    warn!(attempt, wait_ms = wait.as_millis() as u64, "429 rate limited, retrying");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if attempt >= max_5xx_retries {
                        return Err(EngineError::Api(format!(
                            "server error: {}",
                            resp.status()
                        )));
                    }
                    let wait = Duration::from_millis(500 * (1 << attempt));
                    warn!(
                        attempt,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "5xx error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(EngineError::Api(format!(
                        "unexpected status {}: {}",
                        status,
                        body_text.chars().take(200).collect::<String>()
                    )));
                }
                Err(e) if e.is_timeout() => {
                    if timeout_retried {
                        return Err(EngineError::Timeout);
                    }
                    warn!("request timeout, retrying once");
                    timeout_retried = true;
                }
                Err(e) => return Err(EngineError::Api(e.to_string())),
            }
        }
    }
}

#[derive(Deserialize)]
struct TranslateResponse {
    translated: String,
}

impl TranslationEngine for HttpEngine {
    fn name(&self) -> &str {
        "http"
    }

    fn translate<'a>(
        &'a self,
        text: &'a str,
        source_lang: Option<&'a str>,
        target_lang: &'a str,
    ) -> BoxFuture<'a, Result<String, EngineError>> {
        Box::pin(async move {
            if text.is_empty() {
                return Err(EngineError::InvalidInput("empty text".into()));
            }
            let body = serde_json::json!({
                "text": text,
                "source": source_lang,
                "target": target_lang,
            });
            let resp = self.send_with_retry(&body).await?;
            let parsed: TranslateResponse = resp
                .json()
                .await
                .map_err(|e| EngineError::Api(format!("malformed response: {e}")))?;
            Ok(parsed.translated)
        })
    }
}
