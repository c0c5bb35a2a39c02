//! WhatsApp Cloud API client.
//!
//! Sends messages on behalf of a tenant and downloads inbound media. Sends are
//! retried on 5xx responses and network failures with an exponential delay
//! (`base × 2^(attempt-1)`, no jitter); 4xx responses fail immediately.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use tracing::{debug, instrument, warn};

use super::error::WhatsAppError;
use super::types::{
    GraphErrorResponse, MediaDownload, MediaUrlResponse, OutboundContent, SendMessageResponse,
    SendResult, WhatsAppCredentials,
};
use crate::config::WhatsAppConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Bounded retry schedule for outbound sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Total attempts including the first.
    #[must_use]
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// WhatsApp Cloud API client.
#[derive(Clone)]
pub struct WhatsAppClient {
    inner: Arc<WhatsAppClientInner>,
}

struct WhatsAppClientInner {
    client: Client,
    graph_url: String,
    api_version: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("graph_url", &self.inner.graph_url)
            .field("api_version", &self.inner.api_version)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl WhatsAppClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, WhatsAppError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(WhatsAppClientInner {
                client,
                graph_url: config.graph_url.trim_end_matches('/').to_string(),
                api_version: config.api_version.clone(),
                retry: RetryPolicy {
                    max_retries: config.max_retries,
                    base_delay: config.retry_base_delay,
                },
            }),
        })
    }

    /// The retry schedule in use.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.inner.graph_url,
            self.inner.api_version,
            path.trim_start_matches('/')
        )
    }

    /// Send a message, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns `WhatsAppError::Rejected` on a 4xx response (no retry),
    /// `WhatsAppError::RetriesExhausted` once every attempt failed with a 5xx
    /// or network error, and `WhatsAppError::InvalidContent` for unsendable
    /// content.
    #[instrument(skip(self, credentials, content), fields(to = %to, kind = %content.kind()))]
    pub async fn send(
        &self,
        credentials: &WhatsAppCredentials,
        to: &str,
        content: &OutboundContent,
    ) -> Result<SendResult, WhatsAppError> {
        content.validate().map_err(WhatsAppError::InvalidContent)?;

        let payload = content.to_payload(to);
        let retry = self.inner.retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.send_once(credentials, &payload).await {
                Ok(result) => {
                    debug!(wamid = %result.wamid, attempt, "WhatsApp message accepted");
                    return Ok(result);
                }
                Err(err) if err.is_retryable() => {
                    if attempt >= retry.total_attempts() {
                        warn!(attempt, error = %err, "WhatsApp send retries exhausted");
                        return Err(WhatsAppError::RetriesExhausted {
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = retry.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "WhatsApp send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(
        &self,
        credentials: &WhatsAppCredentials,
        payload: &serde_json::Value,
    ) -> Result<SendResult, WhatsAppError> {
        let response = self
            .inner
            .client
            .post(self.endpoint(&format!("{}/messages", credentials.phone_number_id)))
            .bearer_auth(credentials.access_token.expose_secret())
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let body: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| WhatsAppError::Parse(e.to_string()))?;

        body.messages
            .into_iter()
            .next()
            .map(|m| SendResult { wamid: m.id })
            .ok_or_else(|| WhatsAppError::Parse("response carried no message id".to_string()))
    }

    /// Download inbound media: resolve the media id to a URL, then fetch it.
    ///
    /// # Errors
    ///
    /// Returns an error if either request fails.
    #[instrument(skip(self, credentials), fields(media_id = %media_id))]
    pub async fn download_media(
        &self,
        credentials: &WhatsAppCredentials,
        media_id: &str,
    ) -> Result<MediaDownload, WhatsAppError> {
        let token = credentials.access_token.expose_secret();

        let response = self
            .inner
            .client
            .get(self.endpoint(media_id))
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }
        let meta: MediaUrlResponse = response
            .json()
            .await
            .map_err(|e| WhatsAppError::Parse(e.to_string()))?;

        let response = self
            .inner
            .client
            .get(&meta.url)
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response.bytes().await?.to_vec();

        debug!(size = bytes.len(), "Downloaded WhatsApp media");
        Ok(MediaDownload {
            bytes,
            mime_type: meta.mime_type.or(header_mime),
        })
    }
}

/// Map a non-2xx response to a rejected or server error.
async fn error_from_response(status: StatusCode, response: reqwest::Response) -> WhatsAppError {
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GraphErrorResponse>(&body).map_or_else(
        |_| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.chars().take(500).collect()
            }
        },
        |e| match e.error.code {
            Some(code) => format!("{} (code {code})", e.error.message),
            None => e.error.message,
        },
    );

    if status.is_server_error() {
        WhatsAppError::Server {
            status: status.as_u16(),
            message,
        }
    } else {
        WhatsAppError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use secrecy::SecretString;
    use serde_json::{Value, json};

    use super::*;

    #[derive(Clone)]
    struct Script {
        hits: Arc<AtomicU32>,
        fail_times: u32,
        fail_status: u16,
    }

    async fn messages_handler(
        State(script): State<Script>,
        Json(body): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        let hit = script.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if hit <= script.fail_times {
            return (
                AxumStatus::from_u16(script.fail_status).unwrap(),
                Json(json!({"error": {"message": "scripted failure", "code": 1}})),
            );
        }
        assert_eq!(body["messaging_product"], "whatsapp");
        (
            AxumStatus::OK,
            Json(json!({"messages": [{"id": format!("wamid.{hit}")}]})),
        )
    }

    async fn spawn_graph(fail_times: u32, fail_status: u16) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let app = Router::new()
            .route("/v21.0/{phone_id}/messages", post(messages_handler))
            .with_state(Script {
                hits: hits.clone(),
                fail_times,
                fail_status,
            });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), hits)
    }

    fn client(graph_url: String, max_retries: u32) -> WhatsAppClient {
        WhatsAppClient::new(&WhatsAppConfig {
            graph_url,
            max_retries,
            retry_base_delay: Duration::from_millis(5),
            ..WhatsAppConfig::default()
        })
        .unwrap()
    }

    fn creds() -> WhatsAppCredentials {
        WhatsAppCredentials {
            phone_number_id: "1090".to_string(),
            access_token: SecretString::from("EAAG-test"),
        }
    }

    fn hello() -> OutboundContent {
        OutboundContent::Text {
            body: "hello".to_string(),
        }
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.total_attempts(), 4);
    }

    #[test]
    fn test_delay_saturates() {
        let policy = RetryPolicy {
            max_retries: 100,
            base_delay: Duration::from_secs(1),
        };
        assert!(policy.delay_for(64) >= Duration::from_secs(u64::from(u32::MAX)));
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let (url, hits) = spawn_graph(0, 500).await;
        let result = client(url, 3).send(&creds(), "15551234567", &hello()).await.unwrap();
        assert_eq!(result.wamid, "wamid.1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let (url, hits) = spawn_graph(2, 503).await;
        let result = client(url, 3).send(&creds(), "15551234567", &hello()).await.unwrap();
        assert_eq!(result.wamid, "wamid.3");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (url, hits) = spawn_graph(10, 400).await;
        let err = client(url, 3)
            .send(&creds(), "15551234567", &hello())
            .await
            .unwrap_err();
        assert!(matches!(err, WhatsAppError::Rejected { status: 400, .. }));
        assert!(err.to_string().contains("scripted failure"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let (url, hits) = spawn_graph(10, 502).await;
        let err = client(url, 2)
            .send(&creds(), "15551234567", &hello())
            .await
            .unwrap_err();
        assert!(matches!(err, WhatsAppError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_content_never_hits_network() {
        let (url, hits) = spawn_graph(0, 500).await;
        let err = client(url, 3)
            .send(
                &creds(),
                "15551234567",
                &OutboundContent::Text {
                    body: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WhatsAppError::InvalidContent(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
