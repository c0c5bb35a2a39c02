//! Image host client used to persist inbound WhatsApp media.
//!
//! WhatsApp media URLs expire and require the tenant's bearer token, so
//! inbound images and documents are re-uploaded to an imgbb-compatible host and
//! the public URL is stored on the message row.
//!
//! # API Reference
//!
//! - Upload: `POST {upload_url}?key=<api key>` with form fields `image`
//!   (base64 file contents) and optional `name`
//! - Response: `{"data": {"url": "...", "display_url": "..."}, "success": true}`

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ImageHostConfig;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when uploading to the image host.
#[derive(Debug, Error)]
pub enum ImageHostError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
    #[serde(default)]
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    #[serde(default)]
    message: String,
}

/// Image host API client.
#[derive(Clone)]
pub struct ImageHostClient {
    inner: Arc<ImageHostClientInner>,
}

struct ImageHostClientInner {
    client: reqwest::Client,
    api_key: SecretString,
    upload_url: String,
}

impl std::fmt::Debug for ImageHostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHostClient")
            .field("upload_url", &self.inner.upload_url)
            .finish_non_exhaustive()
    }
}

impl ImageHostClient {
    /// Create a new image host client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &ImageHostConfig) -> Result<Self, ImageHostError> {
        let client = reqwest::Client::builder().timeout(UPLOAD_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(ImageHostClientInner {
                client,
                api_key: config.api_key.clone(),
                upload_url: config.upload_url.clone(),
            }),
        })
    }

    /// Upload file contents and return the public URL.
    ///
    /// # Errors
    ///
    /// Returns error if the upload fails or the response has no URL.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, bytes: &[u8], name: Option<&str>) -> Result<String, ImageHostError> {
        let encoded = BASE64.encode(bytes);
        let mut form = vec![("image", encoded)];
        if let Some(name) = name {
            form.push(("name", name.to_string()));
        }

        let response = self
            .inner
            .client
            .post(&self.inner.upload_url)
            .query(&[("key", self.inner.api_key.expose_secret())])
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                ImageHostError::Parse(e.to_string())
            } else {
                ImageHostError::Api {
                    status: status.as_u16(),
                    message: body.chars().take(300).collect(),
                }
            }
        })?;

        if !status.is_success() || !parsed.success {
            return Err(ImageHostError::Api {
                status: status.as_u16(),
                message: parsed
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "upload rejected".to_string()),
            });
        }

        let url = parsed
            .data
            .map(|d| d.url)
            .ok_or_else(|| ImageHostError::Parse("response carried no url".to_string()))?;
        debug!(url = %url, "Uploaded media to image host");
        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::routing::post;
    use axum::{Form, Json, Router};
    use serde_json::{Value, json};

    use super::*;

    async fn upload_handler(
        Query(query): Query<HashMap<String, String>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        if query.get("key").map(String::as_str) != Some("k3y-9f8e7d") {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": {"message": "Invalid API v1 key."}})),
            );
        }
        let decoded = BASE64.decode(form.get("image").unwrap()).unwrap();
        let name = form.get("name").cloned().unwrap_or_default();
        (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {"url": format!("https://i.host.test/{name}-{}", decoded.len())}
            })),
        )
    }

    async fn spawn_host() -> String {
        let app = Router::new().route("/upload", post(upload_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/upload")
    }

    fn client(upload_url: String, key: &str) -> ImageHostClient {
        ImageHostClient::new(&ImageHostConfig {
            api_key: SecretString::from(key.to_string()),
            upload_url,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_upload_returns_url() {
        let url = spawn_host().await;
        let hosted = client(url, "k3y-9f8e7d")
            .upload(b"\x89PNG....", Some("photo"))
            .await
            .unwrap();
        assert_eq!(hosted, "https://i.host.test/photo-8");
    }

    #[tokio::test]
    async fn test_upload_error_message() {
        let url = spawn_host().await;
        let err = client(url, "wrong").upload(b"abc", None).await.unwrap_err();
        assert!(matches!(err, ImageHostError::Api { status: 400, .. }));
        assert!(err.to_string().contains("Invalid API v1 key."));
    }
}
