//! Payment gateway REST client.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use super::error::PaymentGatewayError;
use super::types::{CreatePaymentLink, ErrorResponse, PaymentLink};
use crate::config::PaymentGatewayConfig;
use crate::signature;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Payment gateway client.
#[derive(Clone)]
pub struct PaymentGatewayClient {
    inner: Arc<PaymentGatewayClientInner>,
}

struct PaymentGatewayClientInner {
    client: reqwest::Client,
    api_url: String,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for PaymentGatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGatewayClient")
            .field("api_url", &self.inner.api_url)
            .field("key_id", &self.inner.key_id)
            .finish_non_exhaustive()
    }
}

impl PaymentGatewayClient {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentGatewayConfig) -> Result<Self, PaymentGatewayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            inner: Arc::new(PaymentGatewayClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
                webhook_secret: config.webhook_secret.clone(),
            }),
        })
    }

    /// Verify the `X-Razorpay-Signature` header against the raw body.
    #[must_use]
    pub fn verify_webhook(&self, body: &[u8], signature_header: &str) -> bool {
        signature::verify_hex_signature(
            self.inner.webhook_secret.expose_secret().as_bytes(),
            body,
            signature_header,
        )
    }

    /// Create a payment link.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    #[instrument(skip(self, request), fields(reference_id = %request.reference_id, amount = request.amount))]
    pub async fn create_payment_link(
        &self,
        request: &CreatePaymentLink,
    ) -> Result<PaymentLink, PaymentGatewayError> {
        let response = self
            .inner
            .client
            .post(format!("{}/payment_links", self.inner.api_url))
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .json(request)
            .send()
            .await?;

        let link: PaymentLink = handle_response(response).await?;
        debug!(link_id = %link.id, "Payment link created");
        Ok(link)
    }

    /// Cancel an unpaid payment link.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the gateway rejects it.
    #[instrument(skip(self))]
    pub async fn cancel_payment_link(&self, link_id: &str) -> Result<PaymentLink, PaymentGatewayError> {
        let response = self
            .inner
            .client
            .post(format!(
                "{}/payment_links/{}/cancel",
                self.inner.api_url,
                urlencoding::encode(link_id)
            ))
            .basic_auth(&self.inner.key_id, Some(self.inner.key_secret.expose_secret()))
            .send()
            .await?;

        handle_response(response).await
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PaymentGatewayError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| PaymentGatewayError::Parse(e.to_string()));
    }

    let message = serde_json::from_str::<ErrorResponse>(&body).map_or_else(
        |_| body.chars().take(300).collect(),
        |e| match e.error.code {
            Some(code) => format!("{code}: {}", e.error.description),
            None => e.error.description,
        },
    );
    Err(PaymentGatewayError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::super::types::{LinkCustomer, LinkNotify};
    use super::*;

    async fn create_link(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !auth.starts_with("Basic ") {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": {"code": "BAD_REQUEST_ERROR", "description": "Authentication failed"}})),
            );
        }
        if body["amount"].as_i64().unwrap_or(0) <= 0 {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": "BAD_REQUEST_ERROR", "description": "amount must be positive"}})),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "id": format!("plink_{}", body["reference_id"].as_str().unwrap()),
                "short_url": "https://rzp.io/i/abc",
                "status": "created"
            })),
        )
    }

    async fn spawn_gateway() -> String {
        let app = Router::new().route("/v1/payment_links", post(create_link));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn client(api_url: String) -> PaymentGatewayClient {
        PaymentGatewayClient::new(&PaymentGatewayConfig {
            key_id: "rzp_test_1".to_string(),
            key_secret: SecretString::from("k-secret-9a8b7c"),
            webhook_secret: SecretString::from("wh-9a8b7c"),
            api_url,
        })
        .unwrap()
    }

    fn request(amount: i64) -> CreatePaymentLink {
        CreatePaymentLink {
            amount,
            currency: "INR".to_string(),
            accept_partial: false,
            description: "Order ORD-0001".to_string(),
            reference_id: "42".to_string(),
            customer: LinkCustomer {
                name: "Asha".to_string(),
                contact: "+919876543210".to_string(),
                email: None,
            },
            notify: LinkNotify::default(),
            reminder_enable: false,
            notes: HashMap::from([("tenant_id".to_string(), "7".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_create_payment_link() {
        let url = spawn_gateway().await;
        let link = client(url).create_payment_link(&request(50_000)).await.unwrap();
        assert_eq!(link.id, "plink_42");
        assert_eq!(link.short_url, "https://rzp.io/i/abc");
    }

    #[tokio::test]
    async fn test_gateway_error_is_reported() {
        let url = spawn_gateway().await;
        let err = client(url).create_payment_link(&request(0)).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::Api { status: 400, .. }));
        assert!(err.to_string().contains("amount must be positive"));
    }

    #[test]
    fn test_verify_webhook() {
        let c = client("http://unused".to_string());
        let body = br#"{"event":"payment_link.paid"}"#;
        let sig = signature::hmac_sha256_hex(b"wh-9a8b7c", body).unwrap();
        assert!(c.verify_webhook(body, &sig));
        assert!(!c.verify_webhook(body, "deadbeef"));
    }
}
