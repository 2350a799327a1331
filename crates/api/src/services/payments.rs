//! Payment provider integration.
//!
//! Wraps the provider's HTTP API behind a trait so route handlers and jobs
//! can be tested against a stub gateway, and verifies signed webhook
//! deliveries.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PaymentsConfig;

type HmacSha256 = Hmac<Sha256>;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider not configured")]
    NotConfigured,

    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider returned an error: {0}")]
    ProviderError(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// A hosted checkout session created at the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TransferResponse {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

/// Payment provider operations used by the pool lifecycle.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for one contribution.
    async fn create_checkout_session(
        &self,
        contribution_id: Uuid,
        amount_minor: i64,
        currency: &str,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Release an uncaptured authorization.
    async fn cancel_authorization(&self, payment_ref: &str) -> Result<(), PaymentError>;

    /// Refund a captured payment in full.
    async fn refund(&self, payment_ref: &str) -> Result<(), PaymentError>;

    /// Transfer collected funds to the booker's connected account.
    /// Returns the provider transfer reference.
    async fn create_transfer(
        &self,
        account_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<String, PaymentError>;
}

/// HTTP implementation talking to the provider's REST API.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    return_url: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            return_url: config.checkout_return_url.clone(),
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, PaymentError> {
        if self.secret_key.is_empty() {
            return Err(PaymentError::NotConfigured);
        }

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ProviderErrorBody>().await {
                Ok(body) => body.error.message,
                Err(_) => format!("HTTP {}", status),
            };
            return Err(PaymentError::ProviderError(message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout_session(
        &self,
        contribution_id: Uuid,
        amount_minor: i64,
        currency: &str,
    ) -> Result<CheckoutSession, PaymentError> {
        let form = [
            ("mode", "payment".to_string()),
            ("line_items[0][price_data][currency]", currency.to_string()),
            (
                "line_items[0][price_data][unit_amount]",
                amount_minor.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                "Ride pool contribution".to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "metadata[contribution_id]",
                contribution_id.to_string(),
            ),
            ("success_url", self.return_url.clone()),
            ("cancel_url", self.return_url.clone()),
        ];

        self.post_form("/checkout/sessions", &form).await
    }

    async fn cancel_authorization(&self, payment_ref: &str) -> Result<(), PaymentError> {
        let _: serde_json::Value = self
            .post_form(
                &format!("/payment_intents/{}/cancel", payment_ref),
                &[],
            )
            .await?;
        Ok(())
    }

    async fn refund(&self, payment_ref: &str) -> Result<(), PaymentError> {
        let form = [("payment_intent", payment_ref.to_string())];
        let _: serde_json::Value = self.post_form("/refunds", &form).await?;
        Ok(())
    }

    async fn create_transfer(
        &self,
        account_id: &str,
        amount_minor: i64,
        currency: &str,
    ) -> Result<String, PaymentError> {
        let form = [
            ("destination", account_id.to_string()),
            ("amount", amount_minor.to_string()),
            ("currency", currency.to_string()),
        ];
        let response: TransferResponse = self.post_form("/transfers", &form).await?;
        Ok(response.id)
    }
}

/// Errors from webhook signature verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing or malformed signature header")]
    MalformedHeader,

    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,

    #[error("No signature matched")]
    NoMatchingSignature,
}

/// Verifies a provider webhook signature header of the form
/// `t=<unix>,v1=<hex hmac>`.
///
/// The signed message is `"{t}.{payload}"`. Every configured secret is
/// tried, newest first, so secret rotation does not drop in-flight
/// deliveries.
pub fn verify_webhook_signature(
    payload: &str,
    header: &str,
    secrets: &[String],
    tolerance_secs: i64,
    now_unix: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    if (now_unix - timestamp).abs() > tolerance_secs {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let message = format!("{}.{}", timestamp, payload);

    // Mac::verify_slice is constant time; decode the hex first so casing
    // differences do not matter.
    for secret in secrets {
        for signature in &signatures {
            let Ok(raw) = hex::decode(signature) else {
                continue;
            };
            let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
                Ok(mac) => mac,
                Err(_) => continue,
            };
            mac.update(message.as_bytes());
            if mac.verify_slice(&raw).is_ok() {
                return Ok(());
            }
        }
    }

    Err(WebhookError::NoMatchingSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("t={},v1={}", timestamp, signature)
    }

    #[test]
    fn test_valid_signature() {
        let secrets = vec!["whsec_a".to_string()];
        let header = sign("{}", "whsec_a", 1_700_000_000);
        assert!(
            verify_webhook_signature("{}", &header, &secrets, 300, 1_700_000_010).is_ok()
        );
    }

    #[test]
    fn test_rotated_secret_still_verifies() {
        let secrets = vec!["whsec_new".to_string(), "whsec_old".to_string()];
        let header = sign("{}", "whsec_old", 1_700_000_000);
        assert!(
            verify_webhook_signature("{}", &header, &secrets, 300, 1_700_000_010).is_ok()
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let secrets = vec!["whsec_a".to_string()];
        let header = sign("{}", "whsec_b", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature("{}", &header, &secrets, 300, 1_700_000_010),
            Err(WebhookError::NoMatchingSignature)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let secrets = vec!["whsec_a".to_string()];
        let header = sign("{}", "whsec_a", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature("{\"a\":1}", &header, &secrets, 300, 1_700_000_010),
            Err(WebhookError::NoMatchingSignature)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let secrets = vec!["whsec_a".to_string()];
        let header = sign("{}", "whsec_a", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature("{}", &header, &secrets, 300, 1_700_000_301),
            Err(WebhookError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let secrets = vec!["whsec_a".to_string()];
        let header = sign("{}", "whsec_a", 1_700_000_600);
        assert_eq!(
            verify_webhook_signature("{}", &header, &secrets, 300, 1_700_000_000),
            Err(WebhookError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_malformed_header_rejected() {
        let secrets = vec!["whsec_a".to_string()];
        assert_eq!(
            verify_webhook_signature("{}", "not-a-signature", &secrets, 300, 0),
            Err(WebhookError::MalformedHeader)
        );
        assert_eq!(
            verify_webhook_signature("{}", "t=123", &secrets, 300, 123),
            Err(WebhookError::MalformedHeader)
        );
        assert_eq!(
            verify_webhook_signature("{}", "v1=abcd", &secrets, 300, 0),
            Err(WebhookError::MalformedHeader)
        );
    }

    #[test]
    fn test_no_secrets_rejects() {
        let header = sign("{}", "whsec_a", 1_700_000_000);
        assert_eq!(
            verify_webhook_signature("{}", &header, &[], 300, 1_700_000_000),
            Err(WebhookError::NoMatchingSignature)
        );
    }
}
