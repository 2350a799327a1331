//! Email service for pool lifecycle notifications.
//!
//! Supports multiple email providers:
//! - `console`: Logs emails to console (development)
//! - `sendgrid`: Uses SendGrid API
//!
//! Delivery is best effort. Callers log failures and carry on; a missed
//! notification never blocks a booking.

use crate::config::EmailConfig;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during email operations.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email service disabled")]
    Disabled,

    #[error("Email service not configured")]
    NotConfigured,

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
}

impl EmailService {
    /// Creates a new EmailService with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Send an email using the configured provider.
    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(to = %message.to, "Email disabled, dropping message");
            return Err(EmailError::Disabled);
        }

        if !message.to.contains('@') {
            return Err(EmailError::InvalidAddress(message.to));
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(message),
            "sendgrid" => self.send_sendgrid(message).await,
            other => {
                warn!(provider = other, "Unknown email provider");
                Err(EmailError::NotConfigured)
            }
        }
    }

    /// Notify the host that their pool has reached its funding quorum.
    pub async fn send_pool_bookable(
        &self,
        to: &str,
        origin: &str,
        destination: &str,
    ) -> Result<(), EmailError> {
        self.send(EmailMessage {
            to: to.to_string(),
            subject: "Your ride pool is ready to book".to_string(),
            body_text: format!(
                "Enough passengers have paid into your pool for {} to {}. \
                 You can now issue a check-in code and book the ride.",
                origin, destination
            ),
        })
        .await
    }

    /// Notify a contributor that the pool was canceled.
    pub async fn send_pool_canceled(
        &self,
        to: &str,
        origin: &str,
        destination: &str,
    ) -> Result<(), EmailError> {
        self.send(EmailMessage {
            to: to.to_string(),
            subject: "Your ride pool was canceled".to_string(),
            body_text: format!(
                "The ride pool for {} to {} was canceled. \
                 Any captured payment is being refunded to you.",
                origin, destination
            ),
        })
        .await
    }

    fn send_console(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body_text,
            "Email (console provider)"
        );
        Ok(())
    }

    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured);
        }

        let payload = serde_json::json!({
            "personalizations": [{
                "to": [{"email": message.to}]
            }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": [{
                "type": "text/plain",
                "value": message.body_text
            }]
        });

        let client = reqwest::Client::new();
        let response = client
            .post("https://api.sendgrid.com/v3/mail/send")
            .header(
                "Authorization",
                format!("Bearer {}", self.config.sendgrid_api_key),
            )
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmailError::SendFailed(format!(
                "SendGrid returned HTTP {}",
                response.status()
            )));
        }

        Ok(())
    }
}
