//! Transactional email through a Brevo-compatible HTTP relay.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::MailConfig;
use crate::telemetry::{record_email, EmailOutcome};

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail relay is not configured")]
    NotConfigured,
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected the message (status={status}): {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    html_content: String,
}

/// A rendered message ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub template: &'static str,
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
}

#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    fn body_for(&self, email: &Email) -> Result<SendEmailBody, MailerError> {
        let sender_email = self
            .config
            .sender_email
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or(MailerError::NotConfigured)?;

        Ok(SendEmailBody {
            sender: EmailAddress {
                email: sender_email,
                name: Some(self.config.sender_name.clone()),
            },
            to: vec![EmailAddress {
                email: email.to_email.clone(),
                name: email.to_name.clone(),
            }],
            subject: email.subject.clone(),
            html_content: email.html.clone(),
        })
    }

    pub async fn send(&self, email: &Email) -> Result<(), MailerError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(MailerError::NotConfigured)?;
        let body = self.body_for(email)?;

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailerError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Sends in the background. Delivery problems are logged and counted,
    /// never surfaced to the caller.
    pub fn dispatch(&self, email: Email) {
        if !self.is_enabled() {
            debug!(template = email.template, "Mail relay disabled, skipping email");
            record_email(email.template, EmailOutcome::Skipped);
            return;
        }

        let mailer = self.clone();
        tokio::spawn(async move {
            match mailer.send(&email).await {
                Ok(()) => {
                    info!(template = email.template, "Email sent");
                    record_email(email.template, EmailOutcome::Sent);
                }
                Err(e) => {
                    error!(template = email.template, error = %e, "Failed to send email");
                    record_email(email.template, EmailOutcome::Failed);
                }
            }
        });
    }
}
