//! Brevo API provider (formerly Sendinblue).
//!
//! For reference: [Brevo API docs](https://developers.brevo.com/reference/sendtransacemail)
//!
//! # Example
//!
//! ```rust,ignore
//! use mailrelay::providers::BrevoMailer;
//!
//! let mailer = BrevoMailer::new(config, store);
//! let record = mailer.check_api_key("xkeysib-...").await?;
//! assert_eq!(record.code, 200);
//! ```
//!
//! A send succeeds only on `201 Created`. Any other status is reported as
//! a rejected [`SendOutcome`] carrying the API's `message` and the status.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::address::Address;
use crate::attachment::Attachment;
use crate::config::{sender_override, BrevoConfig, ProviderId, ValidationRecord};
use crate::config_store::ConfigStore;
use crate::email::{Content, Email};
use crate::error::MailError;
use crate::mailer::{HeaderSet, Mailer, ProviderResponse, SendOutcome};

const BREVO_BASE_URL: &str = "https://api.brevo.com/v3";
const BREVO_SEND_ENDPOINT: &str = "/smtp/email";
const BREVO_ACCOUNT_ENDPOINT: &str = "/account";

/// Status Brevo answers with when it accepts a message.
const EMAIL_SENT_CODE: u16 = 201;

const VALIDATION_TIMEOUT: Duration = Duration::from_secs(45);

/// Attachment extensions Brevo accepts.
pub const ALLOWED_ATTACHMENT_EXTENSIONS: &[&str] = &[
    "xlsx", "xls", "ods", "docx", "docm", "doc", "csv", "pdf", "txt", "gif", "jpg", "jpeg", "png",
    "tif", "tiff", "rtf", "bmp", "cgm", "css", "shtml", "html", "htm", "zip", "xml", "ppt", "pptx",
    "tar", "ez", "ics", "mobi", "msg", "pub", "eps", "odt", "mp3", "m4a", "m4v", "wma", "ogg",
    "flac", "wav", "aif", "aifc", "aiff", "mp4", "mov", "avi", "mkv", "mpeg", "mpg", "wmv",
];

/// Brevo API email provider.
pub struct BrevoMailer {
    config: BrevoConfig,
    store: Arc<dyn ConfigStore>,
    base_url: String,
    client: Client,
    headers: HeaderSet,
}

impl BrevoMailer {
    /// Create a mailer from the stored Brevo configuration.
    pub fn new(config: BrevoConfig, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            config,
            store,
            base_url: BREVO_BASE_URL.to_string(),
            client: Client::new(),
            headers: HeaderSet::new(),
        }
    }

    /// Use a custom reqwest client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build the request body for `email`, applying the configured sender
    /// override. Returns the body and the sender actually used.
    pub fn build_payload(&self, email: &Email) -> Result<(BrevoPayload, Address), MailError> {
        let resolved_from = sender_override(&self.config.from_name, &self.config.from_email)
            .or_else(|| email.from.clone())
            .ok_or(MailError::MissingField("from"))?;

        let mut payload = BrevoPayload::default();
        payload.set_from(&resolved_from);
        payload.set_recipients(RecipientKind::To, &email.to);
        payload.set_recipients(RecipientKind::Cc, &email.cc);
        payload.set_recipients(RecipientKind::Bcc, &email.bcc);
        payload.set_subject(&email.subject);
        payload.set_content(&email.content);
        payload.set_reply_to(&email.reply_to);
        payload.set_attachments(&email.attachments);

        Ok((payload, resolved_from))
    }

    /// Caller headers plus the ones the API requires, which win on a clash.
    pub fn request_headers(&self) -> HeaderSet {
        let mut headers = self.headers.clone();
        headers.set_headers([
            ("api-key", self.config.api_key.as_str()),
            ("Accept", "application/json"),
            ("Content-Type", "application/json"),
        ]);
        headers.set_header("User-Agent", &format!("mailrelay/{}", crate::VERSION));
        headers
    }

    /// Check `api_key` against the account endpoint and store the result
    /// as the Brevo validation record.
    ///
    /// Network failures are recorded with code `0`.
    pub async fn check_api_key(&self, api_key: &str) -> Result<ValidationRecord, MailError> {
        let url = format!("{}{}", self.base_url, BREVO_ACCOUNT_ENDPOINT);

        let result = self
            .client
            .get(&url)
            .header("api-key", api_key)
            .header("Accept", "application/json")
            .timeout(VALIDATION_TIMEOUT)
            .send()
            .await;

        let record = match result {
            Ok(response) => {
                let code = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                ValidationRecord {
                    code,
                    error_message: error_message(&body).unwrap_or_default(),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Brevo key validation request failed");
                ValidationRecord {
                    code: 0,
                    error_message: e.to_string(),
                }
            }
        };

        tracing::debug!(code = record.code, "Brevo key validation");
        self.store.set_validation(ProviderId::Brevo, record.clone())?;
        Ok(record)
    }

    /// True when a key is configured and the last validation returned 200.
    ///
    /// The validation record is not tied to a particular key, so a record
    /// from an earlier key still counts until the next check.
    pub fn is_mailer_complete(&self) -> Result<bool, MailError> {
        if self.config.api_key.is_empty() {
            return Ok(false);
        }
        Ok(matches!(
            self.store.validation(ProviderId::Brevo)?,
            Some(record) if record.code == 200
        ))
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, email: &Email) -> Result<SendOutcome, MailError> {
        let (payload, resolved_from) = self.build_payload(email)?;
        let url = format!("{}{}", self.base_url, BREVO_SEND_ENDPOINT);

        let mut request = self.client.post(&url);
        for (name, value) in self.request_headers().iter() {
            request = request.header(name, value);
        }

        let response = request.json(&payload).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if status == EMAIL_SENT_CODE {
            let mut response = ProviderResponse::new("Sent Successfully").code(status);
            if let Ok(reply) = serde_json::from_str::<BrevoSendReply>(&body) {
                response.message_id = reply.message_id;
            }
            tracing::debug!(message_id = ?response.message_id, "Brevo accepted message");
            Ok(SendOutcome::delivered(resolved_from, response))
        } else {
            let message = error_message(&body).unwrap_or_else(|| "Unknown error".to_string());
            tracing::warn!(status, message = %message, "Brevo rejected message");
            Ok(SendOutcome::rejected(
                resolved_from,
                ProviderResponse::new(message).code(status),
            ))
        }
    }

    fn is_configured(&self) -> bool {
        self.is_mailer_complete().unwrap_or(false)
    }

    fn provider_name(&self) -> &'static str {
        "brevo"
    }

    fn headers_mut(&mut self) -> &mut HeaderSet {
        &mut self.headers
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<BrevoError>(body)
        .ok()
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
}

// ============================================================================
// Request body
// ============================================================================

/// Recipient lists Brevo accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

/// A sender or recipient in a Brevo request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrevoContact {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl BrevoContact {
    fn from_address(addr: &Address) -> Option<Self> {
        if !Address::is_valid(&addr.email) {
            return None;
        }
        Some(Self {
            email: addr.email.clone(),
            name: addr.name.clone().filter(|n| !n.is_empty()),
        })
    }
}

/// A base64-encoded attachment in a Brevo request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrevoAttachment {
    pub name: String,
    pub content: String,
}

/// JSON body for `POST /smtp/email`, filled in field by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrevoPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<BrevoContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<BrevoContact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<BrevoContact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Vec<BrevoContact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<BrevoContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachment: Vec<BrevoAttachment>,
}

impl BrevoPayload {
    /// Set the sender; an invalid address leaves the body unchanged.
    pub fn set_from(&mut self, from: &Address) {
        if let Some(contact) = BrevoContact::from_address(from) {
            self.sender = Some(contact);
        }
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.subject = Some(subject.to_string());
    }

    /// Plain-text bodies become `textContent`; anything else `htmlContent`.
    /// Empty bodies are skipped.
    pub fn set_content(&mut self, content: &Content) {
        if let Some(text) = content.text_part().filter(|t| !t.is_empty()) {
            self.text_content = Some(text.to_string());
        }
        if let Some(html) = content.html_part().filter(|h| !h.is_empty()) {
            self.html_content = Some(html.to_string());
        }
    }

    /// Set one recipient list, keeping only valid addresses. A list with no
    /// valid entries is left off the body.
    pub fn set_recipients(&mut self, kind: RecipientKind, addrs: &[Address]) {
        let contacts: Vec<BrevoContact> =
            addrs.iter().filter_map(BrevoContact::from_address).collect();
        if contacts.is_empty() {
            return;
        }
        match kind {
            RecipientKind::To => self.to = Some(contacts),
            RecipientKind::Cc => self.cc = Some(contacts),
            RecipientKind::Bcc => self.bcc = Some(contacts),
        }
    }

    /// Brevo takes a single reply-to; the first valid address wins.
    pub fn set_reply_to(&mut self, addrs: &[Address]) {
        if let Some(contact) = addrs.iter().find_map(BrevoContact::from_address) {
            self.reply_to = Some(contact);
        }
    }

    /// Attach files whose extension is allowed. Unreadable files are skipped.
    pub fn set_attachments(&mut self, attachments: &[Attachment]) {
        for attachment in attachments {
            let allowed = attachment
                .extension()
                .is_some_and(|ext| ALLOWED_ATTACHMENT_EXTENSIONS.contains(&ext.as_str()));
            if !allowed {
                tracing::debug!(attachment = %attachment.filename, "Extension not accepted by Brevo");
                continue;
            }

            match attachment.base64_data() {
                Ok(content) => self.attachment.push(BrevoAttachment {
                    name: attachment.filename.clone(),
                    content,
                }),
                Err(e) => {
                    tracing::warn!(attachment = %attachment.filename, error = %e, "Skipping unreadable attachment");
                }
            }
        }
    }
}

// ============================================================================
// Brevo API Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendReply {
    message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BrevoError {
    message: Option<String>,
}
