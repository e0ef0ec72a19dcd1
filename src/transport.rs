//! Mail transports used by the local-relay and SMTP adapters.
//!
//! A [`Transport`] takes a fully-built [`Email`] and a [`Route`] (sendmail
//! or a specific SMTP server) and hands the message off. Adapters build
//! the route from their provider config on every send.
//!
//! [`LettreTransport`] is the real implementation. [`LocalTransport`]
//! records messages in memory for development and tests:
//!
//! ```rust,ignore
//! use mailrelay::transport::LocalTransport;
//! use mailrelay::testing::*;
//!
//! let transport = LocalTransport::shared();
//! let service = MailService::builder(store, logs).transport(transport.clone()).build();
//!
//! service.send_mail(request).await;
//! assert_mail_sent(&transport);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{Attachment as LettreAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::address::Address;
use crate::config::Encryption;
use crate::email::{Content, Email};
use crate::error::MailError;

/// Connection details for one SMTP send.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Username and plaintext password, when authentication is on.
    pub credentials: Option<(String, String)>,
    pub encryption: Encryption,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.credentials.as_ref().map(|(u, _)| u))
            .field("encryption", &self.encryption)
            .finish()
    }
}

/// Where a transport should hand the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The platform's local mail transport.
    Sendmail,
    /// A specific SMTP server.
    Smtp(SmtpSettings),
}

/// What the transport reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReceipt {
    pub accepted: bool,
    pub message: String,
    pub code: Option<u16>,
}

impl TransportReceipt {
    /// An accepted hand-off with a note.
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
            code: None,
        }
    }
}

/// Hands a built message to a mail system.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `email` over `route`.
    async fn send(&self, route: &Route, email: &Email) -> Result<TransportReceipt, MailError>;
}

// ============================================================================
// Lettre
// ============================================================================

/// Transport backed by lettre's sendmail and SMTP clients.
#[derive(Debug, Clone, Default)]
pub struct LettreTransport {
    sendmail_command: Option<String>,
}

impl LettreTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific sendmail binary instead of the system default.
    pub fn sendmail_command(mut self, command: impl Into<String>) -> Self {
        self.sendmail_command = Some(command.into());
        self
    }

    /// Build a lettre Message from our Email struct.
    pub fn build_message(email: &Email) -> Result<Message, MailError> {
        let from = email
            .from
            .as_ref()
            .ok_or(MailError::MissingField("from"))?;

        if email.all_recipients().is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let mut builder = Message::builder()
            .from(address_to_mailbox(from)?)
            .subject(email.subject.clone());

        for to in &email.to {
            builder = builder.to(address_to_mailbox(to)?);
        }
        for cc in &email.cc {
            builder = builder.cc(address_to_mailbox(cc)?);
        }
        for bcc in &email.bcc {
            builder = builder.bcc(address_to_mailbox(bcc)?);
        }
        for reply_to in &email.reply_to {
            builder = builder.reply_to(address_to_mailbox(reply_to)?);
        }

        // Content-Type is set from the body below
        for (name, value) in email.outgoing_headers() {
            if name.eq_ignore_ascii_case("Content-Type") {
                continue;
            }
            match HeaderName::new_from_ascii(name.clone()) {
                Ok(header_name) => {
                    builder = builder.raw_header(HeaderValue::new(header_name, value));
                }
                Err(_) => {
                    tracing::debug!(header = %name, "Skipping header with invalid name");
                }
            }
        }

        let attachments: Vec<SinglePart> = email
            .attachments
            .iter()
            .filter_map(|attachment| match attachment.get_data() {
                Ok(data) => {
                    let content_type = ContentType::parse(&attachment.content_type)
                        .unwrap_or(ContentType::TEXT_PLAIN);
                    Some(LettreAttachment::new(attachment.filename.clone()).body(data, content_type))
                }
                Err(e) => {
                    tracing::warn!(attachment = %attachment.filename, error = %e, "Skipping unreadable attachment");
                    None
                }
            })
            .collect();

        let message = if attachments.is_empty() {
            match &email.content {
                Content::Single { body, content_type } => builder
                    .header(body_content_type(email, content_type)?)
                    .body(body.clone())?,
                Content::Alternative { text, html } => {
                    builder.multipart(alternative_part(text, html, &email.charset)?)?
                }
            }
        } else {
            let mut mixed = match &email.content {
                Content::Single { body, content_type } => MultiPart::mixed().singlepart(
                    SinglePart::builder()
                        .header(body_content_type(email, content_type)?)
                        .body(body.clone()),
                ),
                Content::Alternative { text, html } => {
                    MultiPart::mixed().multipart(alternative_part(text, html, &email.charset)?)
                }
            };
            for part in attachments {
                mixed = mixed.singlepart(part);
            }
            builder.multipart(mixed)?
        };

        Ok(message)
    }
}

#[async_trait]
impl Transport for LettreTransport {
    async fn send(&self, route: &Route, email: &Email) -> Result<TransportReceipt, MailError> {
        let message = Self::build_message(email)?;

        match route {
            Route::Sendmail => {
                let transport = match &self.sendmail_command {
                    Some(command) => {
                        AsyncSendmailTransport::<Tokio1Executor>::new_with_command(command.clone())
                    }
                    None => AsyncSendmailTransport::<Tokio1Executor>::new(),
                };
                transport.send(message).await?;
                Ok(TransportReceipt::accepted("Sent Successfully"))
            }
            Route::Smtp(settings) => {
                let mut builder = match settings.encryption {
                    Encryption::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?,
                    Encryption::Tls => {
                        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
                    }
                    Encryption::None => {
                        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                    }
                }
                .port(settings.port);

                if let Some((username, password)) = &settings.credentials {
                    builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
                }

                let response = builder.build().send(message).await?;
                let text = response
                    .message()
                    .next()
                    .map(|line| line.to_string())
                    .unwrap_or_else(|| "Sent Successfully".to_string());

                Ok(TransportReceipt {
                    accepted: response.is_positive(),
                    message: text,
                    code: response.code().to_string().parse().ok(),
                })
            }
        }
    }
}

fn body_content_type(email: &Email, mime: &str) -> Result<ContentType, MailError> {
    let raw = match email.multipart_boundary() {
        Some(boundary) => format!("{}; boundary=\"{}\"", mime, boundary),
        None if mime.to_ascii_lowercase().starts_with("text/") && !email.charset.is_empty() => {
            format!("{}; charset={}", mime, email.charset)
        }
        None => mime.to_string(),
    };
    ContentType::parse(&raw)
        .map_err(|e| MailError::BuildError(format!("invalid content type '{}': {:?}", raw, e)))
}

fn alternative_part(text: &str, html: &str, charset: &str) -> Result<MultiPart, MailError> {
    let charset = if charset.is_empty() { "UTF-8" } else { charset };
    let text_type = ContentType::parse(&format!("text/plain; charset={}", charset))
        .map_err(|e| MailError::BuildError(format!("invalid charset '{}': {:?}", charset, e)))?;
    let html_type = ContentType::parse(&format!("text/html; charset={}", charset))
        .map_err(|e| MailError::BuildError(format!("invalid charset '{}': {:?}", charset, e)))?;

    Ok(MultiPart::alternative()
        .singlepart(SinglePart::builder().header(text_type).body(text.to_string()))
        .singlepart(SinglePart::builder().header(html_type).body(html.to_string())))
}

/// Convert our Address to lettre's Mailbox.
fn address_to_mailbox(addr: &Address) -> Result<Mailbox, MailError> {
    let email: lettre::Address = addr.to_ascii()?.parse()?;
    Ok(Mailbox::new(addr.name.clone(), email))
}

// ============================================================================
// In-memory
// ============================================================================

/// A message captured by [`LocalTransport`].
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Unique identifier for this capture.
    pub id: String,
    pub route: Route,
    pub email: Email,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Mode {
    Accept,
    Refuse,
    Fail(MailError),
}

/// Transport that stores messages in memory instead of sending them.
///
/// Use for:
/// - **Development**: run without a mail server
/// - **Testing**: assert on sent mail with the [testing helpers](crate::testing)
#[derive(Debug)]
pub struct LocalTransport {
    deliveries: RwLock<Vec<Delivery>>,
    mode: RwLock<Mode>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self {
            deliveries: RwLock::new(Vec::new()),
            mode: RwLock::new(Mode::Accept),
        }
    }

    /// Create a transport wrapped in an Arc for sharing with the service.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // =========================================================================
    // Failure Simulation
    // =========================================================================

    /// Make every send fail with a transport error.
    ///
    /// ```rust,ignore
    /// transport.set_failure("SMTP connection refused", Some(421));
    /// let report = service.send_mail(request).await;
    /// assert!(!report.sent);
    /// ```
    pub fn set_failure(&self, message: impl Into<String>, code: Option<u16>) {
        *self.mode.write() = Mode::Fail(MailError::Transport {
            message: message.into(),
            code,
        });
    }

    /// Make every send report a refused hand-off without an error.
    pub fn set_refusal(&self) {
        *self.mode.write() = Mode::Refuse;
    }

    /// Go back to accepting every send.
    pub fn clear_failure(&self) {
        *self.mode.write() = Mode::Accept;
    }

    // =========================================================================
    // Captured mail
    // =========================================================================

    /// All captured deliveries, oldest first.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.read().clone()
    }

    /// The most recent delivery.
    pub fn last_delivery(&self) -> Option<Delivery> {
        self.deliveries.read().last().cloned()
    }

    /// Number of captured deliveries.
    pub fn count(&self) -> usize {
        self.deliveries.read().len()
    }

    /// Check if anything was sent.
    pub fn has_deliveries(&self) -> bool {
        !self.deliveries.read().is_empty()
    }

    /// Remove and return everything captured so far.
    pub fn flush(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.deliveries.write())
    }

    /// Forget everything captured so far.
    pub fn clear(&self) {
        self.deliveries.write().clear();
    }

    /// Check if a message was sent to a specific address.
    pub fn sent_to(&self, email: &str) -> bool {
        self.deliveries.read().iter().any(|d| {
            d.email
                .to
                .iter()
                .any(|addr| addr.email.eq_ignore_ascii_case(email))
        })
    }

    /// Check if a message with this exact subject was sent.
    pub fn sent_with_subject(&self, subject: &str) -> bool {
        self.deliveries
            .read()
            .iter()
            .any(|d| d.email.subject == subject)
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, route: &Route, email: &Email) -> Result<TransportReceipt, MailError> {
        let mode = self.mode.read().clone();
        match mode {
            Mode::Fail(err) => Err(err),
            Mode::Refuse => Ok(TransportReceipt {
                accepted: false,
                message: "Transport refused the message".to_string(),
                code: None,
            }),
            Mode::Accept => {
                let id = uuid::Uuid::new_v4().to_string();
                self.deliveries.write().push(Delivery {
                    id: id.clone(),
                    route: route.clone(),
                    email: email.clone(),
                    sent_at: Utc::now(),
                });
                tracing::debug!(id = %id, "Captured message");
                Ok(TransportReceipt::accepted("Sent Successfully"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::Attachment;

    fn sample() -> Email {
        Email::new()
            .from(("Site", "site@example.com"))
            .to("user@example.com")
            .subject("Hello")
            .text_body("Body")
    }

    #[test]
    fn test_build_message_plain() {
        let message = LettreTransport::build_message(&sample()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.to_ascii_lowercase().contains("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_build_message_custom_headers_skip_reserved() {
        let email = sample()
            .header("X-Campaign", "spring")
            .header("X-Mailer", "Custom");
        let raw = String::from_utf8(LettreTransport::build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("X-Campaign: spring"));
        assert!(!raw.contains("X-Mailer: Custom"));
    }

    #[test]
    fn test_build_message_requires_from() {
        let email = Email::new().to("user@example.com");
        assert!(matches!(
            LettreTransport::build_message(&email),
            Err(MailError::MissingField("from"))
        ));
    }

    #[test]
    fn test_build_message_skips_unreadable_attachment() {
        let email = sample()
            .attachment(Attachment::from_path("/nonexistent/file.pdf"))
            .attachment(Attachment::from_bytes("notes.txt", b"hi".to_vec()));
        let raw = String::from_utf8(LettreTransport::build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("notes.txt"));
        assert!(!raw.contains("file.pdf"));
    }

    #[tokio::test]
    async fn test_local_transport_modes() {
        let transport = LocalTransport::new();
        let receipt = transport.send(&Route::Sendmail, &sample()).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(transport.count(), 1);

        transport.set_refusal();
        let receipt = transport.send(&Route::Sendmail, &sample()).await.unwrap();
        assert!(!receipt.accepted);
        assert_eq!(transport.count(), 1);

        transport.set_failure("connection refused", Some(421));
        let err = transport.send(&Route::Sendmail, &sample()).await.unwrap_err();
        assert_eq!(err.code(), Some(421));

        transport.clear_failure();
        assert!(transport.send(&Route::Sendmail, &sample()).await.is_ok());
        assert_eq!(transport.flush().len(), 2);
        assert!(!transport.has_deliveries());
    }
}
