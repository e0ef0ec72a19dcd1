//! Generic SMTP host.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailrelay::providers::SmtpRelayMailer;
//! use mailrelay::transport::LettreTransport;
//!
//! let mailer = SmtpRelayMailer::new(config, store, Arc::new(LettreTransport::new()));
//! let outcome = mailer.send(&email).await?;
//! ```
//!
//! The stored password is encrypted; it is decrypted here, per send, and
//! never written back anywhere.

use async_trait::async_trait;
use std::sync::Arc;

use crate::address::Address;
use crate::config::{sender_override, SmtpRelayConfig};
use crate::config_store::ConfigStore;
use crate::crypto::Crypto;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{HeaderSet, Mailer, ProviderResponse, SendOutcome};
use crate::transport::{Route, SmtpSettings, Transport};

/// Display name given to the configured reply-to address.
const REPLY_TO_NAME: &str = "Information";

/// Host used when none is configured.
const FALLBACK_HOST: &str = "localhost";

/// Adapter for the `other` provider.
pub struct SmtpRelayMailer {
    config: SmtpRelayConfig,
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    headers: HeaderSet,
}

impl SmtpRelayMailer {
    pub fn new(
        config: SmtpRelayConfig,
        store: Arc<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            headers: HeaderSet::new(),
        }
    }

    /// Connection settings for this send, with the password decrypted.
    pub fn smtp_settings(&self) -> Result<SmtpSettings, MailError> {
        let credentials = if self.config.authentication {
            let password = if self.config.password.is_empty() {
                String::new()
            } else {
                Crypto::from_store(self.store.as_ref())?.decrypt(&self.config.password)?
            };
            Some((self.config.username.clone(), password))
        } else {
            None
        };

        let host = if self.config.host.is_empty() {
            FALLBACK_HOST.to_string()
        } else {
            self.config.host.clone()
        };

        Ok(SmtpSettings {
            host,
            port: self
                .config
                .port
                .filter(|p| *p != 0)
                .unwrap_or_else(|| self.config.encryption.default_port()),
            credentials,
            encryption: self.config.encryption,
        })
    }
}

#[async_trait]
impl Mailer for SmtpRelayMailer {
    async fn send(&self, email: &Email) -> Result<SendOutcome, MailError> {
        let settings = self.smtp_settings()?;

        let mut outgoing = email.clone();
        self.headers.apply_to(&mut outgoing);
        if let Some(from) = sender_override(&self.config.from_name, &self.config.from_email) {
            outgoing.from = Some(from);
        }
        if !self.config.reply_to.is_empty() {
            match Address::parse_with_name(REPLY_TO_NAME, &self.config.reply_to) {
                Ok(reply_to) => outgoing.reply_to.push(reply_to),
                Err(e) => tracing::warn!(error = %e, "Ignoring configured reply-to"),
            }
        }
        let resolved_from = outgoing
            .from
            .clone()
            .ok_or(MailError::MissingField("from"))?;

        tracing::debug!(host = %settings.host, port = settings.port, "Sending over SMTP");

        let receipt = self
            .transport
            .send(&Route::Smtp(settings), &outgoing)
            .await?;

        let mut response = ProviderResponse::new(receipt.message);
        response.code = receipt.code;
        Ok(if receipt.accepted {
            SendOutcome::delivered(resolved_from, response)
        } else {
            SendOutcome::rejected(resolved_from, response)
        })
    }

    fn is_configured(&self) -> bool {
        !self.config.host.is_empty() && self.config.port.is_some_and(|p| p != 0)
    }

    fn provider_name(&self) -> &'static str {
        "other"
    }

    fn headers_mut(&mut self) -> &mut HeaderSet {
        &mut self.headers
    }
}
