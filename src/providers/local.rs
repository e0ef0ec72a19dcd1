//! Local relay: the platform's own mail transport.
//!
//! The only setting is an optional sender override. When both a from name
//! and a from address are configured they replace the message's sender.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{sender_override, DefaultRelayConfig};
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{HeaderSet, Mailer, ProviderResponse, SendOutcome};
use crate::transport::{Route, Transport};

/// Adapter for the `default` provider.
pub struct LocalRelayMailer {
    config: DefaultRelayConfig,
    transport: Arc<dyn Transport>,
    headers: HeaderSet,
}

impl LocalRelayMailer {
    pub fn new(config: DefaultRelayConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            headers: HeaderSet::new(),
        }
    }
}

#[async_trait]
impl Mailer for LocalRelayMailer {
    async fn send(&self, email: &Email) -> Result<SendOutcome, MailError> {
        let mut outgoing = email.clone();
        self.headers.apply_to(&mut outgoing);
        if let Some(from) = sender_override(&self.config.from_name, &self.config.from_email) {
            tracing::debug!(from = %from.email, "Using configured sender");
            outgoing.from = Some(from);
        }
        let resolved_from = outgoing
            .from
            .clone()
            .ok_or(MailError::MissingField("from"))?;

        let receipt = self.transport.send(&Route::Sendmail, &outgoing).await?;

        let mut response = ProviderResponse::new(receipt.message);
        response.code = receipt.code;
        Ok(if receipt.accepted {
            SendOutcome::delivered(resolved_from, response)
        } else {
            SendOutcome::rejected(resolved_from, response)
        })
    }

    fn is_configured(&self) -> bool {
        !self.config.from_name.is_empty() && !self.config.from_email.is_empty()
    }

    fn provider_name(&self) -> &'static str {
        "default"
    }

    fn headers_mut(&mut self) -> &mut HeaderSet {
        &mut self.headers
    }
}
