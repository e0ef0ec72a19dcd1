//! Mailer trait and send outcome types.
//!
//! # Why `async_trait`?
//!
//! The dispatcher hands back whichever adapter the active provider names,
//! and callers may plug in their own, so the trait must stay object-safe.
//! `#[async_trait]` boxes the returned futures to make that possible. The
//! one allocation per send is noise next to the network round-trip.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::email::Email;
use crate::error::MailError;

/// What the provider said about a send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Human-readable message (remote error text, or a success note)
    pub message: String,
    /// Remote status or reply code, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Provider-assigned message id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl ProviderResponse {
    /// A response with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Attach a status code.
    pub fn code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a provider message id.
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }
}

/// Normalized result of one adapter send.
///
/// A remote rejection is an outcome with `delivered == false`, not an
/// error. `resolved_from` is the sender actually used, which differs from
/// the message's own `from` when the provider config overrides it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub delivered: bool,
    pub resolved_from: Address,
    pub response: ProviderResponse,
}

impl SendOutcome {
    /// A successful send.
    pub fn delivered(resolved_from: Address, response: ProviderResponse) -> Self {
        Self {
            delivered: true,
            resolved_from,
            response,
        }
    }

    /// A send the provider refused.
    pub fn rejected(resolved_from: Address, response: ProviderResponse) -> Self {
        Self {
            delivered: false,
            resolved_from,
            response,
        }
    }
}

/// Trait every provider adapter implements.
///
/// # Example
///
/// ```rust,ignore
/// use mailrelay::{Email, Mailer};
/// use mailrelay::providers::BrevoMailer;
///
/// let mailer = BrevoMailer::new(config, store);
/// let outcome = mailer.send(&email).await?;
/// if !outcome.delivered {
///     eprintln!("rejected: {}", outcome.response.message);
/// }
/// ```
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message.
    ///
    /// `Err` means the transport itself failed or the reply was malformed.
    async fn send(&self, email: &Email) -> Result<SendOutcome, MailError>;

    /// Whether the minimum settings for this provider are present.
    ///
    /// Advisory only; `send` does not consult it.
    fn is_configured(&self) -> bool;

    /// Get the provider name (for logging/debugging).
    fn provider_name(&self) -> &'static str;

    /// Headers collected for outgoing sends.
    fn headers_mut(&mut self) -> &mut HeaderSet;

    /// Add one outgoing header. Entries with an empty name or value are
    /// ignored.
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers_mut().set_header(name, value);
    }

    /// Add several outgoing headers, skipping empty names and values.
    fn set_headers(&mut self, headers: &[(&str, &str)]) {
        self.headers_mut().set_headers(headers.iter().copied());
    }
}

/// Extra headers an adapter attaches to what it sends: message headers for
/// the SMTP-based providers, request headers for the HTTP API.
///
/// Entries with an empty name or value are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one header.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name = name.trim();
        if name.is_empty() || value.is_empty() {
            return;
        }
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Add several headers.
    pub fn set_headers<'a, I>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
    }

    /// Look a header up by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy these headers onto `email`, replacing same-named entries.
    pub fn apply_to(&self, email: &mut Email) {
        for (name, value) in self.iter() {
            email
                .headers
                .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            email.headers.push((name.to_string(), value.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_set_ignores_empty_parts() {
        let mut headers = HeaderSet::new();
        headers.set_header("", "x");
        headers.set_header("X-Empty", "");
        headers.set_header("Accept", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept"), Some("application/json"));
    }

    #[test]
    fn test_header_set_replaces_same_name() {
        let mut headers = HeaderSet::new();
        headers.set_headers([("api-key", "one"), ("Api-Key", "two"), ("Accept", "*/*")]);
        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("api-key", "two"), ("Accept", "*/*")]);
    }

    #[test]
    fn test_apply_to_replaces_message_headers() {
        let mut headers = HeaderSet::new();
        headers.set_header("X-Campaign", "autumn");
        let mut email = Email::new()
            .header("x-campaign", "spring")
            .header("X-Keep", "1");

        headers.apply_to(&mut email);
        assert_eq!(
            email.headers,
            vec![
                ("X-Keep".to_string(), "1".to_string()),
                ("X-Campaign".to_string(), "autumn".to_string()),
            ]
        );
    }
}
