//! Email address type with optional display name.

use crate::error::MailError;
use email_address::EmailAddress;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static MAILBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Greedy name, non-empty address between the last angle brackets.
    Regex::new(r"^(.*)<(.+)>").expect("mailbox pattern is valid")
});

/// An email address with an optional display name.
///
/// # Examples
///
/// ```
/// use mailrelay::Address;
///
/// let addr: Address = "user@example.com".into();
/// assert_eq!(addr.email, "user@example.com");
/// assert_eq!(addr.name, None);
///
/// let addr = Address::parse_mailbox("\"Alice\" <alice@example.com>").unwrap();
/// assert_eq!(addr.email, "alice@example.com");
/// assert_eq!(addr.name, Some("Alice".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Optional display name (e.g., "Alice Smith")
    pub name: Option<String>,
    /// Email address (e.g., "alice@example.com")
    pub email: String,
}

impl Address {
    /// Create a new address with just an email.
    ///
    /// Logs a warning if the email looks invalid. For strict validation,
    /// use [`Address::parse`] instead.
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();

        if !Self::is_valid(&email) {
            tracing::warn!(
                email = %email,
                "Creating address with invalid email. Use Address::parse() for strict validation."
            );
        }

        Self { name: None, email }
    }

    /// Create a new address with a name and email.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        let name = name.into();
        let mut addr = Self::new(email);
        if !name.is_empty() {
            addr.name = Some(name);
        }
        addr
    }

    /// Whether `email` is a syntactically valid address.
    pub fn is_valid(email: &str) -> bool {
        EmailAddress::is_valid(email)
    }

    /// Parse and validate a bare email address.
    ///
    /// ```
    /// use mailrelay::Address;
    ///
    /// assert!(Address::parse("user@example.com").is_ok());
    /// assert!(Address::parse("not-an-email").is_err());
    /// assert!(Address::parse("").is_err());
    /// ```
    pub fn parse(email: &str) -> Result<Self, MailError> {
        Self::parse_with_name("", email)
    }

    /// Parse and validate an email address with a display name.
    ///
    /// An empty name is treated as no name.
    pub fn parse_with_name(name: &str, email: &str) -> Result<Self, MailError> {
        let email = email.trim();
        if !Self::is_valid(email) {
            return Err(MailError::InvalidAddress(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        let name = name.trim();
        Ok(Self {
            name: if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            },
            email: email.to_string(),
        })
    }

    /// Parse a mailbox of the form `Display Name <email>` or a bare address.
    ///
    /// Double quotes around the display name are removed.
    ///
    /// ```
    /// use mailrelay::Address;
    ///
    /// let addr = Address::parse_mailbox("Bob <bob@example.com>").unwrap();
    /// assert_eq!(addr.name.as_deref(), Some("Bob"));
    ///
    /// let addr = Address::parse_mailbox(" carol@example.com ").unwrap();
    /// assert_eq!(addr.name, None);
    ///
    /// assert!(Address::parse_mailbox("Bob <not valid>").is_err());
    /// ```
    pub fn parse_mailbox(input: &str) -> Result<Self, MailError> {
        match MAILBOX_RE.captures(input) {
            Some(caps) => {
                let name = caps[1].replace('"', "");
                Self::parse_with_name(&name, &caps[2])
            }
            None => Self::parse(input),
        }
    }

    /// Parse a sequence of mailboxes, silently skipping malformed entries.
    ///
    /// Blank entries are dropped without a warning; non-blank invalid ones
    /// are logged at debug level.
    pub fn parse_list<I, S>(entries: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries
            .into_iter()
            .filter_map(|entry| {
                let entry = entry.as_ref();
                if entry.trim().is_empty() {
                    return None;
                }
                match Self::parse_mailbox(entry) {
                    Ok(addr) => Some(addr),
                    Err(e) => {
                        tracing::debug!(entry = %entry, error = %e, "Skipping invalid address");
                        None
                    }
                }
            })
            .collect()
    }

    /// Convert the domain part of the email address to ASCII (Punycode).
    ///
    /// The local part (before @) is preserved as-is.
    ///
    /// ```
    /// use mailrelay::Address;
    ///
    /// let addr = Address::new("user@例え.jp");
    /// assert_eq!(addr.to_ascii().unwrap(), "user@xn--r8jz45g.jp");
    /// ```
    pub fn to_ascii(&self) -> Result<String, MailError> {
        let (local_part, domain) = self.email.split_once('@').ok_or_else(|| {
            MailError::InvalidAddress(format!("'{}' is missing @ symbol", self.email))
        })?;

        let ascii_domain = idna::domain_to_ascii(domain).map_err(|e| {
            MailError::InvalidAddress(format!(
                "Failed to convert domain '{}' to ASCII: {:?}",
                domain, e
            ))
        })?;

        Ok(format!("{}@{}", local_part, ascii_domain))
    }

    /// Format as "Name <email>" or just "email" if no name.
    pub fn formatted(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => format!("{} <{}>", name, self.email),
            _ => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

impl From<&str> for Address {
    fn from(email: &str) -> Self {
        Self::new(email)
    }
}

impl From<String> for Address {
    fn from(email: String) -> Self {
        Self::new(email)
    }
}

impl From<(&str, &str)> for Address {
    fn from((name, email): (&str, &str)) -> Self {
        Self::with_name(name, email)
    }
}

impl From<(String, String)> for Address {
    fn from((name, email): (String, String)) -> Self {
        Self::with_name(name, email)
    }
}

/// Trait for types that can be converted to an email address.
///
/// Used by the [`Email`](crate::Email) builder methods.
pub trait ToAddress {
    fn to_address(&self) -> Address;
}

impl<T: ToAddress + ?Sized> ToAddress for &T {
    fn to_address(&self) -> Address {
        (*self).to_address()
    }
}

impl ToAddress for Address {
    fn to_address(&self) -> Address {
        self.clone()
    }
}

impl ToAddress for str {
    fn to_address(&self) -> Address {
        Address::new(self)
    }
}

impl ToAddress for String {
    fn to_address(&self) -> Address {
        Address::new(self)
    }
}

impl<N: AsRef<str>, E: AsRef<str>> ToAddress for (N, E) {
    fn to_address(&self) -> Address {
        Address::with_name(self.0.as_ref(), self.1.as_ref())
    }
}
