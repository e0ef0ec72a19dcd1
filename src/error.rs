//! Error types for mailrelay.

use thiserror::Error;

/// Errors that can occur while building, dispatching, or recording mail.
///
/// Remote rejections from an HTTP provider are not errors: they come back
/// as a [`SendOutcome`](crate::SendOutcome) with `delivered == false`.
/// This enum covers transport failures, malformed replies, and faults in
/// the surrounding machinery (configuration, crypto, log storage).
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Configuration error (missing env var, invalid value, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field (e.g., from address).
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid email address format.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Attachment has no content (neither data nor path provided).
    #[error("Attachment has no content: {0}")]
    AttachmentMissingContent(String),

    /// Attachment file not found.
    #[error("Attachment file not found: {0}")]
    AttachmentFileNotFound(String),

    /// Failed to read attachment file.
    #[error("Failed to read attachment: {0}")]
    AttachmentReadError(String),

    /// Error building the MIME message.
    #[error("Build error: {0}")]
    BuildError(String),

    /// The mail transport (sendmail or SMTP) failed.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// SMTP reply code, when the server sent one.
        code: Option<u16>,
    },

    /// The Brevo account endpoint refused the API key.
    #[error("Api key authentication failed.")]
    ApiKeyRejected { code: u16, message: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Delivery log or config store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encrypting or decrypting a stored credential failed.
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl MailError {
    /// Create a transport error without a reply code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            code: None,
        }
    }

    /// Numeric code attached to the failure, if any.
    ///
    /// SMTP reply codes for transport errors, the account endpoint's HTTP
    /// status for a rejected API key.
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Transport { code, .. } => *code,
            Self::ApiKeyRejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The message shown to whoever asked for the send.
    ///
    /// Transport errors and rejected keys surface the remote text without
    /// the variant prefix; everything else uses the display form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport { message, .. } => message.clone(),
            Self::ApiKeyRejected { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<sqlx::Error> for MailError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for MailError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::BuildError(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        let code = err
            .status()
            .and_then(|code| code.to_string().parse::<u16>().ok());
        Self::Transport {
            message: err.to_string(),
            code,
        }
    }
}

impl From<lettre::transport::sendmail::Error> for MailError {
    fn from(err: lettre::transport::sendmail::Error) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_for_transport_and_rejected_key() {
        let err = MailError::Transport {
            message: "mailbox unavailable".into(),
            code: Some(550),
        };
        assert_eq!(err.code(), Some(550));
        assert_eq!(err.user_message(), "mailbox unavailable");

        let err = MailError::ApiKeyRejected {
            code: 401,
            message: "Key not found".into(),
        };
        assert_eq!(err.code(), Some(401));
        assert_eq!(err.user_message(), "Key not found");

        let err = MailError::ApiKeyRejected {
            code: 0,
            message: String::new(),
        };
        assert_eq!(err.user_message(), "Api key authentication failed.");
    }

    #[test]
    fn test_code_absent_for_other_errors() {
        let err = MailError::Storage("disk full".into());
        assert_eq!(err.code(), None);
        assert_eq!(err.user_message(), "Storage error: disk full");
    }
}
