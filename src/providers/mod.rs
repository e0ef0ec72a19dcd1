//! Provider adapters.
//!
//! Each provider implements the [`Mailer`](crate::Mailer) trait.
//!
//! | Provider | Id | Description |
//! |----------|----|-------------|
//! | [`LocalRelayMailer`] | `default` | Platform mail transport (sendmail) |
//! | [`SmtpRelayMailer`] | `other` | Any SMTP host, optional auth and TLS |
//! | [`BrevoMailer`] | `brevo` | Brevo transactional email API |

mod brevo;
mod local;
mod smtp;

pub use brevo::{
    BrevoAttachment, BrevoContact, BrevoMailer, BrevoPayload, RecipientKind,
    ALLOWED_ATTACHMENT_EXTENSIONS,
};
pub use local::LocalRelayMailer;
pub use smtp::SmtpRelayMailer;
