//! # mailrelay
//!
//! Route outgoing mail through a configurable provider and keep a delivery
//! log of every attempt.
//!
//! Three providers are built in:
//!
//! | Id | Adapter | Transport |
//! |----|---------|-----------|
//! | `default` | [`LocalRelayMailer`](providers::LocalRelayMailer) | local sendmail |
//! | `other` | [`SmtpRelayMailer`](providers::SmtpRelayMailer) | any SMTP server |
//! | `brevo` | [`BrevoMailer`](providers::BrevoMailer) | Brevo HTTP API |
//!
//! The active provider and its settings live in a [`ConfigStore`]. Every
//! send reads them fresh, so switching providers takes effect immediately.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailrelay::prelude::*;
//!
//! let store = Arc::new(JsonFileConfigStore::open("mailrelay.json")?);
//! let logs = Arc::new(SqliteLogStore::connect("sqlite://mail.db?mode=rwc").await?);
//!
//! let service = MailService::builder(store, logs)
//!     .site(SiteSettings::from_env())
//!     .build();
//!
//! let report = service
//!     .send_mail(
//!         MailRequest::new("Welcome!", "Thanks for signing up.")
//!             .to("user@example.com")
//!             .header("From", "Shop <shop@example.com>"),
//!     )
//!     .await;
//!
//! if !report.sent {
//!     eprintln!("send failed: {}", report.response.message);
//! }
//! ```
//!
//! ## Environment Variables
//!
//! Read by [`config::from_env`] and [`SiteSettings::from_env`]:
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `MAIL_PROVIDER` | `default`, `other`, or `brevo` |
//! | `MAIL_FROM` | Sender override email |
//! | `MAIL_FROM_NAME` | Sender override name |
//! | `SMTP_HOST` | SMTP server host |
//! | `SMTP_PORT` | SMTP server port (default depends on encryption) |
//! | `SMTP_USERNAME` | SMTP username; enables authentication when set |
//! | `SMTP_PASSWORD` | SMTP password |
//! | `SMTP_ENCRYPTION` | `none`, `ssl`, or `tls` |
//! | `SMTP_REPLY_TO` | Reply-To added to SMTP mail |
//! | `BREVO_API_KEY` | Brevo API key |
//! | `MAIL_SITE_URL` | Site URL; its host is the fallback sender domain |
//! | `MAIL_CHARSET` | Default charset |
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit Prometheus-style metrics:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mailrelay_emails_total` | Counter | provider, status | Sends attempted |
//! | `mailrelay_delivery_duration_seconds` | Histogram | provider | Provider call duration |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the mailrelay crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod attachment;
mod context;
mod dispatcher;
mod email;
mod error;
mod hooks;
mod mailer;
mod request;
mod service;
mod settings;

pub mod config;
pub mod config_store;
pub mod crypto;
pub mod logs;
pub mod providers;
pub mod testing;
pub mod transport;

// Re-exports
pub use address::{Address, ToAddress};
pub use attachment::Attachment;
pub use config::{
    BrevoConfig, DefaultRelayConfig, Encryption, ProviderConfig, ProviderId, SiteSettings,
    SmtpRelayConfig, TestMailConfig, ValidationRecord,
};
pub use config_store::{ConfigStore, JsonFileConfigStore, MemoryConfigStore};
pub use context::RequestContext;
pub use crypto::{Crypto, SecretPair};
pub use dispatcher::{Dispatcher, Provider};
pub use email::{Content, Email};
pub use error::MailError;
pub use hooks::{HookSet, MailData, MailFailure, MailHooks};
pub use logs::{
    LogFilter, LogLookup, LogPage, LogQuery, LogRecord, LogSearch, LogStore, MemoryLogStore,
    NewLogRecord, SqliteLogStore,
};
pub use mailer::{HeaderSet, Mailer, ProviderResponse, SendOutcome};
pub use request::{MailRequest, ParsedHeaders};
pub use service::{MailReport, MailService, MailServiceBuilder};
pub use settings::{ProviderConfigView, SaveStatus, Settings};
pub use transport::{LettreTransport, LocalTransport, Transport};

/// Prelude for convenient imports.
///
/// ```rust,ignore
/// use mailrelay::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Address, Attachment, ConfigStore, Email, JsonFileConfigStore, LogStore, MailError,
        MailHooks, MailReport, MailRequest, MailService, MemoryConfigStore, MemoryLogStore,
        ProviderConfig, ProviderId, RequestContext, SiteSettings, SqliteLogStore,
    };
}
