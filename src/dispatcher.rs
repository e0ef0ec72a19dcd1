//! Provider selection.
//!
//! The dispatcher reads the active provider and its configuration from the
//! [`ConfigStore`] on every send and builds the matching adapter. Nothing is
//! cached between sends, so a provider switch takes effect on the next call.
//!
//! ```rust,ignore
//! use mailrelay::Dispatcher;
//!
//! let dispatcher = Dispatcher::new(store);
//! let mut provider = dispatcher.select()?;
//! provider.mailer_mut().set_header("X-Campaign", "spring");
//! let outcome = provider.send(&email).await?;
//! ```

use reqwest::Client;
use std::sync::Arc;

use crate::config::{BrevoConfig, ProviderConfig, ProviderId};
use crate::config_store::ConfigStore;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{Mailer, SendOutcome};
use crate::providers::{BrevoMailer, LocalRelayMailer, SmtpRelayMailer};
use crate::transport::{LettreTransport, Transport};

/// The adapter chosen for one send.
pub enum Provider {
    Default(LocalRelayMailer),
    Other(SmtpRelayMailer),
    Brevo(BrevoMailer),
}

impl Provider {
    pub fn id(&self) -> ProviderId {
        match self {
            Self::Default(_) => ProviderId::Default,
            Self::Other(_) => ProviderId::Other,
            Self::Brevo(_) => ProviderId::Brevo,
        }
    }

    /// The wrapped adapter as a trait object.
    pub fn mailer(&self) -> &dyn Mailer {
        match self {
            Self::Default(m) => m,
            Self::Other(m) => m,
            Self::Brevo(m) => m,
        }
    }

    /// Mutable access, for adding outgoing headers before a send.
    pub fn mailer_mut(&mut self) -> &mut dyn Mailer {
        match self {
            Self::Default(m) => m,
            Self::Other(m) => m,
            Self::Brevo(m) => m,
        }
    }

    /// Send through the wrapped adapter. The result is passed through as is.
    pub async fn send(&self, email: &Email) -> Result<SendOutcome, MailError> {
        match self {
            Self::Default(m) => m.send(email).await,
            Self::Other(m) => m.send(email).await,
            Self::Brevo(m) => m.send(email).await,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.mailer().is_configured()
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Provider").field(&self.id()).finish()
    }
}

/// Builds the adapter for the active provider.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    client: Client,
    brevo_base_url: Option<String>,
}

impl Dispatcher {
    /// Dispatcher sending real mail through lettre.
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            transport: Arc::new(LettreTransport::new()),
            client: Client::new(),
            brevo_base_url: None,
        }
    }

    /// Use a different transport for the SMTP-based providers.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Use a custom reqwest client for the HTTP API.
    pub fn http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Point the Brevo adapter at another base URL (for testing).
    pub fn brevo_base_url(mut self, url: impl Into<String>) -> Self {
        self.brevo_base_url = Some(url.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    /// The provider that will handle the next send.
    ///
    /// Unknown or empty values mean the local relay.
    pub fn active_provider(&self) -> Result<ProviderId, MailError> {
        let raw = self.store.active_provider()?;
        Ok(ProviderId::from_active(Some(raw.as_str())))
    }

    /// Build the adapter for the active provider.
    pub fn select(&self) -> Result<Provider, MailError> {
        let id = self.active_provider()?;
        tracing::debug!(provider = %id, "Selected provider");
        self.provider(id)
    }

    /// Build the adapter for `id` from its stored configuration.
    ///
    /// A missing record, or one stored under the wrong variant, yields an
    /// empty configuration.
    pub fn provider(&self, id: ProviderId) -> Result<Provider, MailError> {
        let config = match self.store.provider_config(id)? {
            Some(config) if config.id() == id => config,
            _ => ProviderConfig::empty(id),
        };

        Ok(match config {
            ProviderConfig::Default(c) => {
                Provider::Default(LocalRelayMailer::new(c, Arc::clone(&self.transport)))
            }
            ProviderConfig::Other(c) => Provider::Other(SmtpRelayMailer::new(
                c,
                Arc::clone(&self.store),
                Arc::clone(&self.transport),
            )),
            ProviderConfig::Brevo(c) => Provider::Brevo(self.brevo(c)),
        })
    }

    /// A Brevo adapter for `config`, sharing this dispatcher's HTTP client.
    pub fn brevo(&self, config: BrevoConfig) -> BrevoMailer {
        let mailer =
            BrevoMailer::new(config, Arc::clone(&self.store)).with_client(self.client.clone());
        match &self.brevo_base_url {
            Some(url) => mailer.base_url(url.clone()),
            None => mailer,
        }
    }

    /// Select the active provider and send through it.
    pub async fn send(&self, email: &Email) -> Result<SendOutcome, MailError> {
        self.select()?.send(email).await
    }
}
