//! Saving and loading provider settings.
//!
//! [`Settings`] is the write path into the [`ConfigStore`]: it encrypts
//! SMTP passwords, checks Brevo keys before accepting them, and flips the
//! active provider. Reads decrypt the password again for display.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{ProviderConfig, ProviderId};
use crate::crypto::Crypto;
use crate::dispatcher::Dispatcher;
use crate::error::MailError;

/// Result of [`Settings::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    /// The stored record changed.
    Saved,
    /// The stored record already held these values.
    Unchanged,
}

/// A provider's settings as shown to an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfigView {
    /// Stored configuration with the SMTP password in plaintext.
    pub config: ProviderConfig,
    /// Raw active-provider value (empty when none is active).
    pub active_provider: String,
    /// Whether this provider is the active one.
    pub is_active: bool,
    /// Completeness of every provider, keyed by provider id.
    pub is_configured: BTreeMap<String, bool>,
}

/// Provider settings service.
pub struct Settings {
    dispatcher: Dispatcher,
}

impl Settings {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// The active provider, defaulting to the local relay.
    pub fn current_provider_type(&self) -> Result<ProviderId, MailError> {
        self.dispatcher.active_provider()
    }

    /// Store `config`.
    ///
    /// The comparison with the stored record happens on plaintext, so
    /// re-saving the same SMTP settings reports [`SaveStatus::Unchanged`].
    /// A non-empty SMTP password is encrypted before it is written. A
    /// non-empty Brevo key is checked against the account endpoint and the
    /// save is refused with [`MailError::ApiKeyRejected`] unless the check
    /// returns 200.
    ///
    /// `activate` makes this provider the active one (`Some(true)`) or
    /// clears the active provider (`Some(false)`); `None` leaves it alone.
    pub async fn save(
        &self,
        mut config: ProviderConfig,
        activate: Option<bool>,
    ) -> Result<SaveStatus, MailError> {
        let store = self.dispatcher.store();
        config.sanitize();

        if let ProviderConfig::Brevo(brevo) = &config {
            if !brevo.api_key.is_empty() {
                let record = self
                    .dispatcher
                    .brevo(brevo.clone())
                    .check_api_key(&brevo.api_key)
                    .await?;
                if record.code != 200 {
                    tracing::warn!(code = record.code, "Brevo API key rejected");
                    return Err(MailError::ApiKeyRejected {
                        code: record.code,
                        message: record.error_message,
                    });
                }
            }
        }

        let id = config.id();
        if let Some(active) = activate {
            let value = if active { id.as_str() } else { "" };
            store.set_active_provider(value)?;
        }

        let stored = match store.provider_config(id)? {
            Some(stored) if stored.id() == id => self.with_plain_password(stored).ok(),
            _ => None,
        };
        if stored.as_ref() == Some(&config) {
            tracing::debug!(provider = %id, "Provider settings unchanged");
            return Ok(SaveStatus::Unchanged);
        }

        if let ProviderConfig::Other(smtp) = &mut config {
            if !smtp.password.is_empty() {
                smtp.password = Crypto::initialize(store.as_ref())?.encrypt(&smtp.password)?;
            }
        }

        store.update_config(config)?;
        tracing::info!(provider = %id, "Provider settings saved");
        Ok(SaveStatus::Saved)
    }

    /// Settings for `id`, or for the active provider when `id` is `None`.
    ///
    /// A password that no longer decrypts is returned empty.
    pub fn load(&self, id: Option<ProviderId>) -> Result<ProviderConfigView, MailError> {
        let store = self.dispatcher.store();
        let active_provider = store.active_provider()?;
        let id = match id {
            Some(id) => id,
            None => ProviderId::from_active(Some(active_provider.as_str())),
        };

        let config = match store.provider_config(id)? {
            Some(config) if config.id() == id => match self.with_plain_password(config.clone()) {
                Ok(plain) => plain,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored SMTP password could not be decrypted");
                    let mut config = config;
                    if let ProviderConfig::Other(smtp) = &mut config {
                        smtp.password.clear();
                    }
                    config
                }
            },
            _ => ProviderConfig::empty(id),
        };

        let mut is_configured = BTreeMap::new();
        for provider in ProviderId::ALL {
            is_configured.insert(
                provider.as_str().to_string(),
                self.is_mailer_complete(Some(provider))?,
            );
        }

        Ok(ProviderConfigView {
            config,
            is_active: active_provider == id.as_str(),
            active_provider,
            is_configured,
        })
    }

    /// `config` with a stored SMTP password decrypted.
    fn with_plain_password(&self, mut config: ProviderConfig) -> Result<ProviderConfig, MailError> {
        if let ProviderConfig::Other(smtp) = &mut config {
            if !smtp.password.is_empty() {
                let crypto = Crypto::from_store(self.dispatcher.store().as_ref())?;
                smtp.password = crypto.decrypt(&smtp.password)?;
            }
        }
        Ok(config)
    }

    /// Whether `id` (or the active provider) has everything it needs.
    ///
    /// With `None` and no active provider the answer is `false`.
    pub fn is_mailer_complete(&self, id: Option<ProviderId>) -> Result<bool, MailError> {
        let id = match id {
            Some(id) => id,
            None => {
                let raw = self.dispatcher.store().active_provider()?;
                match raw.trim().parse::<ProviderId>() {
                    Ok(id) => id,
                    Err(_) => return Ok(false),
                }
            }
        };
        Ok(self.dispatcher.provider(id)?.is_configured())
    }
}
