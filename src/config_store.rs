//! Persistent provider settings.
//!
//! The store holds one [`ProviderConfig`] per provider, the active-provider
//! flag, cached credential validations, the crypto secret pair, and the last
//! test-mail settings. Reads vastly outnumber writes; writes are
//! last-write-wins.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderId, TestMailConfig, ValidationRecord};
use crate::crypto::SecretPair;
use crate::error::MailError;

/// Storage backend for provider settings.
pub trait ConfigStore: Send + Sync {
    /// Raw active-provider value. Empty when no provider is active.
    fn active_provider(&self) -> Result<String, MailError>;

    /// Replace the active-provider value. Pass `""` to clear it.
    fn set_active_provider(&self, provider: &str) -> Result<(), MailError>;

    /// Stored configuration for `id`, if any.
    fn provider_config(&self, id: ProviderId) -> Result<Option<ProviderConfig>, MailError>;

    /// Store `config` under its own provider id.
    fn update_config(&self, config: ProviderConfig) -> Result<(), MailError>;

    /// Most recent credential validation for `id`.
    fn validation(&self, id: ProviderId) -> Result<Option<ValidationRecord>, MailError>;

    /// Replace the credential validation for `id`.
    fn set_validation(&self, id: ProviderId, record: ValidationRecord) -> Result<(), MailError>;

    /// The crypto secret pair, once generated.
    fn secret_pair(&self) -> Result<Option<SecretPair>, MailError>;

    /// The crypto secret pair, generating and persisting one first when
    /// none exists. The check and the write happen under one lock, so
    /// concurrent callers all get the same pair.
    fn secret_pair_or_init(&self) -> Result<SecretPair, MailError>;

    /// Last test-mail settings.
    fn test_mail(&self) -> Result<Option<TestMailConfig>, MailError>;

    /// Replace the last test-mail settings.
    fn set_test_mail(&self, config: TestMailConfig) -> Result<(), MailError>;
}

/// Serialized form of every setting the store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub active_provider: String,
    pub providers: BTreeMap<String, ProviderConfig>,
    pub validations: BTreeMap<String, ValidationRecord>,
    pub secrets: Option<SecretPair>,
    pub test_mail: Option<TestMailConfig>,
}

/// Thread-safe in-memory config store.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    doc: RwLock<ConfigDocument>,
}

impl MemoryConfigStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Create a store pre-populated from a document.
    pub fn from_document(doc: ConfigDocument) -> Self {
        Self {
            doc: RwLock::new(doc),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> ConfigDocument {
        self.doc.read().clone()
    }

    /// The stored pair, or a fresh one inserted under the same write lock.
    /// The flag is `true` when this call generated the pair.
    fn secret_pair_or_insert(&self) -> (SecretPair, bool) {
        let mut doc = self.doc.write();
        match &doc.secrets {
            Some(pair) if pair.is_complete() => (pair.clone(), false),
            _ => {
                tracing::debug!("Generating credential secret pair");
                let pair = SecretPair::generate();
                doc.secrets = Some(pair.clone());
                (pair, true)
            }
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn active_provider(&self) -> Result<String, MailError> {
        Ok(self.doc.read().active_provider.clone())
    }

    fn set_active_provider(&self, provider: &str) -> Result<(), MailError> {
        self.doc.write().active_provider = provider.to_string();
        Ok(())
    }

    fn provider_config(&self, id: ProviderId) -> Result<Option<ProviderConfig>, MailError> {
        Ok(self.doc.read().providers.get(id.as_str()).cloned())
    }

    fn update_config(&self, config: ProviderConfig) -> Result<(), MailError> {
        self.doc
            .write()
            .providers
            .insert(config.id().as_str().to_string(), config);
        Ok(())
    }

    fn validation(&self, id: ProviderId) -> Result<Option<ValidationRecord>, MailError> {
        Ok(self.doc.read().validations.get(id.as_str()).cloned())
    }

    fn set_validation(&self, id: ProviderId, record: ValidationRecord) -> Result<(), MailError> {
        self.doc
            .write()
            .validations
            .insert(id.as_str().to_string(), record);
        Ok(())
    }

    fn secret_pair(&self) -> Result<Option<SecretPair>, MailError> {
        Ok(self.doc.read().secrets.clone())
    }

    fn secret_pair_or_init(&self) -> Result<SecretPair, MailError> {
        Ok(self.secret_pair_or_insert().0)
    }

    fn test_mail(&self) -> Result<Option<TestMailConfig>, MailError> {
        Ok(self.doc.read().test_mail.clone())
    }

    fn set_test_mail(&self, config: TestMailConfig) -> Result<(), MailError> {
        self.doc.write().test_mail = Some(config);
        Ok(())
    }
}

/// Config store backed by a JSON file, rewritten after every change.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    inner: MemoryConfigStore,
}

impl JsonFileConfigStore {
    /// Open `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MailError> {
        let path = path.as_ref().to_path_buf();
        let doc = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ConfigDocument::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), "Opened config file");

        Ok(Self {
            path,
            inner: MemoryConfigStore::from_document(doc),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), MailError> {
        let bytes = serde_json::to_vec_pretty(&self.inner.snapshot())?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn active_provider(&self) -> Result<String, MailError> {
        self.inner.active_provider()
    }

    fn set_active_provider(&self, provider: &str) -> Result<(), MailError> {
        self.inner.set_active_provider(provider)?;
        self.persist()
    }

    fn provider_config(&self, id: ProviderId) -> Result<Option<ProviderConfig>, MailError> {
        self.inner.provider_config(id)
    }

    fn update_config(&self, config: ProviderConfig) -> Result<(), MailError> {
        self.inner.update_config(config)?;
        self.persist()
    }

    fn validation(&self, id: ProviderId) -> Result<Option<ValidationRecord>, MailError> {
        self.inner.validation(id)
    }

    fn set_validation(&self, id: ProviderId, record: ValidationRecord) -> Result<(), MailError> {
        self.inner.set_validation(id, record)?;
        self.persist()
    }

    fn secret_pair(&self) -> Result<Option<SecretPair>, MailError> {
        self.inner.secret_pair()
    }

    fn secret_pair_or_init(&self) -> Result<SecretPair, MailError> {
        let (pair, generated) = self.inner.secret_pair_or_insert();
        if generated {
            self.persist()?;
        }
        Ok(pair)
    }

    fn test_mail(&self) -> Result<Option<TestMailConfig>, MailError> {
        self.inner.test_mail()
    }

    fn set_test_mail(&self, config: TestMailConfig) -> Result<(), MailError> {
        self.inner.set_test_mail(config)?;
        self.persist()
    }
}
