//! Provider identifiers and per-provider configuration records.
//!
//! Each provider (`default`, `other`, `brevo`) owns one [`ProviderConfig`]
//! record in the [`ConfigStore`](crate::ConfigStore); at most one provider is
//! marked active. Passwords are stored encrypted and only decrypted by the
//! adapter that needs them.
//!
//! ## Environment Variables
//!
//! [`from_env`] reads an initial configuration, useful for seeding a store
//! at startup through [`Settings::save`](crate::Settings::save):
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `MAIL_PROVIDER` | `default`, `other`, or `brevo` |
//! | `MAIL_FROM` | Sender override email |
//! | `MAIL_FROM_NAME` | Sender override name |
//! | `MAIL_SITE_URL` | Site URL used for the fallback sender domain |
//! | `MAIL_CHARSET` | Default charset (default: UTF-8) |
//! | `SMTP_HOST` | SMTP server host |
//! | `SMTP_PORT` | SMTP server port (default depends on encryption) |
//! | `SMTP_USERNAME` | SMTP username; enables authentication when set |
//! | `SMTP_PASSWORD` | SMTP password |
//! | `SMTP_ENCRYPTION` | `none`, `ssl`, or `tls` |
//! | `SMTP_REPLY_TO` | Reply-to address added to every SMTP send |
//! | `BREVO_API_KEY` | Brevo API key |

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::email::DEFAULT_CHARSET;
use crate::error::MailError;

/// Display name used when the caller supplies no sender name.
pub const DEFAULT_FROM_NAME: &str = "WordPress";

/// Local part of the fallback sender address.
pub const DEFAULT_FROM_LOCAL_PART: &str = "wordpress";

/// The three supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Platform mail transport (sendmail).
    #[default]
    Default,
    /// Generic SMTP host.
    Other,
    /// Brevo transactional HTTP API.
    Brevo,
}

impl ProviderId {
    /// Every provider, in display order.
    pub const ALL: [ProviderId; 3] = [ProviderId::Default, ProviderId::Other, ProviderId::Brevo];

    /// Stable identifier used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Other => "other",
            Self::Brevo => "brevo",
        }
    }

    /// Resolve a stored active-provider value.
    ///
    /// Empty, missing, or unrecognised values all route to the local relay.
    pub fn from_active(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "other" => Ok(Self::Other),
            "brevo" => Ok(Self::Brevo),
            other => Err(MailError::Configuration(format!(
                "Unknown provider: {}. Valid providers are: default, other, brevo",
                other
            ))),
        }
    }
}

/// SMTP connection security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encryption {
    /// Plain connection (dangerous outside localhost).
    #[default]
    None,
    /// Implicit TLS from the first byte (usually port 465).
    Ssl,
    /// STARTTLS upgrade after connecting (usually port 587).
    Tls,
}

impl Encryption {
    /// Conventional port for this mode.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::None => 25,
            Self::Ssl => 465,
            Self::Tls => 587,
        }
    }
}

impl FromStr for Encryption {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "ssl" => Ok(Self::Ssl),
            "tls" | "starttls" => Ok(Self::Tls),
            other => Err(MailError::Configuration(format!(
                "Unknown SMTP encryption: {}",
                other
            ))),
        }
    }
}

/// Settings for the local relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultRelayConfig {
    pub from_name: String,
    pub from_email: String,
}

/// Settings for a generic SMTP host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpRelayConfig {
    pub host: String,
    pub port: Option<u16>,
    pub authentication: bool,
    pub username: String,
    /// Encrypted at rest; see [`Crypto`](crate::Crypto).
    pub password: String,
    pub encryption: Encryption,
    pub from_name: String,
    pub from_email: String,
    pub reply_to: String,
}

/// Settings for the Brevo HTTP API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrevoConfig {
    pub api_key: String,
    pub from_name: String,
    pub from_email: String,
}

/// One provider's configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider_type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Default(DefaultRelayConfig),
    Other(SmtpRelayConfig),
    Brevo(BrevoConfig),
}

impl ProviderConfig {
    /// An empty record for `id`.
    pub fn empty(id: ProviderId) -> Self {
        match id {
            ProviderId::Default => Self::Default(DefaultRelayConfig::default()),
            ProviderId::Other => Self::Other(SmtpRelayConfig::default()),
            ProviderId::Brevo => Self::Brevo(BrevoConfig::default()),
        }
    }

    /// Which provider this record belongs to.
    pub fn id(&self) -> ProviderId {
        match self {
            Self::Default(_) => ProviderId::Default,
            Self::Other(_) => ProviderId::Other,
            Self::Brevo(_) => ProviderId::Brevo,
        }
    }

    /// The configured sender, when both name and address are set.
    pub fn sender_override(&self) -> Option<Address> {
        let (name, email) = match self {
            Self::Default(c) => (&c.from_name, &c.from_email),
            Self::Other(c) => (&c.from_name, &c.from_email),
            Self::Brevo(c) => (&c.from_name, &c.from_email),
        };
        sender_override(name, email)
    }

    /// Whether the minimum settings for this provider are present.
    ///
    /// For Brevo this only checks the key; the cached validation result is
    /// consulted by [`BrevoMailer::is_mailer_complete`](crate::providers::BrevoMailer::is_mailer_complete).
    pub fn has_required_fields(&self) -> bool {
        match self {
            Self::Default(c) => !c.from_name.is_empty() && !c.from_email.is_empty(),
            Self::Other(c) => !c.host.is_empty() && c.port.is_some_and(|p| p != 0),
            Self::Brevo(c) => !c.api_key.is_empty(),
        }
    }

    /// Trim text fields and blank out email fields that fail validation.
    pub fn sanitize(&mut self) {
        match self {
            Self::Default(c) => {
                c.from_name = c.from_name.trim().to_string();
                c.from_email = sanitize_email(&c.from_email);
            }
            Self::Other(c) => {
                c.host = c.host.trim().to_string();
                c.username = c.username.trim().to_string();
                c.from_name = c.from_name.trim().to_string();
                c.from_email = sanitize_email(&c.from_email);
                c.reply_to = sanitize_email(&c.reply_to);
            }
            Self::Brevo(c) => {
                c.api_key = c.api_key.trim().to_string();
                c.from_name = c.from_name.trim().to_string();
                c.from_email = sanitize_email(&c.from_email);
            }
        }
    }
}

/// Build a sender from a configured name/address pair.
///
/// Both parts must be non-empty and the address must validate.
pub fn sender_override(name: &str, email: &str) -> Option<Address> {
    if name.trim().is_empty() || email.trim().is_empty() {
        return None;
    }
    Address::parse_with_name(name, email).ok()
}

fn sanitize_email(email: &str) -> String {
    let email = email.trim();
    if Address::is_valid(email) {
        email.to_string()
    } else {
        String::new()
    }
}

/// Last result of checking a provider's credentials remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub code: u16,
    pub error_message: String,
}

/// Last settings used for a test mail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestMailConfig {
    pub to: String,
    pub html: bool,
}

/// Site URL assumed until one is configured.
pub const DEFAULT_SITE_URL: &str = "http://localhost";

/// Site-wide defaults used while building messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Public URL of the site; its host becomes the fallback sender domain.
    pub site_url: String,
    /// Sender name used when the caller supplies none.
    pub from_name: String,
    /// Charset used when the caller supplies none.
    pub charset: String,
    /// Prefix for test mail subjects.
    pub product_name: String,
    /// Site identifier written to every log record.
    pub site_id: i64,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            from_name: DEFAULT_FROM_NAME.to_string(),
            charset: DEFAULT_CHARSET.to_string(),
            product_name: "Mail Relay".to_string(),
            site_id: 1,
        }
    }
}

impl SiteSettings {
    /// Fallback sender address: `wordpress@<host>` with a leading `www.`
    /// removed. Without a parsable host the address is just `wordpress@`.
    pub fn default_from_email(&self) -> String {
        let host = reqwest::Url::parse(&self.site_url)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.to_string()));

        match host {
            Some(host) => {
                let host = host.strip_prefix("www.").unwrap_or(&host);
                format!("{}@{}", DEFAULT_FROM_LOCAL_PART, host)
            }
            None => format!("{}@", DEFAULT_FROM_LOCAL_PART),
        }
    }

    /// Read site defaults from `MAIL_SITE_URL` and `MAIL_CHARSET`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(url) = env::var("MAIL_SITE_URL") {
            settings.site_url = url;
        }
        if let Ok(charset) = env::var("MAIL_CHARSET") {
            if !charset.trim().is_empty() {
                settings.charset = charset;
            }
        }
        settings
    }
}

/// Configuration read from the environment.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub site: SiteSettings,
    /// Present when `MAIL_PROVIDER` is set.
    pub provider: Option<ProviderConfig>,
}

/// Read configuration from environment variables.
///
/// Passwords in the returned record are plaintext; persist them through
/// [`Settings::save`](crate::Settings::save) so they are encrypted.
pub fn from_env() -> Result<EnvConfig, MailError> {
    let site = SiteSettings::from_env();

    let provider = match env::var("MAIL_PROVIDER") {
        Ok(p) if !p.trim().is_empty() => p.trim().parse::<ProviderId>()?,
        _ => return Ok(EnvConfig { site, provider: None }),
    };

    let from_name = env::var("MAIL_FROM_NAME").unwrap_or_default();
    let from_email = env::var("MAIL_FROM").unwrap_or_default();

    let config = match provider {
        ProviderId::Default => ProviderConfig::Default(DefaultRelayConfig {
            from_name,
            from_email,
        }),
        ProviderId::Other => {
            let host = env::var("SMTP_HOST")
                .map_err(|_| MailError::Configuration("SMTP_HOST not set".into()))?;
            let encryption: Encryption = env::var("SMTP_ENCRYPTION")
                .unwrap_or_default()
                .parse()?;
            let port = match env::var("SMTP_PORT") {
                Ok(p) => p.trim().parse::<u16>().map_err(|_| {
                    MailError::Configuration(format!("SMTP_PORT is not a valid port: {}", p))
                })?,
                Err(_) => encryption.default_port(),
            };
            let username = env::var("SMTP_USERNAME").unwrap_or_default();

            ProviderConfig::Other(SmtpRelayConfig {
                host,
                port: Some(port),
                authentication: !username.is_empty(),
                username,
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                encryption,
                from_name,
                from_email,
                reply_to: env::var("SMTP_REPLY_TO").unwrap_or_default(),
            })
        }
        ProviderId::Brevo => {
            let api_key = env::var("BREVO_API_KEY")
                .map_err(|_| MailError::Configuration("BREVO_API_KEY not set".into()))?;
            ProviderConfig::Brevo(BrevoConfig {
                api_key,
                from_name,
                from_email,
            })
        }
    };

    Ok(EnvConfig {
        site,
        provider: Some(config),
    })
}
