//! Provider settings persistence tests.

use mailrelay::{
    BrevoConfig, ConfigStore, DefaultRelayConfig, Dispatcher, Encryption, JsonFileConfigStore,
    MailError, ProviderConfig, ProviderId, SaveStatus, Settings, SmtpRelayConfig,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn smtp_config() -> SmtpRelayConfig {
    SmtpRelayConfig {
        host: " smtp.example.com ".into(),
        port: Some(465),
        authentication: true,
        username: "relay".into(),
        password: "correct horse".into(),
        encryption: Encryption::Ssl,
        from_name: "Relay".into(),
        from_email: "relay@example.com".into(),
        reply_to: "not an address".into(),
    }
}

fn settings_for(store: Arc<JsonFileConfigStore>) -> Settings {
    Settings::new(Dispatcher::new(store))
}

#[tokio::test]
async fn smtp_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mailrelay.json");

    {
        let store = Arc::new(JsonFileConfigStore::open(&file).unwrap());
        let status = settings_for(store.clone())
            .save(ProviderConfig::Other(smtp_config()), Some(true))
            .await
            .unwrap();
        assert_eq!(status, SaveStatus::Saved);

        let Some(ProviderConfig::Other(stored)) = store.provider_config(ProviderId::Other).unwrap()
        else {
            panic!("expected an smtp record");
        };
        assert_ne!(stored.password, "correct horse");
        assert_eq!(stored.host, "smtp.example.com");
        assert_eq!(stored.reply_to, "");
    }

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&file).unwrap()).unwrap();
    assert_eq!(raw["active_provider"], json!("other"));
    assert_eq!(raw["providers"]["other"]["provider_type"], json!("other"));

    let reopened = Arc::new(JsonFileConfigStore::open(&file).unwrap());
    let view = settings_for(reopened).load(None).unwrap();

    let expected = SmtpRelayConfig {
        host: "smtp.example.com".into(),
        reply_to: String::new(),
        ..smtp_config()
    };
    assert_eq!(view.config, ProviderConfig::Other(expected));
    assert!(view.is_active);
    assert_eq!(view.active_provider, "other");
    assert_eq!(view.is_configured["other"], true);
    assert_eq!(view.is_configured["default"], false);
}

#[tokio::test]
async fn unchanged_save_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileConfigStore::open(dir.path().join("c.json")).unwrap());
    let settings = settings_for(store);

    let config = ProviderConfig::Default(DefaultRelayConfig {
        from_name: "Shop".into(),
        from_email: "shop@example.com".into(),
    });
    assert_eq!(settings.save(config.clone(), None).await.unwrap(), SaveStatus::Saved);
    assert_eq!(settings.save(config.clone(), None).await.unwrap(), SaveStatus::Unchanged);

    let view = settings.load(Some(ProviderId::Default)).unwrap();
    assert_eq!(view.config, config);
    assert!(!view.is_active);
    assert_eq!(settings.current_provider_type().unwrap(), ProviderId::Default);
}

#[tokio::test]
async fn unchanged_smtp_save_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileConfigStore::open(dir.path().join("c.json")).unwrap());
    let settings = settings_for(store.clone());

    let config = ProviderConfig::Other(smtp_config());
    assert_eq!(settings.save(config.clone(), Some(true)).await.unwrap(), SaveStatus::Saved);
    let sealed = store.provider_config(ProviderId::Other).unwrap();

    assert_eq!(settings.save(config, None).await.unwrap(), SaveStatus::Unchanged);
    assert_eq!(store.provider_config(ProviderId::Other).unwrap(), sealed);
}

#[tokio::test]
async fn load_without_record_returns_empty_config() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileConfigStore::open(dir.path().join("c.json")).unwrap());

    let view = settings_for(store).load(Some(ProviderId::Brevo)).unwrap();
    assert_eq!(view.config, ProviderConfig::Brevo(BrevoConfig::default()));
    assert_eq!(view.active_provider, "");
    assert!(view.is_configured.values().all(|c| !c));
}

#[tokio::test]
async fn brevo_key_is_checked_before_saving() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .and(header("api-key", "bad-key"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Key not found"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .and(header("api-key", "good-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "owner@example.com"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileConfigStore::open(dir.path().join("c.json")).unwrap());
    let settings = Settings::new(Dispatcher::new(store.clone()).brevo_base_url(server.uri()));

    let err = settings
        .save(
            ProviderConfig::Brevo(BrevoConfig {
                api_key: "bad-key".into(),
                ..Default::default()
            }),
            Some(true),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MailError::ApiKeyRejected { code: 401, .. }));
    assert!(store.provider_config(ProviderId::Brevo).unwrap().is_none());
    assert_eq!(store.active_provider().unwrap(), "");
    assert_eq!(store.validation(ProviderId::Brevo).unwrap().map(|v| v.code), Some(401));

    let status = settings
        .save(
            ProviderConfig::Brevo(BrevoConfig {
                api_key: "good-key".into(),
                ..Default::default()
            }),
            Some(true),
        )
        .await
        .unwrap();
    assert_eq!(status, SaveStatus::Saved);
    assert_eq!(store.active_provider().unwrap(), "brevo");
    assert!(settings.is_mailer_complete(None).unwrap());
}
