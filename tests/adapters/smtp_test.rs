//! Generic SMTP adapter tests.

use mailrelay::providers::SmtpRelayMailer;
use mailrelay::transport::{Route, SmtpSettings};
use mailrelay::{
    ConfigStore, Crypto, Email, Encryption, LocalTransport, MailError, Mailer, MemoryConfigStore,
    SmtpRelayConfig,
};

fn email() -> Email {
    Email::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .subject("Quarterly report")
        .text_body("Attached.")
}

#[tokio::test]
async fn sends_over_configured_server_with_decrypted_password() {
    let store = MemoryConfigStore::shared();
    let encrypted = Crypto::initialize(store.as_ref())
        .unwrap()
        .encrypt("hunter2")
        .unwrap();
    let transport = LocalTransport::shared();

    let mailer = SmtpRelayMailer::new(
        SmtpRelayConfig {
            host: "smtp.example.com".into(),
            port: Some(2525),
            authentication: true,
            username: "relay".into(),
            password: encrypted,
            encryption: Encryption::Tls,
            ..Default::default()
        },
        store,
        transport.clone(),
    );

    let outcome = mailer.send(&email()).await.unwrap();
    assert!(outcome.delivered);

    let delivery = transport.last_delivery().unwrap();
    assert_eq!(
        delivery.route,
        Route::Smtp(SmtpSettings {
            host: "smtp.example.com".into(),
            port: 2525,
            credentials: Some(("relay".into(), "hunter2".into())),
            encryption: Encryption::Tls,
        })
    );
}

#[tokio::test]
async fn without_authentication_no_credentials_are_used() {
    let transport = LocalTransport::shared();
    let mailer = SmtpRelayMailer::new(
        SmtpRelayConfig {
            host: "mx.example.com".into(),
            port: Some(25),
            username: "ignored".into(),
            ..Default::default()
        },
        MemoryConfigStore::shared(),
        transport.clone(),
    );

    mailer.send(&email()).await.unwrap();
    let Route::Smtp(settings) = transport.last_delivery().unwrap().route else {
        panic!("expected an SMTP route");
    };
    assert_eq!(settings.credentials, None);
}

#[tokio::test]
async fn empty_host_falls_back_to_localhost() {
    let mailer = SmtpRelayMailer::new(
        SmtpRelayConfig::default(),
        MemoryConfigStore::shared(),
        LocalTransport::shared(),
    );
    let settings = mailer.smtp_settings().unwrap();
    assert_eq!(settings.host, "localhost");
    assert!(!mailer.is_configured());
}

#[tokio::test]
async fn reply_to_and_sender_override_are_applied() {
    let transport = LocalTransport::shared();
    let mailer = SmtpRelayMailer::new(
        SmtpRelayConfig {
            host: "smtp.example.com".into(),
            port: Some(587),
            from_name: "Billing".into(),
            from_email: "billing@example.com".into(),
            reply_to: "support@example.com".into(),
            ..Default::default()
        },
        MemoryConfigStore::shared(),
        transport.clone(),
    );

    let outcome = mailer.send(&email()).await.unwrap();
    assert_eq!(outcome.resolved_from.email, "billing@example.com");

    let sent = transport.last_delivery().unwrap().email;
    assert_eq!(sent.from.unwrap().email, "billing@example.com");
    assert_eq!(sent.reply_to.len(), 1);
    assert_eq!(sent.reply_to[0].email, "support@example.com");
    assert_eq!(sent.reply_to[0].name.as_deref(), Some("Information"));
}

#[tokio::test]
async fn transport_failure_keeps_reply_code() {
    let transport = LocalTransport::shared();
    transport.set_failure("Mailbox unavailable", Some(550));
    let mailer = SmtpRelayMailer::new(
        SmtpRelayConfig {
            host: "smtp.example.com".into(),
            port: Some(587),
            ..Default::default()
        },
        MemoryConfigStore::shared(),
        transport,
    );

    let err = mailer.send(&email()).await.unwrap_err();
    assert_eq!(err.code(), Some(550));
    assert!(matches!(err, MailError::Transport { .. }));
}

#[tokio::test]
async fn adapter_headers_reach_the_message() {
    let transport = LocalTransport::shared();
    let mut mailer = SmtpRelayMailer::new(
        SmtpRelayConfig {
            host: "smtp.example.com".into(),
            port: Some(587),
            ..Default::default()
        },
        MemoryConfigStore::shared(),
        transport.clone(),
    );
    mailer.set_headers(&[("X-Report", "q3"), ("X-Blank", ""), ("", "nameless")]);

    mailer.send(&email()).await.unwrap();

    let sent = transport.last_delivery().unwrap().email;
    assert_eq!(sent.headers, vec![("X-Report".to_string(), "q3".to_string())]);
}

#[tokio::test]
async fn send_never_generates_secrets() {
    let store = MemoryConfigStore::shared();
    let transport = LocalTransport::shared();
    let mailer = SmtpRelayMailer::new(
        SmtpRelayConfig {
            host: "smtp.example.com".into(),
            port: Some(587),
            authentication: true,
            username: "relay".into(),
            password: "c2VhbGVkIGVsc2V3aGVyZQ==".into(),
            ..Default::default()
        },
        store.clone(),
        transport.clone(),
    );

    let err = mailer.send(&email()).await.unwrap_err();
    assert!(matches!(err, MailError::Crypto(_)));
    assert!(store.secret_pair().unwrap().is_none());
    assert!(!transport.has_deliveries());
}
