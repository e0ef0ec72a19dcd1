//! Local relay adapter tests.

use mailrelay::providers::LocalRelayMailer;
use mailrelay::transport::Route;
use mailrelay::{DefaultRelayConfig, Email, LocalTransport, MailError, Mailer};

fn email() -> Email {
    Email::new()
        .from(("Tony", "tony.stark@example.com"))
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .text_body("Hello!")
}

fn configured() -> DefaultRelayConfig {
    DefaultRelayConfig {
        from_name: "Stark Industries".into(),
        from_email: "noreply@stark.example.com".into(),
    }
}

#[tokio::test]
async fn hands_message_to_sendmail() {
    let transport = LocalTransport::shared();
    let mailer = LocalRelayMailer::new(DefaultRelayConfig::default(), transport.clone());

    let outcome = mailer.send(&email()).await.unwrap();
    assert!(outcome.delivered);
    assert_eq!(outcome.resolved_from.email, "tony.stark@example.com");

    let delivery = transport.last_delivery().unwrap();
    assert_eq!(delivery.route, Route::Sendmail);
    assert_eq!(delivery.email.subject, "Hello, Avengers!");
}

#[tokio::test]
async fn configured_sender_replaces_message_sender() {
    let transport = LocalTransport::shared();
    let mailer = LocalRelayMailer::new(configured(), transport.clone());

    let outcome = mailer.send(&email()).await.unwrap();
    assert_eq!(outcome.resolved_from.email, "noreply@stark.example.com");
    assert_eq!(outcome.resolved_from.name.as_deref(), Some("Stark Industries"));

    let sent = transport.last_delivery().unwrap().email;
    assert_eq!(sent.from.unwrap().email, "noreply@stark.example.com");
}

#[tokio::test]
async fn partial_sender_config_is_ignored() {
    let transport = LocalTransport::shared();
    let mailer = LocalRelayMailer::new(
        DefaultRelayConfig {
            from_name: String::new(),
            from_email: "noreply@stark.example.com".into(),
        },
        transport,
    );

    let outcome = mailer.send(&email()).await.unwrap();
    assert_eq!(outcome.resolved_from.email, "tony.stark@example.com");
    assert!(!mailer.is_configured());
}

#[tokio::test]
async fn refusal_is_a_rejected_outcome() {
    let transport = LocalTransport::shared();
    transport.set_refusal();
    let mailer = LocalRelayMailer::new(configured(), transport.clone());

    let outcome = mailer.send(&email()).await.unwrap();
    assert!(!outcome.delivered);
    assert!(!transport.has_deliveries());
}

#[tokio::test]
async fn transport_failure_is_an_error() {
    let transport = LocalTransport::shared();
    transport.set_failure("sendmail not found", None);
    let mailer = LocalRelayMailer::new(configured(), transport);

    let err = mailer.send(&email()).await.unwrap_err();
    assert!(matches!(err, MailError::Transport { .. }));
    assert_eq!(err.user_message(), "sendmail not found");
}

#[tokio::test]
async fn missing_sender_is_an_error() {
    let mailer = LocalRelayMailer::new(DefaultRelayConfig::default(), LocalTransport::shared());
    let email = Email::new().to("steve.rogers@example.com").subject("No sender");

    let err = mailer.send(&email).await.unwrap_err();
    assert!(matches!(err, MailError::MissingField("from")));
}

#[tokio::test]
async fn adapter_headers_reach_the_message() {
    let transport = LocalTransport::shared();
    let mut mailer = LocalRelayMailer::new(DefaultRelayConfig::default(), transport.clone());
    mailer.set_header("X-Campaign", "launch");
    mailer.set_headers(&[("", "orphan"), ("X-Empty", ""), ("X-Priority", "1")]);

    let email = email().header("x-campaign", "draft");
    mailer.send(&email).await.unwrap();

    let sent = transport.last_delivery().unwrap().email;
    assert_eq!(
        sent.headers,
        vec![
            ("X-Campaign".to_string(), "launch".to_string()),
            ("X-Priority".to_string(), "1".to_string()),
        ]
    );
}
