//! Brevo adapter tests.

use mailrelay::providers::BrevoMailer;
use mailrelay::{
    Attachment, BrevoConfig, ConfigStore, Email, Mailer, MemoryConfigStore, ProviderId,
    ValidationRecord,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn config(api_key: &str) -> BrevoConfig {
    BrevoConfig {
        api_key: api_key.to_string(),
        ..Default::default()
    }
}

fn mailer(server: &MockServer, config: BrevoConfig) -> (BrevoMailer, Arc<MemoryConfigStore>) {
    let store = MemoryConfigStore::shared();
    let mailer = BrevoMailer::new(config, store.clone()).base_url(server.uri());
    (mailer, store)
}

fn valid_email() -> Email {
    Email::new()
        .from(("Tony Stark", "tony.stark@example.com"))
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .html_body("<h1>Hello</h1>")
}

fn created() -> ResponseTemplate {
    ResponseTemplate::new(201).set_body_json(json!({
        "messageId": "<42.11@relay.example.com>"
    }))
}

// ============================================================================
// Delivery
// ============================================================================

#[tokio::test]
async fn created_reply_is_delivered() {
    let server = MockServer::start().await;
    let (mailer, _) = mailer(&server, config("xkeysib-test"));

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(header("api-key", "xkeysib-test"))
        .and(header("Accept", "application/json"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "sender": {"email": "tony.stark@example.com", "name": "Tony Stark"},
            "to": [{"email": "steve.rogers@example.com"}],
            "subject": "Hello, Avengers!",
            "htmlContent": "<h1>Hello</h1>"
        })))
        .respond_with(created())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mailer.send(&valid_email()).await.unwrap();
    assert!(outcome.delivered);
    assert_eq!(outcome.response.code, Some(201));
    assert_eq!(outcome.response.message, "Sent Successfully");
    assert_eq!(
        outcome.response.message_id.as_deref(),
        Some("<42.11@relay.example.com>")
    );
    assert_eq!(outcome.resolved_from.email, "tony.stark@example.com");
}

#[tokio::test]
async fn plain_text_goes_to_text_content() {
    let server = MockServer::start().await;
    let (mailer, _) = mailer(&server, config("key"));

    let email = Email::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .subject("Plain")
        .text_body("Hello");

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(body_json(json!({
            "sender": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "subject": "Plain",
            "textContent": "Hello"
        })))
        .respond_with(created())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer.send(&email).await.unwrap().delivered);
}

#[tokio::test]
async fn ok_status_is_not_delivery() {
    let server = MockServer::start().await;
    let (mailer, _) = mailer(&server, config("key"));

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messageId": "x"})))
        .mount(&server)
        .await;

    let outcome = mailer.send(&valid_email()).await.unwrap();
    assert!(!outcome.delivered);
    assert_eq!(outcome.response.code, Some(200));
}

#[tokio::test]
async fn rejection_carries_remote_message_and_status() {
    let server = MockServer::start().await;
    let (mailer, _) = mailer(&server, config("bad-key"));

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "unauthorized",
            "message": "Key not found"
        })))
        .mount(&server)
        .await;

    let outcome = mailer.send(&valid_email()).await.unwrap();
    assert!(!outcome.delivered);
    assert_eq!(outcome.response.code, Some(401));
    assert_eq!(outcome.response.message, "Key not found");
}

#[tokio::test]
async fn rejection_without_message_uses_fallback() {
    let server = MockServer::start().await;
    let (mailer, _) = mailer(&server, config("key"));

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let outcome = mailer.send(&valid_email()).await.unwrap();
    assert!(!outcome.delivered);
    assert_eq!(outcome.response.code, Some(500));
    assert_eq!(outcome.response.message, "Unknown error");
}

#[tokio::test]
async fn network_failure_is_an_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let mailer = BrevoMailer::new(config("key"), MemoryConfigStore::shared()).base_url(uri);
    let result = mailer.send(&valid_email()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn configured_sender_overrides_message_sender() {
    let server = MockServer::start().await;
    let (mailer, _) = mailer(
        &server,
        BrevoConfig {
            api_key: "key".into(),
            from_name: "Shop".into(),
            from_email: "shop@example.com".into(),
        },
    );

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(body_json(json!({
            "sender": {"email": "shop@example.com", "name": "Shop"},
            "to": [{"email": "steve.rogers@example.com"}],
            "subject": "Hello, Avengers!",
            "htmlContent": "<h1>Hello</h1>"
        })))
        .respond_with(created())
        .expect(1)
        .mount(&server)
        .await;

    let outcome = mailer.send(&valid_email()).await.unwrap();
    assert!(outcome.delivered);
    assert_eq!(outcome.resolved_from.email, "shop@example.com");
}

#[tokio::test]
async fn full_payload_with_lists_and_attachment() {
    let server = MockServer::start().await;
    let (mailer, _) = mailer(&server, config("key"));

    let email = valid_email()
        .cc(("Bruce", "bruce@example.com"))
        .bcc("natasha@example.com")
        .reply_to("office@example.com")
        .reply_to("second@example.com")
        .attachment(Attachment::from_bytes("notes.TXT", b"hi".to_vec()))
        .attachment(Attachment::from_bytes("payload.exe", b"MZ".to_vec()));

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(body_json(json!({
            "sender": {"email": "tony.stark@example.com", "name": "Tony Stark"},
            "to": [{"email": "steve.rogers@example.com"}],
            "cc": [{"email": "bruce@example.com", "name": "Bruce"}],
            "bcc": [{"email": "natasha@example.com"}],
            "replyTo": {"email": "office@example.com"},
            "subject": "Hello, Avengers!",
            "htmlContent": "<h1>Hello</h1>",
            "attachment": [{"name": "notes.TXT", "content": "aGk="}]
        })))
        .respond_with(created())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer.send(&email).await.unwrap().delivered);
}

#[tokio::test]
async fn adapter_headers_go_on_the_request() {
    let server = MockServer::start().await;
    let (mut mailer, _) = mailer(&server, config("xkeysib-test"));
    mailer.set_header("X-Mailin-Tag", "receipts");
    mailer.set_headers(&[("", "nameless"), ("X-Blank", ""), ("api-key", "spoofed")]);

    Mock::given(method("POST"))
        .and(path("/smtp/email"))
        .and(header("X-Mailin-Tag", "receipts"))
        .and(header("api-key", "xkeysib-test"))
        .respond_with(created())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer.send(&valid_email()).await.unwrap().delivered);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("x-blank").is_none());
}

// ============================================================================
// Key validation
// ============================================================================

#[tokio::test]
async fn valid_key_is_recorded_and_completes_config() {
    let server = MockServer::start().await;
    let (mailer, store) = mailer(&server, config("xkeysib-good"));

    Mock::given(method("GET"))
        .and(path("/account"))
        .and(header("api-key", "xkeysib-good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "owner@example.com"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!mailer.is_configured());

    let record = mailer.check_api_key("xkeysib-good").await.unwrap();
    assert_eq!(record.code, 200);
    assert_eq!(record.error_message, "");
    assert_eq!(
        store.validation(ProviderId::Brevo).unwrap(),
        Some(ValidationRecord {
            code: 200,
            error_message: String::new()
        })
    );
    assert!(mailer.is_configured());
}

#[tokio::test]
async fn rejected_key_is_recorded_with_message() {
    let server = MockServer::start().await;
    let (mailer, store) = mailer(&server, config("nope"));

    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "unauthorized",
            "message": "Key not found"
        })))
        .mount(&server)
        .await;

    let record = mailer.check_api_key("nope").await.unwrap();
    assert_eq!(record.code, 401);
    assert_eq!(record.error_message, "Key not found");
    assert_eq!(store.validation(ProviderId::Brevo).unwrap(), Some(record));
    assert!(!mailer.is_configured());
}

#[tokio::test]
async fn unreachable_account_endpoint_records_code_zero() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let store = MemoryConfigStore::shared();
    let mailer = BrevoMailer::new(config("key"), store.clone()).base_url(uri);

    let record = mailer.check_api_key("key").await.unwrap();
    assert_eq!(record.code, 0);
    assert!(!record.error_message.is_empty());
    assert_eq!(store.validation(ProviderId::Brevo).unwrap().map(|r| r.code), Some(0));
}
