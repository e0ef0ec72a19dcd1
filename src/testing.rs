//! Assertion helpers for tests.
//!
//! Pair a [`LocalTransport`] with a [`MemoryLogStore`] and assert on what
//! reached the transport and what was logged.
//!
//! ```rust,ignore
//! use mailrelay::testing::*;
//!
//! #[tokio::test]
//! async fn test_welcome_flow() {
//!     let transport = LocalTransport::shared();
//!     let logs = MemoryLogStore::shared();
//!     let service = MailService::builder(MemoryConfigStore::shared(), logs.clone())
//!         .transport(transport.clone())
//!         .build();
//!
//!     service.send_mail(MailRequest::new("Welcome!", "Hi").to("user@example.com")).await;
//!
//!     assert_mail_sent(&transport);
//!     assert_mail_to(&transport, "user@example.com");
//!     assert_mail_subject_matches(&transport, r"^Welcome");
//!     assert_logged_success(&logs, "user@example.com");
//! }
//! ```

use regex::Regex;

use crate::logs::{LogRecord, MemoryLogStore};
use crate::transport::{Delivery, LocalTransport};

// ============================================================================
// Helper Functions
// ============================================================================

fn summarize(deliveries: &[Delivery]) -> String {
    if deliveries.is_empty() {
        return "  (nothing sent)".to_string();
    }

    deliveries
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let to = d
                .email
                .to
                .iter()
                .map(|a| a.email.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let from = d
                .email
                .from
                .as_ref()
                .map(|a| a.email.as_str())
                .unwrap_or("<none>");
            format!(
                "  {}. To: [{}], From: {}, Subject: \"{}\"",
                i + 1,
                to,
                from,
                d.email.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_logs(rows: &[LogRecord]) -> String {
    if rows.is_empty() {
        return "  (no log rows)".to_string();
    }

    rows.iter()
        .map(|r| {
            format!(
                "  #{} to: {}, status: {}, error: \"{}\"",
                r.id, r.to, r.status, r.error_message
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("Invalid regex '{}': {}", pattern, e))
}

// ============================================================================
// Transport Assertions
// ============================================================================

/// Assert that at least one message reached the transport.
pub fn assert_mail_sent(transport: &LocalTransport) {
    assert!(
        transport.has_deliveries(),
        "Expected at least one message to be sent, but none were sent"
    );
}

/// Assert that nothing reached the transport.
pub fn refute_mail_sent(transport: &LocalTransport) {
    let deliveries = transport.deliveries();
    assert!(
        deliveries.is_empty(),
        "Expected no messages to be sent, but {} were sent.\n\nSent:\n{}",
        deliveries.len(),
        summarize(&deliveries)
    );
}

/// Assert that exactly `expected` messages reached the transport.
pub fn assert_mail_count(transport: &LocalTransport, expected: usize) {
    let deliveries = transport.deliveries();
    assert!(
        deliveries.len() == expected,
        "Expected {} message(s) to be sent, but {} were sent.\n\nSent:\n{}",
        expected,
        deliveries.len(),
        summarize(&deliveries)
    );
}

/// Assert that a message went to `email` (case-insensitive).
pub fn assert_mail_to(transport: &LocalTransport, email: &str) {
    assert!(
        transport.sent_to(email),
        "Expected a message to '{}'.\n\nSent:\n{}",
        email,
        summarize(&transport.deliveries())
    );
}

/// Assert that no message went to `email`.
pub fn refute_mail_to(transport: &LocalTransport, email: &str) {
    assert!(
        !transport.sent_to(email),
        "Expected no message to '{}', but found one.\n\nSent:\n{}",
        email,
        summarize(&transport.deliveries())
    );
}

/// Assert that a message with exactly this subject was sent.
pub fn assert_mail_subject(transport: &LocalTransport, subject: &str) {
    assert!(
        transport.sent_with_subject(subject),
        "Expected a message with subject '{}'.\n\nSent:\n{}",
        subject,
        summarize(&transport.deliveries())
    );
}

/// Assert that a sent subject matches `pattern`.
pub fn assert_mail_subject_matches(transport: &LocalTransport, pattern: &str) {
    let re = compile(pattern);
    let deliveries = transport.deliveries();
    assert!(
        deliveries.iter().any(|d| re.is_match(&d.email.subject)),
        "Expected a message with subject matching /{}/.\n\nSent:\n{}",
        pattern,
        summarize(&deliveries)
    );
}

/// Assert that a message was sent from `email`.
pub fn assert_mail_from(transport: &LocalTransport, email: &str) {
    let deliveries = transport.deliveries();
    let found = deliveries.iter().any(|d| {
        d.email
            .from
            .as_ref()
            .is_some_and(|a| a.email.eq_ignore_ascii_case(email))
    });
    assert!(
        found,
        "Expected a message from '{}'.\n\nSent:\n{}",
        email,
        summarize(&deliveries)
    );
}

/// Assert that a message carried an attachment named `filename`.
pub fn assert_mail_has_attachment(transport: &LocalTransport, filename: &str) {
    let deliveries = transport.deliveries();
    let found = deliveries
        .iter()
        .any(|d| d.email.attachments.iter().any(|a| a.filename == filename));
    assert!(
        found,
        "Expected a message with attachment '{}'.\n\nSent:\n{}",
        filename,
        summarize(&deliveries)
    );
}

/// Assert that a message matching `predicate` was sent.
pub fn assert_mail_matches<F>(transport: &LocalTransport, predicate: F)
where
    F: Fn(&Delivery) -> bool,
{
    let deliveries = transport.deliveries();
    assert!(
        deliveries.iter().any(predicate),
        "Expected a message matching the predicate.\n\nSent:\n{}",
        summarize(&deliveries)
    );
}

/// The most recent delivery. Panics when nothing was sent.
pub fn last_delivery(transport: &LocalTransport) -> Delivery {
    transport
        .last_delivery()
        .unwrap_or_else(|| panic!("Expected a message to be sent, but none were sent"))
}

// ============================================================================
// Log Assertions
// ============================================================================

/// Assert that a successful row was logged for `to`.
pub fn assert_logged_success(logs: &MemoryLogStore, to: &str) {
    let rows = logs.all();
    assert!(
        rows.iter().any(|r| r.status && r.to.contains(to)),
        "Expected a successful log row for '{}'.\n\nRows:\n{}",
        to,
        summarize_logs(&rows)
    );
}

/// Assert that a failed row was logged for `to`.
pub fn assert_logged_failure(logs: &MemoryLogStore, to: &str) {
    let rows = logs.all();
    assert!(
        rows.iter().any(|r| !r.status && r.to.contains(to)),
        "Expected a failed log row for '{}'.\n\nRows:\n{}",
        to,
        summarize_logs(&rows)
    );
}

/// Assert that exactly `expected` rows were logged.
pub fn assert_log_count(logs: &MemoryLogStore, expected: usize) {
    let rows = logs.all();
    assert!(
        rows.len() == expected,
        "Expected {} log row(s), found {}.\n\nRows:\n{}",
        expected,
        rows.len(),
        summarize_logs(&rows)
    );
}

/// The most recent log row. Panics when nothing was logged.
pub fn last_log(logs: &MemoryLogStore) -> LogRecord {
    logs.last()
        .unwrap_or_else(|| panic!("Expected a log row, but none were written"))
}
