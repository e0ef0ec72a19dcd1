//! Extension points around [`MailService::send_mail`](crate::MailService::send_mail).
//!
//! Hooks sit between the caller and the provider. They can rewrite the
//! request, skip sending entirely, adjust sender and content defaults, look
//! at the finished message, and observe the outcome.
//!
//! # Example
//!
//! ```rust,ignore
//! use mailrelay::{MailHooks, MailRequest};
//!
//! struct StagingRedirect;
//!
//! impl MailHooks for StagingRedirect {
//!     fn filter_request(&self, mut request: MailRequest) -> MailRequest {
//!         request.to = vec!["qa@example.com".into()];
//!         request
//!     }
//! }
//!
//! let service = MailService::builder(store, logs).hook(StagingRedirect).build();
//! ```

use std::sync::Arc;

use crate::email::Email;
use crate::request::MailRequest;

/// What a send was about, as passed to the outcome hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailData {
    pub to: Vec<String>,
    pub subject: String,
    pub message: String,
    /// Custom headers left after the typed ones were extracted.
    pub headers: Vec<(String, String)>,
    /// Attachment paths or filenames.
    pub attachments: Vec<String>,
}

/// A failed send, as passed to [`MailHooks::on_failure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailFailure {
    pub data: MailData,
    pub message: String,
    /// Transport or remote status code, when one was reported.
    pub code: Option<u16>,
}

/// Callbacks invoked by the mail service.
///
/// Every method has a pass-through default, so implementors override only
/// what they need.
pub trait MailHooks: Send + Sync {
    /// Rewrite the whole request before anything else happens.
    fn filter_request(&self, request: MailRequest) -> MailRequest {
        request
    }

    /// Return `Some(result)` to skip sending. The value is reported as the
    /// send result and nothing is logged.
    fn pre_send(&self, _request: &MailRequest) -> Option<bool> {
        None
    }

    fn from_email(&self, email: String) -> String {
        email
    }

    fn from_name(&self, name: String) -> String {
        name
    }

    fn content_type(&self, content_type: String) -> String {
        content_type
    }

    fn charset(&self, charset: String) -> String {
        charset
    }

    /// Called with the finished message just before it is dispatched.
    fn on_prepared(&self, _email: &Email) {}

    fn on_success(&self, _data: &MailData) {}

    fn on_failure(&self, _failure: &MailFailure) {}
}

/// An ordered list of hooks. Filters run in registration order, each
/// seeing the previous one's output.
#[derive(Clone, Default)]
pub struct HookSet {
    hooks: Vec<Arc<dyn MailHooks>>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook: Arc<dyn MailHooks>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn filter_request(&self, request: MailRequest) -> MailRequest {
        self.hooks
            .iter()
            .fold(request, |req, hook| hook.filter_request(req))
    }

    /// First hook to return a value wins.
    pub fn pre_send(&self, request: &MailRequest) -> Option<bool> {
        self.hooks.iter().find_map(|hook| hook.pre_send(request))
    }

    pub fn from_email(&self, email: String) -> String {
        self.hooks.iter().fold(email, |v, hook| hook.from_email(v))
    }

    pub fn from_name(&self, name: String) -> String {
        self.hooks.iter().fold(name, |v, hook| hook.from_name(v))
    }

    pub fn content_type(&self, content_type: String) -> String {
        self.hooks
            .iter()
            .fold(content_type, |v, hook| hook.content_type(v))
    }

    pub fn charset(&self, charset: String) -> String {
        self.hooks.iter().fold(charset, |v, hook| hook.charset(v))
    }

    pub fn on_prepared(&self, email: &Email) {
        for hook in &self.hooks {
            hook.on_prepared(email);
        }
    }

    pub fn on_success(&self, data: &MailData) {
        for hook in &self.hooks {
            hook.on_success(data);
        }
    }

    pub fn on_failure(&self, failure: &MailFailure) {
        for hook in &self.hooks {
            hook.on_failure(failure);
        }
    }
}

impl std::fmt::Debug for HookSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSet")
            .field("len", &self.hooks.len())
            .finish()
    }
}
