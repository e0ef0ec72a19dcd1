//! Email struct with builder pattern.

use serde::{Deserialize, Serialize};

use crate::address::{Address, ToAddress};
use crate::attachment::Attachment;

/// Headers the transports generate themselves; never copied from callers.
pub const RESERVED_HEADERS: [&str; 2] = ["MIME-Version", "X-Mailer"];

/// Default character set when neither the caller nor the site sets one.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    /// One body tagged with its MIME type (`text/plain`, `text/html`, ...).
    Single { body: String, content_type: String },
    /// Plain-text and HTML renderings of the same message.
    Alternative { text: String, html: String },
}

impl Content {
    /// A plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::Single {
            body: body.into(),
            content_type: "text/plain".to_string(),
        }
    }

    /// An HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        Self::Single {
            body: body.into(),
            content_type: "text/html".to_string(),
        }
    }

    /// MIME type of the body as a whole.
    pub fn content_type(&self) -> &str {
        match self {
            Self::Single { content_type, .. } => content_type,
            Self::Alternative { .. } => "multipart/alternative",
        }
    }

    /// Text rendering, if there is one.
    pub fn text_part(&self) -> Option<&str> {
        match self {
            Self::Single { body, content_type } if content_type.eq_ignore_ascii_case("text/plain") => {
                Some(body)
            }
            Self::Alternative { text, .. } => Some(text),
            _ => None,
        }
    }

    /// HTML (or other non-plain) rendering, if there is one.
    pub fn html_part(&self) -> Option<&str> {
        match self {
            Self::Single { body, content_type } if !content_type.eq_ignore_ascii_case("text/plain") => {
                Some(body)
            }
            Self::Alternative { html, .. } => Some(html),
            _ => None,
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::text("")
    }
}

/// An outgoing email message.
///
/// ```
/// use mailrelay::Email;
///
/// let email = Email::new()
///     .from(("Billing", "billing@example.com"))
///     .to("customer@example.com")
///     .subject("Your invoice")
///     .html_body("<p>Attached.</p>");
///
/// assert_eq!(email.content.content_type(), "text/html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    /// Sender address
    pub from: Option<Address>,
    /// Primary recipients
    pub to: Vec<Address>,
    /// Carbon copy recipients
    pub cc: Vec<Address>,
    /// Blind carbon copy recipients
    pub bcc: Vec<Address>,
    /// Reply-to addresses
    pub reply_to: Vec<Address>,
    /// Subject line, may be empty
    pub subject: String,
    /// Body
    pub content: Content,
    /// Character set of the body
    pub charset: String,
    /// Multipart boundary supplied by the caller
    pub boundary: Option<String>,
    /// Custom headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// File attachments
    pub attachments: Vec<Attachment>,
}

impl Default for Email {
    fn default() -> Self {
        Self {
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            subject: String::new(),
            content: Content::default(),
            charset: DEFAULT_CHARSET.to_string(),
            boundary: None,
            headers: Vec::new(),
            attachments: Vec::new(),
        }
    }
}

impl Email {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    pub fn from(mut self, addr: impl ToAddress) -> Self {
        self.from = Some(addr.to_address());
        self
    }

    /// Add a recipient.
    pub fn to(mut self, addr: impl ToAddress) -> Self {
        self.to.push(addr.to_address());
        self
    }

    /// Replace all recipients.
    pub fn put_to(mut self, addrs: Vec<Address>) -> Self {
        self.to = addrs;
        self
    }

    /// Add a CC recipient.
    pub fn cc(mut self, addr: impl ToAddress) -> Self {
        self.cc.push(addr.to_address());
        self
    }

    /// Replace all CC recipients.
    pub fn put_cc(mut self, addrs: Vec<Address>) -> Self {
        self.cc = addrs;
        self
    }

    /// Add a BCC recipient.
    pub fn bcc(mut self, addr: impl ToAddress) -> Self {
        self.bcc.push(addr.to_address());
        self
    }

    /// Replace all BCC recipients.
    pub fn put_bcc(mut self, addrs: Vec<Address>) -> Self {
        self.bcc = addrs;
        self
    }

    /// Add a reply-to address.
    pub fn reply_to(mut self, addr: impl ToAddress) -> Self {
        self.reply_to.push(addr.to_address());
        self
    }

    /// Replace all reply-to addresses.
    pub fn put_reply_to(mut self, addrs: Vec<Address>) -> Self {
        self.reply_to = addrs;
        self
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set a plain-text body.
    pub fn text_body(mut self, body: impl Into<String>) -> Self {
        self.content = Content::text(body);
        self
    }

    /// Set an HTML body.
    pub fn html_body(mut self, body: impl Into<String>) -> Self {
        self.content = Content::html(body);
        self
    }

    /// Set a body with an arbitrary MIME type.
    pub fn body(mut self, body: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.content = Content::Single {
            body: body.into(),
            content_type: content_type.into(),
        };
        self
    }

    /// Set both plain-text and HTML bodies.
    pub fn alternative(mut self, text: impl Into<String>, html: impl Into<String>) -> Self {
        self.content = Content::Alternative {
            text: text.into(),
            html: html.into(),
        };
        self
    }

    /// Set the character set.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set the multipart boundary.
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Add an attachment.
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Custom headers a transport should emit.
    ///
    /// Skips the reserved headers and, for multipart bodies with a caller
    /// boundary, appends a `Content-Type` carrying that boundary.
    pub fn outgoing_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| !is_reserved_header(name))
            .cloned()
            .collect();

        if let Some(boundary) = self.multipart_boundary() {
            headers.push((
                "Content-Type".to_string(),
                format!("{}; boundary=\"{}\"", self.content.content_type(), boundary),
            ));
        }

        headers
    }

    /// The caller boundary, when the content type is multipart.
    pub fn multipart_boundary(&self) -> Option<&str> {
        let is_multipart = self
            .content
            .content_type()
            .to_ascii_lowercase()
            .contains("multipart");
        match &self.boundary {
            Some(boundary) if is_multipart && !boundary.is_empty() => Some(boundary),
            _ => None,
        }
    }

    /// Get all recipients (to + cc + bcc).
    pub fn all_recipients(&self) -> Vec<&Address> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .collect()
    }

    /// Check if the email has any attachments.
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Whether `name` is one of [`RESERVED_HEADERS`] (case-insensitive).
pub fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name.trim()))
}
