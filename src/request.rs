//! Raw send requests and header parsing.
//!
//! A [`MailRequest`] is what callers hand to
//! [`MailService::send_mail`](crate::MailService::send_mail): loosely
//! formatted recipients, a header block, and attachments. Typed fields are
//! pulled out of the headers by [`ParsedHeaders::parse`].

use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;

/// An unprocessed send request.
///
/// ```rust,ignore
/// let request = MailRequest::new("Order shipped", "Your parcel is on its way.")
///     .to("alice@example.com, Bob <bob@example.com>")
///     .header_block("From: Shop <shop@example.com>\r\nCc: ops@example.com");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRequest {
    /// Recipient entries; each may be `"Name" <email>` or a bare address.
    pub to: Vec<String>,
    pub subject: String,
    pub message: String,
    /// Header lines, `Name: Value` each.
    pub headers: Vec<String>,
    pub attachments: Vec<Attachment>,
}

impl MailRequest {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Add recipients from a comma-separated string.
    pub fn to(mut self, recipients: &str) -> Self {
        self.to.extend(recipients.split(',').map(str::to_string));
        self
    }

    /// Add recipients from a list. Entries are not split further.
    pub fn recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.to.extend(recipients.into_iter().map(Into::into));
        self
    }

    /// Add one header line.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(format!("{}: {}", name, value));
        self
    }

    /// Add headers from a raw block separated by `\n` or `\r\n`.
    pub fn header_block(mut self, block: &str) -> Self {
        self.headers.extend(
            block
                .replace("\r\n", "\n")
                .split('\n')
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string),
        );
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Add file attachments from a newline-separated list of paths.
    pub fn attachment_paths(mut self, paths: &str) -> Self {
        self.attachments.extend(
            paths
                .replace("\r\n", "\n")
                .split('\n')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Attachment::from_path),
        );
        self
    }

    /// Labels of the attachments as they appear in the log.
    pub fn attachment_labels(&self) -> Vec<String> {
        self.attachments
            .iter()
            .map(|a| a.log_label().to_string())
            .collect()
    }
}

/// Typed values pulled out of a header block, plus the remaining headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHeaders {
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub content_type: Option<String>,
    pub charset: Option<String>,
    pub boundary: Option<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub reply_to: Vec<String>,
    /// Every other header, in first-seen order. A repeated name keeps the
    /// last value.
    pub custom: Vec<(String, String)>,
}

impl ParsedHeaders {
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut parsed = Self::default();

        for line in lines {
            let line = line.as_ref().trim();
            let Some((name, content)) = line.split_once(':') else {
                if let Some(boundary) = value_after(line, "boundary=") {
                    parsed.boundary = Some(strip_quotes(boundary));
                }
                continue;
            };

            let name = name.trim();
            let content = content.trim();

            match name.to_ascii_lowercase().as_str() {
                "from" => parsed.parse_from(content),
                "content-type" => parsed.parse_content_type(content),
                "cc" => parsed.cc.extend(split_list(content)),
                "bcc" => parsed.bcc.extend(split_list(content)),
                "reply-to" => parsed.reply_to.extend(split_list(content)),
                _ => match parsed.custom.iter_mut().find(|(n, _)| n == name) {
                    Some(entry) => entry.1 = content.to_string(),
                    None => parsed.custom.push((name.to_string(), content.to_string())),
                },
            }
        }

        parsed
    }

    fn parse_from(&mut self, content: &str) {
        match content.find('<') {
            Some(pos) => {
                let name = content[..pos].replace('"', "");
                let name = name.trim();
                if !name.is_empty() {
                    self.from_name = Some(name.to_string());
                }
                let email = content[pos + 1..].replace('>', "");
                self.from_email = Some(email.trim().to_string());
            }
            None if !content.is_empty() => self.from_email = Some(content.to_string()),
            None => {}
        }
    }

    fn parse_content_type(&mut self, content: &str) {
        match content.split_once(';') {
            Some((mime, params)) => {
                self.content_type = Some(mime.trim().to_string());
                let params = params.split(';').next().unwrap_or_default();
                if let Some(charset) = value_after(params, "charset=") {
                    let charset = strip_quotes(charset);
                    if !charset.is_empty() {
                        self.charset = Some(charset);
                    }
                } else if let Some(boundary) = value_after(params, "boundary=") {
                    self.boundary = Some(strip_quotes(boundary));
                }
            }
            None if !content.is_empty() => self.content_type = Some(content.to_string()),
            None => {}
        }
    }
}

/// The text after `key` (matched case-insensitively), if `key` occurs.
fn value_after<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let pos = text.to_ascii_lowercase().find(key)?;
    Some(&text[pos + key.len()..])
}

fn strip_quotes(value: &str) -> String {
    value.replace(['"', '\''], "").trim().to_string()
}

fn split_list(content: &str) -> impl Iterator<Item = String> + '_ {
    content.split(',').map(str::to_string)
}
