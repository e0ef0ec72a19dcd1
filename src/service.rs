//! The mail entry point.
//!
//! [`MailService::send_mail`] takes a loosely formatted [`MailRequest`],
//! runs the hooks, builds an [`Email`], hands it to the active provider, and
//! writes one delivery log row with the outcome.
//!
//! ```rust,ignore
//! use mailrelay::{MailRequest, MailService, MemoryConfigStore, MemoryLogStore};
//!
//! let service = MailService::builder(MemoryConfigStore::shared(), MemoryLogStore::shared())
//!     .site(SiteSettings::from_env())
//!     .build();
//!
//! let report = service
//!     .send_mail(MailRequest::new("Welcome", "Hello!").to("user@example.com"))
//!     .await;
//! if !report.sent {
//!     eprintln!("{}", report.response.message);
//! }
//! ```

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::address::Address;
use crate::config::{ProviderId, SiteSettings, TestMailConfig};
use crate::config_store::ConfigStore;
use crate::context::RequestContext;
use crate::dispatcher::Dispatcher;
use crate::email::Email;
use crate::hooks::{HookSet, MailData, MailFailure, MailHooks};
use crate::logs::{LogLookup, LogStore, NewLogRecord};
use crate::mailer::{ProviderResponse, SendOutcome};
use crate::request::{MailRequest, ParsedHeaders};
use crate::settings::Settings;
use crate::transport::Transport;

/// Content type used when the request does not name one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Shown when a failure carries no message of its own.
const GENERIC_FAILURE: &str = "The email could not be sent.";

const TEST_MAIL_BODY: &str = "Congrats, test email was sent successfully! We're on a mission \
to make sure that your emails actually get delivered.";

/// What happened to one [`MailService::send_mail`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailReport {
    pub sent: bool,
    /// Provider that handled the message; `None` when nothing was dispatched.
    pub provider: Option<ProviderId>,
    /// Sender actually used.
    pub resolved_from: Option<Address>,
    /// Provider message and code, or the failure detail.
    pub response: ProviderResponse,
    /// Delivery log row written for this attempt.
    pub log_id: Option<i64>,
    /// A `pre_send` hook answered instead of a provider.
    pub short_circuited: bool,
}

impl MailReport {
    fn short_circuit(sent: bool) -> Self {
        Self {
            sent,
            provider: None,
            resolved_from: None,
            response: ProviderResponse::default(),
            log_id: None,
            short_circuited: true,
        }
    }

    fn not_sent(message: impl Into<String>) -> Self {
        Self {
            sent: false,
            provider: None,
            resolved_from: None,
            response: ProviderResponse::new(message),
            log_id: None,
            short_circuited: false,
        }
    }
}

/// Sends mail through the active provider and records every attempt.
pub struct MailService {
    dispatcher: Dispatcher,
    logs: Arc<dyn LogStore>,
    hooks: HookSet,
    site: SiteSettings,
}

impl MailService {
    pub fn builder(store: Arc<dyn ConfigStore>, logs: Arc<dyn LogStore>) -> MailServiceBuilder {
        MailServiceBuilder {
            dispatcher: Dispatcher::new(store),
            logs,
            hooks: HookSet::new(),
            site: SiteSettings::default(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn logs(&self) -> &Arc<dyn LogStore> {
        &self.logs
    }

    pub fn site(&self) -> &SiteSettings {
        &self.site
    }

    /// Settings service over the same store and HTTP client.
    pub fn settings(&self) -> Settings {
        Settings::new(self.dispatcher.clone())
    }

    /// Send with no request context.
    pub async fn send_mail(&self, request: MailRequest) -> MailReport {
        self.send_mail_with(request, &RequestContext::default()).await
    }

    /// Send and record `ctx` (client IP, source) in the log.
    pub async fn send_mail_with(&self, request: MailRequest, ctx: &RequestContext) -> MailReport {
        let request = self.hooks.filter_request(request);
        if let Some(sent) = self.hooks.pre_send(&request) {
            tracing::debug!(sent, "Send short-circuited by hook");
            return MailReport::short_circuit(sent);
        }

        let parsed = ParsedHeaders::parse(&request.headers);
        let data = MailData {
            to: request.to.iter().map(|t| t.trim().to_string()).collect(),
            subject: request.subject.clone(),
            message: request.message.clone(),
            headers: parsed.custom.clone(),
            attachments: request.attachment_labels(),
        };

        let from_name = self.hooks.from_name(
            parsed
                .from_name
                .clone()
                .unwrap_or_else(|| self.site.from_name.clone()),
        );
        let from_email = self.hooks.from_email(
            parsed
                .from_email
                .clone()
                .unwrap_or_else(|| self.site.default_from_email()),
        );

        let from = match Address::parse_with_name(&from_name, &from_email) {
            Ok(from) => from,
            Err(e) => {
                tracing::error!(from = %from_email, error = %e, "Invalid sender, not sending");
                let failure = MailFailure {
                    data,
                    message: e.user_message(),
                    code: None,
                };
                self.hooks.on_failure(&failure);
                let record = self.log_record(&failure.data, &from_email, &request, ctx);
                let log_id = self.write_failure(record, &failure.message).await;
                let mut report = MailReport::not_sent(failure.message);
                report.log_id = log_id;
                return report;
            }
        };

        let email = self.build_email(&request, &parsed, from);
        self.hooks.on_prepared(&email);

        self.dispatch(email, data, &request, ctx).await
    }

    fn build_email(&self, request: &MailRequest, parsed: &ParsedHeaders, from: Address) -> Email {
        let content_type = self.hooks.content_type(
            parsed
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        );
        let charset = self.hooks.charset(
            parsed
                .charset
                .clone()
                .unwrap_or_else(|| self.site.charset.clone()),
        );

        let mut email = Email::new()
            .from(from)
            .put_to(Address::parse_list(&request.to))
            .put_cc(Address::parse_list(&parsed.cc))
            .put_bcc(Address::parse_list(&parsed.bcc))
            .put_reply_to(Address::parse_list(&parsed.reply_to))
            .subject(request.subject.clone())
            .body(request.message.clone(), content_type)
            .charset(charset);

        if let Some(boundary) = &parsed.boundary {
            email = email.boundary(boundary.clone());
        }
        for (name, value) in &parsed.custom {
            email = email.header(name.clone(), value.clone());
        }
        for attachment in &request.attachments {
            email = email.attachment(attachment.clone());
        }

        tracing::debug!(
            to = email.to.len(),
            cc = email.cc.len(),
            bcc = email.bcc.len(),
            attachments = email.attachments.len(),
            "Built message"
        );
        email
    }

    async fn dispatch(
        &self,
        email: Email,
        data: MailData,
        request: &MailRequest,
        ctx: &RequestContext,
    ) -> MailReport {
        let sender = email.from.clone();
        let sender_email = sender.as_ref().map(|a| a.email.clone()).unwrap_or_default();

        let provider = match self.dispatcher.select() {
            Ok(provider) => provider,
            Err(e) => {
                tracing::error!(error = %e, "Could not select a provider");
                let failure = MailFailure {
                    data,
                    message: e.user_message(),
                    code: e.code(),
                };
                self.hooks.on_failure(&failure);
                let record = self.log_record(&failure.data, &sender_email, request, ctx);
                let log_id = self.write_failure(record, &failure.message).await;
                let mut report = MailReport::not_sent(failure.message);
                report.resolved_from = sender;
                report.log_id = log_id;
                return report;
            }
        };
        let provider_id = provider.id();

        let span = tracing::info_span!(
            "mailrelay.send_mail",
            provider = provider_id.as_str(),
            to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
            subject = %email.subject,
        );

        async move {
            tracing::debug!("Sending email");

            #[cfg(feature = "metrics")]
            let start = Instant::now();

            let result = provider.send(&email).await;

            #[cfg(feature = "metrics")]
            {
                let duration = start.elapsed().as_secs_f64();
                let status = match &result {
                    Ok(outcome) if outcome.delivered => "success",
                    _ => "error",
                };
                metrics::counter!("mailrelay_emails_total", "provider" => provider_id.as_str(), "status" => status)
                    .increment(1);
                metrics::histogram!("mailrelay_delivery_duration_seconds", "provider" => provider_id.as_str())
                    .record(duration);
            }

            match result {
                Ok(outcome) => {
                    self.finish(provider_id, outcome, data, request, ctx).await
                }
                Err(e) => {
                    tracing::error!(error = %e, "Email delivery failed");
                    let failure = MailFailure {
                        data,
                        message: e.user_message(),
                        code: e.code(),
                    };
                    self.hooks.on_failure(&failure);
                    let mut record = self.log_record(&failure.data, &sender_email, request, ctx);
                    record.response = response_json(&ProviderResponse {
                        message: failure.message.clone(),
                        code: failure.code,
                        message_id: None,
                    });
                    let log_id = self.write_failure(record, &failure.message).await;

                    MailReport {
                        sent: false,
                        provider: Some(provider_id),
                        resolved_from: sender,
                        response: ProviderResponse {
                            message: failure.message,
                            code: failure.code,
                            message_id: None,
                        },
                        log_id,
                        short_circuited: false,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn finish(
        &self,
        provider_id: ProviderId,
        outcome: SendOutcome,
        data: MailData,
        request: &MailRequest,
        ctx: &RequestContext,
    ) -> MailReport {
        let SendOutcome {
            delivered,
            resolved_from,
            mut response,
        } = outcome;

        let mut record = self.log_record(&data, &resolved_from.email, request, ctx);

        let log_id = if delivered {
            tracing::info!(message_id = ?response.message_id, "Email delivered");
            self.hooks.on_success(&data);
            record.status = true;
            record.response = response_json(&response);
            self.write_log(record).await
        } else {
            if response.message.is_empty() {
                response.message = GENERIC_FAILURE.to_string();
            }
            tracing::error!(code = ?response.code, message = %response.message, "Provider rejected email");
            let failure = MailFailure {
                data,
                message: response.message.clone(),
                code: response.code,
            };
            self.hooks.on_failure(&failure);
            record.response = response_json(&response);
            self.write_failure(record, &failure.message).await
        };

        MailReport {
            sent: delivered,
            provider: Some(provider_id),
            resolved_from: Some(resolved_from),
            response,
            log_id,
            short_circuited: false,
        }
    }

    fn log_record(
        &self,
        data: &MailData,
        from: &str,
        request: &MailRequest,
        ctx: &RequestContext,
    ) -> NewLogRecord {
        NewLogRecord {
            site_id: self.site.site_id,
            to: data.to.join(", "),
            from: from.to_string(),
            subject: data.subject.clone(),
            body: data.message.clone(),
            header: request.headers.join("\r\n"),
            attachments: data.attachments.join(","),
            source: ctx.source.clone(),
            ip_address: ctx.client_ip(),
            ..Default::default()
        }
    }

    async fn write_failure(&self, mut record: NewLogRecord, message: &str) -> Option<i64> {
        record.status = false;
        record.error_message = message.to_string();
        self.write_log(record).await
    }

    /// Log write faults never change the send result.
    async fn write_log(&self, record: NewLogRecord) -> Option<i64> {
        match self.logs.insert(record).await {
            Ok(id) => {
                tracing::debug!(log_id = id, "Delivery logged");
                Some(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to write delivery log");
                None
            }
        }
    }

    /// Send the settings-page test message.
    ///
    /// The test settings are saved first. An empty recipient sends nothing.
    pub async fn send_test_mail(&self, test: TestMailConfig) -> MailReport {
        if let Err(e) = self.dispatcher.store().set_test_mail(test.clone()) {
            tracing::warn!(error = %e, "Failed to store test mail settings");
        }

        let to = test.to.trim();
        if to.is_empty() {
            return MailReport::not_sent("No recipient given for the test email.");
        }

        let subject = format!("{}: Test email to {}", self.site.product_name, to);
        let request = if test.html {
            MailRequest::new(subject, test_mail_html(TEST_MAIL_BODY))
                .header("Content-Type", "text/html; charset=UTF-8")
        } else {
            MailRequest::new(subject, TEST_MAIL_BODY)
                .header("Content-Type", "text/plain; charset=UTF-8")
        };

        self.send_mail(request.to(to)).await
    }

    /// Mark the row logged for an earlier send as failed.
    ///
    /// Used when a failure is only learned about after the attempt was
    /// logged as delivered. Returns the updated row id.
    pub async fn record_late_failure(
        &self,
        data: &MailData,
        message: &str,
    ) -> Result<Option<i64>, crate::MailError> {
        let lookup = LogLookup {
            to: Some(data.to.clone()),
            subject: Some(data.subject.clone()),
            attachments: Some(data.attachments.clone()),
        };

        let Some(id) = self.logs.find_id_by_attributes(&lookup).await? else {
            tracing::debug!("No log row matches the late failure");
            return Ok(None);
        };

        if self.logs.annotate_error(id, message).await? {
            tracing::info!(log_id = id, "Marked logged email as failed");
            Ok(Some(id))
        } else {
            Ok(None)
        }
    }
}

impl std::fmt::Debug for MailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailService")
            .field("hooks", &self.hooks)
            .field("site", &self.site)
            .finish_non_exhaustive()
    }
}

fn response_json(response: &ProviderResponse) -> String {
    serde_json::to_string(response).unwrap_or_default()
}

fn test_mail_html(content: &str) -> String {
    format!(
        r#"<div style="padding: 100px 0; background-color: #ebebeb;">
	<table border="0" cellpadding="0" cellspacing="0" style="width: 40%; margin: 0 auto; background: #ffffff; padding: 30px 30px 26px; border: 0.4px solid #d3d3d3; border-radius: 11px; font-family: 'Segoe UI', sans-serif;">
		<tbody>
			<tr>
				<td colspan="2" style="text-align: left; padding: 10px">{content}</td>
			</tr>
		</tbody>
	</table>
</div>"#
    )
}

/// Builder for [`MailService`].
pub struct MailServiceBuilder {
    dispatcher: Dispatcher,
    logs: Arc<dyn LogStore>,
    hooks: HookSet,
    site: SiteSettings,
}

impl MailServiceBuilder {
    /// Use a different transport for the SMTP-based providers.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.dispatcher = self.dispatcher.transport(transport);
        self
    }

    /// Use a custom reqwest client for the HTTP API.
    pub fn http_client(mut self, client: Client) -> Self {
        self.dispatcher = self.dispatcher.http_client(client);
        self
    }

    /// Point the Brevo adapter at another base URL (for testing).
    pub fn brevo_base_url(mut self, url: impl Into<String>) -> Self {
        self.dispatcher = self.dispatcher.brevo_base_url(url);
        self
    }

    pub fn site(mut self, site: SiteSettings) -> Self {
        self.site = site;
        self
    }

    /// Register a hook. Hooks run in registration order.
    pub fn hook<H: MailHooks + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub fn hook_arc(mut self, hook: Arc<dyn MailHooks>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> MailService {
        MailService {
            dispatcher: self.dispatcher,
            logs: self.logs,
            hooks: self.hooks,
            site: self.site,
        }
    }
}
