//! Delivery log.
//!
//! One [`LogRecord`] is written per attempted send. Records are never
//! updated except by [`LogStore::annotate_error`], which marks an earlier
//! row as failed, and are removed only by [`LogStore::bulk_delete`].
//!
//! Two backends ship with the crate:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`MemoryLogStore`] | development and tests |
//! | [`SqliteLogStore`] | the `mail_logs` table through sqlx |

mod memory;
mod sqlite;

pub use memory::MemoryLogStore;
pub use sqlite::SqliteLogStore;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// Name of the delivery log table (before any prefix).
pub const LOG_TABLE: &str = "mail_logs";

/// A stored delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub site_id: i64,
    /// Recipients, joined with `", "`.
    pub to: String,
    /// Sender address actually used.
    pub from: String,
    pub subject: String,
    pub body: String,
    /// Raw header block as supplied by the caller.
    pub header: String,
    /// Attachment paths or filenames, joined with `","`.
    pub attachments: String,
    /// `true` when the provider accepted the message.
    pub status: bool,
    pub response: String,
    pub extra: String,
    pub retries: u32,
    pub resent_count: u32,
    pub source: String,
    pub ip_address: String,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new log row. The id and `updated_at` are assigned by the
/// store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLogRecord {
    pub site_id: i64,
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub header: String,
    pub attachments: String,
    pub status: bool,
    pub response: String,
    pub extra: String,
    pub source: String,
    pub ip_address: String,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

impl Default for NewLogRecord {
    fn default() -> Self {
        Self {
            site_id: 1,
            to: String::new(),
            from: String::new(),
            subject: String::new(),
            body: String::new(),
            header: String::new(),
            attachments: String::new(),
            status: false,
            response: String::new(),
            extra: String::new(),
            source: String::new(),
            ip_address: String::new(),
            error_message: String::new(),
            created_at: Utc::now(),
        }
    }
}

impl NewLogRecord {
    pub(crate) fn into_record(self, id: i64) -> LogRecord {
        LogRecord {
            id,
            site_id: self.site_id,
            to: self.to,
            from: self.from,
            subject: self.subject,
            body: self.body,
            header: self.header,
            attachments: self.attachments,
            status: self.status,
            response: self.response,
            extra: self.extra,
            retries: 0,
            resent_count: 0,
            source: self.source,
            ip_address: self.ip_address,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `true` sorts ascending.
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Sort keys, applied in the order created_at, from, to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOrder {
    pub created_at: Option<SortDirection>,
    pub from: Option<SortDirection>,
    pub to: Option<SortDirection>,
}

impl LogOrder {
    /// Column/direction pairs in application order.
    pub fn columns(&self) -> Vec<(&'static str, SortDirection)> {
        [
            ("created_at", self.created_at),
            ("from", self.from),
            ("to", self.to),
        ]
        .into_iter()
        .filter_map(|(col, dir)| dir.map(|d| (col, d)))
        .collect()
    }
}

/// Search filters. Every present field narrows the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSearch {
    /// Substring of the `to` column.
    pub term: Option<String>,
    /// Calendar day (UTC) of `created_at`.
    pub date: Option<NaiveDate>,
    pub status: Option<bool>,
    pub order: LogOrder,
}

impl LogSearch {
    /// Half-open `created_at` range for the date filter.
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let date = self.date?;
        let start = date.and_hms_opt(0, 0, 0)?.and_utc();
        let end = date.checked_add_days(Days::new(1))?.and_hms_opt(0, 0, 0)?.and_utc();
        Some((start, end))
    }

    /// The search term with surrounding whitespace removed, if non-empty.
    pub fn term(&self) -> Option<&str> {
        self.term.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Which rows a query selects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFilter {
    #[default]
    All,
    ById(i64),
    Search(LogSearch),
}

/// A filtered, paginated log query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    pub filter: LogFilter,
    /// Maximum rows to return; `None` returns everything after `offset`.
    pub page_size: Option<u32>,
    pub offset: u32,
}

impl LogQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: i64) -> Self {
        Self {
            filter: LogFilter::ById(id),
            ..Default::default()
        }
    }

    pub fn search(search: LogSearch) -> Self {
        Self {
            filter: LogFilter::Search(search),
            ..Default::default()
        }
    }

    pub fn page(mut self, page_size: u32, offset: u32) -> Self {
        self.page_size = Some(page_size);
        self.offset = offset;
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPage {
    /// Size of the filtered set before pagination.
    pub total_count: u64,
    pub rows: Vec<LogRecord>,
}

/// Attributes used to find the row logged for an earlier send.
///
/// Only the fields that are present take part in the match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLookup {
    /// Matched against the first recipient only.
    pub to: Option<Vec<String>>,
    pub subject: Option<String>,
    /// Matched against the `","`-joined list.
    pub attachments: Option<Vec<String>>,
}

impl LogLookup {
    /// `(column, value)` pairs to compare, trimmed as they are stored.
    pub fn conditions(&self) -> Vec<(&'static str, String)> {
        let mut conditions = Vec::new();
        if let Some(to) = &self.to {
            let first = to.first().map(|s| s.trim().to_string()).unwrap_or_default();
            conditions.push(("to", first));
        }
        if let Some(subject) = &self.subject {
            conditions.push(("subject", subject.trim().to_string()));
        }
        if let Some(attachments) = &self.attachments {
            conditions.push(("attachments", attachments.join(",").trim().to_string()));
        }
        conditions
    }
}

// ============================================================================
// Store
// ============================================================================

/// Storage backend for the delivery log.
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append a row and return its id.
    async fn insert(&self, record: NewLogRecord) -> Result<i64, MailError>;

    /// Run a filtered, paginated query.
    async fn query(&self, query: &LogQuery) -> Result<LogPage, MailError>;

    /// Id of the most recent row matching `lookup`. `None` when nothing
    /// matches or no attribute was given.
    async fn find_id_by_attributes(&self, lookup: &LogLookup) -> Result<Option<i64>, MailError>;

    /// Mark a row as failed with `message`. Ids `<= 0` are ignored.
    ///
    /// Returns whether a row was updated.
    async fn annotate_error(&self, id: i64, message: &str) -> Result<bool, MailError>;

    /// Delete every row whose id is in `ids`. Unknown ids are skipped.
    ///
    /// Returns the number of rows removed.
    async fn bulk_delete(&self, ids: &[i64]) -> Result<u64, MailError>;
}
