use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::Arc;

use super::{LogFilter, LogLookup, LogPage, LogQuery, LogRecord, LogStore, NewLogRecord, SortDirection};
use crate::error::MailError;

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<LogRecord>,
    next_id: i64,
}

/// In-memory log store.
///
/// Follows the same filtering and ordering rules as [`SqliteLogStore`](super::SqliteLogStore).
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    inner: RwLock<Inner>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store wrapped in an Arc for sharing with the service.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Every row, oldest first.
    pub fn all(&self) -> Vec<LogRecord> {
        self.inner.read().rows.clone()
    }

    pub fn count(&self) -> usize {
        self.inner.read().rows.len()
    }

    pub fn last(&self) -> Option<LogRecord> {
        self.inner.read().rows.last().cloned()
    }

    pub fn get(&self, id: i64) -> Option<LogRecord> {
        self.inner.read().rows.iter().find(|r| r.id == id).cloned()
    }

    pub fn clear(&self) {
        self.inner.write().rows.clear();
    }
}

fn matches(filter: &LogFilter, row: &LogRecord) -> bool {
    match filter {
        LogFilter::All => true,
        LogFilter::ById(id) => row.id == *id,
        LogFilter::Search(search) => {
            if let Some(term) = search.term() {
                if !row.to.to_lowercase().contains(&term.to_lowercase()) {
                    return false;
                }
            }
            if let Some((start, end)) = search.date_range() {
                if row.created_at < start || row.created_at >= end {
                    return false;
                }
            }
            if let Some(status) = search.status {
                if row.status != status {
                    return false;
                }
            }
            true
        }
    }
}

fn compare(filter: &LogFilter, a: &LogRecord, b: &LogRecord) -> Ordering {
    if let LogFilter::Search(search) = filter {
        for (column, direction) in search.order.columns() {
            let ord = match column {
                "created_at" => a.created_at.cmp(&b.created_at),
                "from" => a.from.cmp(&b.from),
                _ => a.to.cmp(&b.to),
            };
            let ord = match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
    }
    a.id.cmp(&b.id)
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn insert(&self, record: NewLogRecord) -> Result<i64, MailError> {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.push(record.into_record(id));
        Ok(id)
    }

    async fn query(&self, query: &LogQuery) -> Result<LogPage, MailError> {
        let inner = self.inner.read();
        let mut rows: Vec<LogRecord> = inner
            .rows
            .iter()
            .filter(|r| matches(&query.filter, r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| compare(&query.filter, a, b));

        let total_count = rows.len() as u64;
        let limit = query.page_size.map(|n| n as usize).unwrap_or(usize::MAX);
        let rows = rows
            .into_iter()
            .skip(query.offset as usize)
            .take(limit)
            .collect();

        Ok(LogPage { total_count, rows })
    }

    async fn find_id_by_attributes(&self, lookup: &LogLookup) -> Result<Option<i64>, MailError> {
        let conditions = lookup.conditions();
        if conditions.is_empty() {
            return Ok(None);
        }

        let inner = self.inner.read();
        Ok(inner
            .rows
            .iter()
            .rev()
            .find(|row| {
                conditions.iter().all(|(column, value)| match *column {
                    "to" => &row.to == value,
                    "subject" => &row.subject == value,
                    _ => &row.attachments == value,
                })
            })
            .map(|row| row.id))
    }

    async fn annotate_error(&self, id: i64, message: &str) -> Result<bool, MailError> {
        if id <= 0 {
            return Ok(false);
        }
        let mut inner = self.inner.write();
        match inner.rows.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.status = false;
                row.error_message = message.to_string();
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn bulk_delete(&self, ids: &[i64]) -> Result<u64, MailError> {
        let mut inner = self.inner.write();
        let before = inner.rows.len();
        inner.rows.retain(|r| !ids.contains(&r.id));
        Ok((before - inner.rows.len()) as u64)
    }
}
