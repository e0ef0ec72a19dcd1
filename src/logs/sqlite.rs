use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use super::{LogFilter, LogLookup, LogPage, LogQuery, LogRecord, LogStore, NewLogRecord, LOG_TABLE};
use crate::error::MailError;

/// Delivery log backed by SQLite through `sqlx`.
///
/// ```rust,ignore
/// use mailrelay::logs::SqliteLogStore;
///
/// let store = SqliteLogStore::connect("sqlite://mail.db?mode=rwc").await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqliteLogStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteLogStore {
    /// Connect to `url` and create the log table if needed.
    pub async fn connect(url: &str) -> Result<Self, MailError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;
        Self::from_pool(pool, "").await
    }

    /// A private in-memory database.
    ///
    /// Every SQLite connection to `:memory:` opens its own database, so the
    /// pool is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, MailError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;
        Self::from_pool(pool, "").await
    }

    /// Create from an existing pool. The table is named `<prefix>mail_logs`.
    pub async fn from_pool(pool: SqlitePool, prefix: &str) -> Result<Self, MailError> {
        let table = format!("{prefix}{LOG_TABLE}");
        run_migrations(&pool, &table).await?;
        Ok(Self { pool, table })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Create the log table and its indexes if they do not exist.
async fn run_migrations(pool: &SqlitePool, table: &str) -> Result<(), MailError> {
    let create_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            site_id       INTEGER NOT NULL DEFAULT 1,
            "to"          TEXT NOT NULL,
            "from"        TEXT NOT NULL,
            subject       TEXT NOT NULL DEFAULT '',
            body          TEXT NOT NULL DEFAULT '',
            header        TEXT NOT NULL DEFAULT '',
            attachments   TEXT NOT NULL DEFAULT '',
            status        BOOLEAN NOT NULL DEFAULT 0,
            response      TEXT NOT NULL DEFAULT '',
            extra         TEXT NOT NULL DEFAULT '',
            retries       INTEGER NOT NULL DEFAULT 0,
            resent_count  INTEGER NOT NULL DEFAULT 0,
            source        TEXT NOT NULL DEFAULT '',
            ip_address    TEXT NOT NULL DEFAULT '',
            error_message TEXT NOT NULL DEFAULT '',
            created_at    DATETIME NOT NULL,
            updated_at    DATETIME NOT NULL
        )
        "#
    );
    sqlx::query(&create_table).execute(pool).await?;

    let indexes = [
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table} (created_at)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_to ON {table} (\"to\")"),
    ];
    for idx in &indexes {
        sqlx::query(idx).execute(pool).await?;
    }

    Ok(())
}

/// A value bound into a dynamically built statement.
#[derive(Debug, Clone)]
enum SqlValue {
    Int(i64),
    Text(String),
    Time(DateTime<Utc>),
    Bool(bool),
}

macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut q = $query;
        for value in $values {
            q = match value {
                SqlValue::Int(v) => q.bind(*v),
                SqlValue::Text(v) => q.bind(v.clone()),
                SqlValue::Time(v) => q.bind(*v),
                SqlValue::Bool(v) => q.bind(*v),
            };
        }
        q
    }};
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the WHERE and ORDER BY clauses and bind values for the query.
fn build_clauses(filter: &LogFilter) -> (String, String, Vec<SqlValue>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    let mut order = Vec::new();

    match filter {
        LogFilter::All => {}
        LogFilter::ById(id) => {
            conditions.push("id = ?".to_string());
            values.push(SqlValue::Int(*id));
        }
        LogFilter::Search(search) => {
            if let Some(term) = search.term() {
                conditions.push(r#""to" LIKE ? ESCAPE '\'"#.to_string());
                values.push(SqlValue::Text(format!("%{}%", escape_like(term))));
            }
            if let Some((start, end)) = search.date_range() {
                conditions.push("created_at >= ? AND created_at < ?".to_string());
                values.push(SqlValue::Time(start));
                values.push(SqlValue::Time(end));
            }
            if let Some(status) = search.status {
                conditions.push("status = ?".to_string());
                values.push(SqlValue::Bool(status));
            }
            for (column, direction) in search.order.columns() {
                order.push(format!("\"{column}\" {}", direction.as_sql()));
            }
        }
    }
    order.push("id ASC".to_string());

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, format!("ORDER BY {}", order.join(", ")), values)
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn insert(&self, record: NewLogRecord) -> Result<i64, MailError> {
        let sql = format!(
            r#"
            INSERT INTO {} (
                site_id, "to", "from", subject, body, header, attachments,
                status, response, extra, retries, resent_count,
                source, ip_address, error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?)
            "#,
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(record.site_id)
            .bind(&record.to)
            .bind(&record.from)
            .bind(&record.subject)
            .bind(&record.body)
            .bind(&record.header)
            .bind(&record.attachments)
            .bind(record.status)
            .bind(&record.response)
            .bind(&record.extra)
            .bind(&record.source)
            .bind(&record.ip_address)
            .bind(&record.error_message)
            .bind(record.created_at)
            .bind(record.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    async fn query(&self, query: &LogQuery) -> Result<LogPage, MailError> {
        let (where_clause, order_clause, values) = build_clauses(&query.filter);

        // Count query.
        let count_sql = format!("SELECT COUNT(*) FROM {} {where_clause}", self.table);
        let total = bind_values!(sqlx::query_scalar::<_, i64>(&count_sql), &values)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;

        // Data query. A negative LIMIT means no limit in SQLite.
        let data_sql = format!(
            "SELECT * FROM {} {where_clause} {order_clause} LIMIT ? OFFSET ?",
            self.table
        );
        let limit = query.page_size.map(i64::from).unwrap_or(-1);
        let rows: Vec<LogRow> = bind_values!(sqlx::query_as::<_, LogRow>(&data_sql), &values)
            .bind(limit)
            .bind(i64::from(query.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;

        #[allow(clippy::cast_sign_loss)]
        let total_count = total.max(0) as u64;

        Ok(LogPage {
            total_count,
            rows: rows.into_iter().map(Into::into).collect(),
        })
    }

    async fn find_id_by_attributes(&self, lookup: &LogLookup) -> Result<Option<i64>, MailError> {
        let conditions = lookup.conditions();
        if conditions.is_empty() {
            return Ok(None);
        }

        let where_clause = conditions
            .iter()
            .map(|(column, _)| format!("\"{column}\" = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let sql = format!(
            "SELECT id FROM {} WHERE {where_clause} ORDER BY id DESC LIMIT 1",
            self.table
        );

        let values: Vec<SqlValue> = conditions
            .into_iter()
            .map(|(_, value)| SqlValue::Text(value))
            .collect();

        let id = bind_values!(sqlx::query_scalar::<_, i64>(&sql), &values)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;

        Ok(id)
    }

    async fn annotate_error(&self, id: i64, message: &str) -> Result<bool, MailError> {
        if id <= 0 {
            return Ok(false);
        }

        let sql = format!(
            "UPDATE {} SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(false)
            .bind(message)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn bulk_delete(&self, ids: &[i64]) -> Result<u64, MailError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!("DELETE FROM {} WHERE id = ?", self.table);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;

        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query(&sql)
                .bind(*id)
                .execute(&mut *tx)
                .await
                .map_err(|e| MailError::Storage(e.to_string()))?;
            deleted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| MailError::Storage(e.to_string()))?;

        Ok(deleted)
    }
}

/// Internal row type for mapping database rows to `LogRecord`.
#[derive(sqlx::FromRow)]
struct LogRow {
    id: i64,
    site_id: i64,
    to: String,
    from: String,
    subject: String,
    body: String,
    header: String,
    attachments: String,
    status: bool,
    response: String,
    extra: String,
    retries: i64,
    resent_count: i64,
    source: String,
    ip_address: String,
    error_message: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LogRow> for LogRecord {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            site_id: row.site_id,
            to: row.to,
            from: row.from,
            subject: row.subject,
            body: row.body,
            header: row.header,
            attachments: row.attachments,
            status: row.status,
            response: row.response,
            extra: row.extra,
            retries: u32::try_from(row.retries).unwrap_or(0),
            resent_count: u32::try_from(row.resent_count).unwrap_or(0),
            source: row.source,
            ip_address: row.ip_address,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
