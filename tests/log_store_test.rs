//! Delivery log store tests, run against both backends.

use chrono::{NaiveDate, TimeZone, Utc};
use mailrelay::logs::{LogOrder, SortDirection};
use mailrelay::{
    LogLookup, LogQuery, LogSearch, LogStore, MemoryLogStore, NewLogRecord, SqliteLogStore,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn record(to: &str, from: &str, status: bool, day: u32, hour: u32) -> NewLogRecord {
    NewLogRecord {
        to: to.to_string(),
        from: from.to_string(),
        subject: format!("Mail for {to}"),
        status,
        created_at: Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap(),
        ..Default::default()
    }
}

async fn seed(store: &dyn LogStore) -> Vec<i64> {
    let rows = [
        record("alice@example.com", "shop@example.com", true, 1, 9),
        record("bob@example.com", "billing@example.com", false, 1, 23),
        record("carol@example.com", "shop@example.com", true, 2, 0),
        record("ALICE@work.example.com", "alerts@example.com", true, 2, 12),
        record("dave@example.com", "shop@example.com", false, 3, 8),
    ];
    let mut ids = Vec::new();
    for row in rows {
        ids.push(store.insert(row).await.unwrap());
    }
    ids
}

async fn sqlite() -> SqliteLogStore {
    SqliteLogStore::in_memory().await.unwrap()
}

// ============================================================================
// Shared checks
// ============================================================================

async fn check_insert_and_fetch(store: &dyn LogStore) {
    let ids = seed(store).await;
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let page = store.query(&LogQuery::by_id(ids[1])).await.unwrap();
    assert_eq!(page.total_count, 1);
    let row = &page.rows[0];
    assert_eq!(row.to, "bob@example.com");
    assert_eq!(row.from, "billing@example.com");
    assert!(!row.status);
    assert_eq!(row.site_id, 1);
    assert_eq!(row.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap());

    let missing = store.query(&LogQuery::by_id(9999)).await.unwrap();
    assert_eq!(missing.total_count, 0);
    assert!(missing.rows.is_empty());
}

async fn check_pagination(store: &dyn LogStore) {
    let ids = seed(store).await;

    let all = store.query(&LogQuery::all()).await.unwrap();
    assert_eq!(all.total_count, 5);
    assert_eq!(all.rows.iter().map(|r| r.id).collect::<Vec<_>>(), ids);

    let page = store.query(&LogQuery::all().page(2, 0)).await.unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.rows.iter().map(|r| r.id).collect::<Vec<_>>(), ids[..2]);

    let page = store.query(&LogQuery::all().page(2, 4)).await.unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].id, ids[4]);

    let beyond = store.query(&LogQuery::all().page(2, 10)).await.unwrap();
    assert_eq!(beyond.total_count, 5);
    assert!(beyond.rows.is_empty());

    let failed = LogQuery::search(LogSearch {
        status: Some(false),
        ..Default::default()
    })
    .page(1, 0);
    let page = store.query(&failed).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.rows.len(), 1);
}

async fn check_search(store: &dyn LogStore) {
    seed(store).await;

    let by_term = store
        .query(&LogQuery::search(LogSearch {
            term: Some("  alice ".into()),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(by_term.total_count, 2);

    let by_day = store
        .query(&LogQuery::search(LogSearch {
            date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(
        by_day.rows.iter().map(|r| r.to.as_str()).collect::<Vec<_>>(),
        vec!["alice@example.com", "bob@example.com"]
    );

    let combined = store
        .query(&LogQuery::search(LogSearch {
            term: Some("example.com".into()),
            date: NaiveDate::from_ymd_opt(2024, 5, 2),
            status: Some(true),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(combined.total_count, 2);

    let literal = store
        .query(&LogQuery::search(LogSearch {
            term: Some("%".into()),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(literal.total_count, 0);
}

async fn check_ordering(store: &dyn LogStore) {
    seed(store).await;

    let newest_first = store
        .query(&LogQuery::search(LogSearch {
            order: LogOrder {
                created_at: Some(SortDirection::Desc),
                ..Default::default()
            },
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(newest_first.rows[0].to, "dave@example.com");
    assert_eq!(newest_first.rows[4].to, "alice@example.com");

    let by_from = store
        .query(&LogQuery::search(LogSearch {
            order: LogOrder {
                from: Some(SortDirection::from_ascending(true)),
                ..Default::default()
            },
            ..Default::default()
        }))
        .await
        .unwrap();
    let froms: Vec<_> = by_from.rows.iter().map(|r| r.from.as_str()).collect();
    assert_eq!(
        froms,
        vec![
            "alerts@example.com",
            "billing@example.com",
            "shop@example.com",
            "shop@example.com",
            "shop@example.com"
        ]
    );
    // Ties keep insertion order.
    let shop: Vec<_> = by_from.rows[2..].iter().map(|r| r.to.as_str()).collect();
    assert_eq!(shop, vec!["alice@example.com", "carol@example.com", "dave@example.com"]);
}

async fn check_lookup_and_annotate(store: &dyn LogStore) {
    let first = store
        .insert(NewLogRecord {
            to: "user@example.com".into(),
            subject: "Digest".into(),
            attachments: "/tmp/a.pdf,/tmp/b.pdf".into(),
            status: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let second = store
        .insert(NewLogRecord {
            to: "user@example.com".into(),
            subject: "Digest".into(),
            status: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let lookup = LogLookup {
        to: Some(vec![" user@example.com ".into(), "other@example.com".into()]),
        subject: Some("Digest".into()),
        attachments: None,
    };
    assert_eq!(store.find_id_by_attributes(&lookup).await.unwrap(), Some(second));

    let with_files = LogLookup {
        attachments: Some(vec!["/tmp/a.pdf".into(), "/tmp/b.pdf".into()]),
        ..lookup.clone()
    };
    assert_eq!(store.find_id_by_attributes(&with_files).await.unwrap(), Some(first));

    assert_eq!(
        store.find_id_by_attributes(&LogLookup::default()).await.unwrap(),
        None
    );

    assert!(store.annotate_error(first, "Bounced").await.unwrap());
    let row = store.query(&LogQuery::by_id(first)).await.unwrap().rows.remove(0);
    assert!(!row.status);
    assert_eq!(row.error_message, "Bounced");
    assert!(row.updated_at >= row.created_at);

    assert!(!store.annotate_error(0, "ignored").await.unwrap());
    assert!(!store.annotate_error(9999, "ignored").await.unwrap());
}

async fn check_bulk_delete(store: &dyn LogStore) {
    let ids = seed(store).await;

    let removed = store.bulk_delete(&[ids[0], ids[2], 9999]).await.unwrap();
    assert_eq!(removed, 2);

    let rest = store.query(&LogQuery::all()).await.unwrap();
    assert_eq!(rest.rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[1], ids[3], ids[4]]);

    assert_eq!(store.bulk_delete(&[]).await.unwrap(), 0);
}

// ============================================================================
// Memory backend
// ============================================================================

#[tokio::test]
async fn memory_insert_and_fetch() {
    check_insert_and_fetch(&MemoryLogStore::new()).await;
}

#[tokio::test]
async fn memory_pagination() {
    check_pagination(&MemoryLogStore::new()).await;
}

#[tokio::test]
async fn memory_search() {
    check_search(&MemoryLogStore::new()).await;
}

#[tokio::test]
async fn memory_ordering() {
    check_ordering(&MemoryLogStore::new()).await;
}

#[tokio::test]
async fn memory_lookup_and_annotate() {
    check_lookup_and_annotate(&MemoryLogStore::new()).await;
}

#[tokio::test]
async fn memory_bulk_delete() {
    check_bulk_delete(&MemoryLogStore::new()).await;
}

// ============================================================================
// SQLite backend
// ============================================================================

#[tokio::test]
async fn sqlite_insert_and_fetch() {
    check_insert_and_fetch(&sqlite().await).await;
}

#[tokio::test]
async fn sqlite_pagination() {
    check_pagination(&sqlite().await).await;
}

#[tokio::test]
async fn sqlite_search() {
    check_search(&sqlite().await).await;
}

#[tokio::test]
async fn sqlite_ordering() {
    check_ordering(&sqlite().await).await;
}

#[tokio::test]
async fn sqlite_lookup_and_annotate() {
    check_lookup_and_annotate(&sqlite().await).await;
}

#[tokio::test]
async fn sqlite_bulk_delete() {
    check_bulk_delete(&sqlite().await).await;
}

#[tokio::test]
async fn sqlite_file_database_with_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("logs.db").display());
    let pool = sqlx::SqlitePool::connect(&url).await.unwrap();

    let store = SqliteLogStore::from_pool(pool.clone(), "wp_").await.unwrap();
    assert_eq!(store.table(), "wp_mail_logs");
    store.insert(record("a@example.com", "s@example.com", true, 1, 1)).await.unwrap();

    // Reopening runs the migrations again without touching existing rows.
    let reopened = SqliteLogStore::from_pool(pool, "wp_").await.unwrap();
    assert_eq!(reopened.query(&LogQuery::all()).await.unwrap().total_count, 1);
}
