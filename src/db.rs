use crate::error::{PricebookError, PricebookResult};
use crate::model::{CommercialKey, RateFamily, RateRecord, TierRates};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// COLUMNS
// ============================================================================

/// Rate columns in family-major, tier-minor order
const RATE_COLUMNS: [&str; 20] = [
    "yearly_with_backfill_l1",
    "yearly_with_backfill_l2",
    "yearly_with_backfill_l3",
    "yearly_with_backfill_l4",
    "yearly_with_backfill_l5",
    "yearly_without_backfill_l1",
    "yearly_without_backfill_l2",
    "yearly_without_backfill_l3",
    "yearly_without_backfill_l4",
    "yearly_without_backfill_l5",
    "monthly_short_term_l1",
    "monthly_short_term_l2",
    "monthly_short_term_l3",
    "monthly_short_term_l4",
    "monthly_short_term_l5",
    "monthly_long_term_l1",
    "monthly_long_term_l2",
    "monthly_long_term_l3",
    "monthly_long_term_l4",
    "monthly_long_term_l5",
];

const KEY_COLUMNS: [&str; 5] = ["region", "country", "supplier", "currency", "payment_terms"];

// Offsets into a row selected with select_columns()
const FIRST_RATE_IDX: usize = 6;
const CREATED_AT_IDX: usize = FIRST_RATE_IDX + RATE_COLUMNS.len();
const UPDATED_AT_IDX: usize = CREATED_AT_IDX + 1;

fn select_columns() -> String {
    format!(
        "id, {}, {}, created_at, updated_at",
        KEY_COLUMNS.join(", "),
        RATE_COLUMNS.join(", ")
    )
}

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Key field that can be filtered on or listed with `distinct`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    Region,
    Country,
    Supplier,
    Currency,
    PaymentTerms,
}

impl KeyField {
    pub fn column(&self) -> &'static str {
        match self {
            KeyField::Region => "region",
            KeyField::Country => "country",
            KeyField::Supplier => "supplier",
            KeyField::Currency => "currency",
            KeyField::PaymentTerms => "payment_terms",
        }
    }
}

/// Exact-match filter over any subset of the commercial key.
/// String comparison is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFilter {
    pub region: Option<String>,
    pub country: Option<String>,
    pub supplier: Option<String>,
    pub currency: Option<String>,
    pub payment_terms: Option<String>,
}

impl KeyFilter {
    pub fn region(region: &str) -> Self {
        Self {
            region: Some(region.to_string()),
            ..Self::default()
        }
    }

    fn clauses(&self) -> (String, Vec<Value>) {
        let fields = [
            (KeyField::Region, &self.region),
            (KeyField::Country, &self.country),
            (KeyField::Supplier, &self.supplier),
            (KeyField::Currency, &self.currency),
            (KeyField::PaymentTerms, &self.payment_terms),
        ];

        let mut conditions = Vec::new();
        let mut values = Vec::new();
        for (field, value) in fields {
            if let Some(value) = value {
                values.push(Value::Text(value.clone()));
                conditions.push(format!("{} = ?{}", field.column(), values.len()));
            }
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

impl From<&CommercialKey> for KeyFilter {
    fn from(key: &CommercialKey) -> Self {
        Self {
            region: Some(key.region.clone()),
            country: Some(key.country.clone()),
            supplier: Some(key.supplier.clone()),
            currency: Some(key.currency.clone()),
            payment_terms: Some(key.payment_terms.clone()),
        }
    }
}

// ============================================================================
// STORED ENTRY
// ============================================================================

/// A rate record as persisted: stable identity plus bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricebookEntry {
    pub id: String,
    #[serde(flatten)]
    pub record: RateRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Identical record already stored; nothing written
    Unchanged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl LoadSummary {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Read-only view of the pricebook used by the resolvers
pub trait PricebookReader {
    /// At most one entry matching every value set in `filter`
    fn find_one(&self, filter: &KeyFilter) -> PricebookResult<Option<PricebookEntry>>;

    /// Unique values of `field`, sorted, optionally restricted by `filter`
    fn distinct(&self, field: KeyField, filter: Option<&KeyFilter>) -> PricebookResult<Vec<String>>;
}

/// SHA-256 over the canonical JSON form of the record
pub fn compute_content_hash(record: &RateRecord) -> PricebookResult<String> {
    let canonical = serde_json::to_vec(record)
        .map_err(|e| PricebookError::Infrastructure(format!("failed to encode record: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// STORE
// ============================================================================

/// Owned handle on the pricebook database. Opened once, closed explicitly.
pub struct PricebookStore {
    conn: Connection,
}

impl PricebookStore {
    pub fn open(path: &Path) -> PricebookResult<Self> {
        let conn = Connection::open(path)?;
        // WAL for crash recovery on file databases
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        setup_database(&conn)?;
        tracing::debug!(path = %path.display(), "pricebook store opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> PricebookResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    pub fn close(self) -> PricebookResult<()> {
        self.conn.close().map_err(|(_, e)| PricebookError::Storage(e))?;
        tracing::debug!("pricebook store closed");
        Ok(())
    }

    /// Insert or replace the record stored under its commercial key
    pub fn upsert(&self, record: &RateRecord) -> PricebookResult<UpsertOutcome> {
        record.validate()?;
        upsert_record(&self.conn, record)
    }

    /// Validate every record, then upsert all of them in one transaction.
    /// Any invalid record, or a commercial key repeated within the batch,
    /// aborts the load before anything is written.
    pub fn bulk_load(&mut self, records: &[RateRecord]) -> PricebookResult<LoadSummary> {
        load_batch(&mut self.conn, records)
    }

    pub fn count(&self) -> PricebookResult<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pricebook_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Every entry, ordered by key
    pub fn all_entries(&self) -> PricebookResult<Vec<PricebookEntry>> {
        let sql = format!(
            "SELECT {} FROM pricebook_entries ORDER BY {}",
            select_columns(),
            KEY_COLUMNS.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

impl PricebookReader for Connection {
    fn find_one(&self, filter: &KeyFilter) -> PricebookResult<Option<PricebookEntry>> {
        let (where_clause, values) = filter.clauses();
        let sql = format!(
            "SELECT {} FROM pricebook_entries{} ORDER BY rowid LIMIT 1",
            select_columns(),
            where_clause
        );

        let entry = self
            .query_row(&sql, params_from_iter(values), row_to_entry)
            .optional()?;

        tracing::debug!(?filter, found = entry.is_some(), "pricebook lookup");
        Ok(entry)
    }

    fn distinct(&self, field: KeyField, filter: Option<&KeyFilter>) -> PricebookResult<Vec<String>> {
        let (where_clause, values) = filter.map(KeyFilter::clauses).unwrap_or_default();
        let column = field.column();
        let sql = format!(
            "SELECT DISTINCT {col} FROM pricebook_entries{} ORDER BY {col}",
            where_clause,
            col = column
        );

        let mut stmt = self.prepare(&sql)?;
        let values = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }
}

impl PricebookReader for PricebookStore {
    fn find_one(&self, filter: &KeyFilter) -> PricebookResult<Option<PricebookEntry>> {
        self.conn.find_one(filter)
    }

    fn distinct(&self, field: KeyField, filter: Option<&KeyFilter>) -> PricebookResult<Vec<String>> {
        self.conn.distinct(field, filter)
    }
}

// ============================================================================
// READ POOL
// ============================================================================

/// Connection checked out of a [`PricebookPool`]; derefs to a reader
pub type PooledReader = PooledConnection<SqliteConnectionManager>;

/// Pool of connections for concurrent readers (the HTTP serving path).
/// Cloning is cheap and shares the same connections.
#[derive(Clone)]
pub struct PricebookPool {
    pool: Pool<SqliteConnectionManager>,
}

impl PricebookPool {
    /// Pool over a database file. The schema is created first through a
    /// regular store handle; pooled connections then refuse writes.
    pub fn open(path: &Path, max_size: u32) -> PricebookResult<Self> {
        PricebookStore::open(path)?.close()?;

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA query_only = ON;")
        });
        let pool = Pool::builder().max_size(max_size.max(1)).build(manager)?;
        tracing::debug!(path = %path.display(), max_size, "pricebook read pool opened");
        Ok(Self { pool })
    }

    /// Private shared-cache in-memory database, seeded with `records`.
    /// It lives as long as the pool holds at least one connection.
    pub fn in_memory(records: &[RateRecord]) -> PricebookResult<Self> {
        let uri = format!(
            "file:pricebook-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4()
        );
        let manager = SqliteConnectionManager::file(uri).with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        );
        let pool = Pool::builder()
            .max_size(crate::config::DEFAULT_POOL_SIZE)
            .min_idle(Some(1))
            .build(manager)?;

        let mut conn = pool.get()?;
        setup_database(&conn)?;
        load_batch(&mut conn, records)?;
        Ok(Self { pool })
    }

    /// Check out a connection; blocks until one is free or the pool times out
    pub fn get(&self) -> PricebookResult<PooledReader> {
        Ok(self.pool.get()?)
    }

    /// Drop this handle. Connections close once every clone is gone.
    pub fn close(self) {
        let state = self.pool.state();
        tracing::debug!(
            connections = state.connections,
            idle = state.idle_connections,
            "pricebook read pool closed"
        );
    }
}

pub fn setup_database(conn: &Connection) -> PricebookResult<()> {
    // ==========================================================================
    // Pricebook table: one row per commercial key, 4 families x 5 tiers flat
    // ==========================================================================
    let rate_columns = RATE_COLUMNS
        .iter()
        .map(|col| format!("{} REAL NOT NULL DEFAULT 0", col))
        .collect::<Vec<_>>()
        .join(",\n            ");

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS pricebook_entries (
            id TEXT PRIMARY KEY NOT NULL,
            region TEXT NOT NULL,
            country TEXT NOT NULL,
            supplier TEXT NOT NULL DEFAULT 'Direct',
            currency TEXT NOT NULL,
            payment_terms TEXT NOT NULL DEFAULT '60 Days',
            {},
            content_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (region, country, supplier, currency, payment_terms)
        )",
            rate_columns
        ),
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pricebook_region_country
         ON pricebook_entries(region, country)",
        [],
    )?;

    Ok(())
}

fn key_values(record: &RateRecord) -> Vec<Value> {
    vec![
        Value::Text(record.region.clone()),
        Value::Text(record.country.clone()),
        Value::Text(record.supplier.clone()),
        Value::Text(record.currency.clone()),
        Value::Text(record.payment_terms.clone()),
    ]
}

fn rate_values(record: &RateRecord) -> Vec<Value> {
    RateFamily::ALL
        .iter()
        .flat_map(|family| record.family(*family).values())
        .map(Value::Real)
        .collect()
}

/// Reject the batch if any record is invalid or a key appears twice
fn check_batch(records: &[RateRecord]) -> PricebookResult<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        record.validate()?;
        let key = record.key();
        if !seen.insert(key) {
            return Err(PricebookError::Validation(format!(
                "Duplicate pricebook entry for {} / {} ({}, {}, {}).",
                record.region, record.country, record.supplier, record.currency, record.payment_terms
            )));
        }
    }
    Ok(())
}

fn load_batch(conn: &mut Connection, records: &[RateRecord]) -> PricebookResult<LoadSummary> {
    check_batch(records)?;

    let tx = conn.transaction()?;
    let mut summary = LoadSummary::default();
    for record in records {
        summary.record(upsert_record(&tx, record)?);
    }
    tx.commit()?;

    tracing::info!(
        inserted = summary.inserted,
        updated = summary.updated,
        unchanged = summary.unchanged,
        "pricebook bulk load complete"
    );
    Ok(summary)
}

fn upsert_record(conn: &Connection, record: &RateRecord) -> PricebookResult<UpsertOutcome> {
    let hash = compute_content_hash(record)?;
    let key_condition = KEY_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, col)| format!("{} = ?{}", col, i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");

    let existing: Option<String> = conn
        .query_row(
            &format!(
                "SELECT content_hash FROM pricebook_entries WHERE {}",
                key_condition
            ),
            params_from_iter(key_values(record)),
            |row| row.get(0),
        )
        .optional()?;

    let now = Utc::now().to_rfc3339();

    match existing {
        Some(stored) if stored == hash => Ok(UpsertOutcome::Unchanged),
        Some(_) => {
            let assignments = RATE_COLUMNS
                .iter()
                .enumerate()
                .map(|(i, col)| format!("{} = ?{}", col, i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let n = RATE_COLUMNS.len();
            let key_condition = KEY_COLUMNS
                .iter()
                .enumerate()
                .map(|(i, col)| format!("{} = ?{}", col, n + 3 + i))
                .collect::<Vec<_>>()
                .join(" AND ");
            let sql = format!(
                "UPDATE pricebook_entries SET {}, content_hash = ?{}, updated_at = ?{} WHERE {}",
                assignments,
                n + 1,
                n + 2,
                key_condition
            );

            let mut values = rate_values(record);
            values.push(Value::Text(hash));
            values.push(Value::Text(now));
            values.extend(key_values(record));
            conn.execute(&sql, params_from_iter(values))?;

            tracing::debug!(region = %record.region, country = %record.country, "pricebook entry updated");
            Ok(UpsertOutcome::Updated)
        }
        None => {
            let column_count = 1 + KEY_COLUMNS.len() + RATE_COLUMNS.len() + 3;
            let sql = format!(
                "INSERT INTO pricebook_entries (id, {}, {}, content_hash, created_at, updated_at)
                 VALUES ({})",
                KEY_COLUMNS.join(", "),
                RATE_COLUMNS.join(", "),
                placeholders(1, column_count)
            );

            let mut values = vec![Value::Text(uuid::Uuid::new_v4().to_string())];
            values.extend(key_values(record));
            values.extend(rate_values(record));
            values.push(Value::Text(hash));
            values.push(Value::Text(now.clone()));
            values.push(Value::Text(now));
            conn.execute(&sql, params_from_iter(values))?;

            tracing::debug!(region = %record.region, country = %record.country, "pricebook entry inserted");
            Ok(UpsertOutcome::Inserted)
        }
    }
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_entry(row: &Row) -> rusqlite::Result<PricebookEntry> {
    let rates = |family: usize| -> rusqlite::Result<TierRates> {
        let base = FIRST_RATE_IDX + family * 5;
        Ok(TierRates::new(
            row.get(base)?,
            row.get(base + 1)?,
            row.get(base + 2)?,
            row.get(base + 3)?,
            row.get(base + 4)?,
        ))
    };

    Ok(PricebookEntry {
        id: row.get(0)?,
        record: RateRecord {
            region: row.get(1)?,
            country: row.get(2)?,
            supplier: row.get(3)?,
            currency: row.get(4)?,
            payment_terms: row.get(5)?,
            yearly_with_backfill: rates(0)?,
            yearly_without_backfill: rates(1)?,
            monthly_short_term: rates(2)?,
            monthly_long_term: rates(3)?,
        },
        created_at: parse_timestamp(row, CREATED_AT_IDX)?,
        updated_at: parse_timestamp(row, UPDATED_AT_IDX)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tier;

    /// Helper to build a record whose rates are derived from a base amount
    fn create_test_record(region: &str, country: &str, currency: &str, base: f64) -> RateRecord {
        let mut record = RateRecord::new(region, country, currency);
        for (i, family) in RateFamily::ALL.iter().enumerate() {
            let step = base / 10.0;
            let start = base - (i as f64) * step;
            *record.family_mut(*family) = TierRates::new(
                start,
                start + step,
                start + 2.0 * step,
                start + 3.0 * step,
                start + 4.0 * step,
            );
        }
        record
    }

    fn sample_records() -> Vec<RateRecord> {
        vec![
            create_test_record("APAC", "Australia", "USD", 48000.0),
            create_test_record("Europe", "Austria", "Euro", 38995.0),
            create_test_record("Europe", "Belgium", "Euro", 65000.0),
        ]
    }

    #[test]
    fn test_idempotency_load_twice() {
        let mut store = PricebookStore::open_in_memory().unwrap();
        let records = sample_records();

        let first = store.bulk_load(&records).unwrap();
        let entries_after_first = store.all_entries().unwrap();

        let second = store.bulk_load(&records).unwrap();
        let entries_after_second = store.all_entries().unwrap();

        assert_eq!(first.inserted, 3);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.unchanged, 3, "identical reload should write nothing");
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(
            entries_after_first, entries_after_second,
            "ids, values and timestamps survive an identical reload"
        );
    }

    #[test]
    fn test_upsert_replaces_values_and_keeps_identity() {
        let store = PricebookStore::open_in_memory().unwrap();
        let mut record = create_test_record("APAC", "Australia", "USD", 48000.0);

        assert_eq!(store.upsert(&record).unwrap(), UpsertOutcome::Inserted);
        let before = store
            .find_one(&KeyFilter::from(&record.key()))
            .unwrap()
            .unwrap();

        record.yearly_with_backfill.l1 = 50000.0;
        assert_eq!(store.upsert(&record).unwrap(), UpsertOutcome::Updated);

        let after = store
            .find_one(&KeyFilter::from(&record.key()))
            .unwrap()
            .unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.record.yearly_with_backfill.get(Tier::L1), 50000.0);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_key_is_unique_at_storage_level() {
        let store = PricebookStore::open_in_memory().unwrap();
        let record = create_test_record("APAC", "Australia", "USD", 48000.0);
        store.upsert(&record).unwrap();

        let result = store.conn.execute(
            "INSERT INTO pricebook_entries
                (id, region, country, supplier, currency, payment_terms, content_hash, created_at, updated_at)
             VALUES ('dup', 'APAC', 'Australia', 'Direct', 'USD', '60 Days', 'x', 'now', 'now')",
            [],
        );
        match result {
            Err(rusqlite::Error::SqliteFailure(err, _)) => {
                assert_eq!(err.code, rusqlite::ErrorCode::ConstraintViolation)
            }
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }

    #[test]
    fn test_same_country_different_currency_is_a_new_key() {
        let store = PricebookStore::open_in_memory().unwrap();
        store
            .upsert(&create_test_record("Europe", "Austria", "Euro", 38995.0))
            .unwrap();
        store
            .upsert(&create_test_record("Europe", "Austria", "USD", 42000.0))
            .unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(
            store
                .distinct(KeyField::Country, Some(&KeyFilter::region("Europe")))
                .unwrap(),
            vec!["Austria"]
        );
    }

    #[test]
    fn test_find_one_is_exact_and_case_sensitive() {
        let mut store = PricebookStore::open_in_memory().unwrap();
        store.bulk_load(&sample_records()).unwrap();

        let key = CommercialKey {
            region: "APAC".to_string(),
            country: "Australia".to_string(),
            supplier: "Direct".to_string(),
            currency: "USD".to_string(),
            payment_terms: "60 Days".to_string(),
        };
        let entry = store.find_one(&KeyFilter::from(&key)).unwrap().unwrap();
        assert_eq!(entry.record.yearly_with_backfill.get(Tier::L1), 48000.0);

        let lower = CommercialKey {
            country: "australia".to_string(),
            ..key.clone()
        };
        assert!(store.find_one(&KeyFilter::from(&lower)).unwrap().is_none());

        let absent = CommercialKey {
            country: "Germany".to_string(),
            ..key
        };
        assert!(store.find_one(&KeyFilter::from(&absent)).unwrap().is_none());
    }

    #[test]
    fn test_distinct_values_sorted_and_filtered() {
        let mut store = PricebookStore::open_in_memory().unwrap();
        store.bulk_load(&sample_records()).unwrap();

        assert_eq!(
            store.distinct(KeyField::Region, None).unwrap(),
            vec!["APAC", "Europe"]
        );
        assert_eq!(
            store.distinct(KeyField::Currency, None).unwrap(),
            vec!["Euro", "USD"]
        );
        assert_eq!(
            store
                .distinct(KeyField::Country, Some(&KeyFilter::region("Europe")))
                .unwrap(),
            vec!["Austria", "Belgium"]
        );
        assert!(store
            .distinct(KeyField::Country, Some(&KeyFilter::region("Africa")))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_record_aborts_whole_load() {
        let mut store = PricebookStore::open_in_memory().unwrap();
        let mut records = sample_records();
        records[2].monthly_long_term.l2 = -5.0;

        let err = store.bulk_load(&records).unwrap_err();
        assert!(matches!(err, PricebookError::Validation(_)));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_key_in_batch_is_rejected() {
        let mut store = PricebookStore::open_in_memory().unwrap();
        let first = create_test_record("APAC", "Australia", "USD", 48000.0);
        let mut second = first.clone();
        second.yearly_with_backfill.l1 = 50000.0;

        let err = store.bulk_load(&[first.clone(), second]).unwrap_err();
        assert!(matches!(err, PricebookError::Validation(_)));
        assert!(err.to_string().contains("Australia"));
        assert_eq!(store.count().unwrap(), 0, "nothing written for a rejected batch");

        let batch = [first, create_test_record("Europe", "Austria", "Euro", 38995.0)];
        store.bulk_load(&batch).unwrap();
        let reload = store.bulk_load(&batch).unwrap();
        assert_eq!(reload.unchanged, 2);
        assert_eq!(reload.updated, 0);
    }

    #[test]
    fn test_same_country_other_currency_is_not_a_duplicate() {
        let mut store = PricebookStore::open_in_memory().unwrap();
        let summary = store
            .bulk_load(&[
                create_test_record("Europe", "Austria", "Euro", 38995.0),
                create_test_record("Europe", "Austria", "USD", 42000.0),
            ])
            .unwrap();
        assert_eq!(summary.inserted, 2);
    }

    #[test]
    fn test_pool_readers_share_one_database() {
        let pool = PricebookPool::in_memory(&sample_records()).unwrap();

        // Two connections checked out at once both see the seeded rows
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        assert_eq!(
            a.distinct(KeyField::Region, None).unwrap(),
            vec!["APAC", "Europe"]
        );
        let key = create_test_record("Europe", "Belgium", "Euro", 65000.0).key();
        let entry = b.find_one(&KeyFilter::from(&key)).unwrap().unwrap();
        assert_eq!(entry.record.yearly_with_backfill.get(Tier::L1), 65000.0);
    }

    #[test]
    fn test_file_pool_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricebook.db");

        let mut store = PricebookStore::open(&path).unwrap();
        store.bulk_load(&sample_records()).unwrap();
        store.close().unwrap();

        let pool = PricebookPool::open(&path, 2).unwrap();
        let conn = pool.get().unwrap();
        assert_eq!(conn.distinct(KeyField::Country, None).unwrap().len(), 3);
        assert!(conn
            .execute("DELETE FROM pricebook_entries", [])
            .is_err());
        pool.close();
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricebook.db");

        let mut store = PricebookStore::open(&path).unwrap();
        store.bulk_load(&sample_records()).unwrap();
        store.close().unwrap();

        let reopened = PricebookStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 3);
    }

    #[test]
    fn test_content_hash_is_stable() {
        let record = create_test_record("APAC", "Australia", "USD", 48000.0);
        let hash1 = compute_content_hash(&record).unwrap();
        let hash2 = compute_content_hash(&record.clone()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }
}
