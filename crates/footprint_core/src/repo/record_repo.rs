//! Record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide generic CRUD over records of any registered model.
//! - Maintain parent → child links for declared references.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Attributes persist as a JSON object; anything else is invalid data.
//! - Result lists are ordered by insertion (`created_at`, then rowid).
//! - Multi-statement writes run in one `IMMEDIATE` transaction, so a
//!   concurrent writer waits on the busy timeout instead of failing.
//! - Linked writes re-check the parent record inside their transaction.
//! - Deleting a record removes every link it takes part in.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::record::{Attributes, Criteria, QueryOptions, Record, RecordId};
use crate::model::schema::Cardinality;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

const RECORD_COLUMNS: &str = "r.id, r.model, r.attributes, r.created_at, r.updated_at";
const REQUIRED_TABLES: &[&str] = &["records", "record_links"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Store error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(RecordId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl RepoError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Db(_) => "db_error",
            Self::NotFound(_) => "record_not_found",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_required_table",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table is missing: {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Parent side of an association: one parent record and one reference field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRef<'a> {
    pub parent_model: &'a str,
    pub parent_id: &'a RecordId,
    pub reference: &'a str,
}

/// Store driver contract the footprint service delegates to.
pub trait RecordStore {
    fn insert_record(&self, model: &str, attributes: &Attributes) -> RepoResult<Record>;
    fn get_record(&self, model: &str, id: &RecordId) -> RepoResult<Option<Record>>;
    fn find_records(
        &self,
        model: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Record>>;
    /// Merges `changes` into every matching record and returns them.
    fn update_records(
        &self,
        model: &str,
        criteria: &Criteria,
        changes: &Attributes,
    ) -> RepoResult<Vec<Record>>;
    /// Deletes every matching record and returns what was removed.
    fn delete_records(&self, model: &str, criteria: &Criteria) -> RepoResult<Vec<Record>>;

    /// Inserts a child record and links it under `link`.
    ///
    /// With `Cardinality::One`, existing links under `link` are dropped first.
    /// Linked writes fail with `NotFound(parent_id)` when the parent record
    /// is gone.
    fn insert_linked_record(
        &self,
        link: LinkRef<'_>,
        cardinality: Cardinality,
        child_model: &str,
        attributes: &Attributes,
    ) -> RepoResult<Record>;
    fn find_linked_records(
        &self,
        link: LinkRef<'_>,
        child_model: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Record>>;
    fn update_linked_records(
        &self,
        link: LinkRef<'_>,
        child_model: &str,
        criteria: &Criteria,
        changes: &Attributes,
    ) -> RepoResult<Vec<Record>>;
    fn delete_linked_records(
        &self,
        link: LinkRef<'_>,
        child_model: &str,
        criteria: &Criteria,
    ) -> RepoResult<Vec<Record>>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Wraps a connection that has every migration applied.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `user_version` differs from the latest
    ///   migration.
    /// - `MissingRequiredTable` when a store table is absent.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        for &table in REQUIRED_TABLES {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
                [table],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }

        Ok(Self { conn })
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn insert_record(&self, model: &str, attributes: &Attributes) -> RepoResult<Record> {
        insert_record_row(self.conn, model, attributes)
    }

    fn get_record(&self, model: &str, id: &RecordId) -> RepoResult<Option<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM records r WHERE r.model = ?1 AND r.id = ?2;"
        ))?;
        let raw = stmt
            .query_row(params![model, id.as_str()], read_raw_row)
            .optional()?;

        raw.map(RawRecordRow::into_record).transpose()
    }

    fn find_records(
        &self,
        model: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Record>> {
        let records = select_model_records(self.conn, model, criteria)?;
        Ok(options.paginate(records))
    }

    fn update_records(
        &self,
        model: &str,
        criteria: &Criteria,
        changes: &Attributes,
    ) -> RepoResult<Vec<Record>> {
        let tx = begin_immediate(self.conn)?;
        let matched = select_model_records(&tx, model, criteria)?;
        let updated = apply_changes(&tx, matched, changes)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_records(&self, model: &str, criteria: &Criteria) -> RepoResult<Vec<Record>> {
        let tx = begin_immediate(self.conn)?;
        let matched = select_model_records(&tx, model, criteria)?;
        delete_rows(&tx, &matched)?;
        tx.commit()?;
        Ok(matched)
    }

    fn insert_linked_record(
        &self,
        link: LinkRef<'_>,
        cardinality: Cardinality,
        child_model: &str,
        attributes: &Attributes,
    ) -> RepoResult<Record> {
        let tx = begin_immediate(self.conn)?;
        ensure_parent_in_tx(&tx, link)?;

        if cardinality == Cardinality::One {
            tx.execute(
                "DELETE FROM record_links WHERE parent_id = ?1 AND reference = ?2;",
                params![link.parent_id.as_str(), link.reference],
            )?;
        }

        let child = insert_record_row(&tx, child_model, attributes)?;
        tx.execute(
            "INSERT INTO record_links (parent_id, reference, child_id, linked_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                link.parent_id.as_str(),
                link.reference,
                child.id.as_str(),
                child.created_at
            ],
        )?;

        tx.commit()?;
        Ok(child)
    }

    fn find_linked_records(
        &self,
        link: LinkRef<'_>,
        child_model: &str,
        criteria: &Criteria,
        options: &QueryOptions,
    ) -> RepoResult<Vec<Record>> {
        let records = select_linked_records(self.conn, link, child_model, criteria)?;
        Ok(options.paginate(records))
    }

    fn update_linked_records(
        &self,
        link: LinkRef<'_>,
        child_model: &str,
        criteria: &Criteria,
        changes: &Attributes,
    ) -> RepoResult<Vec<Record>> {
        let tx = begin_immediate(self.conn)?;
        ensure_parent_in_tx(&tx, link)?;
        let matched = select_linked_records(&tx, link, child_model, criteria)?;
        let updated = apply_changes(&tx, matched, changes)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_linked_records(
        &self,
        link: LinkRef<'_>,
        child_model: &str,
        criteria: &Criteria,
    ) -> RepoResult<Vec<Record>> {
        let tx = begin_immediate(self.conn)?;
        ensure_parent_in_tx(&tx, link)?;
        let matched = select_linked_records(&tx, link, child_model, criteria)?;
        delete_rows(&tx, &matched)?;
        tx.commit()?;
        Ok(matched)
    }
}

fn begin_immediate(conn: &Connection) -> RepoResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

fn ensure_parent_in_tx(tx: &Transaction<'_>, link: LinkRef<'_>) -> RepoResult<()> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM records WHERE id = ?1 AND model = ?2);",
        params![link.parent_id.as_str(), link.parent_model],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(RepoError::NotFound(link.parent_id.clone()));
    }
    Ok(())
}

fn insert_record_row(conn: &Connection, model: &str, attributes: &Attributes) -> RepoResult<Record> {
    let now = now_epoch_ms();
    let record = Record {
        id: RecordId::generate(),
        model: model.to_string(),
        attributes: attributes.clone(),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO records (id, model, attributes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            record.id.as_str(),
            record.model.as_str(),
            encode_attributes(&record.attributes)?,
            record.created_at,
            record.updated_at,
        ],
    )?;

    Ok(record)
}

fn select_model_records(
    conn: &Connection,
    model: &str,
    criteria: &Criteria,
) -> RepoResult<Vec<Record>> {
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records r WHERE r.model = ?1");
    let id_filter = match criteria {
        Criteria::Id(id) => {
            sql.push_str(" AND r.id = ?2");
            Some(id.as_str())
        }
        Criteria::All | Criteria::Where(_) => None,
    };
    sql.push_str(" ORDER BY r.created_at ASC, r.rowid ASC;");

    let mut stmt = conn.prepare(&sql)?;
    let rows = match id_filter {
        Some(id) => stmt.query(params![model, id])?,
        None => stmt.query(params![model])?,
    };
    collect_matching(rows, criteria)
}

fn select_linked_records(
    conn: &Connection,
    link: LinkRef<'_>,
    child_model: &str,
    criteria: &Criteria,
) -> RepoResult<Vec<Record>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS}
         FROM record_links l
         JOIN records r ON r.id = l.child_id
         WHERE l.parent_id = ?1
           AND l.reference = ?2
           AND r.model = ?3
         ORDER BY r.created_at ASC, r.rowid ASC;"
    ))?;
    let rows = stmt.query(params![link.parent_id.as_str(), link.reference, child_model])?;
    collect_matching(rows, criteria)
}

fn collect_matching(mut rows: rusqlite::Rows<'_>, criteria: &Criteria) -> RepoResult<Vec<Record>> {
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let record = read_raw_row(row)?.into_record()?;
        if criteria.matches(&record) {
            records.push(record);
        }
    }
    Ok(records)
}

fn apply_changes(
    conn: &Connection,
    records: Vec<Record>,
    changes: &Attributes,
) -> RepoResult<Vec<Record>> {
    let now = now_epoch_ms();
    let mut updated = Vec::with_capacity(records.len());

    for mut record in records {
        for (key, value) in changes {
            record.attributes.insert(key.clone(), value.clone());
        }
        record.updated_at = now;

        let changed = conn.execute(
            "UPDATE records SET attributes = ?1, updated_at = ?2 WHERE id = ?3;",
            params![
                encode_attributes(&record.attributes)?,
                record.updated_at,
                record.id.as_str()
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(record.id));
        }
        updated.push(record);
    }

    Ok(updated)
}

fn delete_rows(conn: &Connection, records: &[Record]) -> RepoResult<()> {
    for record in records {
        conn.execute("DELETE FROM records WHERE id = ?1;", [record.id.as_str()])?;
    }
    Ok(())
}

/// Row values before JSON decoding, so SQL and data errors stay distinct.
struct RawRecordRow {
    id: String,
    model: String,
    attributes: String,
    created_at: i64,
    updated_at: i64,
}

impl RawRecordRow {
    fn into_record(self) -> RepoResult<Record> {
        let id = RecordId::parse(&self.id).ok_or_else(|| {
            RepoError::InvalidData(format!("blank id in records.id for model `{}`", self.model))
        })?;

        let attributes = match serde_json::from_str::<Value>(&self.attributes) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(RepoError::InvalidData(format!(
                    "records.attributes for `{id}` is not an object: {other}"
                )));
            }
            Err(err) => {
                return Err(RepoError::InvalidData(format!(
                    "records.attributes for `{id}` is not valid json: {err}"
                )));
            }
        };

        Ok(Record {
            id,
            model: self.model,
            attributes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRecordRow> {
    Ok(RawRecordRow {
        id: row.get(0)?,
        model: row.get(1)?,
        attributes: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn encode_attributes(attributes: &Attributes) -> RepoResult<String> {
    serde_json::to_string(attributes)
        .map_err(|err| RepoError::InvalidData(format!("attributes are not serializable: {err}")))
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
