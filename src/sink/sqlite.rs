use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use super::{RecordSink, WriteOutcome, planned_outcome};
use crate::cli::WriteMode;
use crate::formats::{EnrichedRecord, RecordKey};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str = "name, date_of_birth, date_of_death, gender, nationality, profession, \
     biography, image_url, popularity_score, additional_data, created_at, updated_at";

pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSink {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory().context("open in-memory sqlite db")?)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        initialize_schema(&conn).context("initialize sqlite schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn lock(conn: &Mutex<Connection>) -> anyhow::Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow::anyhow!("sqlite connection lock poisoned"))
}

fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS celebrities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            date_of_death TEXT,
            zodiac_sign TEXT NOT NULL,
            gender TEXT NOT NULL,
            nationality TEXT NOT NULL,
            profession TEXT NOT NULL,
            biography TEXT NOT NULL,
            image_url TEXT NOT NULL,
            popularity_score INTEGER NOT NULL,
            additional_data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(name, date_of_birth)
        )",
        [],
    )?;
    Ok(())
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn write_chunk(
        &self,
        records: &[EnrichedRecord],
        mode: WriteMode,
    ) -> Vec<anyhow::Result<WriteOutcome>> {
        let conn = Arc::clone(&self.conn);
        let owned = records.to_vec();
        let joined = tokio::task::spawn_blocking(move || write_chunk_blocking(&conn, &owned, mode))
            .await
            .context("join sqlite write task");

        match joined.and_then(|result| result) {
            Ok(outcomes) => outcomes,
            Err(err) => {
                tracing::warn!(err = %format!("{err:#}"), records = records.len(), "sqlite chunk failed");
                records
                    .iter()
                    .map(|record| Err(anyhow::anyhow!("chunk failed for {}: {err:#}", record.name())))
                    .collect()
            }
        }
    }

    async fn get(&self, key: &RecordKey) -> anyhow::Result<Option<EnrichedRecord>> {
        let conn = Arc::clone(&self.conn);
        let key = key.clone();
        tokio::task::spawn_blocking(move || get_blocking(&conn, &key))
            .await
            .context("join sqlite lookup task")?
    }

    async fn records(&self) -> anyhow::Result<Vec<EnrichedRecord>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || records_blocking(&conn))
            .await
            .context("join sqlite listing task")?
    }

    async fn flush(&self) -> anyhow::Result<()> {
        // Every chunk is committed as it is written.
        Ok(())
    }
}

fn get_blocking(conn: &Mutex<Connection>, key: &RecordKey) -> anyhow::Result<Option<EnrichedRecord>> {
    let conn = lock(conn)?;
    let row = conn
        .query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM celebrities WHERE name = ?1 AND date_of_birth = ?2"
            ),
            params![key.name, key.date_of_birth.format(DATE_FORMAT).to_string()],
            row_to_json,
        )
        .optional()
        .context("query record")?;
    row.map(record_from_json).transpose()
}

fn records_blocking(conn: &Mutex<Connection>) -> anyhow::Result<Vec<EnrichedRecord>> {
    let conn = lock(conn)?;
    let mut stmt = conn
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM celebrities ORDER BY id"))
        .context("prepare record listing")?;
    let rows = stmt.query_map([], row_to_json).context("list records")?;

    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_json(row.context("read record row")?)?);
    }
    Ok(records)
}

/// Runs the chunk in one transaction. A failing statement fails only its
/// record; a failed begin or commit fails the whole chunk.
fn write_chunk_blocking(
    conn: &Mutex<Connection>,
    records: &[EnrichedRecord],
    mode: WriteMode,
) -> anyhow::Result<Vec<anyhow::Result<WriteOutcome>>> {
    let mut conn = lock(conn)?;
    let tx = conn.transaction().context("begin transaction")?;
    let now = Utc::now();

    let outcomes: Vec<_> = records
        .iter()
        .map(|record| {
            write_record(&tx, record, mode, now)
                .with_context(|| format!("write record: {}", record.slug()))
        })
        .collect();

    tx.commit().context("commit chunk")?;
    Ok(outcomes)
}

fn write_record(
    tx: &Transaction<'_>,
    record: &EnrichedRecord,
    mode: WriteMode,
    now: DateTime<Utc>,
) -> anyhow::Result<WriteOutcome> {
    let dob = record.date_of_birth().format(DATE_FORMAT).to_string();
    let exists = tx
        .query_row(
            "SELECT 1 FROM celebrities WHERE name = ?1 AND date_of_birth = ?2",
            params![record.name(), dob],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    let outcome = planned_outcome(mode, exists);
    let dod = record
        .date_of_death
        .map(|date| date.format(DATE_FORMAT).to_string());
    let additional_data =
        serde_json::to_string(&record.additional_data).context("serialize additional data")?;

    match outcome {
        WriteOutcome::Inserted => {
            tx.execute(
                "INSERT INTO celebrities (
                    name, date_of_birth, date_of_death, zodiac_sign, gender, nationality,
                    profession, biography, image_url, popularity_score, additional_data,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.name(),
                    dob,
                    dod,
                    record.zodiac_sign().as_str(),
                    record.gender,
                    record.nationality,
                    record.profession,
                    record.biography,
                    record.image_url,
                    i64::from(record.popularity_score),
                    additional_data,
                    record.created_at().to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )?;
        }
        WriteOutcome::Updated => {
            tx.execute(
                "UPDATE celebrities SET
                    date_of_death = ?3, gender = ?4, nationality = ?5, profession = ?6,
                    biography = ?7, image_url = ?8, popularity_score = ?9,
                    additional_data = ?10, updated_at = ?11
                 WHERE name = ?1 AND date_of_birth = ?2",
                params![
                    record.name(),
                    dob,
                    dod,
                    record.gender,
                    record.nationality,
                    record.profession,
                    record.biography,
                    record.image_url,
                    i64::from(record.popularity_score),
                    additional_data,
                    now.to_rfc3339(),
                ],
            )?;
        }
        WriteOutcome::Skipped => {
            tracing::debug!(name = record.name(), ?mode, "record skipped");
        }
    }
    Ok(outcome)
}

/// Reads a row into the snake_case JSON shape accepted by record deserialization.
fn row_to_json(row: &Row<'_>) -> rusqlite::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "name": row.get::<_, String>(0)?,
        "date_of_birth": row.get::<_, String>(1)?,
        "date_of_death": row.get::<_, Option<String>>(2)?,
        "gender": row.get::<_, String>(3)?,
        "nationality": row.get::<_, String>(4)?,
        "profession": row.get::<_, String>(5)?,
        "biography": row.get::<_, String>(6)?,
        "image_url": row.get::<_, String>(7)?,
        "popularity_score": row.get::<_, i64>(8)?,
        "additional_data": row.get::<_, String>(9)?,
        "created_at": row.get::<_, String>(10)?,
        "updated_at": row.get::<_, String>(11)?,
    }))
}

fn record_from_json(value: serde_json::Value) -> anyhow::Result<EnrichedRecord> {
    serde_json::from_value(value).context("decode stored record")
}
