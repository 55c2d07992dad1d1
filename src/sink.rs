use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::cli::{ShowArgs, SinkArgs, SinkKind, WriteMode};
use crate::formats::{EnrichedRecord, RecordKey};

pub mod json_file;
pub mod sqlite;

pub use json_file::JsonFileSink;
pub use sqlite::SqliteSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
    /// Nothing written: an `insert` hit an existing key, or an `update` missed.
    Skipped,
}

/// Durable home for enriched records, keyed by (name, date of birth).
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Writes one chunk. Returns one outcome per input record, in input order.
    async fn write_chunk(
        &self,
        records: &[EnrichedRecord],
        mode: WriteMode,
    ) -> Vec<anyhow::Result<WriteOutcome>>;

    async fn get(&self, key: &RecordKey) -> anyhow::Result<Option<EnrichedRecord>>;

    /// Every stored record, in insertion order.
    async fn records(&self) -> anyhow::Result<Vec<EnrichedRecord>>;

    /// Makes previous writes durable.
    async fn flush(&self) -> anyhow::Result<()>;
}

/// What `mode` does to a record given whether its key is already stored.
pub fn planned_outcome(mode: WriteMode, exists: bool) -> WriteOutcome {
    match (mode, exists) {
        (WriteMode::Insert, false) | (WriteMode::Upsert, false) => WriteOutcome::Inserted,
        (WriteMode::Update, true) | (WriteMode::Upsert, true) => WriteOutcome::Updated,
        (WriteMode::Insert, true) | (WriteMode::Update, false) => WriteOutcome::Skipped,
    }
}

pub fn open(args: &SinkArgs) -> anyhow::Result<Arc<dyn RecordSink>> {
    let path = Path::new(&args.sink);
    let sink: Arc<dyn RecordSink> = match args.sink_kind {
        SinkKind::Json => Arc::new(
            JsonFileSink::open(path, args.format)
                .with_context(|| format!("open json sink: {}", path.display()))?,
        ),
        SinkKind::Sqlite => Arc::new(
            SqliteSink::open(path)
                .with_context(|| format!("open sqlite sink: {}", path.display()))?,
        ),
    };
    Ok(sink)
}

pub async fn show(args: ShowArgs) -> anyhow::Result<()> {
    let key = RecordKey::from_slug(&args.slug)?;
    let sink = open(&args.sink)?;
    let Some(record) = sink.get(&key).await? else {
        anyhow::bail!("no record for slug: {}", args.slug);
    };
    let json = serde_json::to_string_pretty(&record).context("serialize record")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_table() {
        use WriteMode::*;
        use WriteOutcome::*;

        assert_eq!(planned_outcome(Insert, false), Inserted);
        assert_eq!(planned_outcome(Insert, true), Skipped);
        assert_eq!(planned_outcome(Update, false), Skipped);
        assert_eq!(planned_outcome(Update, true), Updated);
        assert_eq!(planned_outcome(Upsert, false), Inserted);
        assert_eq!(planned_outcome(Upsert, true), Updated);
    }
}
