use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::batch::RunSummary;
use crate::cli::{PersistArgs, WriteMode};
use crate::formats::EnrichedRecord;
use crate::sink::RecordSink;

/// Writes `records` to `sink` in chunks of `chunk_size`, sleeping `delay`
/// between chunks, then flushes.
pub async fn persist_records(
    sink: &dyn RecordSink,
    records: &[EnrichedRecord],
    mode: WriteMode,
    chunk_size: usize,
    delay: Duration,
) -> anyhow::Result<RunSummary> {
    let chunk_size = chunk_size.max(1);
    let mut summary = RunSummary::default();

    for (chunk_index, chunk) in records.chunks(chunk_size).enumerate() {
        if chunk_index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let outcomes = sink.write_chunk(chunk, mode).await;
        summary.record_outcomes(outcomes);
        tracing::info!(
            chunk = chunk_index + 1,
            records = chunk.len(),
            success = summary.success_count,
            errors = summary.error_count,
            "persist: progress"
        );
    }

    sink.flush().await.context("flush sink")?;
    Ok(summary)
}

pub async fn run(args: PersistArgs) -> anyhow::Result<()> {
    let records =
        crate::formats::read_records(Path::new(&args.records)).context("load record snapshot")?;
    let sink = crate::sink::open(&args.sink)?;

    tracing::info!(
        records = records.len(),
        mode = ?args.mode,
        sink = %args.sink.sink,
        "persist"
    );

    let summary = persist_records(
        sink.as_ref(),
        &records,
        args.mode,
        args.chunk_size,
        Duration::from_millis(args.delay_ms),
    )
    .await?;

    tracing::info!(
        success = summary.success_count,
        errors = summary.error_count,
        skipped = summary.skipped_count,
        "persist complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::formats::{AdditionalData, Profile, RecordKey};
    use crate::sink::{SqliteSink, WriteOutcome};

    fn record(name: &str) -> EnrichedRecord {
        EnrichedRecord::new(
            RecordKey::new(name, NaiveDate::from_ymd_opt(1980, 8, 8).expect("valid date")),
            Profile {
                date_of_death: None,
                gender: "Male".to_owned(),
                nationality: "Unknown".to_owned(),
                profession: "Unknown".to_owned(),
                biography: String::new(),
                image_url: String::new(),
                popularity_score: 0,
                additional_data: AdditionalData::new(),
            },
            Utc::now(),
        )
    }

    /// Fails every chunk that contains a record named "poison".
    struct FlakySink;

    #[async_trait]
    impl RecordSink for FlakySink {
        async fn write_chunk(
            &self,
            records: &[EnrichedRecord],
            _mode: WriteMode,
        ) -> Vec<anyhow::Result<WriteOutcome>> {
            let poisoned = records.iter().any(|r| r.name() == "poison");
            records
                .iter()
                .map(|_| {
                    if poisoned {
                        Err(anyhow::anyhow!("chunk rejected"))
                    } else {
                        Ok(WriteOutcome::Inserted)
                    }
                })
                .collect()
        }

        async fn get(&self, _key: &RecordKey) -> anyhow::Result<Option<EnrichedRecord>> {
            Ok(None)
        }

        async fn records(&self) -> anyhow::Result<Vec<EnrichedRecord>> {
            Ok(Vec::new())
        }

        async fn flush(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_chunk_counts_every_record() -> anyhow::Result<()> {
        let records: Vec<_> = ["a", "b", "poison", "c", "d"].into_iter().map(record).collect();
        let summary =
            persist_records(&FlakySink, &records, WriteMode::Upsert, 2, Duration::ZERO).await?;
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.error_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn replays_snapshot_into_sqlite() -> anyhow::Result<()> {
        let sink = SqliteSink::open_in_memory()?;
        let records: Vec<_> = ["a", "b", "c"].into_iter().map(record).collect();

        let first = persist_records(&sink, &records, WriteMode::Upsert, 2, Duration::ZERO).await?;
        assert_eq!(first.success_count, 3);

        let again = persist_records(&sink, &records, WriteMode::Insert, 50, Duration::ZERO).await?;
        assert_eq!(again.skipped_count, 3);
        assert_eq!(sink.records().await?.len(), 3);
        Ok(())
    }
}
