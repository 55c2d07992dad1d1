use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cli::WriteMode;
use crate::enrich::Enricher;
use crate::formats::EnrichedRecord;
use crate::sink::{RecordSink, WriteOutcome};
use crate::wiki::PageSource;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    /// Sleep between batches.
    pub delay: Duration,
    pub mode: WriteMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            delay: Duration::from_millis(100),
            mode: WriteMode::Upsert,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub success_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
}

impl RunSummary {
    /// Folds one chunk of sink outcomes into the counts.
    pub fn record_outcomes(&mut self, outcomes: Vec<anyhow::Result<WriteOutcome>>) {
        for outcome in outcomes {
            match outcome {
                Ok(WriteOutcome::Inserted | WriteOutcome::Updated) => self.success_count += 1,
                Ok(WriteOutcome::Skipped) => self.skipped_count += 1,
                Err(err) => {
                    tracing::warn!(err = %format!("{err:#}"), "record write failed");
                    self.error_count += 1;
                }
            }
        }
    }
}

pub struct BatchRunner<S> {
    enricher: Arc<Enricher<S>>,
    sink: Arc<dyn RecordSink>,
    config: BatchConfig,
}

impl<S: PageSource + 'static> BatchRunner<S> {
    pub fn new(enricher: Arc<Enricher<S>>, sink: Arc<dyn RecordSink>, config: BatchConfig) -> Self {
        Self {
            enricher,
            sink,
            config,
        }
    }

    /// Enriches and stores every name. Per-name failures are counted, not
    /// returned; only a failed final flush is an error.
    pub async fn run(&self, names: &[String]) -> anyhow::Result<RunSummary> {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = names.len().div_ceil(batch_size);
        let mut summary = RunSummary::default();

        for (batch_index, batch) in names.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }

            let enriched = self.enrich_batch(batch).await;
            let mut records = Vec::with_capacity(enriched.len());
            for (name, record) in batch.iter().zip(enriched) {
                match record {
                    Some(record) => records.push(record),
                    None => {
                        tracing::info!(%name, "not enriched");
                        summary.error_count += 1;
                    }
                }
            }

            if !records.is_empty() {
                let outcomes = self.sink.write_chunk(&records, self.config.mode).await;
                summary.record_outcomes(outcomes);
            }

            tracing::info!(
                batch = batch_index + 1,
                total = total_batches,
                success = summary.success_count,
                errors = summary.error_count,
                skipped = summary.skipped_count,
                "enrich: progress"
            );
        }

        self.sink.flush().await?;
        Ok(summary)
    }

    /// Enriches one batch concurrently. Results keep input order; a task that
    /// fails to join leaves `None` in its slot.
    async fn enrich_batch(&self, batch: &[String]) -> Vec<Option<EnrichedRecord>> {
        let mut join_set = tokio::task::JoinSet::new();
        for (idx, name) in batch.iter().enumerate() {
            let enricher = Arc::clone(&self.enricher);
            let name = name.clone();
            join_set.spawn(async move { (idx, enricher.enrich(&name).await) });
        }

        let mut results: Vec<Option<EnrichedRecord>> = vec![None; batch.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, record)) => results[idx] = record,
                Err(err) => tracing::warn!(?err, "enrich task failed"),
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SnapshotFormat;
    use crate::enrich::tests::FakeSource;
    use crate::enrich::EnrichConfig;
    use crate::sink::{JsonFileSink, SqliteSink};

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn source() -> FakeSource {
        FakeSource::default()
            .with_subject("Ann", Some("1970-01-01"))
            .with_subject("Bob", Some("1971-02-02"))
            .with_subject("Cid", None)
            .with_subject("Dee", Some("1973-04-04"))
            .with_subject("Eve", Some("1974-05-05"))
    }

    fn runner(sink: Arc<dyn RecordSink>, batch_size: usize, mode: WriteMode) -> BatchRunner<FakeSource> {
        let enricher = Enricher::new(source(), EnrichConfig::default()).expect("enricher");
        BatchRunner::new(
            Arc::new(enricher),
            sink,
            BatchConfig {
                batch_size,
                delay: Duration::ZERO,
                mode,
            },
        )
    }

    #[tokio::test]
    async fn failures_are_counted_and_successes_stored_in_order() -> anyhow::Result<()> {
        let sink: Arc<dyn RecordSink> = Arc::new(SqliteSink::open_in_memory()?);
        let input = names(&["Ann", "Bob", "Cid", "Unknown Person", "Dee", "Eve"]);

        let summary = runner(Arc::clone(&sink), 4, WriteMode::Upsert)
            .run(&input)
            .await?;

        assert_eq!(
            summary,
            RunSummary {
                success_count: 4,
                error_count: 2,
                skipped_count: 0,
            }
        );
        let stored: Vec<String> = sink
            .records()
            .await?
            .iter()
            .map(|r| r.name().to_owned())
            .collect();
        assert_eq!(stored, ["Ann", "Bob", "Dee", "Eve"]);
        Ok(())
    }

    #[tokio::test]
    async fn rerun_in_insert_mode_skips_everything() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("records.json");
        let sink: Arc<dyn RecordSink> = Arc::new(JsonFileSink::open(&path, SnapshotFormat::Json)?);
        let input = names(&["Ann", "Bob"]);

        runner(Arc::clone(&sink), 1, WriteMode::Insert)
            .run(&input)
            .await?;
        let second = runner(Arc::clone(&sink), 1, WriteMode::Insert)
            .run(&input)
            .await?;

        assert_eq!(second.success_count, 0);
        assert_eq!(second.skipped_count, 2);
        assert_eq!(crate::formats::read_records(&path)?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn empty_input_still_flushes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("records.json");
        let sink: Arc<dyn RecordSink> = Arc::new(JsonFileSink::open(&path, SnapshotFormat::Json)?);

        let summary = runner(sink, 3, WriteMode::Upsert).run(&[]).await?;
        assert_eq!(summary, RunSummary::default());
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn outcome_errors_count_as_errors() {
        let mut summary = RunSummary::default();
        summary.record_outcomes(vec![
            Ok(WriteOutcome::Inserted),
            Ok(WriteOutcome::Skipped),
            Err(anyhow::anyhow!("constraint")),
            Ok(WriteOutcome::Updated),
        ]);
        assert_eq!(
            summary,
            RunSummary {
                success_count: 2,
                error_count: 1,
                skipped_count: 1,
            }
        );
    }
}
