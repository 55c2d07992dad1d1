use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::sync::Mutex;

use super::{RecordSink, WriteOutcome, planned_outcome};
use crate::cli::{SnapshotFormat, WriteMode};
use crate::formats::{EnrichedRecord, RecordKey};

/// Snapshot file sink. Records live in memory and are rewritten on `flush`.
pub struct JsonFileSink {
    path: PathBuf,
    format: SnapshotFormat,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    records: Vec<EnrichedRecord>,
    index: HashMap<RecordKey, usize>,
}

impl State {
    fn push_or_replace(&mut self, record: EnrichedRecord) -> bool {
        let key = record.key();
        match self.index.get(&key) {
            Some(&idx) => {
                self.records[idx] = record;
                true
            }
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
                false
            }
        }
    }
}

impl JsonFileSink {
    /// Opens `path`, loading its records when the file exists.
    pub fn open(path: &Path, format: SnapshotFormat) -> anyhow::Result<Self> {
        let mut state = State::default();
        if path.exists() {
            for record in crate::formats::read_records(path)? {
                let name = record.name().to_owned();
                if state.push_or_replace(record) {
                    tracing::warn!(%name, path = %path.display(), "duplicate key in snapshot; keeping the last");
                }
            }
            tracing::debug!(records = state.records.len(), path = %path.display(), "loaded snapshot");
        }

        Ok(Self {
            path: path.to_path_buf(),
            format,
            state: Mutex::new(state),
        })
    }
}

#[async_trait]
impl RecordSink for JsonFileSink {
    async fn write_chunk(
        &self,
        records: &[EnrichedRecord],
        mode: WriteMode,
    ) -> Vec<anyhow::Result<WriteOutcome>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        records
            .iter()
            .map(|incoming| {
                let key = incoming.key();
                let existing = state.index.get(&key).copied();
                let outcome = planned_outcome(mode, existing.is_some());
                match (outcome, existing) {
                    (WriteOutcome::Updated, Some(idx)) => {
                        state.records[idx].apply_update(incoming, now);
                    }
                    (WriteOutcome::Inserted, _) => {
                        let mut record = incoming.clone();
                        record.updated_at = now;
                        state.push_or_replace(record);
                    }
                    _ => {}
                }
                Ok(outcome)
            })
            .collect()
    }

    async fn get(&self, key: &RecordKey) -> anyhow::Result<Option<EnrichedRecord>> {
        let state = self.state.lock().await;
        Ok(state.index.get(key).map(|&idx| state.records[idx].clone()))
    }

    async fn records(&self) -> anyhow::Result<Vec<EnrichedRecord>> {
        Ok(self.state.lock().await.records.clone())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        let data = {
            let state = self.state.lock().await;
            encode_snapshot(&state.records, self.format)?
        };
        write_atomic(&self.path, &data).await?;
        tracing::debug!(path = %self.path.display(), "flushed snapshot");
        Ok(())
    }
}

fn encode_snapshot(records: &[EnrichedRecord], format: SnapshotFormat) -> anyhow::Result<Vec<u8>> {
    match format {
        SnapshotFormat::Json => {
            let mut data = serde_json::to_vec_pretty(records).context("serialize records")?;
            data.push(b'\n');
            Ok(data)
        }
        SnapshotFormat::Jsonl => {
            let mut data = Vec::new();
            for record in records {
                serde_json::to_writer(&mut data, record).context("serialize record")?;
                data.push(b'\n');
            }
            Ok(data)
        }
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}
