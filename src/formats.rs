use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::zodiac::ZodiacSign;

pub const SLUG_SEPARATOR: &str = "-birth-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    List(Vec<String>),
}

impl AttributeValue {
    /// Returns `None` for empty text or an empty list.
    pub fn non_empty(self) -> Option<Self> {
        match &self {
            AttributeValue::Text(text) if text.is_empty() => None,
            AttributeValue::List(items) if items.is_empty() => None,
            _ => Some(self),
        }
    }
}

pub type AdditionalData = BTreeMap<String, AttributeValue>;

/// Natural key of a record: `(name, date of birth)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub name: String,
    pub date_of_birth: NaiveDate,
}

impl RecordKey {
    pub fn new(name: impl Into<String>, date_of_birth: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date_of_birth,
        }
    }

    #[must_use]
    pub fn slug(&self) -> String {
        format!(
            "{}{SLUG_SEPARATOR}{}",
            self.name,
            self.date_of_birth.format("%Y-%m-%d")
        )
    }

    pub fn from_slug(slug: &str) -> anyhow::Result<Self> {
        let (name, date) = slug
            .split_once(SLUG_SEPARATOR)
            .ok_or_else(|| anyhow::anyhow!("invalid slug format: {slug}"))?;
        if name.trim().is_empty() {
            anyhow::bail!("invalid slug format: {slug}");
        }
        let date_of_birth = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .with_context(|| format!("parse slug birth date: {date}"))?;
        Ok(Self::new(name, date_of_birth))
    }
}

/// Mutable part of a record. Everything here may be overwritten by an update pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub date_of_death: Option<NaiveDate>,
    pub gender: String,
    pub nationality: String,
    pub profession: String,
    pub biography: String,
    pub image_url: String,
    pub popularity_score: u8,
    pub additional_data: AdditionalData,
}

/// One enriched celebrity profile.
///
/// `name` and `date_of_birth` form the identity and cannot change after
/// construction; `zodiac_sign` is always derived from `date_of_birth`,
/// including when a record is read back from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredRecord")]
pub struct EnrichedRecord {
    name: String,
    date_of_birth: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_death: Option<NaiveDate>,
    zodiac_sign: ZodiacSign,
    pub gender: String,
    pub nationality: String,
    pub profession: String,
    pub biography: String,
    pub image_url: String,
    pub popularity_score: u8,
    pub additional_data: AdditionalData,
    created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnrichedRecord {
    pub fn new(key: RecordKey, profile: Profile, now: DateTime<Utc>) -> Self {
        let RecordKey {
            name,
            date_of_birth,
        } = key;
        Self {
            zodiac_sign: ZodiacSign::from_date(date_of_birth),
            name,
            date_of_birth,
            date_of_death: profile.date_of_death,
            gender: profile.gender,
            nationality: profile.nationality,
            profession: profile.profession,
            biography: profile.biography,
            image_url: profile.image_url,
            popularity_score: profile.popularity_score.min(100),
            additional_data: profile.additional_data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn date_of_birth(&self) -> NaiveDate {
        self.date_of_birth
    }

    pub fn zodiac_sign(&self) -> ZodiacSign {
        self.zodiac_sign
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.name.clone(), self.date_of_birth)
    }

    pub fn slug(&self) -> String {
        self.key().slug()
    }

    /// Overwrites every mutable field with `incoming`'s values and stamps `updated_at`.
    /// Identity fields and `created_at` are kept.
    pub fn apply_update(&mut self, incoming: &EnrichedRecord, now: DateTime<Utc>) {
        self.date_of_death = incoming.date_of_death;
        self.gender = incoming.gender.clone();
        self.nationality = incoming.nationality.clone();
        self.profession = incoming.profession.clone();
        self.biography = incoming.biography.clone();
        self.image_url = incoming.image_url.clone();
        self.popularity_score = incoming.popularity_score;
        self.additional_data = incoming.additional_data.clone();
        self.updated_at = now;
    }
}

/// Shape accepted when reading records back. Also takes the snake_case column
/// names used by older snapshots.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    name: String,
    #[serde(alias = "date_of_birth")]
    date_of_birth: NaiveDate,
    #[serde(default, alias = "date_of_death")]
    date_of_death: Option<NaiveDate>,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    nationality: String,
    #[serde(default)]
    profession: String,
    #[serde(default)]
    biography: String,
    #[serde(default, alias = "image_url")]
    image_url: String,
    #[serde(default, alias = "popularity_score")]
    popularity_score: f64,
    #[serde(default, alias = "additional_data")]
    additional_data: Option<serde_json::Value>,
    #[serde(default, alias = "created_at")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    updated_at: Option<DateTime<Utc>>,
}

impl From<StoredRecord> for EnrichedRecord {
    fn from(stored: StoredRecord) -> Self {
        let now = Utc::now();
        let created_at = stored.created_at.unwrap_or(now);
        let mut record = EnrichedRecord::new(
            RecordKey::new(stored.name, stored.date_of_birth),
            Profile {
                date_of_death: stored.date_of_death,
                gender: stored.gender,
                nationality: stored.nationality,
                profession: stored.profession,
                biography: stored.biography,
                image_url: stored.image_url,
                popularity_score: stored.popularity_score.round().clamp(0.0, 100.0) as u8,
                additional_data: stored
                    .additional_data
                    .map(additional_data_from_json)
                    .unwrap_or_default(),
            },
            created_at,
        );
        record.updated_at = stored.updated_at.unwrap_or(created_at);
        record
    }
}

/// Keeps string and string-list entries; other JSON shapes are stringified.
fn additional_data_from_json(value: serde_json::Value) -> AdditionalData {
    let value = match value {
        // Some stores keep the map as a JSON-encoded string column.
        serde_json::Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(_) => return AdditionalData::new(),
        },
        other => other,
    };
    let serde_json::Value::Object(map) = value else {
        return AdditionalData::new();
    };

    let mut out = AdditionalData::new();
    for (key, value) in map {
        let attribute = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(text) => AttributeValue::Text(text),
            serde_json::Value::Array(items) => AttributeValue::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(text) => text,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            other => AttributeValue::Text(other.to_string()),
        };
        out.insert(key, attribute);
    }
    out
}

pub fn read_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read names file: {}", path.display()))?;
    let names: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("parse names file (expected JSON array): {}", path.display()))?;
    Ok(names
        .into_iter()
        .map(|name| name.trim().to_owned())
        .filter(|name| !name.is_empty())
        .collect())
}

/// Reads a record snapshot written either as a JSON array or as JSON lines.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<EnrichedRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read records file: {}", path.display()))?;
    parse_records(&raw).with_context(|| format!("parse records file: {}", path.display()))
}

pub fn parse_records(raw: &str) -> anyhow::Result<Vec<EnrichedRecord>> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("parse record array");
    }

    let mut records = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line)
            .with_context(|| format!("parse record on line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}

/// Writes pretty JSON to a file that must not exist yet.
pub fn write_json_new<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(path)
        .with_context(|| format!("create output file: {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, value).context("serialize json")?;
    file.write_all(b"\n").context("write trailing newline")?;
    file.flush().context("flush output file")?;
    Ok(())
}
