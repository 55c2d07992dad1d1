use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use chrono::{DateTime, Utc};

use crate::batch::{BatchConfig, BatchRunner};
use crate::classify::{Classifier, popularity_score};
use crate::cli::EnrichArgs;
use crate::formats::{AttributeValue, EnrichedRecord, Profile, RecordKey};
use crate::infobox::Details;
use crate::summary::Summary;
use crate::wiki::{PageSource, WikiClient, WikiConfig};

pub const DEFAULT_POPULARITY_SCALE: u64 = 100_000;
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "https://loremflickr.com/640/480/abstract";

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Content length that maps to a popularity score of 100.
    pub popularity_scale: u64,
    pub placeholder_image_url: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            popularity_scale: DEFAULT_POPULARITY_SCALE,
            placeholder_image_url: DEFAULT_PLACEHOLDER_IMAGE.to_owned(),
        }
    }
}

pub struct Enricher<S> {
    source: S,
    classifier: Classifier,
    config: EnrichConfig,
}

impl<S: PageSource> Enricher<S> {
    pub fn new(source: S, config: EnrichConfig) -> anyhow::Result<Self> {
        Ok(Self {
            source,
            classifier: Classifier::new().context("build classifier")?,
            config,
        })
    }

    /// Builds the record for `name`, or `None` when the subject has no
    /// summary, no detail page, or no discoverable birth date.
    pub async fn enrich(&self, name: &str) -> Option<EnrichedRecord> {
        let Some(summary) = self.source.summary(name).await else {
            tracing::info!(name, "no summary; skipping");
            return None;
        };
        if summary.extract.trim().is_empty() {
            tracing::info!(name, "summary has no extract; skipping");
            return None;
        }
        let Some(page_url) = summary.page_url.clone() else {
            tracing::info!(name, "summary has no page url; skipping");
            return None;
        };

        let details = self.source.details(&page_url).await;
        tracing::debug!(name, content_length = details.content_length, "parsed detail page");

        let record = assemble_record(
            name,
            &summary,
            &page_url,
            details,
            &self.classifier,
            &self.config,
            Utc::now(),
        );
        if record.is_none() {
            tracing::warn!(name, "no birth date found; skipping");
        }
        record
    }
}

/// Combines a summary and parsed details into a record. `None` without a birth date.
pub fn assemble_record(
    name: &str,
    summary: &Summary,
    page_url: &str,
    details: Details,
    classifier: &Classifier,
    config: &EnrichConfig,
    now: DateTime<Utc>,
) -> Option<EnrichedRecord> {
    let date_of_birth = details.birth_date?;
    let description = summary.description.as_deref().unwrap_or_default();

    let mut additional_data = crate::formats::AdditionalData::new();
    additional_data.insert(
        "fullName".to_owned(),
        AttributeValue::Text(details.full_name.unwrap_or_else(|| name.to_owned())),
    );
    if let Some(place) = details.birth_place {
        additional_data.insert("birthPlace".to_owned(), AttributeValue::Text(place));
    }
    if !details.organizations.is_empty() {
        additional_data.insert(
            "organizations".to_owned(),
            AttributeValue::List(details.organizations),
        );
    }
    if !details.occupations.is_empty() {
        additional_data.insert(
            "occupations".to_owned(),
            AttributeValue::List(details.occupations),
        );
    }
    additional_data.insert(
        "wikiUrl".to_owned(),
        AttributeValue::Text(page_url.to_owned()),
    );
    additional_data.extend(details.additional_data);

    let profile = Profile {
        date_of_death: details.death_date,
        gender: classifier.gender(&summary.extract).as_str().to_owned(),
        nationality: classifier.nationality(description),
        profession: classifier.profession(description),
        biography: summary.extract.clone(),
        image_url: summary
            .thumbnail_url
            .clone()
            .unwrap_or_else(|| config.placeholder_image_url.clone()),
        popularity_score: popularity_score(details.content_length, config.popularity_scale),
        additional_data,
    };

    Some(EnrichedRecord::new(
        RecordKey::new(name, date_of_birth),
        profile,
        now,
    ))
}

pub async fn run(args: EnrichArgs) -> anyhow::Result<()> {
    let mut names =
        crate::formats::read_names(Path::new(&args.names)).context("load candidate names")?;

    if let Some(existing_path) = args.skip_existing.as_deref() {
        let existing = crate::formats::read_records(Path::new(existing_path))
            .context("load --skip-existing records")?;
        let known: HashSet<String> = existing
            .iter()
            .map(|record| record.name().to_lowercase())
            .collect();
        let before = names.len();
        names.retain(|name| !known.contains(&name.to_lowercase()));
        tracing::info!(
            skipped = before - names.len(),
            remaining = names.len(),
            "dropped names already present"
        );
    }

    let sink = crate::sink::open(&args.sink).context("open sink")?;
    let client = WikiClient::new(WikiConfig::from_args(&args.wiki)?)?;
    let enricher = Enricher::new(
        client,
        EnrichConfig {
            popularity_scale: args.popularity_scale,
            placeholder_image_url: args.placeholder_image.clone(),
        },
    )?;

    tracing::info!(
        names = names.len(),
        batch_size = args.batch_size,
        mode = ?args.mode,
        sink = %args.sink.sink,
        "enrich"
    );

    let runner = BatchRunner::new(
        Arc::new(enricher),
        sink,
        BatchConfig {
            batch_size: args.batch_size,
            delay: Duration::from_millis(args.delay_ms),
            mode: args.mode,
        },
    );
    let summary = runner.run(&names).await.context("run enrichment batch")?;

    tracing::info!(
        success = summary.success_count,
        errors = summary.error_count,
        skipped = summary.skipped_count,
        "enrich complete"
    );
    Ok(())
}
