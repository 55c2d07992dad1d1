use serde::Deserialize;

use crate::wiki::WikiClient;

/// Short-form page summary from the REST API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub extract: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Canonical desktop page URL; the detail document is fetched from here.
    pub page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    thumbnail: Option<Thumbnail>,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: String,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    #[serde(default)]
    desktop: Option<PlatformUrls>,
}

#[derive(Debug, Deserialize)]
struct PlatformUrls {
    #[serde(default)]
    page: Option<String>,
}

impl From<SummaryResponse> for Summary {
    fn from(response: SummaryResponse) -> Self {
        Self {
            extract: response.extract.unwrap_or_default(),
            description: response.description.filter(|d| !d.trim().is_empty()),
            thumbnail_url: response
                .thumbnail
                .map(|t| t.source)
                .filter(|s| !s.trim().is_empty()),
            page_url: response
                .content_urls
                .and_then(|urls| urls.desktop)
                .and_then(|desktop| desktop.page)
                .filter(|p| !p.trim().is_empty()),
        }
    }
}

/// One lookup against `/page/summary/{name}`. No retries; any failure is `None`.
pub async fn fetch_summary(client: &WikiClient, name: &str) -> Option<Summary> {
    let url = match client.summary_url(name) {
        Ok(url) => url,
        Err(err) => {
            tracing::warn!(name, ?err, "cannot build summary url");
            return None;
        }
    };

    match client.get_json::<SummaryResponse>(url).await {
        Ok(response) => Some(response.into()),
        Err(err) => {
            tracing::debug!(name, ?err, "summary lookup failed");
            None
        }
    }
}
