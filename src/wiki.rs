use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::cli::WikiArgs;
use crate::infobox::{Details, parse_details};
use crate::summary::{Summary, fetch_summary};

#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub rest_base: Url,
    pub api_base: Url,
    pub timeout: Duration,
    pub user_agent: String,
}

impl WikiConfig {
    pub fn from_args(args: &WikiArgs) -> anyhow::Result<Self> {
        Ok(Self {
            rest_base: parse_http_url(&args.rest_base).context("parse --rest-base")?,
            api_base: parse_http_url(&args.api_base).context("parse --api-base")?,
            timeout: Duration::from_secs(args.timeout_secs.max(1)),
            user_agent: args.user_agent.clone(),
        })
    }
}

fn parse_http_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("url must be http/https: {url}");
    }
    Ok(url)
}

/// Where the enricher gets its inputs from. `WikiClient` talks to Wikipedia;
/// tests substitute canned data.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// `None` when the subject cannot be resolved.
    async fn summary(&self, name: &str) -> Option<Summary>;

    /// Parsed detail page. Fetch failures yield `Details::default()`.
    async fn details(&self, page_url: &str) -> Details;
}

#[derive(Debug, Clone)]
pub struct WikiClient {
    http: reqwest::Client,
    config: WikiConfig,
}

impl WikiClient {
    pub fn new(config: WikiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build wikipedia http client")?;
        Ok(Self { http, config })
    }

    pub fn summary_url(&self, name: &str) -> anyhow::Result<Url> {
        let mut url = self.config.rest_base.clone();
        if url.cannot_be_a_base() {
            anyhow::bail!("rest base cannot be a base url: {url}");
        }
        url.path_segments_mut()
            .map_err(|()| anyhow::anyhow!("rest base cannot be a base url"))?
            .pop_if_empty()
            .extend(["page", "summary", name]);
        Ok(url)
    }

    pub fn api_url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.config.api_base.clone();
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("format", "json");
        url
    }

    /// GETs `url` and decodes the body as JSON. Non-2xx statuses are errors.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url}: http status {status}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("decode json from {url}"))
    }

    pub async fn get_html(&self, url: &str) -> anyhow::Result<String> {
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url}: http status {status}");
        }

        response
            .text()
            .await
            .with_context(|| format!("read body from {url}"))
    }
}

#[async_trait]
impl PageSource for WikiClient {
    async fn summary(&self, name: &str) -> Option<Summary> {
        fetch_summary(self, name).await
    }

    async fn details(&self, page_url: &str) -> Details {
        match self.get_html(page_url).await {
            Ok(html) => parse_details(&html),
            Err(err) => {
                tracing::warn!(page_url, ?err, "detail page fetch failed");
                Details::default()
            }
        }
    }
}
