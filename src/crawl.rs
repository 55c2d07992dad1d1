use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use crate::cli::CrawlArgs;
use crate::wiki::{WikiClient, WikiConfig};

/// Title words that mark a page as something other than a person.
const DENYLIST: &[&str] = &[
    "list",
    "lists",
    "film",
    "films",
    "award",
    "awards",
    "company",
    "companies",
    "series",
    "album",
    "song",
    "discography",
    "filmography",
    "television",
    "festival",
    "episode",
];

#[derive(Debug, Clone, Copy)]
pub struct CrawlLimits {
    /// Listing requests per category or page.
    pub max_pages: usize,
    pub page_size: usize,
    /// Sleep between listing requests.
    pub delay: Duration,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_pages: 10,
            page_size: 500,
            delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default, rename = "continue")]
    continuation: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    query: Option<ListQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    categorymembers: Vec<Titled>,
    #[serde(default)]
    pages: Vec<LinkedPage>,
}

#[derive(Debug, Deserialize)]
struct Titled {
    title: String,
}

#[derive(Debug, Deserialize)]
struct LinkedPage {
    #[serde(default)]
    links: Vec<Titled>,
}

/// Titles of every member of `category`, across continuation pages.
pub async fn list_category_members(
    client: &WikiClient,
    category: &str,
    limits: CrawlLimits,
) -> Vec<String> {
    let page_size = limits.page_size.to_string();
    let params = [
        ("action", "query"),
        ("list", "categorymembers"),
        ("cmtitle", category),
        ("cmlimit", page_size.as_str()),
        ("formatversion", "2"),
    ];
    paginate(client, &params, "cmcontinue", limits, |query| {
        query
            .categorymembers
            .into_iter()
            .map(|member| member.title)
            .collect()
    })
    .await
}

/// Outgoing article links of `title` that look like people.
pub async fn list_page_links(client: &WikiClient, title: &str, limits: CrawlLimits) -> Vec<String> {
    let page_size = limits.page_size.to_string();
    let params = [
        ("action", "query"),
        ("prop", "links"),
        ("titles", title),
        ("pllimit", page_size.as_str()),
        ("formatversion", "2"),
    ];
    paginate(client, &params, "plcontinue", limits, |query| {
        query
            .pages
            .into_iter()
            .flat_map(|page| page.links)
            .map(|link| link.title)
            .filter(|title| is_candidate_title(title))
            .collect()
    })
    .await
}

/// Follows `continue.<token_key>` until it disappears or `max_pages` requests
/// were made. A failed request ends pagination with what was collected.
async fn paginate(
    client: &WikiClient,
    params: &[(&str, &str)],
    token_key: &str,
    limits: CrawlLimits,
    extract: impl Fn(ListQuery) -> Vec<String>,
) -> Vec<String> {
    let mut titles = Vec::new();
    let mut token: Option<String> = None;

    for request_index in 0..limits.max_pages {
        if request_index > 0 && !limits.delay.is_zero() {
            tokio::time::sleep(limits.delay).await;
        }

        let mut request_params = params.to_vec();
        if let Some(token) = token.as_deref() {
            request_params.push((token_key, token));
        }
        let url = client.api_url(&request_params);

        let response = match client.get_json::<ListResponse>(url).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    err = %format!("{err:#}"),
                    collected = titles.len(),
                    "listing request failed; keeping partial result"
                );
                break;
            }
        };

        let page_titles = extract(response.query.unwrap_or_default());
        tracing::info!(
            page = request_index + 1,
            titles = page_titles.len(),
            "crawl: listing page"
        );
        titles.extend(page_titles);

        token = response
            .continuation
            .as_ref()
            .and_then(|cont| cont.get(token_key))
            .and_then(|value| value.as_str())
            .map(str::to_owned);
        if token.is_none() {
            break;
        }
    }

    titles
}

/// Rejects namespaced titles and titles with a denylisted word.
pub fn is_candidate_title(title: &str) -> bool {
    if title.trim().is_empty() || title.contains(':') {
        return false;
    }
    let lower = title.to_lowercase();
    !lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| DENYLIST.contains(&word))
}

pub async fn run(args: CrawlArgs) -> anyhow::Result<()> {
    let out = Path::new(&args.out);
    if out.exists() {
        anyhow::bail!("output already exists: {}", out.display());
    }

    let client = WikiClient::new(WikiConfig::from_args(&args.wiki)?)?;
    let limits = CrawlLimits {
        max_pages: args.max_pages.max(1),
        page_size: args.page_size.max(1),
        delay: Duration::from_millis(args.delay_ms),
    };

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for category in &args.categories {
        let members = list_category_members(&client, category, limits).await;
        tracing::info!(%category, members = members.len(), "crawl: category listed");

        let candidates = if args.direct {
            members
                .into_iter()
                .filter(|title| is_candidate_title(title))
                .collect::<Vec<_>>()
        } else {
            let mut expanded = Vec::new();
            for member in &members {
                let links = list_page_links(&client, member, limits).await;
                tracing::debug!(%member, links = links.len(), "crawl: page expanded");
                expanded.extend(links);
            }
            expanded
        };

        for name in candidates {
            if seen.insert(name.clone()) {
                names.push(name);
            }
        }
    }

    crate::formats::write_json_new(out, &names).context("write candidate names")?;
    tracing::info!(names = names.len(), out = %out.display(), "crawl complete");
    Ok(())
}
