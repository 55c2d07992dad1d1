use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct StubPerson {
    pub name: String,
    pub birth_date: Option<String>,
    pub description: String,
    pub pronoun: String,
    /// Paragraph characters inside `#mw-content-text`, driving the popularity score.
    pub body_chars: usize,
}

impl StubPerson {
    pub fn new(name: &str, birth_date: Option<&str>, description: &str, pronoun: &str) -> Self {
        Self {
            name: name.to_owned(),
            birth_date: birth_date.map(str::to_owned),
            description: description.to_owned(),
            pronoun: pronoun.to_owned(),
            body_chars: 20_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WikiStubConfig {
    pub people: Vec<StubPerson>,
    /// Category title -> member titles, one inner vec per listing page.
    pub categories: HashMap<String, Vec<Vec<String>>>,
    /// Page title -> link titles, one inner vec per listing page.
    pub links: HashMap<String, Vec<Vec<String>>>,
    /// Listing title -> zero-based page index answered with HTTP 500.
    pub failing_pages: HashMap<String, usize>,
}

pub struct WikiStub {
    pub base_url: String,
    pub api_requests: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl WikiStub {
    pub fn spawn(config: WikiStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start wiki stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let api_requests = Arc::new(AtomicUsize::new(0));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let counter = Arc::clone(&api_requests);
        let page_base = base_url.clone();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let raw_url = request.url().to_string();
                let (status, content_type, body) = if let Some(name) =
                    raw_url.strip_prefix("/api/rest_v1/page/summary/")
                {
                    summary_response(&config, &page_base, &decode_segment(name))
                } else if let Some(title) = raw_url.strip_prefix("/wiki/") {
                    article_response(&config, &decode_segment(title).replace('_', " "))
                } else if raw_url.starts_with("/w/api.php") {
                    counter.fetch_add(1, Ordering::SeqCst);
                    api_response(&config, &raw_url)
                } else {
                    (404, "text/plain", "not found".to_owned())
                };

                let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes())
                    .expect("build header");
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            api_requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn rest_base(&self) -> String {
        format!("{}/api/rest_v1", self.base_url)
    }

    pub fn api_base(&self) -> String {
        format!("{}/w/api.php", self.base_url)
    }

    pub fn api_request_count(&self) -> usize {
        self.api_requests.load(Ordering::SeqCst)
    }
}

impl Drop for WikiStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn decode_segment(raw: &str) -> String {
    raw.replace("%20", " ")
}

fn summary_response(
    config: &WikiStubConfig,
    base_url: &str,
    name: &str,
) -> (u16, &'static str, String) {
    let Some(person) = config.people.iter().find(|p| p.name == name) else {
        let body = json!({"type": "not_found", "title": "Not found."});
        return (404, "application/json", body.to_string());
    };

    let body = json!({
        "title": person.name,
        "extract": format!(
            "{} is a well known figure. {} has appeared in many productions.",
            person.name, person.pronoun
        ),
        "description": person.description,
        "content_urls": {
            "desktop": {"page": format!("{base_url}/wiki/{}", person.name.replace(' ', "_"))}
        }
    });
    (200, "application/json", body.to_string())
}

fn article_response(config: &WikiStubConfig, title: &str) -> (u16, &'static str, String) {
    let Some(person) = config.people.iter().find(|p| p.name == title) else {
        return (404, "text/html", "<html><body>missing</body></html>".to_owned());
    };

    let born = match person.birth_date.as_deref() {
        Some(date) => format!(
            r#"<span style="display:none">(<span class="bday">{date}</span>)</span>
               <div class="birthplace">Springfield, U.S.</div>"#
        ),
        None => r#"<div class="birthplace">Springfield, U.S.</div>"#.to_owned(),
    };
    let filler = "x".repeat(person.body_chars);
    let html = format!(
        r#"<!doctype html><html><body><div id="mw-content-text">
<table class="infobox"><tbody>
<tr><th class="infobox-label">Born</th><td class="infobox-data">{born}</td></tr>
<tr><th class="infobox-label">Occupation</th><td class="infobox-data">Actor, Producer, Director</td></tr>
<tr><th class="infobox-label">Years active</th><td class="infobox-data">1990–present</td></tr>
</tbody></table>
<p>{filler}</p>
</div></body></html>"#
    );
    (200, "text/html; charset=utf-8", html)
}

fn api_response(config: &WikiStubConfig, raw_url: &str) -> (u16, &'static str, String) {
    let Ok(url) = url::Url::parse(&format!("http://stub{raw_url}")) else {
        return (400, "text/plain", "bad url".to_owned());
    };
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    let (title, token_key, wrap): (String, &str, fn(&[String]) -> Value) =
        if params.get("list").map(String::as_str) == Some("categorymembers") {
            let title = params.get("cmtitle").cloned().unwrap_or_default();
            (title, "cmcontinue", category_query)
        } else if params.get("prop").map(String::as_str) == Some("links") {
            let title = params.get("titles").cloned().unwrap_or_default();
            (title, "plcontinue", links_query)
        } else {
            return (400, "application/json", json!({"error": "unsupported"}).to_string());
        };

    let pages = if token_key == "cmcontinue" {
        config.categories.get(&title)
    } else {
        config.links.get(&title)
    };
    let Some(pages) = pages else {
        return (200, "application/json", json!({"batchcomplete": true, "query": wrap(&[])}).to_string());
    };

    let index: usize = params
        .get(token_key)
        .and_then(|token| token.parse().ok())
        .unwrap_or(0);
    if config.failing_pages.get(&title) == Some(&index) {
        return (500, "application/json", json!({"error": "internal"}).to_string());
    }
    let Some(page) = pages.get(index) else {
        return (500, "application/json", json!({"error": "bad continuation"}).to_string());
    };

    let mut body = json!({"query": wrap(page)});
    if index + 1 < pages.len() {
        let mut continuation = serde_json::Map::new();
        continuation.insert(token_key.to_owned(), json!((index + 1).to_string()));
        continuation.insert("continue".to_owned(), json!("-||"));
        body["continue"] = Value::Object(continuation);
    } else {
        body["batchcomplete"] = json!(true);
    }
    (200, "application/json", body.to_string())
}

fn titled(titles: &[String]) -> Vec<Value> {
    titles.iter().map(|t| json!({"ns": 0, "title": t})).collect()
}

fn category_query(titles: &[String]) -> Value {
    json!({"categorymembers": titled(titles)})
}

fn links_query(titles: &[String]) -> Value {
    json!({"pages": [{"pageid": 1, "title": "stub", "links": titled(titles)}]})
}
