use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::formats::{AdditionalData, AttributeValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Details {
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub full_name: Option<String>,
    pub birth_place: Option<String>,
    pub occupations: Vec<String>,
    pub organizations: Vec<String>,
    pub additional_data: AdditionalData,
    /// Character count of the main content region.
    pub content_length: usize,
}

struct InfoboxSelectors {
    infobox: Selector,
    row: Selector,
    label: Selector,
    data: Selector,
    bday: Selector,
    dday: Selector,
    hidden_span: Selector,
    birthplace: Selector,
    nickname: Selector,
    list_item: Selector,
    anchor: Selector,
    plain_or_hlist: Selector,
    organization_anchor: Selector,
    content: Selector,
}

impl InfoboxSelectors {
    fn new() -> Self {
        Self {
            infobox: Selector::parse(".infobox").expect("infobox selector"),
            row: Selector::parse("tr").expect("row selector"),
            label: Selector::parse(".infobox-label").expect("label selector"),
            data: Selector::parse(".infobox-data").expect("data selector"),
            bday: Selector::parse(".bday").expect("bday selector"),
            dday: Selector::parse(".dday").expect("dday selector"),
            hidden_span: Selector::parse(
                r#"span[style*="display:none"], span[style*="display: none"]"#,
            )
            .expect("hidden span selector"),
            birthplace: Selector::parse(".birthplace").expect("birthplace selector"),
            nickname: Selector::parse(".nickname").expect("nickname selector"),
            list_item: Selector::parse("li").expect("list item selector"),
            anchor: Selector::parse("a").expect("anchor selector"),
            plain_or_hlist: Selector::parse(".plainlist, .hlist").expect("plainlist selector"),
            organization_anchor: Selector::parse(
                r#"a[href*="team"], a[href*="club"], a[href*="organization"]"#,
            )
            .expect("organization anchor selector"),
            content: Selector::parse("#mw-content-text").expect("content selector"),
        }
    }
}

static SELECTORS: LazyLock<InfoboxSelectors> = LazyLock::new(InfoboxSelectors::new);

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("iso date regex"));

/// Parses an article document. Never fails: a document without an infobox
/// yields empty fields.
pub fn parse_details(html: &str) -> Details {
    let document = Html::parse_document(html);
    let selectors = &*SELECTORS;
    let mut details = Details::default();

    if let Some(infobox) = document.select(&selectors.infobox).next() {
        for row in infobox.select(&selectors.row) {
            parse_row(row, selectors, &mut details);
        }
    }

    for anchor in document.select(&selectors.organization_anchor) {
        let text = clean_text(anchor);
        if !text.is_empty() && !details.organizations.contains(&text) {
            details.organizations.push(text);
        }
    }

    details.content_length = document
        .select(&selectors.content)
        .next()
        .map(|content| content.text().map(|piece| piece.chars().count()).sum::<usize>())
        .unwrap_or(0);

    details
}

fn parse_row(row: ElementRef<'_>, selectors: &InfoboxSelectors, details: &mut Details) {
    let Some(label) = row.select(&selectors.label).next() else {
        return;
    };
    let Some(data) = row.select(&selectors.data).next() else {
        return;
    };
    let label = clean_text(label).to_lowercase();
    if label.is_empty() {
        return;
    }

    if label.contains("born") {
        details.birth_date = data
            .select(&selectors.bday)
            .next()
            .and_then(|bday| parse_iso_date(&bday.text().collect::<String>()));
        if let Some(place) = first_clean_text(data, &selectors.birthplace) {
            details.birth_place = Some(place);
        }
        if let Some(name) = first_clean_text(data, &selectors.nickname) {
            details.full_name = Some(name);
        }
    } else if label.contains("died") {
        details.death_date = data
            .select(&selectors.dday)
            .chain(data.select(&selectors.hidden_span))
            .find_map(|span| parse_iso_date(&span.text().collect::<String>()));
    } else if label.contains("occupation") {
        details.occupations = list_or_split(data, selectors);
    } else if label.contains("organization") || label.contains("employer") {
        for organization in list_or_split(data, selectors) {
            if !details.organizations.contains(&organization) {
                details.organizations.push(organization);
            }
        }
    } else {
        if label == "birth name" && details.full_name.is_none() {
            details.full_name = Some(clean_text(data)).filter(|name| !name.is_empty());
        }
        if let Some(value) = generic_value(data, selectors).non_empty() {
            details.additional_data.insert(attribute_key(&label), value);
        }
    }
}

/// Finds the first `YYYY-MM-DD` token in `text`.
fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let token = ISO_DATE.find(text)?;
    NaiveDate::parse_from_str(token.as_str(), "%Y-%m-%d").ok()
}

fn first_clean_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(clean_text)
        .filter(|text| !text.is_empty())
}

fn cleaned_items(element: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    element
        .select(selector)
        .map(clean_text)
        .filter(|text| !text.is_empty())
        .collect()
}

fn split_on_commas(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

/// List items, then anchors, then the comma-split cell text.
fn list_or_split(data: ElementRef<'_>, selectors: &InfoboxSelectors) -> Vec<String> {
    let items = cleaned_items(data, &selectors.list_item);
    if !items.is_empty() {
        return items;
    }
    let anchors = cleaned_items(data, &selectors.anchor);
    if !anchors.is_empty() {
        return anchors;
    }
    split_on_commas(&clean_text(data))
}

/// Value shape for rows without dedicated handling.
///
/// Plain text containing a comma becomes a list even when it is prose; callers
/// cannot tell the two apart.
fn generic_value(data: ElementRef<'_>, selectors: &InfoboxSelectors) -> AttributeValue {
    let items = cleaned_items(data, &selectors.list_item);
    if !items.is_empty() {
        return AttributeValue::List(items);
    }

    let text = clean_text(data);
    if data.select(&selectors.plain_or_hlist).next().is_some() {
        if text.is_empty() {
            return AttributeValue::List(Vec::new());
        }
        return AttributeValue::List(vec![text]);
    }
    if text.contains(',') {
        return AttributeValue::List(split_on_commas(&text));
    }
    AttributeValue::Text(text)
}

fn attribute_key(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Visible text of `element`: `style` children skipped, zero-width spaces
/// dropped, whitespace collapsed, trimmed.
pub fn clean_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.replace('\u{200B}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "style" => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}
