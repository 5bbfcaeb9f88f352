//! RSS and Atom feeds.
//!
//! A small pull parser over `quick-xml` that understands RSS 2.0, RSS 1.0
//! (RDF) and Atom well enough to pull out what the pipeline needs: title,
//! link, dates, summary and the channel language. Unknown elements are
//! ignored and text of nested markup (Atom `type="xhtml"`) is flattened into
//! its parent field.

use super::Fetch;
use crate::models::{DateCandidates, RawCandidate};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use std::error::Error;
use tracing::{debug, info, instrument};

/// Elements whose text is not bubbled up into their parent.
const CONTAINERS: &[&str] = &["rss", "rdf:RDF", "channel", "feed", "item", "entry"];

/// One `<item>` or `<entry>`, with raw text values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub id: String,
    pub published: String,
    pub updated: String,
    pub created: String,
    pub dc_date: String,
    pub summary: String,
    pub content: String,
}

impl FeedEntry {
    /// Link to the item, falling back to a URL-shaped id or guid.
    pub fn locator(&self) -> &str {
        if !self.link.is_empty() {
            &self.link
        } else if self.id.starts_with("http://") || self.id.starts_with("https://") {
            &self.id
        } else {
            ""
        }
    }

    /// Date strings in the shape the resolver expects.
    pub fn date_candidates(&self) -> DateCandidates {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        DateCandidates {
            published: opt(&self.published),
            updated: opt(&self.updated),
            created: opt(&self.created),
            dc_date: opt(&self.dc_date),
            ..Default::default()
        }
    }

    /// Summary, or the full content when the feed only ships that.
    pub fn body(&self) -> Option<String> {
        [&self.summary, &self.content]
            .into_iter()
            .find(|s| !s.is_empty())
            .cloned()
    }
}

/// A parsed feed document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Channel-level `<language>` / `<dc:language>`, if declared.
    pub language: Option<String>,
    pub entries: Vec<FeedEntry>,
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.as_ref() != key.as_bytes() {
            return None;
        }
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        Some(
            quick_xml::escape::unescape(&raw)
                .map(|v| v.into_owned())
                .unwrap_or(raw),
        )
    })
}

/// Atom links carry the URL in `href`; only `rel="alternate"` (or no rel)
/// points at the article itself.
fn take_atom_link(entry: &mut FeedEntry, e: &BytesStart<'_>) {
    if !entry.link.is_empty() {
        return;
    }
    let rel = attribute(e, "rel");
    if rel.as_deref().is_some_and(|r| r != "alternate") {
        return;
    }
    if let Some(href) = attribute(e, "href") {
        entry.link = href.trim().to_string();
    }
}

fn resolve_entity(name: &str) -> String {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => num.parse().ok(),
        };
        return code.and_then(char::from_u32).map(String::from).unwrap_or_default();
    }
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        // HTML entities are left for the markup cleaner.
        other => format!("&{other};"),
    }
}

fn set_once(field: &mut String, value: &str) {
    if field.is_empty() {
        *field = value.trim().to_string();
    }
}

fn assign(entry: &mut FeedEntry, name: &str, text: &str) {
    match name {
        "title" => set_once(&mut entry.title, text),
        "link" => set_once(&mut entry.link, text),
        "guid" | "id" => set_once(&mut entry.id, text),
        "pubDate" | "published" | "issued" => set_once(&mut entry.published, text),
        "updated" | "modified" | "lastBuildDate" => set_once(&mut entry.updated, text),
        "created" | "dcterms:created" => set_once(&mut entry.created, text),
        "dc:date" => set_once(&mut entry.dc_date, text),
        "description" | "summary" => set_once(&mut entry.summary, text),
        "content:encoded" | "content" => set_once(&mut entry.content, text),
        _ => {}
    }
}

/// Parse an RSS or Atom document.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    // Real feeds are often sloppy about closing tags.
    reader.config_mut().check_end_names = false;

    let mut feed = ParsedFeed::default();
    let mut current: Option<FeedEntry> = None;
    let mut stack: Vec<(String, String)> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e);
                match name.as_str() {
                    "item" | "entry" => current = Some(FeedEntry::default()),
                    "link" => {
                        if let Some(entry) = current.as_mut() {
                            take_atom_link(entry, &e);
                        }
                    }
                    _ => {}
                }
                stack.push((name, String::new()));
            }
            Event::Empty(e) => {
                if element_name(&e) == "link" {
                    if let Some(entry) = current.as_mut() {
                        take_atom_link(entry, &e);
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::GeneralRef(r) => {
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&resolve_entity(&String::from_utf8_lossy(&r)));
                }
            }
            Event::End(_) => {
                let Some((name, text)) = stack.pop() else {
                    continue;
                };
                if name == "item" || name == "entry" {
                    if let Some(entry) = current.take() {
                        feed.entries.push(entry);
                    }
                    continue;
                }
                let in_entry = stack.last().is_some_and(|(p, _)| p == "item" || p == "entry");
                match current.as_mut() {
                    Some(entry) if in_entry => assign(entry, &name, &text),
                    None if name == "language" || name == "dc:language" => {
                        let lang = text.trim();
                        if feed.language.is_none() && !lang.is_empty() {
                            feed.language = Some(lang.to_string());
                        }
                    }
                    _ => {}
                }
                if let Some((parent, parent_text)) = stack.last_mut() {
                    if !CONTAINERS.contains(&parent.as_str()) {
                        parent_text.push_str(&text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(entries = feed.entries.len(), language = ?feed.language, "Parsed feed");
    Ok(feed)
}

/// Turn parsed entries into candidates for `source`.
pub fn to_candidates(feed: ParsedFeed, source: &str, limit: usize) -> Vec<RawCandidate> {
    let language = feed.language;
    feed.entries
        .into_iter()
        .take(limit)
        .map(|entry| RawCandidate {
            title: entry.title.clone(),
            locator: entry.locator().to_string(),
            date: entry.date_candidates(),
            source: source.to_string(),
            summary: entry.body(),
            language: language.clone(),
        })
        .collect()
}

/// An RSS or Atom feed at a fixed URL.
#[derive(Debug, Clone)]
pub struct FeedSource {
    client: Client,
    name: String,
    url: String,
    limit: usize,
}

impl FeedSource {
    pub fn new(client: Client, name: &str, url: &str, limit: usize) -> Self {
        Self {
            client,
            name: name.to_string(),
            url: url.trim().to_string(),
            limit,
        }
    }
}

impl Fetch for FeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "info", skip_all, fields(source = %self.name, url = %self.url))]
    async fn fetch(&self) -> Result<Vec<RawCandidate>, Box<dyn Error>> {
        let xml = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let feed = parse_feed(&xml)?;
        let candidates = to_candidates(feed, &self.name, self.limit);
        info!(count = candidates.len(), "Parsed feed items");
        Ok(candidates)
    }
}
