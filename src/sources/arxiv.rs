//! arXiv API source.
//!
//! Queries the arXiv export API, which answers with an Atom feed sorted by
//! submission date. Unlike plain feeds, arXiv timestamps are always RFC 3339,
//! so they are handed to the date resolver already parsed.

use super::Fetch;
use super::feed::{FeedEntry, parse_feed};
use crate::models::RawCandidate;
use chrono::DateTime;
use reqwest::Client;
use std::error::Error;
use tracing::{info, instrument};

pub const DEFAULT_QUERY: &str = "cat:cs.AI";

const API_URL: &str = "http://export.arxiv.org/api/query";

#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Client,
    name: String,
    query: String,
    limit: usize,
}

impl ArxivSource {
    pub fn new(client: Client, name: &str, query: &str, limit: usize) -> Self {
        Self {
            client,
            name: name.to_string(),
            query: query.to_string(),
            limit,
        }
    }
}

fn to_candidate(entry: FeedEntry, source: &str) -> RawCandidate {
    let mut date = entry.date_candidates();
    date.published_at = DateTime::parse_from_rfc3339(&entry.published).ok();
    date.updated_at = DateTime::parse_from_rfc3339(&entry.updated).ok();

    // arXiv titles and abstracts are hard-wrapped.
    let title = entry.title.split_whitespace().collect::<Vec<_>>().join(" ");
    RawCandidate {
        title,
        locator: entry.locator().to_string(),
        date,
        source: source.to_string(),
        summary: entry.body(),
        language: Some("en".to_string()),
    }
}

/// Parse an arXiv API response.
pub fn parse_response(xml: &str, source: &str, limit: usize) -> Result<Vec<RawCandidate>, Box<dyn Error>> {
    let feed = parse_feed(xml)?;
    Ok(feed
        .entries
        .into_iter()
        .take(limit)
        .map(|entry| to_candidate(entry, source))
        .collect())
}

impl Fetch for ArxivSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "info", skip_all, fields(source = %self.name, query = %self.query))]
    async fn fetch(&self) -> Result<Vec<RawCandidate>, Box<dyn Error>> {
        let max_results = self.limit.to_string();
        let xml = self
            .client
            .get(API_URL)
            .query(&[
                ("search_query", self.query.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
                ("max_results", max_results.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let candidates = parse_response(&xml, &self.name, self.limit)?;
        info!(count = candidates.len(), "Parsed arXiv entries");
        Ok(candidates)
    }
}
