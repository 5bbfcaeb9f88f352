//! Data models for candidates observed at the sources and the records we store.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawCandidate`]: an unvalidated item handed over by a fetcher
//! - [`DateCandidates`]: every date-like value a fetcher could find for an item
//! - [`Record`]: the normalized, localized entry persisted in the archive
//! - [`StoredRecord`]: the permissive shape used to read historical documents
//!
//! The archive's JSON keys are fixed (`title`, `title_es`, `url`, `date`,
//! `source`, `content_es`) because the website reads them directly.

use crate::dates;
use crate::identity;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Date-like values found for a single item, in no particular shape.
///
/// Structured timestamps come from sources that expose typed values (the
/// arXiv API); the string fields carry whatever a feed published. See
/// [`dates::resolve`] for the order in which they are tried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateCandidates {
    pub published_at: Option<DateTime<FixedOffset>>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub created: Option<String>,
    pub dc_date: Option<String>,
}

/// A raw item as observed at a source, before any normalization.
#[derive(Debug, Clone, Default)]
pub struct RawCandidate {
    /// Headline as published; may be empty.
    pub title: String,
    /// Link to the item; may be relative, malformed or empty.
    pub locator: String,
    /// Every date-like value the fetcher found.
    pub date: DateCandidates,
    /// Provenance label of the source that produced the item.
    pub source: String,
    /// Summary or body, possibly HTML.
    pub summary: Option<String>,
    /// Language declared by the source (e.g. RSS `<language>`), if any.
    pub language: Option<String>,
}

/// A normalized archive entry.
///
/// Serialized with the archive's fixed key names. Deserialization goes
/// through [`StoredRecord`] so that documents written by older pipelines
/// still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct Record {
    pub title: String,
    #[serde(rename = "title_es")]
    pub title_localized: String,
    #[serde(rename = "url")]
    pub identity: String,
    /// `YYYY-MM-DD`, or empty when unknown.
    pub date: String,
    pub source: String,
    #[serde(rename = "content_es")]
    pub content_localized: String,
}

impl Record {
    /// Whether this record may be written to the archive.
    pub fn is_persistable(&self) -> bool {
        !self.identity.trim().is_empty()
    }

    /// Whether `title_localized` is just a copy of `title`, which is what a
    /// fail-open translation leaves behind.
    pub fn has_placebo_title(&self) -> bool {
        let title = self.title.trim();
        !title.is_empty() && self.title_localized.trim() == title
    }
}

/// Permissive reading shape for historical archive entries.
///
/// Each legacy key that some earlier pipeline used is accepted; the
/// conversion into [`Record`] picks the first non-empty value per field.
#[derive(Debug, Default, Deserialize)]
pub struct StoredRecord {
    title: Option<String>,
    title_en: Option<String>,
    title_es: Option<String>,
    url: Option<String>,
    link: Option<String>,
    source_url: Option<String>,
    date: Option<String>,
    published: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "isoDate")]
    iso_date: Option<String>,
    source: Option<String>,
    content_es: Option<String>,
    summary_es: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    content_en: Option<String>,
    content: Option<String>,
}

fn first_non_empty(values: &[&Option<String>]) -> String {
    values
        .iter()
        .filter_map(|v| v.as_deref())
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string()
}

impl From<StoredRecord> for Record {
    fn from(s: StoredRecord) -> Self {
        let title = first_non_empty(&[&s.title, &s.title_en]);
        let title_localized = match first_non_empty(&[&s.title_es]) {
            t if t.is_empty() => title.clone(),
            t => t,
        };
        let identity = identity::normalize(&first_non_empty(&[&s.url, &s.link, &s.source_url]));
        let raw_date = first_non_empty(&[&s.date, &s.published, &s.pub_date, &s.iso_date]);
        let date = if raw_date.is_empty() {
            String::new()
        } else {
            let resolved = dates::parse_date_str(&raw_date)
                .map(|d| d.to_string())
                .unwrap_or_default();
            if resolved.is_empty() {
                tracing::debug!(%identity, %raw_date, "Stored date is unparsable; treating as unknown");
            }
            resolved
        };
        let content_keys = [
            &s.content_es,
            &s.summary_es,
            &s.summary,
            &s.description,
            &s.content_en,
            &s.content,
        ];
        // Only documents without any body key get the title as content; an
        // explicit "" stays empty so a later observation can fill it.
        let content_localized = if content_keys.iter().all(|c| c.is_none()) {
            title.clone()
        } else {
            first_non_empty(&content_keys)
        };

        Record {
            title,
            title_localized,
            identity,
            date,
            source: first_non_empty(&[&s.source]),
            content_localized,
        }
    }
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub candidates: usize,
    pub dropped: usize,
    pub built: usize,
    pub stored: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization_uses_archive_keys() {
        let record = Record {
            title: "Black holes".to_string(),
            title_localized: "Agujeros negros".to_string(),
            identity: "https://x.org/a".to_string(),
            date: "2024-01-01".to_string(),
            source: "Nature".to_string(),
            content_localized: "Resumen".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["title_es"], "Agujeros negros");
        assert_eq!(json["url"], "https://x.org/a");
        assert_eq!(json["content_es"], "Resumen");
        assert!(json.get("identity").is_none());
    }

    #[test]
    fn test_record_deserialization_canonical() {
        let json = r#"{
            "title": "T",
            "title_es": "T es",
            "url": "https://x.org/a",
            "date": "2024-01-01",
            "source": "Feeds",
            "content_es": "filled"
        }"#;

        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.identity, "https://x.org/a");
        assert_eq!(record.title_localized, "T es");
        assert_eq!(record.content_localized, "filled");
        assert_eq!(record.date, "2024-01-01");
    }

    #[test]
    fn test_legacy_fields_are_mapped() {
        let json = r#"{
            "title_en": "Quantum dots",
            "source_url": "HTTPS://ARXIV.ORG/abs/1234?v=2",
            "published": "2024-03-05T10:00:00.000Z",
            "summary": "A summary",
            "source": "arXiv",
            "tags": ["physics"]
        }"#;

        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.title, "Quantum dots");
        assert_eq!(record.title_localized, "Quantum dots");
        assert_eq!(record.identity, "https://arxiv.org/abs/1234");
        assert_eq!(record.date, "2024-03-05");
        assert_eq!(record.content_localized, "A summary");
    }

    #[test]
    fn test_legacy_content_falls_back_to_title() {
        let json = r#"{"title": "Only a title", "url": "https://x.org/b", "date": null}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.content_localized, "Only a title");
        assert_eq!(record.date, "");
    }

    #[test]
    fn test_explicit_empty_content_stays_empty() {
        let json = r#"{"title": "T", "url": "https://x.org/d", "content_es": "", "summary": null}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.content_localized, "");
    }

    #[test]
    fn test_unparsable_stored_date_is_unknown() {
        let json = r#"{"title": "T", "url": "https://x.org/c", "date": "sometime soon"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.date, "");
    }

    #[test]
    fn test_placebo_title() {
        let mut record = Record {
            title: "Same".to_string(),
            title_localized: "Same".to_string(),
            ..Default::default()
        };
        assert!(record.has_placebo_title());
        record.title_localized = "Igual".to_string();
        assert!(!record.has_placebo_title());
    }

    #[test]
    fn test_empty_identity_is_not_persistable() {
        let record = Record::default();
        assert!(!record.is_persistable());
    }
}
