//! Turns raw candidates into archive records.
//!
//! Each candidate is trimmed, its link normalized into an identity, its date
//! resolved and its body stripped of markup. Text from sources that already
//! publish in the target language is copied as-is; everything else goes
//! through the fail-open translator.

use crate::dates;
use crate::identity;
use crate::models::{RawCandidate, Record};
use crate::translate::{Translate, translate_or_original};
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Which candidates skip translation, and into which language the rest go.
#[derive(Debug, Clone)]
pub struct LocalizationPolicy {
    /// ISO 639-1 target language, e.g. `"es"`.
    pub target_lang: String,
    /// Sources that already publish in the target language.
    pub native_sources: HashSet<String>,
}

impl LocalizationPolicy {
    /// Whether the candidate is already in the target language, either
    /// because its source is listed as native or because the feed declares
    /// the target language (`es`, `es-ES`, ...).
    pub fn is_native(&self, candidate: &RawCandidate) -> bool {
        if self.native_sources.contains(candidate.source.trim()) {
            return true;
        }
        candidate
            .language
            .as_deref()
            .map(|lang| {
                let primary = lang.trim().split(['-', '_']).next().unwrap_or_default();
                primary.eq_ignore_ascii_case(&self.target_lang)
            })
            .unwrap_or(false)
    }
}

/// Strip markup and collapse whitespace.
///
/// Plain text passes through unchanged apart from whitespace collapsing and
/// entity decoding.
pub fn clean_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a record from a candidate.
///
/// Returns `None` when the candidate has no usable identity or no title; no
/// translation is attempted for such candidates.
#[instrument(level = "debug", skip_all, fields(source = %candidate.source))]
pub async fn build<T: Translate>(
    candidate: &RawCandidate,
    policy: &LocalizationPolicy,
    translator: &T,
) -> Option<Record> {
    let identity = identity::normalize(&candidate.locator);
    let title = candidate.title.split_whitespace().collect::<Vec<_>>().join(" ");
    if identity.is_empty() || title.is_empty() {
        debug!(locator = %candidate.locator, "Dropping candidate without identity or title");
        return None;
    }

    let date = dates::resolve(&candidate.date);
    let source = candidate.source.trim().to_string();
    let body = clean_text(candidate.summary.as_deref().unwrap_or_default());
    let content_seed = if body.is_empty() { title.clone() } else { body };

    let (title_localized, content_localized) = if policy.is_native(candidate) {
        (title.clone(), content_seed)
    } else {
        let t = translate_or_original(translator, &title, &policy.target_lang).await;
        let c = translate_or_original(translator, &content_seed, &policy.target_lang).await;
        (
            if t.is_empty() { title.clone() } else { t },
            if c.is_empty() { content_seed } else { c },
        )
    };

    Some(Record {
        title,
        title_localized,
        identity,
        date,
        source,
        content_localized,
    })
}
