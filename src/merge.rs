//! Merge of newly built records into the historical archive.
//!
//! Records are keyed by identity. For every field the stored value wins
//! unless it is empty, in which case the incoming value fills it; an empty
//! incoming value never erases anything. The date follows the configured
//! [`DatePolicy`]. No identity is ever removed.

use crate::dates;
use crate::identity;
use crate::models::Record;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Precedence between two non-empty dates for the same identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// The first date captured for an identity is kept.
    #[default]
    KeepPrevious,
    /// A non-empty date from the latest observation replaces the stored one.
    PreferIncoming,
}

/// What a merge did, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn sticky(previous: &str, incoming: &str) -> String {
    if is_blank(previous) {
        incoming.trim().to_string()
    } else {
        previous.to_string()
    }
}

/// Merge a single incoming observation into the stored version.
pub fn merge_record(previous: &Record, incoming: &Record, policy: DatePolicy) -> Record {
    let date = match policy {
        DatePolicy::PreferIncoming if !is_blank(&incoming.date) => incoming.date.trim().to_string(),
        _ => sticky(&previous.date, &incoming.date),
    };

    // A stored copy of the title is what a failed translation leaves behind;
    // a real incoming translation may replace it.
    let incoming_is_translation =
        !is_blank(&incoming.title_localized) && incoming.title_localized.trim() != incoming.title.trim();
    let title_localized = if previous.has_placebo_title() && incoming_is_translation {
        incoming.title_localized.trim().to_string()
    } else {
        sticky(&previous.title_localized, &incoming.title_localized)
    };

    Record {
        title: sticky(&previous.title, &incoming.title),
        title_localized,
        identity: sticky(&previous.identity, &incoming.identity),
        date,
        source: sticky(&previous.source, &incoming.source),
        content_localized: sticky(&previous.content_localized, &incoming.content_localized),
    }
}

/// Merge `incoming` into `existing` and return the full archive, newest first.
///
/// Identities are re-normalized on both sides so that entries stored by
/// older pipelines (with query strings or mixed-case hosts) collapse onto
/// their canonical key. Records with an empty identity are skipped.
#[instrument(level = "info", skip_all, fields(existing = existing.len(), incoming = incoming.len()))]
pub fn merge(existing: Vec<Record>, incoming: &[Record], policy: DatePolicy) -> (Vec<Record>, MergeStats) {
    let mut by_identity: BTreeMap<String, Record> = BTreeMap::new();

    for mut record in existing {
        record.identity = identity::normalize(&record.identity);
        if !record.is_persistable() {
            debug!(title = %record.title, "Skipping stored record without identity");
            continue;
        }
        let key = record.identity.clone();
        let folded = match by_identity.get(&key) {
            Some(earlier) => merge_record(earlier, &record, DatePolicy::KeepPrevious),
            None => record,
        };
        by_identity.insert(key, folded);
    }

    // Each touched identity is counted once, against its state before the batch.
    let mut before: BTreeMap<String, Option<Record>> = BTreeMap::new();
    for record in incoming {
        let key = identity::normalize(&record.identity);
        if key.is_empty() {
            continue;
        }
        let mut record = record.clone();
        record.identity = key.clone();

        let previous = by_identity.get(&key).cloned();
        before.entry(key.clone()).or_insert_with(|| previous.clone());
        let merged = merge_record(&previous.unwrap_or_default(), &record, policy);
        by_identity.insert(key, merged);
    }

    let mut stats = MergeStats::default();
    for (key, prior) in &before {
        match prior {
            None => stats.added += 1,
            Some(prior) if by_identity.get(key) == Some(prior) => stats.unchanged += 1,
            Some(_) => stats.updated += 1,
        }
    }

    let mut records: Vec<Record> = by_identity.into_values().collect();
    // Stable sort over identity order keeps ties deterministic.
    records.sort_by_cached_key(|r| Reverse(dates::sort_key(&r.date)));

    debug!(?stats, total = records.len(), "Merge complete");
    (records, stats)
}
