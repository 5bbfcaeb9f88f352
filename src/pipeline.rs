//! The ingestion run and the archive backfill.
//!
//! A run is strictly sequential:
//!
//! 1. **Load** the current archive (a malformed archive aborts before any
//!    network traffic)
//! 2. **Fetch** every configured source
//! 3. **Build** records from the candidates
//! 4. **Merge** them into the archive
//! 5. **Persist** backup, daily snapshot and final document
//!
//! Nothing is written until step 5, so a run either leaves the archive
//! untouched or advances it.

use crate::builder;
use crate::config::PipelineConfig;
use crate::merge;
use crate::models::{Record, RunSummary};
use crate::sources::{Fetch, fetch_all};
use crate::store::{self, StoreLayout};
use crate::translate::{RateLimited, Translate, translate_unless_throttled};
use chrono::{DateTime, Local};
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Run one ingestion pass over `sources`.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn run<F: Fetch, T: Translate>(
    sources: &[F],
    translator: &T,
    config: &PipelineConfig,
    layout: &StoreLayout,
    now: DateTime<Local>,
) -> Result<RunSummary, Box<dyn Error>> {
    let existing = store::load(&layout.final_path).await?;

    let candidates = fetch_all(sources).await;
    let policy = config.localization();

    let t0 = Instant::now();
    let mut built: Vec<Record> = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        if let Some(record) = builder::build(candidate, &policy, translator).await {
            built.push(record);
        }
    }
    let dropped = candidates.len() - built.len();
    info!(
        built = built.len(),
        dropped,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Built records"
    );

    let (merged, stats) = merge::merge(existing, &built, config.date_policy);
    info!(
        added = stats.added,
        updated = stats.updated,
        unchanged = stats.unchanged,
        total = merged.len(),
        "Merged into archive"
    );

    store::persist(layout, &built, &merged, now).await?;

    Ok(RunSummary {
        candidates: candidates.len(),
        dropped,
        built: built.len(),
        stored: merged.len(),
    })
}

fn needs_backfill(record: &Record) -> bool {
    record.title_localized.trim().is_empty()
        || record.has_placebo_title()
        || record.content_localized.trim().is_empty()
}

/// Fill the missing localized fields of one record.
async fn backfill_record<T: Translate>(
    translator: &T,
    record: &Record,
    target_lang: &str,
) -> Result<Record, RateLimited> {
    let title = record.title.trim().to_string();
    let mut updated = record.clone();
    if record.title_localized.trim().is_empty() || record.has_placebo_title() {
        let translated = translate_unless_throttled(translator, &title, target_lang).await?;
        if !translated.is_empty() && (translated != title || record.title_localized.trim().is_empty()) {
            updated.title_localized = translated;
        }
    }
    if record.content_localized.trim().is_empty() {
        let translated = translate_unless_throttled(translator, &title, target_lang).await?;
        if !translated.is_empty() {
            updated.content_localized = translated;
        }
    }
    Ok(updated)
}

/// Retranslate stored records whose localized fields are missing or are
/// untranslated copies of the title.
///
/// At most `limit` records are attempted, with `pause` between them. Fields
/// are only filled: a translation that fails open leaves the record as it
/// was. A rate-limited backend ends the pass early; whatever was filled
/// before that is still saved. Dates, identities and order are untouched.
/// Returns the number of records that changed; the archive is rewritten only
/// when that is non-zero.
#[instrument(level = "info", skip_all, fields(limit = limit, pause_ms = pause.as_millis() as u64))]
pub async fn backfill<T: Translate>(
    translator: &T,
    config: &PipelineConfig,
    layout: &StoreLayout,
    limit: usize,
    pause: Duration,
    now: DateTime<Local>,
) -> Result<usize, Box<dyn Error>> {
    let mut records = store::load(&layout.final_path).await?;
    let policy = config.localization();

    let mut attempted = 0usize;
    let mut changed = 0usize;
    for record in records.iter_mut() {
        if attempted >= limit {
            break;
        }
        if policy.native_sources.contains(record.source.trim()) || !needs_backfill(record) {
            continue;
        }
        if attempted > 0 && !pause.is_zero() {
            sleep(pause).await;
        }
        attempted += 1;

        let updated = match backfill_record(translator, record, &policy.target_lang).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(error = %e, attempted, changed, "Stopping backfill");
                break;
            }
        };
        if updated != *record {
            debug!(identity = %record.identity, "Backfilled record");
            *record = updated;
            changed += 1;
        }
    }

    info!(attempted, changed, "Backfill complete");
    if changed > 0 {
        store::rewrite(layout, &records, now).await?;
    }
    Ok(changed)
}
