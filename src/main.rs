//! # CurioScience ingest
//!
//! Incremental ingestion for a science-news site. Each run pulls recent items
//! from preprint APIs, RSS/Atom feeds and HTML listing pages, translates what
//! is not already in the site's language, and merges the result into a
//! single JSON archive that only ever grows.
//!
//! ## Usage
//!
//! ```sh
//! curioscience_ingest                      # daily run, built-in sources
//! curioscience_ingest -c sources.yaml      # custom sources
//! curioscience_ingest backfill --limit 50  # retranslate stored records
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: every configured source, one at a time; failures are isolated
//! 2. **Building**: candidates become records with a canonical identity, a
//!    resolved date and localized text
//! 3. **Merging**: records are folded into the archive by identity without
//!    ever losing a stored value
//! 4. **Persisting**: backup, daily snapshot, then the archive itself

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod builder;
mod cli;
mod config;
mod dates;
mod identity;
mod merge;
mod models;
mod pipeline;
mod sources;
mod store;
mod translate;
mod utils;

use cli::{Cli, Command, TranslatorKind};
use store::StoreLayout;
use translate::{DeepLTranslate, GoogleTranslate, Translator};
use utils::{ensure_writable_dir, http_client};

fn select_translator(args: &Cli, client: &reqwest::Client) -> Result<Translator, Box<dyn Error>> {
    let translator = match args.translator {
        TranslatorKind::Google => Translator::Google(GoogleTranslate::new(client.clone())),
        TranslatorKind::Deepl => {
            let key = args
                .deepl_api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or("--translator deepl needs DEEPL_API_KEY")?;
            Translator::DeepL(DeepLTranslate::new(client.clone(), &args.deepl_endpoint, key))
        }
        TranslatorKind::None => Translator::Disabled,
    };
    Ok(translator)
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("curioscience_ingest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.final_path, ?args.daily_dir, ?args.backup_dir, ?args.command, "Parsed CLI arguments");

    let mut config = config::load_config(args.config.as_deref()).await?;
    if let Some(policy) = args.date_policy {
        config.date_policy = policy;
    }
    info!(
        target_lang = %config.target_lang,
        date_policy = ?config.date_policy,
        sources = config.sources.len(),
        "Configuration ready"
    );

    let layout = StoreLayout {
        final_path: args.final_path.clone(),
        daily_dir: args.daily_dir.clone(),
        backup_dir: args.backup_dir.clone(),
    };

    // Early check: every output directory must be writable before fetching.
    let final_dir = layout
        .final_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| ".".into());
    for dir in [&final_dir, &layout.daily_dir, &layout.backup_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    let client = http_client(&args.user_agent)?;
    let translator = select_translator(&args, &client)?;
    let now = Local::now();

    match args.command {
        Some(Command::Backfill { limit, sleep_ms }) => {
            let pause = Duration::from_millis(sleep_ms);
            let changed = pipeline::backfill(&translator, &config, &layout, limit, pause, now).await?;
            info!(changed, "Backfill finished");
        }
        None => {
            let registry = sources::registry(&config, &client);
            let summary = pipeline::run(&registry, &translator, &config, &layout, now).await?;
            info!(
                candidates = summary.candidates,
                dropped = summary.dropped,
                built = summary.built,
                stored = summary.stored,
                "Ingestion finished"
            );
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
