//! Command-line interface definitions.
//!
//! Paths default to the site layout the archive is served from. Secrets and
//! deployment-specific values can come from the environment instead of
//! flags.

use crate::merge::DatePolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Which translation backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TranslatorKind {
    /// Public Google Translate endpoint; no key needed.
    Google,
    /// DeepL API; needs `--deepl-api-key`.
    Deepl,
    /// Keep text as fetched.
    None,
}

/// Fetch science news, merge it into the archive and write it back.
///
/// # Examples
///
/// ```sh
/// # Daily run with the built-in sources
/// curioscience_ingest
///
/// # Custom sources, DeepL, newer dates win
/// DEEPL_API_KEY=... curioscience_ingest -c sources.yaml --translator deepl --date-policy prefer-incoming
///
/// # Retranslate up to 100 stored records
/// curioscience_ingest backfill --limit 100
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Final archive document
    #[arg(short, long, default_value = "workspace/astro/public/articles_py.json")]
    pub final_path: PathBuf,

    /// Directory for per-day snapshots of each run
    #[arg(short, long, default_value = "workspace/astro/data/articles_daily")]
    pub daily_dir: PathBuf,

    /// Directory for backups of the previous archive
    #[arg(short, long, default_value = "workspace/astro/backups")]
    pub backup_dir: PathBuf,

    /// Optional path to a YAML source configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Translation backend
    #[arg(long, value_enum, default_value_t = TranslatorKind::Google)]
    pub translator: TranslatorKind,

    /// DeepL API key
    #[arg(long, env = "DEEPL_API_KEY", hide_env_values = true)]
    pub deepl_api_key: Option<String>,

    /// DeepL API base URL (free and pro plans differ)
    #[arg(long, env = "DEEPL_ENDPOINT", default_value = "https://api-free.deepl.com")]
    pub deepl_endpoint: String,

    /// User agent sent to sources and translation backends
    #[arg(long, env = "USER_AGENT", default_value = "curioscience-bot/1.0")]
    pub user_agent: String,

    /// Override the configured date policy
    #[arg(long, value_enum)]
    pub date_policy: Option<DatePolicy>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Retranslate stored records that are missing a translation
    Backfill {
        /// Maximum number of records to attempt
        #[arg(long, env = "BACKFILL_LIMIT", default_value_t = 400)]
        limit: usize,

        /// Pause between records, in milliseconds
        #[arg(long, env = "SLEEP_MS", default_value_t = 800)]
        sleep_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["curioscience_ingest"]);

        assert_eq!(cli.command, None);
        assert_eq!(cli.final_path, PathBuf::from("workspace/astro/public/articles_py.json"));
        assert_eq!(cli.daily_dir, PathBuf::from("workspace/astro/data/articles_daily"));
        assert_eq!(cli.backup_dir, PathBuf::from("workspace/astro/backups"));
        assert_eq!(cli.translator, TranslatorKind::Google);
        assert_eq!(cli.date_policy, None);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "curioscience_ingest",
            "-f",
            "/tmp/out/articles.json",
            "-d",
            "/tmp/out/daily",
            "-b",
            "/tmp/out/backups",
            "-c",
            "sources.yaml",
        ]);

        assert_eq!(cli.final_path, PathBuf::from("/tmp/out/articles.json"));
        assert_eq!(cli.daily_dir, PathBuf::from("/tmp/out/daily"));
        assert_eq!(cli.backup_dir, PathBuf::from("/tmp/out/backups"));
        assert_eq!(cli.config, Some(PathBuf::from("sources.yaml")));
    }

    #[test]
    fn test_cli_translator_and_policy() {
        let cli = Cli::parse_from([
            "curioscience_ingest",
            "--translator",
            "deepl",
            "--date-policy",
            "prefer-incoming",
        ]);

        assert_eq!(cli.translator, TranslatorKind::Deepl);
        assert_eq!(cli.date_policy, Some(DatePolicy::PreferIncoming));
    }

    #[test]
    fn test_cli_backfill_subcommand() {
        let cli = Cli::parse_from(["curioscience_ingest", "backfill", "--limit", "25", "--sleep-ms", "0"]);
        assert_eq!(cli.command, Some(Command::Backfill { limit: 25, sleep_ms: 0 }));
    }
}
