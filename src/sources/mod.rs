//! Fetch collaborators: everything that produces raw candidates.
//!
//! Each source implements [`Fetch`]. Sources are registered from the
//! configuration as a name → fetcher mapping, so adding or removing one is a
//! configuration change.
//!
//! # Supported kinds
//!
//! | Kind | Module | Method |
//! |------|--------|--------|
//! | arXiv | [`arxiv`] | Atom API query, structured timestamps |
//! | RSS / Atom | [`feed`] | `quick-xml` pull parser |
//! | HTML | [`html`] | CSS selectors over a listing page |
//!
//! A failing source is logged and contributes nothing; the run continues
//! with the others.

pub mod arxiv;
pub mod feed;
pub mod html;
pub mod retry;

use crate::config::{PipelineConfig, SourceKind};
use crate::models::RawCandidate;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

pub use arxiv::ArxivSource;
pub use feed::FeedSource;
pub use html::HtmlSource;
pub use retry::RetryFetch;

/// A source of raw candidates.
pub trait Fetch {
    /// Provenance label stamped on every candidate.
    fn name(&self) -> &str;

    /// Fetch the current items. Network and parse errors are returned, not
    /// swallowed; [`fetch_all`] decides what to do with them.
    async fn fetch(&self) -> Result<Vec<RawCandidate>, Box<dyn Error>>;
}

/// A configured source of any kind.
#[derive(Debug, Clone)]
pub enum Source {
    Arxiv(ArxivSource),
    Feed(FeedSource),
    Html(HtmlSource),
}

impl Fetch for Source {
    fn name(&self) -> &str {
        match self {
            Source::Arxiv(s) => s.name(),
            Source::Feed(s) => s.name(),
            Source::Html(s) => s.name(),
        }
    }

    async fn fetch(&self) -> Result<Vec<RawCandidate>, Box<dyn Error>> {
        match self {
            Source::Arxiv(s) => s.fetch().await,
            Source::Feed(s) => s.fetch().await,
            Source::Html(s) => s.fetch().await,
        }
    }
}

/// Build the fetchers named in `config`, in configuration order.
///
/// Entries that cannot be turned into a fetcher (an unparsable page URL)
/// are logged and left out.
pub fn registry(config: &PipelineConfig, client: &Client) -> Vec<RetryFetch<Source>> {
    config
        .sources
        .iter()
        .filter_map(|sc| {
            let name = sc.name.trim().to_string();
            let source = match sc.kind {
                SourceKind::Arxiv => Source::Arxiv(ArxivSource::new(
                    client.clone(),
                    &name,
                    sc.query.as_deref().unwrap_or(arxiv::DEFAULT_QUERY),
                    sc.limit,
                )),
                SourceKind::Rss => Source::Feed(FeedSource::new(client.clone(), &name, &sc.url, sc.limit)),
                SourceKind::Html => {
                    let page = match Url::parse(sc.url.trim()) {
                        Ok(page) => page,
                        Err(e) => {
                            warn!(source = %name, url = %sc.url, error = %e, "Skipping HTML source with invalid URL");
                            return None;
                        }
                    };
                    let Some(selectors) = sc.selectors.clone() else {
                        warn!(source = %name, "Skipping HTML source without selectors");
                        return None;
                    };
                    Source::Html(HtmlSource::new(client.clone(), &name, page, selectors, sc.limit))
                }
            };
            Some(RetryFetch::new(
                source,
                sc.retries,
                Duration::from_secs(sc.retry_delay_secs),
            ))
        })
        .collect()
}

/// Fetch every source in turn and concatenate their candidates.
///
/// A source that fails contributes zero candidates.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn fetch_all<F: Fetch>(sources: &[F]) -> Vec<RawCandidate> {
    let batches: Vec<Vec<RawCandidate>> = stream::iter(sources)
        .then(|source| async move {
            match source.fetch().await {
                Ok(candidates) => {
                    info!(source = %source.name(), count = candidates.len(), "Fetched source");
                    candidates
                }
                Err(e) => {
                    warn!(source = %source.name(), error = %e, "Source failed; skipping");
                    Vec::new()
                }
            }
        })
        .collect()
        .await;

    let candidates: Vec<RawCandidate> = batches.into_iter().flatten().collect();
    info!(count = candidates.len(), "Fetched all sources");
    candidates
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SourceConfig;

    /// Source that returns a fixed batch, or fails.
    pub(crate) struct StaticSource {
        pub name: String,
        pub candidates: Option<Vec<RawCandidate>>,
    }

    impl Fetch for StaticSource {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self) -> Result<Vec<RawCandidate>, Box<dyn Error>> {
            self.candidates.clone().ok_or_else(|| "feed returned HTTP 503".into())
        }
    }

    fn candidate(title: &str) -> RawCandidate {
        RawCandidate {
            title: title.to_string(),
            locator: format!("https://example.org/{title}"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let sources = vec![
            StaticSource {
                name: "A".to_string(),
                candidates: Some(vec![candidate("a1"), candidate("a2")]),
            },
            StaticSource {
                name: "Broken".to_string(),
                candidates: None,
            },
            StaticSource {
                name: "B".to_string(),
                candidates: Some(vec![candidate("b1")]),
            },
        ];
        let out = fetch_all(&sources).await;
        let titles: Vec<_> = out.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_registry_follows_config_order() {
        let client = Client::new();
        let config = PipelineConfig::default();
        let registry = registry(&config, &client);
        let names: Vec<_> = registry.iter().map(|s| s.name().to_string()).collect();
        let expected: Vec<_> = config.sources.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, expected);
        assert!(matches!(registry[0].inner(), Source::Arxiv(_)));
    }

    #[test]
    fn test_registry_skips_bad_html_url() {
        let client = Client::new();
        let mut config = PipelineConfig::default();
        config.sources = vec![SourceConfig {
            name: "Broken page".to_string(),
            kind: SourceKind::Html,
            url: "not a url".to_string(),
            query: None,
            limit: 10,
            retries: 0,
            retry_delay_secs: 1,
            selectors: None,
        }];
        assert!(registry(&config, &client).is_empty());
    }

    #[test]
    fn test_registry_skips_html_without_selectors() {
        let client = Client::new();
        let mut config = PipelineConfig::default();
        config.sources = vec![SourceConfig {
            name: "No selectors".to_string(),
            kind: SourceKind::Html,
            url: "https://www.iac.es/es/noticias".to_string(),
            query: None,
            limit: 10,
            retries: 0,
            retry_delay_secs: 1,
            selectors: None,
        }];
        assert!(registry(&config, &client).is_empty());
    }
}
