//! Pipeline configuration.
//!
//! Sources, the target language, the set of sources that already publish in
//! that language, and the merge's date policy are all explicit configuration
//! handed to the pipeline. The defaults reproduce the production source list;
//! a YAML file passed with `--config` replaces them.
//!
//! ```yaml
//! target_lang: es
//! date_policy: keep_previous
//! native_sources: [AEMET, CNIO]
//! sources:
//!   - name: arXiv
//!     kind: arxiv
//!     query: "cat:cs.AI"
//!     limit: 20
//!     retries: 2
//!   - name: Nature
//!     kind: rss
//!     url: https://www.nature.com/nature.rss
//!   - name: IAC
//!     kind: html
//!     url: https://www.iac.es/es/noticias
//!     selectors:
//!       item: "article h3 a[href]"
//! ```

use crate::builder::LocalizationPolicy;
use crate::merge::DatePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// How a source is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// arXiv Atom API; `query` is an arXiv `search_query`.
    Arxiv,
    /// RSS 2.0, RSS 1.0 or Atom feed at `url`.
    Rss,
    /// HTML listing page at `url`, scraped with `selectors`.
    Html,
}

/// CSS selectors for an HTML listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlSelectors {
    /// One match per news item; either the link itself or a container of it.
    pub item: String,
    /// Title inside the item; defaults to the item's text.
    #[serde(default)]
    pub title: Option<String>,
    /// Date inside the item; its `datetime` attribute wins over its text.
    #[serde(default)]
    pub date: Option<String>,
    /// Summary inside the item.
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Extra attempts after a failed fetch.
    #[serde(default)]
    pub retries: usize,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default)]
    pub selectors: Option<HtmlSelectors>,
}

fn default_limit() -> usize {
    30
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_target_lang() -> String {
    "es".to_string()
}

impl SourceConfig {
    fn rss(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SourceKind::Rss,
            url: url.to_string(),
            query: None,
            limit: default_limit(),
            retries: 0,
            retry_delay_secs: default_retry_delay_secs(),
            selectors: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    #[serde(default)]
    pub date_policy: DatePolicy,
    #[serde(default)]
    pub native_sources: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let arxiv = SourceConfig {
            name: "arXiv".to_string(),
            kind: SourceKind::Arxiv,
            url: String::new(),
            query: Some("cat:cs.AI".to_string()),
            limit: 20,
            retries: 2,
            retry_delay_secs: 5,
            selectors: None,
        };
        let feeds = [
            ("Science.org", "https://www.science.org/action/showFeed?type=etoc&feed=rss&jc=science"),
            ("Nature", "https://www.nature.com/nature.rss"),
            ("AEMET", "https://www.aemet.es/xml/boletin.rss"),
            ("CNIC", "https://www.cnic.es/es/rss.xml"),
            ("CNIO", "https://www.cnio.es/feed/"),
            ("ISCIII", "https://www.isciii.es/Noticias/Paginas/Noticias.aspx?rss=1"),
            (
                "IEO",
                "https://www.ieo.es/es_ES/web/ieo/noticias?p_p_id=rss_WAR_rssportlet_INSTANCE_wMyGl9T8Kpyx&p_p_lifecycle=2&p_p_resource_id=rss",
            ),
            ("IAC", "https://www.iac.es/en/rss.xml"),
        ];

        let mut sources = vec![arxiv];
        sources.extend(feeds.iter().map(|(name, url)| SourceConfig::rss(name, url)));

        Self {
            target_lang: default_target_lang(),
            date_policy: DatePolicy::KeepPrevious,
            native_sources: ["AEMET", "CNIC", "CNIO", "ISCIII", "IEO", "IAC"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sources,
        }
    }
}

impl PipelineConfig {
    /// The builder's view of this configuration.
    pub fn localization(&self) -> LocalizationPolicy {
        LocalizationPolicy {
            target_lang: self.target_lang.trim().to_lowercase(),
            native_sources: self.native_sources.iter().map(|s| s.trim().to_string()).collect(),
        }
    }

    /// Reject configurations the registry cannot honor.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_lang.trim().is_empty() {
            return Err("target_lang must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err("every source needs a name".to_string());
            }
            if !seen.insert(source.name.trim()) {
                return Err(format!("duplicate source name {:?}", source.name));
            }
            match source.kind {
                SourceKind::Rss | SourceKind::Html if source.url.trim().is_empty() => {
                    return Err(format!("source {:?} needs a url", source.name));
                }
                SourceKind::Html if source.selectors.is_none() => {
                    return Err(format!("html source {:?} needs selectors", source.name));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Load the configuration from `path`, or the built-in defaults when `None`.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&Path>) -> Result<PipelineConfig, Box<dyn Error>> {
    let config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path).await?;
            let config: PipelineConfig = serde_yaml::from_str(&raw)?;
            info!(path = %path.display(), sources = config.sources.len(), "Loaded configuration");
            config
        }
        None => {
            let config = PipelineConfig::default();
            info!(sources = config.sources.len(), "Using built-in configuration");
            config
        }
    };
    config.validate()?;
    Ok(config)
}
