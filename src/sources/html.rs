//! HTML listing pages.
//!
//! For institutions without a feed, a listing page is scraped with CSS
//! selectors from the configuration. Every element matching `item` becomes
//! one candidate: its link is the element's own `href` or the first
//! `a[href]` inside it, resolved against the page URL.

use super::Fetch;
use crate::config::HtmlSelectors;
use crate::models::{DateCandidates, RawCandidate};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub struct HtmlSource {
    client: Client,
    name: String,
    page: Url,
    selectors: HtmlSelectors,
    limit: usize,
}

impl HtmlSource {
    pub fn new(client: Client, name: &str, page: Url, selectors: HtmlSelectors, limit: usize) -> Self {
        Self {
            client,
            name: name.to_string(),
            page,
            selectors,
            limit,
        }
    }
}

fn selector(css: &str) -> Result<Selector, Box<dyn Error>> {
    Selector::parse(css).map_err(|e| format!("invalid selector {css:?}: {e:?}").into())
}

fn optional_selector(css: Option<&str>) -> Result<Option<Selector>, Box<dyn Error>> {
    css.map(selector).transpose()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_match<'a>(item: ElementRef<'a>, sel: Option<&Selector>) -> Option<ElementRef<'a>> {
    sel.and_then(|s| item.select(s).next())
}

fn item_href(item: ElementRef<'_>, anchor: &Selector) -> Option<String> {
    item.value()
        .attr("href")
        .or_else(|| {
            item.select(anchor)
                .next()
                .and_then(|a| a.value().attr("href"))
        })
        .map(str::to_string)
}

/// Extract candidates from a listing page.
pub fn parse_listing(
    html: &str,
    page: &Url,
    selectors: &HtmlSelectors,
    source: &str,
) -> Result<Vec<RawCandidate>, Box<dyn Error>> {
    let item_sel = selector(&selectors.item)?;
    let title_sel = optional_selector(selectors.title.as_deref())?;
    let date_sel = optional_selector(selectors.date.as_deref())?;
    let summary_sel = optional_selector(selectors.summary.as_deref())?;
    let anchor_sel = selector("a[href]")?;

    let document = Html::parse_document(html);
    let mut candidates = Vec::new();
    for item in document.select(&item_sel) {
        let Some(href) = item_href(item, &anchor_sel) else {
            debug!("Listing item without a link");
            continue;
        };
        let Ok(link) = page.join(href.trim()) else {
            debug!(%href, "Unresolvable listing link");
            continue;
        };

        let title = match first_match(item, title_sel.as_ref()) {
            Some(el) => element_text(el),
            None => element_text(item),
        };
        let date = first_match(item, date_sel.as_ref())
            .map(|el| {
                el.value()
                    .attr("datetime")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(el))
            })
            .filter(|d| !d.is_empty());
        let summary = first_match(item, summary_sel.as_ref())
            .map(|el| el.inner_html())
            .filter(|s| !s.trim().is_empty());

        candidates.push(RawCandidate {
            title,
            locator: link.to_string(),
            date: DateCandidates {
                published: date,
                ..Default::default()
            },
            source: source.to_string(),
            summary,
            language: None,
        });
    }
    Ok(candidates)
}

impl Fetch for HtmlSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "info", skip_all, fields(source = %self.name, page = %self.page))]
    async fn fetch(&self) -> Result<Vec<RawCandidate>, Box<dyn Error>> {
        let html = self
            .client
            .get(self.page.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let mut candidates = parse_listing(&html, &self.page, &self.selectors, &self.name)?;
        candidates.truncate(self.limit);
        info!(count = candidates.len(), "Indexed listing page");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
      <div class="card">
        <h3><a href="/es/noticias/telescopio?utm=home">Nuevo   telescopio</a></h3>
        <time datetime="2024-06-01T09:00:00+02:00">1 de junio</time>
        <p class="lead">Primera <b>luz</b>.</p>
      </div>
      <div class="card">
        <h3><a href="https://other.org/x">Sin fecha</a></h3>
      </div>
      <div class="card"><h3>Sin enlace</h3></div>
    </body></html>"#;

    fn selectors() -> HtmlSelectors {
        HtmlSelectors {
            item: "div.card".to_string(),
            title: Some("h3".to_string()),
            date: Some("time".to_string()),
            summary: Some("p.lead".to_string()),
        }
    }

    #[test]
    fn test_parse_listing() {
        let page = Url::parse("https://www.iac.es/es/noticias").unwrap();
        let out = parse_listing(PAGE, &page, &selectors(), "IAC").unwrap();
        assert_eq!(out.len(), 2);

        let first = &out[0];
        assert_eq!(first.title, "Nuevo telescopio");
        assert_eq!(first.locator, "https://www.iac.es/es/noticias/telescopio?utm=home");
        assert_eq!(first.date.published.as_deref(), Some("2024-06-01T09:00:00+02:00"));
        assert_eq!(first.summary.as_deref(), Some("Primera <b>luz</b>."));
        assert_eq!(first.source, "IAC");

        assert_eq!(out[1].locator, "https://other.org/x");
        assert_eq!(out[1].date.published, None);
        assert_eq!(out[1].summary, None);
    }

    #[test]
    fn test_item_is_the_link() {
        let page = Url::parse("https://www.cnio.es/noticias/").unwrap();
        let sels = HtmlSelectors {
            item: "h3 a[href]".to_string(),
            title: None,
            date: None,
            summary: None,
        };
        let out = parse_listing(PAGE, &page, &sels, "CNIO").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Nuevo telescopio");
        assert_eq!(out[0].locator, "https://www.cnio.es/es/noticias/telescopio?utm=home");
    }

    #[test]
    fn test_invalid_selector_is_error() {
        let page = Url::parse("https://example.org").unwrap();
        let sels = HtmlSelectors {
            item: "div[".to_string(),
            title: None,
            date: None,
            summary: None,
        };
        assert!(parse_listing(PAGE, &page, &sels, "X").is_err());
    }
}
