//! Publisher adapters: discover PDF links and pagination on journal listing pages
//!
//! Each publisher family encodes its own HTML conventions:
//! - springer: SpringerOpen journal sites (`/articles` listing)
//! - rsc: Royal Society of Chemistry recent-articles pages
//! - acs: ACS tables of contents (open access only, two-hop)
//! - nature: Nature research-article lists (open access only)
//! - peerj: PeerJ article search (two-hop)
//! - aiche: AIChE search results on Wiley Online Library (open access only)
//! - wiley: Chemistry Europe search results
//!
//! Adapters parse synchronously from an HTML string; `PublisherScraper` does the
//! fetching, including the single extra landing-page hop where needed.

pub mod springer;
pub mod rsc;
pub mod acs;
pub mod nature;
pub mod peerj;
pub mod aiche;
pub mod wiley;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use crate::http::{FetchError, PageFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Publisher {
    Springer,
    Rsc,
    Acs,
    Nature,
    Peerj,
    Aiche,
    Wiley,
}

impl Publisher {
    pub const ALL: [Publisher; 7] = [
        Publisher::Springer,
        Publisher::Rsc,
        Publisher::Acs,
        Publisher::Nature,
        Publisher::Peerj,
        Publisher::Aiche,
        Publisher::Wiley,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Publisher::Springer => "springer",
            Publisher::Rsc => "rsc",
            Publisher::Acs => "acs",
            Publisher::Nature => "nature",
            Publisher::Peerj => "peerj",
            Publisher::Aiche => "aiche",
            Publisher::Wiley => "wiley",
        }
    }

    /// URL actually requested for a listing page
    pub fn listing_url(&self, url: &Url) -> Url {
        match self {
            Publisher::Springer => springer::listing_url(url),
            _ => url.clone(),
        }
    }

    /// Extract link candidates and the next page from one listing page
    pub fn parse_listing(&self, html: &str, page_url: &Url) -> ParsedListing {
        let doc = Html::parse_document(html);
        match self {
            Publisher::Springer => springer::parse_listing(&doc, page_url),
            Publisher::Rsc => rsc::parse_listing(&doc, page_url),
            Publisher::Acs => acs::parse_listing(&doc, page_url),
            Publisher::Nature => nature::parse_listing(&doc, page_url),
            Publisher::Peerj => peerj::parse_listing(&doc, page_url),
            Publisher::Aiche => aiche::parse_listing(&doc, page_url),
            Publisher::Wiley => wiley::parse_listing(&doc, page_url),
        }
    }

    /// Locate the PDF link on an article landing page (two-hop publishers)
    pub fn parse_landing(&self, html: &str, landing_url: &Url) -> Option<String> {
        let doc = Html::parse_document(html);
        match self {
            Publisher::Acs => acs::parse_landing(&doc, landing_url),
            Publisher::Peerj => peerj::parse_landing(&doc, landing_url),
            _ => None,
        }
    }
}

impl fmt::Display for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Publisher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let key = key.strip_suffix("_links").unwrap_or(&key);
        Publisher::ALL
            .iter()
            .copied()
            .find(|p| p.key() == key)
            .ok_or_else(|| format!("unknown publisher '{}'", s))
    }
}

/// A link found on a listing page
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// Direct PDF URL
    Pdf(String),
    /// Article landing page that must be fetched to find the PDF
    Landing(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedListing {
    pub candidates: Vec<Candidate>,
    pub next_page_url: Option<String>,
    /// Article containers matched before open-access filtering
    pub items_seen: usize,
}

/// One fetched listing page, reduced to what the coordinator needs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub url: String,
    pub pdf_links: Vec<String>,
    pub next_page_url: Option<String>,
    pub items_seen: usize,
}

#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listing(&self, url: &str) -> Result<ListingPage, FetchError>;
}

/// Fetches listing pages over HTTP and applies one publisher's conventions
pub struct PublisherScraper {
    publisher: Publisher,
    fetcher: Arc<dyn PageFetcher>,
}

impl PublisherScraper {
    pub fn new(publisher: Publisher, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { publisher, fetcher }
    }

    /// Fetch one landing page and pull the PDF link out of it. No further hops.
    async fn resolve_landing(&self, landing: &str) -> Option<String> {
        let landing_url = Url::parse(landing).ok()?;
        match self.fetcher.get_text(landing).await {
            Ok(html) => {
                let pdf = self.publisher.parse_landing(&html, &landing_url);
                if pdf.is_none() {
                    tracing::warn!(publisher = %self.publisher, url = %landing, "[Scraper] No PDF link on landing page");
                }
                pdf
            }
            Err(e) => {
                tracing::warn!(publisher = %self.publisher, url = %landing, error = %e, "[Scraper] Landing page fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl ListingSource for PublisherScraper {
    async fn fetch_listing(&self, url: &str) -> Result<ListingPage, FetchError> {
        let parsed_url = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let request_url = self.publisher.listing_url(&parsed_url);

        let html = self.fetcher.get_text(request_url.as_str()).await?;
        let parsed = self.publisher.parse_listing(&html, &request_url);

        let mut pdf_links = Vec::with_capacity(parsed.candidates.len());
        for candidate in parsed.candidates {
            match candidate {
                Candidate::Pdf(link) => pdf_links.push(link),
                Candidate::Landing(landing) => {
                    if let Some(link) = self.resolve_landing(&landing).await {
                        pdf_links.push(link);
                    }
                }
            }
        }

        tracing::debug!(
            publisher = %self.publisher,
            url = %url,
            links = pdf_links.len(),
            items = parsed.items_seen,
            next = ?parsed.next_page_url,
            "[Scraper] Parsed listing page"
        );

        Ok(ListingPage {
            url: url.to_string(),
            pdf_links,
            next_page_url: parsed.next_page_url,
            items_seen: parsed.items_seen,
        })
    }
}

// ==================== Parsing helpers ====================

/// Compile a CSS selector literal
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
}

/// Resolve an href against the page it was found on
pub(crate) fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// Resolve the `href` of an element
pub(crate) fn href_of(el: ElementRef<'_>, base: &Url) -> Option<String> {
    el.value().attr("href").and_then(|h| resolve(base, h))
}

/// First element under `scope` matching `css`, resolved to an absolute href
pub(crate) fn first_href(scope: ElementRef<'_>, css: &Selector, base: &Url) -> Option<String> {
    scope.select(css).find_map(|el| href_of(el, base))
}

/// Order-preserving dedup of candidates
pub(crate) fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let key = match c {
                Candidate::Pdf(u) | Candidate::Landing(u) => u.clone(),
            };
            seen.insert(key)
        })
        .collect()
}

/// Wiley e-reader link `/doi/epdf/<doi>` -> `/doi/pdfdirect/<doi>?download=true`
pub(crate) fn direct_download(link: &str) -> Option<String> {
    let mut url = Url::parse(link).ok()?;
    let path = url.path().replace("/epdf/", "/pdfdirect/");
    url.set_path(&path);
    url.query_pairs_mut().append_pair("download", "true");
    Some(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned HTML per URL and records requests
    struct StaticPages {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PageFetcher for StaticPages {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.pages.get(url).cloned().ok_or(FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[test]
    fn test_publisher_from_str() {
        assert_eq!("springer".parse::<Publisher>().unwrap(), Publisher::Springer);
        assert_eq!("ACS".parse::<Publisher>().unwrap(), Publisher::Acs);
        assert_eq!("peerj_links".parse::<Publisher>().unwrap(), Publisher::Peerj);
        assert!("elsevier".parse::<Publisher>().is_err());
    }

    #[test]
    fn test_key_roundtrip() {
        for publisher in Publisher::ALL {
            assert_eq!(publisher.key().parse::<Publisher>().unwrap(), publisher);
        }
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("https://pubs.acs.org/toc/jacsat/0/0").unwrap();
        assert_eq!(
            resolve(&base, "/doi/pdf/10.1021/x").as_deref(),
            Some("https://pubs.acs.org/doi/pdf/10.1021/x")
        );
        assert_eq!(
            resolve(&base, "https://cdn.example.org/a.pdf").as_deref(),
            Some("https://cdn.example.org/a.pdf")
        );
        assert_eq!(resolve(&base, "javascript:void(0)"), None);
        assert_eq!(resolve(&base, "  "), None);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let out = dedup(vec![
            Candidate::Pdf("a".into()),
            Candidate::Pdf("b".into()),
            Candidate::Pdf("a".into()),
        ]);
        assert_eq!(out, vec![Candidate::Pdf("a".into()), Candidate::Pdf("b".into())]);
    }

    #[tokio::test]
    async fn test_two_hop_fetches_each_landing_once() {
        let listing = r#"
            <div class="issue-item_footer">
              <img alt="Open Access"><a title="PDF" href="/doi/pdf/10.1021/one">PDF</a>
            </div>
            <div class="issue-item_footer">
              <img alt="Open Access"><a title="PDF" href="/doi/pdf/10.1021/two">PDF</a>
            </div>"#;
        let landing_one = r#"<a class="navbar-download" href="/doi/pdf/10.1021/one?download=true">Download</a>"#;

        let mut pages = HashMap::new();
        pages.insert("https://pubs.acs.org/toc/jacsat/0/0".to_string(), listing.to_string());
        pages.insert("https://pubs.acs.org/doi/pdf/10.1021/one".to_string(), landing_one.to_string());
        let fetcher = Arc::new(StaticPages { pages, requested: Mutex::new(Vec::new()) });

        let scraper = PublisherScraper::new(Publisher::Acs, fetcher.clone());
        let page = scraper.fetch_listing("https://pubs.acs.org/toc/jacsat/0/0").await.unwrap();

        // second landing page 404s and is dropped without failing the listing
        assert_eq!(page.pdf_links, vec!["https://pubs.acs.org/doi/pdf/10.1021/one?download=true"]);
        assert_eq!(page.items_seen, 2);
        assert_eq!(page.next_page_url, None);
        assert_eq!(fetcher.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_listing_fetch_failure_is_error() {
        let fetcher = Arc::new(StaticPages { pages: HashMap::new(), requested: Mutex::new(Vec::new()) });
        let scraper = PublisherScraper::new(Publisher::Nature, fetcher);
        let result = scraper.fetch_listing("https://www.nature.com/commschem/research-articles").await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_springer_requests_articles_path() {
        let mut pages = HashMap::new();
        pages.insert(
            "https://fjps.springeropen.com/articles".to_string(),
            r#"<a data-test="pdf-link" href="/counter/pdf/10.1186/s43094-024-00001-2">PDF</a>"#.to_string(),
        );
        let fetcher = Arc::new(StaticPages { pages, requested: Mutex::new(Vec::new()) });
        let scraper = PublisherScraper::new(Publisher::Springer, fetcher);

        let page = scraper.fetch_listing("https://fjps.springeropen.com/").await.unwrap();
        assert_eq!(
            page.pdf_links,
            vec!["https://fjps.springeropen.com/counter/pdf/10.1186/s43094-024-00001-2"]
        );
        assert_eq!(page.url, "https://fjps.springeropen.com/");
    }
}
