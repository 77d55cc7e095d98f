//! SpringerOpen journal sites
//!
//! Listing lives at `<journal>/articles`; every article row carries a direct
//! `data-test="pdf-link"` anchor and pagination is an explicit
//! `data-test="next-page"` link.

use scraper::Html;
use url::Url;

use super::{dedup, href_of, selector, Candidate, ParsedListing};

/// Seeds are journal home pages; the article index is under `/articles`
pub fn listing_url(url: &Url) -> Url {
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        let mut listing = url.clone();
        listing.set_path("/articles");
        return listing;
    }
    url.clone()
}

pub fn parse_listing(doc: &Html, page_url: &Url) -> ParsedListing {
    let pdf_sel = selector(r#"a[data-test="pdf-link"]"#);
    let next_sel = selector(r#"a[data-test="next-page"]"#);

    let links: Vec<Candidate> = doc
        .select(&pdf_sel)
        .filter_map(|a| href_of(a, page_url))
        .map(Candidate::Pdf)
        .collect();
    let items_seen = links.len();

    ParsedListing {
        candidates: dedup(links),
        next_page_url: doc.select(&next_sel).find_map(|a| href_of(a, page_url)),
        items_seen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <ol>
          <li><a data-test="pdf-link" href="/counter/pdf/10.1186/s40543-024-00431-2">Download PDF</a></li>
          <li><a data-test="pdf-link" href="/counter/pdf/10.1186/s40543-024-00432-1">Download PDF</a></li>
        </ol>
        <a data-test="next-page" href="/articles?searchType=journalSearch&amp;sort=PubDate&amp;page=2">Next</a>
    "#;

    #[test]
    fn test_listing_url_appends_articles() {
        let seed = Url::parse("https://jast-journal.springeropen.com").unwrap();
        assert_eq!(listing_url(&seed).as_str(), "https://jast-journal.springeropen.com/articles");

        let trailing = Url::parse("https://fjps.springeropen.com/").unwrap();
        assert_eq!(listing_url(&trailing).as_str(), "https://fjps.springeropen.com/articles");
    }

    #[test]
    fn test_listing_url_keeps_paginated_url() {
        let next = Url::parse("https://jast-journal.springeropen.com/articles?page=2").unwrap();
        assert_eq!(listing_url(&next), next);
    }

    #[test]
    fn test_parse_listing() {
        let base = Url::parse("https://jast-journal.springeropen.com/articles").unwrap();
        let parsed = parse_listing(&Html::parse_document(PAGE), &base);

        assert_eq!(parsed.items_seen, 2);
        assert_eq!(
            parsed.candidates,
            vec![
                Candidate::Pdf("https://jast-journal.springeropen.com/counter/pdf/10.1186/s40543-024-00431-2".into()),
                Candidate::Pdf("https://jast-journal.springeropen.com/counter/pdf/10.1186/s40543-024-00432-1".into()),
            ]
        );
        assert_eq!(
            parsed.next_page_url.as_deref(),
            Some("https://jast-journal.springeropen.com/articles?searchType=journalSearch&sort=PubDate&page=2")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let base = Url::parse("https://jast-journal.springeropen.com/articles?page=9").unwrap();
        let html = r#"<a data-test="pdf-link" href="/counter/pdf/10.1186/x">PDF</a>"#;
        let parsed = parse_listing(&Html::parse_document(html), &base);
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.next_page_url, None);
    }
}
