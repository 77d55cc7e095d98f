//! PeerJ article search
//!
//! Search rows link to article pages, not PDFs. The PDF is read from the
//! article page's `citation_pdf_url` meta tag. The pager is a button with no
//! href, so the next page is built by bumping the `page` query parameter.

use scraper::Html;
use url::Url;

use super::{dedup, first_href, href_of, selector, Candidate, ParsedListing};

pub fn parse_listing(doc: &Html, page_url: &Url) -> ParsedListing {
    let item_sel = selector("div.main-search-item-row");
    let link_sel = selector("a[href]");
    let next_sel = selector(r#"button[aria-label="Next page"]"#);

    let mut items_seen = 0;
    let mut candidates = Vec::new();
    for item in doc.select(&item_sel) {
        items_seen += 1;
        if let Some(article) = first_href(item, &link_sel, page_url) {
            candidates.push(Candidate::Landing(article));
        }
    }

    let has_next = doc
        .select(&next_sel)
        .any(|button| button.value().attr("disabled").is_none());

    ParsedListing {
        candidates: dedup(candidates),
        next_page_url: has_next.then(|| next_page(page_url)),
        items_seen,
    }
}

pub fn parse_landing(doc: &Html, landing_url: &Url) -> Option<String> {
    let meta_sel = selector(r#"meta[name="citation_pdf_url"]"#);
    let anchor_sel = selector(r#"a[href$=".pdf"]"#);

    doc.select(&meta_sel)
        .find_map(|m| m.value().attr("content").and_then(|c| super::resolve(landing_url, c)))
        .or_else(|| doc.select(&anchor_sel).find_map(|a| href_of(a, landing_url)))
}

/// Same URL with `page` incremented (absent counts as page 1)
fn next_page(page_url: &Url) -> String {
    let current = page_url
        .query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse::<u32>().ok())
        .unwrap_or(1);

    let kept: Vec<(String, String)> = page_url
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut next = page_url.clone();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &(current + 1).to_string());
    next.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH: &str = r#"
        <div class="main-search-item-row">
          <a href="/articles/17001/">Title one</a>
          <a href="/articles/17001/reviews/">Reviews</a>
        </div>
        <div class="main-search-item-row">
          <a href="/articles/17002/">Title two</a>
        </div>
        <button aria-label="Next page">&raquo;</button>
    "#;

    #[test]
    fn test_parse_listing() {
        let base = Url::parse("https://peerj.com/articles/?journal=ochem").unwrap();
        let parsed = parse_listing(&Html::parse_document(SEARCH), &base);

        assert_eq!(parsed.items_seen, 2);
        assert_eq!(
            parsed.candidates,
            vec![
                Candidate::Landing("https://peerj.com/articles/17001/".into()),
                Candidate::Landing("https://peerj.com/articles/17002/".into()),
            ]
        );
        assert_eq!(
            parsed.next_page_url.as_deref(),
            Some("https://peerj.com/articles/?journal=ochem&page=2")
        );
    }

    #[test]
    fn test_next_page_increments_existing() {
        let base = Url::parse("https://peerj.com/articles/?page=4&section=microbiology").unwrap();
        assert_eq!(next_page(&base), "https://peerj.com/articles/?section=microbiology&page=5");
    }

    #[test]
    fn test_disabled_button_ends_pagination() {
        let base = Url::parse("https://peerj.com/articles/?journal=ichem&page=12").unwrap();
        let html = r#"<button aria-label="Next page" disabled>&raquo;</button>"#;
        assert_eq!(parse_listing(&Html::parse_document(html), &base).next_page_url, None);
    }

    #[test]
    fn test_parse_landing_prefers_meta() {
        let landing = Url::parse("https://peerj.com/articles/17001/").unwrap();
        let html = r#"
            <head><meta name="citation_pdf_url" content="https://peerj.com/articles/17001.pdf"></head>
            <body><a href="/articles/17001-supplement.pdf">Supplement</a></body>
        "#;
        assert_eq!(
            parse_landing(&Html::parse_document(html), &landing).as_deref(),
            Some("https://peerj.com/articles/17001.pdf")
        );
    }

    #[test]
    fn test_parse_landing_falls_back_to_anchor() {
        let landing = Url::parse("https://peerj.com/articles/17002/").unwrap();
        let html = r#"<a href="/articles/17002.pdf">Download PDF</a>"#;
        assert_eq!(
            parse_landing(&Html::parse_document(html), &landing).as_deref(),
            Some("https://peerj.com/articles/17002.pdf")
        );
    }
}
