//! Royal Society of Chemistry journal pages
//!
//! PDF buttons are `btn btn--primary btn--tiny` anchors. The next-page button
//! only carries a page number, so the next URL is synthesised as a
//! `#!recentarticles&adv&page=N` fragment on the journal URL.

use scraper::Html;
use url::Url;

use super::{dedup, href_of, selector, Candidate, ParsedListing};

pub fn parse_listing(doc: &Html, page_url: &Url) -> ParsedListing {
    let pdf_sel = selector("a.btn.btn--primary.btn--tiny[href]");
    let next_sel = selector(r#"a.paging__btn.paging__btn--next[aria-disabled="false"]"#);

    let links: Vec<Candidate> = doc
        .select(&pdf_sel)
        .filter_map(|a| href_of(a, page_url))
        .map(Candidate::Pdf)
        .collect();
    let items_seen = links.len();

    let next_page_url = doc
        .select(&next_sel)
        .find_map(|a| a.value().attr("data-pageno"))
        .map(|page| next_page(page_url, page.trim()));

    ParsedListing {
        candidates: dedup(links),
        next_page_url,
        items_seen,
    }
}

fn next_page(page_url: &Url, page: &str) -> String {
    let mut url = page_url.clone();
    url.set_fragment(None);
    format!("{}#!recentarticles&adv&page={}", url, page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_with_next() {
        let base = Url::parse("https://pubs.rsc.org/en/journals/journalissues/sc#!recentarticles&adv").unwrap();
        let html = r#"
            <a class="btn btn--primary btn--tiny" href="/en/content/articlepdf/2024/sc/d4sc00001a">PDF</a>
            <a class="btn btn--primary btn--tiny" href="/en/content/articlepdf/2024/sc/d4sc00002b">PDF</a>
            <a class="btn btn--secondary btn--tiny" href="/en/content/articlehtml/2024/sc/d4sc00002b">HTML</a>
            <a class="paging__btn paging__btn--next" aria-disabled="false" data-pageno="2">Next</a>
        "#;
        let parsed = parse_listing(&Html::parse_document(html), &base);

        assert_eq!(parsed.items_seen, 2);
        assert_eq!(
            parsed.candidates[0],
            Candidate::Pdf("https://pubs.rsc.org/en/content/articlepdf/2024/sc/d4sc00001a".into())
        );
        assert_eq!(
            parsed.next_page_url.as_deref(),
            Some("https://pubs.rsc.org/en/journals/journalissues/sc#!recentarticles&adv&page=2")
        );
    }

    #[test]
    fn test_disabled_next_button_ends_pagination() {
        let base = Url::parse("https://pubs.rsc.org/en/journals/journalissues/cc").unwrap();
        let html = r#"<a class="paging__btn paging__btn--next" aria-disabled="true" data-pageno="7">Next</a>"#;
        let parsed = parse_listing(&Html::parse_document(html), &base);
        assert_eq!(parsed.next_page_url, None);
        assert_eq!(parsed.items_seen, 0);
    }
}
