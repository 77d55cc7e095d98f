//! ACS Publications tables of contents
//!
//! Only items flagged with the "Open Access" badge are harvested. The listing
//! links to a PDF viewer page whose `navbar-download` anchor is the real file,
//! so every candidate needs one landing-page hop. Tables of contents are single
//! pages: no pagination.

use scraper::Html;
use url::Url;

use super::{dedup, first_href, href_of, selector, Candidate, ParsedListing};

pub fn parse_listing(doc: &Html, page_url: &Url) -> ParsedListing {
    let item_sel = selector(".issue-item_footer");
    let open_access_sel = selector(r#"img[alt="Open Access"]"#);
    let pdf_sel = selector(r#"a[title="PDF"]"#);

    let mut items_seen = 0;
    let mut candidates = Vec::new();
    for item in doc.select(&item_sel) {
        items_seen += 1;
        if item.select(&open_access_sel).next().is_none() {
            continue;
        }
        if let Some(landing) = first_href(item, &pdf_sel, page_url) {
            candidates.push(Candidate::Landing(landing));
        }
    }

    ParsedListing {
        candidates: dedup(candidates),
        next_page_url: None,
        items_seen,
    }
}

pub fn parse_landing(doc: &Html, landing_url: &Url) -> Option<String> {
    let download_sel = selector("a.navbar-download[href]");
    doc.select(&download_sel).find_map(|a| href_of(a, landing_url))
}
