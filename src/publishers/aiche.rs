//! AIChE journals on Wiley Online Library
//!
//! Search results mark open-access items with `div.open-access`. Their
//! `pdf-download` link points at the e-reader (`/epdf/`); the direct file is
//! served from `/pdfdirect/` with `download=true`.

use scraper::Html;
use url::Url;

use super::{dedup, direct_download, first_href, href_of, selector, Candidate, ParsedListing};

pub fn parse_listing(doc: &Html, page_url: &Url) -> ParsedListing {
    let item_sel = selector("li.search__item");
    let open_access_sel = selector("div.open-access");
    let pdf_sel = selector("a.pdf-download[href]");
    let next_sel = selector("a.pagination__next[href]");

    let mut items_seen = 0;
    let mut candidates = Vec::new();
    for item in doc.select(&item_sel) {
        items_seen += 1;
        if item.select(&open_access_sel).next().is_none() {
            continue;
        }
        if let Some(pdf) = first_href(item, &pdf_sel, page_url).and_then(|u| direct_download(&u)) {
            candidates.push(Candidate::Pdf(pdf));
        }
    }

    ParsedListing {
        candidates: dedup(candidates),
        next_page_url: doc.select(&next_sel).find_map(|a| href_of(a, page_url)),
        items_seen,
    }
}
