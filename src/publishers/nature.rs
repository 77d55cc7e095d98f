//! Nature portfolio research-article lists

use scraper::Html;
use url::Url;

use super::{dedup, first_href, href_of, selector, Candidate, ParsedListing};

pub fn parse_listing(doc: &Html, page_url: &Url) -> ParsedListing {
    let item_sel = selector("li.app-article-list-row__item");
    let open_access_sel = selector("span.u-color-open-access");
    let pdf_sel = selector(r#"a[data-article-pdf="true"][data-test="download-pdf"]"#);
    let next_sel = selector(r#"li[data-page="next"] a.c-pagination__link"#);

    let mut items_seen = 0;
    let mut candidates = Vec::new();
    for item in doc.select(&item_sel) {
        items_seen += 1;
        if item.select(&open_access_sel).next().is_none() {
            continue;
        }
        if let Some(pdf) = first_href(item, &pdf_sel, page_url) {
            candidates.push(Candidate::Pdf(pdf));
        }
    }

    ParsedListing {
        candidates: dedup(candidates),
        next_page_url: doc.select(&next_sel).find_map(|a| href_of(a, page_url)),
        items_seen,
    }
}
