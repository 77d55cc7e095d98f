//! Chemistry Europe (Wiley) search results
//!
//! Each result offers its PDF under `/doi/epdf/` (the HTML e-reader) or
//! `/doi/pdf/`. E-reader links are rewritten to the `/pdfdirect/` file.

use scraper::Html;
use url::Url;

use super::{dedup, direct_download, href_of, selector, Candidate, ParsedListing};

const PDF_PATHS: [&str; 3] = ["/doi/epdf/", "/doi/pdf/", "/doi/pdfdirect/"];

pub fn parse_listing(doc: &Html, page_url: &Url) -> ParsedListing {
    let item_sel = selector("li.search__item");
    let link_sel = selector("a[href]");
    let next_sel = selector("a.pagination__btn--next[href]");

    let mut items_seen = 0;
    let mut candidates = Vec::new();
    for item in doc.select(&item_sel) {
        items_seen += 1;
        let pdf = item
            .select(&link_sel)
            .filter_map(|a| href_of(a, page_url))
            .find(|link| is_pdf_link(link))
            .and_then(|link| if link.contains("/epdf/") { direct_download(&link) } else { Some(link) });
        if let Some(pdf) = pdf {
            candidates.push(Candidate::Pdf(pdf));
        }
    }

    ParsedListing {
        candidates: dedup(candidates),
        next_page_url: doc.select(&next_sel).find_map(|a| href_of(a, page_url)),
        items_seen,
    }
}

fn is_pdf_link(link: &str) -> bool {
    Url::parse(link).is_ok_and(|u| PDF_PATHS.iter().any(|p| u.path().contains(p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing() {
        let base = Url::parse("https://chemistry-europe.onlinelibrary.wiley.com/action/doSearch?SeriesKey=15213765").unwrap();
        let html = r#"
            <li class="search__item">
              <a href="/doi/10.1002/chem.202400001">Article title</a>
              <a href="/doi/epdf/10.1002/chem.202400001"><span>PDF</span></a>
            </li>
            <li class="search__item">
              <a href="/doi/10.1002/chem.202400002">No PDF offered here</a>
              <a href="/doi/abs/10.1002/chem.202400002">Abstract</a>
            </li>
            <li class="search__item">
              <a href="/doi/full/10.1002/chem.202400003">Full text</a>
              <a href="/doi/pdf/10.1002/chem.202400003">Download</a>
            </li>
            <a class="pagination__btn--next" href="https://chemistry-europe.onlinelibrary.wiley.com/action/doSearch?SeriesKey=15213765&amp;startPage=1">Next</a>
        "#;
        let parsed = parse_listing(&Html::parse_document(html), &base);

        assert_eq!(parsed.items_seen, 3);
        assert_eq!(
            parsed.candidates,
            vec![
                Candidate::Pdf(
                    "https://chemistry-europe.onlinelibrary.wiley.com/doi/pdfdirect/10.1002/chem.202400001?download=true"
                        .into()
                ),
                Candidate::Pdf("https://chemistry-europe.onlinelibrary.wiley.com/doi/pdf/10.1002/chem.202400003".into()),
            ]
        );
        assert!(parsed.next_page_url.unwrap().ends_with("startPage=1"));
    }

    #[test]
    fn test_links_resolve_against_page_origin() {
        let base = Url::parse("https://chemistry-europe.onlinelibrary.wiley.com.mirror.test/search").unwrap();
        let html = r#"<li class="search__item"><a href="/doi/pdf/10.1002/x">PDF</a></li>"#;
        let parsed = parse_listing(&Html::parse_document(html), &base);
        assert_eq!(
            parsed.candidates,
            vec![Candidate::Pdf("https://chemistry-europe.onlinelibrary.wiley.com.mirror.test/doi/pdf/10.1002/x".into())]
        );
    }
}
