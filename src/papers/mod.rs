//! Article records and everything that turns a downloaded PDF into one
//!
//! - pdf_extractor: page text via pdf-extract, run off the async runtime
//! - section_parser: whitespace cleanup and abstract..references slicing
//! - ledger: the CSV ledger with an in-memory DOI index
//! - record_store: per-DOI JSON files next to the PDFs

pub mod ledger;
pub mod pdf_extractor;
pub mod record_store;
pub mod section_parser;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

pub const NOT_AVAILABLE: &str = "N/A";

/// Ledger columns, in file order
pub const LEDGER_HEADER: [&str; 12] = [
    "DOI",
    "Title",
    "Abstract",
    "Journal",
    "Relevant fields",
    "Authors",
    "Keywords",
    "Institute of Origin",
    "Funding",
    "Methods",
    "Results",
    "Experiment details",
];

/// One successfully processed article.
///
/// Serialized with the same keys the language backend is asked to produce, so
/// the per-DOI JSON file and a raw backend reply share one shape. Deserializing
/// is lenient: missing or null text fields become `"N/A"`, list fields accept
/// either an array or a single comma-separated string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(rename = "Title", default = "not_available", deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(rename = "Abstract", default = "not_available", deserialize_with = "lenient_text")]
    pub abstract_text: String,
    #[serde(rename = "Journal", default = "not_available", deserialize_with = "lenient_text")]
    pub journal: String,
    #[serde(rename = "Relevant fields", default, deserialize_with = "lenient_list")]
    pub relevant_fields: Vec<String>,
    #[serde(rename = "Authors", default, deserialize_with = "lenient_list")]
    pub authors: Vec<String>,
    #[serde(rename = "Keywords", default, deserialize_with = "lenient_list")]
    pub keywords: Vec<String>,
    #[serde(rename = "Institute of Origin", default = "not_available", deserialize_with = "lenient_text")]
    pub institute_of_origin: String,
    #[serde(rename = "DOI", default = "not_available", deserialize_with = "lenient_text")]
    pub doi: String,
    #[serde(rename = "Funding", default = "not_available", deserialize_with = "lenient_text")]
    pub funding: String,
    #[serde(rename = "Methods", default = "not_available", deserialize_with = "lenient_text")]
    pub methods: String,
    #[serde(rename = "Results", default = "not_available", deserialize_with = "lenient_text")]
    pub results: String,
    #[serde(rename = "Experiment details", default = "not_available", deserialize_with = "lenient_text")]
    pub experiment_details: String,
}

impl ArticleRecord {
    /// Ledger row in `LEDGER_HEADER` order; list fields joined with ", "
    pub fn ledger_row(&self) -> [String; 12] {
        [
            self.doi.clone(),
            self.title.clone(),
            self.abstract_text.clone(),
            self.journal.clone(),
            join_or_na(&self.relevant_fields),
            join_or_na(&self.authors),
            join_or_na(&self.keywords),
            self.institute_of_origin.clone(),
            self.funding.clone(),
            self.methods.clone(),
            self.results.clone(),
            self.experiment_details.clone(),
        ]
    }
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn join_or_na(items: &[String]) -> String {
    if items.is_empty() {
        not_available()
    } else {
        items.join(", ")
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let text = match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    };
    let text = text.trim();
    Ok(if text.is_empty() { not_available() } else { text.to_string() })
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(value_to_text).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        other => vec![other.to_string()],
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != NOT_AVAILABLE)
        .collect())
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Last non-empty path segment of a URL; query and fragment are ignored
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()
        .map(str::to_string)
}

/// Ledger key for a downloaded file: the filename without a trailing `.pdf`.
///
/// Only that extension is removed; publisher identifiers such as
/// `jacs.3c12345` contain dots of their own.
pub fn derive_doi(filename: &str) -> String {
    let len = filename.len();
    if len > 4 && filename.is_char_boundary(len - 4) && filename[len - 4..].eq_ignore_ascii_case(".pdf") {
        filename[..len - 4].to_string()
    } else {
        filename.to_string()
    }
}

#[cfg(test)]
pub(crate) fn sample_record(doi: &str) -> ArticleRecord {
    ArticleRecord {
        title: "Ligand effects in Pd-catalysed C–H activation".to_string(),
        abstract_text: "We report a study.".to_string(),
        journal: "Chemical Science".to_string(),
        relevant_fields: vec!["Catalysis".to_string(), "Organic chemistry".to_string()],
        authors: vec!["A. Author".to_string(), "B. Author".to_string()],
        keywords: vec!["palladium".to_string()],
        institute_of_origin: "Example University".to_string(),
        doi: doi.to_string(),
        funding: NOT_AVAILABLE.to_string(),
        methods: "DFT, kinetics".to_string(),
        results: "Rate increased 3x".to_string(),
        experiment_details: "80 °C, 12 h".to_string(),
    }
}
