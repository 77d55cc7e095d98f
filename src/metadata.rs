//! Structured-metadata extraction
//!
//! Turns article text into an `ArticleRecord`:
//! 1. claim the derived DOI in the ledger (already recorded -> `AlreadyExists`,
//!    no backend call)
//! 2. prompt the language backend for a 12-key JSON object
//! 3. parse the reply (code fences and surrounding prose tolerated)
//! 4. write `{doi}.json`, then append the ledger row

use std::sync::Arc;
use thiserror::Error;

use crate::llm::{LanguageBackend, LlmError, Prompt, TokenUsage};
use crate::papers::ledger::{Claim, Ledger, LedgerError};
use crate::papers::record_store::RecordStore;
use crate::papers::ArticleRecord;
use crate::settings::LlmSettings;
use crate::utils::truncate_chars;

const SYSTEM_PROMPT: &str = "You are a helpful assistant, skilled in extracting structured information from research papers and outputting it in JSON format.";

const EXAMPLE_OUTPUT: &str = r#"{
    "Title": "Example Title",
    "Abstract": "Example abstract text",
    "Journal": "Example journal",
    "Relevant fields": ["field1", "field2", etc],
    "Authors": ["Author One", "Author Two"],
    "Keywords": ["keyword1", "keyword2"],
    "Institute of Origin": "Example Institute",
    "DOI": "https://doi.org/example",
    "Funding": "Example funding source",
    "Methods": "Detailed information about the experimental setup with specific information about materials, techniques, formulas, numbers, metrics, etc. Write as much as you find.",
    "Results": "Detailed information about the experimental outcomes with specific information about materials, techniques, formulas, numbers, metrics, etc. Write as much as you find.",
    "Experiment details": "Detailed information about the experiment with specific information about materials, techniques, formulas, etc. Write as much as you find."
}"#;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("language backend failed for {doi}: {source}")]
    Backend {
        doi: String,
        #[source]
        source: LlmError,
    },
    #[error("malformed JSON from language backend for {doi}: {reason}")]
    MalformedJson {
        doi: String,
        reason: String,
        usage: Option<TokenUsage>,
    },
    #[error("failed to write record for {doi}: {source}")]
    Io {
        doi: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl MetadataError {
    /// Tokens spent before the failure, if a completion came back
    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            MetadataError::MalformedJson { usage, .. } => *usage,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    Extracted {
        record: ArticleRecord,
        usage: Option<TokenUsage>,
    },
    AlreadyExists,
}

pub struct MetadataExtractor {
    backend: Arc<dyn LanguageBackend>,
    ledger: Arc<Ledger>,
    store: RecordStore,
    max_input_chars: Option<usize>,
}

impl MetadataExtractor {
    pub fn new(
        backend: Arc<dyn LanguageBackend>,
        ledger: Arc<Ledger>,
        store: RecordStore,
        llm: &LlmSettings,
    ) -> Self {
        Self {
            backend,
            ledger,
            store,
            max_input_chars: llm.max_input_chars,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub async fn extract_metadata(&self, text: &str, derived_doi: &str) -> Result<ExtractOutcome, MetadataError> {
        let claim = match self.ledger.claim(derived_doi) {
            Claim::Claimed(guard) => guard,
            Claim::Exists => {
                tracing::info!(doi = %derived_doi, status = "AlreadyExists", "[Metadata] DOI already exists in ledger");
                return Ok(ExtractOutcome::AlreadyExists);
            }
            Claim::InFlight => {
                tracing::info!(doi = %derived_doi, status = "AlreadyExists", "[Metadata] DOI is being processed by another worker");
                return Ok(ExtractOutcome::AlreadyExists);
            }
        };

        let body = match self.max_input_chars {
            Some(limit) => truncate_chars(text, limit),
            None => text,
        };
        let completion = self
            .backend
            .complete(&build_prompt(body))
            .await
            .map_err(|source| MetadataError::Backend { doi: derived_doi.to_string(), source })?;

        let mut record = parse_record(&completion.text).map_err(|reason| MetadataError::MalformedJson {
            doi: derived_doi.to_string(),
            reason,
            usage: completion.usage,
        })?;

        if record.doi != derived_doi {
            tracing::debug!("[Metadata] Backend DOI '{}' differs from file key '{}'", record.doi, derived_doi);
            record.doi = derived_doi.to_string();
        }

        self.store
            .save_record(&record)
            .await
            .map_err(|source| MetadataError::Io { doi: derived_doi.to_string(), source })?;

        let inserted = Arc::clone(&self.ledger).append(record.clone()).await?;
        drop(claim);
        if !inserted {
            return Ok(ExtractOutcome::AlreadyExists);
        }

        tracing::info!(doi = %record.doi, status = "Recorded", "[Metadata] Extracted '{}'", record.title);
        Ok(ExtractOutcome::Extracted { record, usage: completion.usage })
    }
}

pub fn build_prompt(text: &str) -> Prompt {
    let user = format!(
        r#"Given the following text, extract structured information in JSON format including the title, abstract, authors, keywords, institute of origin, DOI, and funding:

Text: "{}"

Example Output:
{}

Only output the JSON object. Nothing else."#,
        text, EXAMPLE_OUTPUT
    );
    Prompt { system: SYSTEM_PROMPT.to_string(), user }
}

/// Parse a backend reply into a record, tolerating markdown fences and prose
pub fn parse_record(reply: &str) -> Result<ArticleRecord, String> {
    let trimmed = reply.trim();
    let json_text = if trimmed.starts_with("```") {
        trimmed
            .lines()
            .skip(1)
            .take_while(|l| !l.starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        trimmed.to_string()
    };

    let candidate = match (json_text.find('{'), json_text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &json_text[start..=end],
        _ => return Err("no JSON object in response".to_string()),
    };

    let value: serde_json::Value = serde_json::from_str(candidate).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err("response is not a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::Completion;
    use crate::papers::sample_record;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies with a fixed text and counts calls
    pub(crate) struct ScriptedBackend {
        pub reply: String,
        pub calls: AtomicUsize,
    }

    impl ScriptedBackend {
        pub(crate) fn new(reply: &str) -> Self {
            Self { reply: reply.to_string(), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl LanguageBackend for ScriptedBackend {
        async fn complete(&self, _prompt: &Prompt) -> Result<Completion, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                text: self.reply.clone(),
                usage: Some(TokenUsage { prompt_tokens: 1000, completion_tokens: 200 }),
            })
        }
    }

    const VALID_REPLY: &str = r#"```json
{"Title": "Copper catalysis", "Authors": ["Ann Smith"], "Keywords": ["copper", "catalysis"], "DOI": "https://doi.org/10.1039/d4sc00001a"}
```"#;

    fn extractor(dir: &std::path::Path, backend: Arc<ScriptedBackend>) -> MetadataExtractor {
        let ledger = Arc::new(Ledger::open(&dir.join("ledger.csv")).unwrap());
        MetadataExtractor::new(backend, ledger, RecordStore::new(dir.join("out")), &LlmSettings::default())
    }

    #[test]
    fn test_parse_record_with_fences() {
        let record = parse_record(VALID_REPLY).unwrap();
        assert_eq!(record.title, "Copper catalysis");
        assert_eq!(record.keywords, vec!["copper", "catalysis"]);
        assert_eq!(record.funding, "N/A");
    }

    #[test]
    fn test_parse_record_with_prose() {
        let record = parse_record("Here is the JSON:\n{\"Title\": \"T\"}\nHope this helps").unwrap();
        assert_eq!(record.title, "T");
    }

    #[test]
    fn test_parse_record_rejects_garbage() {
        assert!(parse_record("I could not read the paper").is_err());
        assert!(parse_record("{\"Title\": ").is_err());
        assert!(parse_record("[1, 2]").is_err());
    }

    #[test]
    fn test_prompt_contains_text_and_keys() {
        let prompt = build_prompt("Abstract. Hello.");
        assert!(prompt.system.contains("JSON format"));
        assert!(prompt.user.contains("Text: \"Abstract. Hello.\""));
        for key in crate::papers::LEDGER_HEADER {
            assert!(prompt.user.contains(&format!("\"{}\"", key)), "missing {}", key);
        }
    }

    #[tokio::test]
    async fn test_extract_writes_json_and_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(VALID_REPLY));
        let extractor = extractor(dir.path(), backend.clone());

        let outcome = extractor.extract_metadata("Abstract. Hello.", "d4sc00001a").await.unwrap();
        let record = match outcome {
            ExtractOutcome::Extracted { record, usage } => {
                assert_eq!(usage.unwrap().prompt_tokens, 1000);
                record
            }
            other => panic!("unexpected outcome {:?}", other),
        };

        assert_eq!(record.doi, "d4sc00001a");
        assert!(dir.path().join("out").join("d4sc00001a.json").exists());
        let rows = extractor.ledger().rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "d4sc00001a");
        assert_eq!(&rows[0][6], "copper, catalysis");
    }

    #[tokio::test]
    async fn test_existing_doi_skips_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(VALID_REPLY));
        let extractor = extractor(dir.path(), backend.clone());

        for doi in ["a", "b", "jacs.4c00001"] {
            extractor.ledger().insert_if_absent(&sample_record(doi)).unwrap();
        }
        for doi in ["a", "b", "jacs.4c00001"] {
            let outcome = extractor.extract_metadata("text", doi).await.unwrap();
            assert_eq!(outcome, ExtractOutcome::AlreadyExists);
        }
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(VALID_REPLY));
        let extractor = extractor(dir.path(), backend.clone());

        extractor.extract_metadata("text", "x").await.unwrap();
        let second = extractor.extract_metadata("text", "x").await.unwrap();

        assert_eq!(second, ExtractOutcome::AlreadyExists);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(extractor.ledger().rows().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_reply_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new("Sorry, I can't help with that."));
        let extractor = extractor(dir.path(), backend);

        let err = extractor.extract_metadata("text", "b").await.unwrap_err();
        assert!(matches!(err, MetadataError::MalformedJson { .. }));
        assert!(err.usage().is_some());
        assert!(extractor.ledger().rows().unwrap().is_empty());
        assert!(!dir.path().join("out").join("b.json").exists());

        // claim released: a later attempt reaches the backend again
        assert!(!extractor.ledger().contains("b"));
        assert!(matches!(extractor.ledger().claim("b"), Claim::Claimed(_)));
    }
}
