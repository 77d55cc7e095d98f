//! Harvester settings storage
//!
//! Stores run configuration (output paths, HTTP limits, LLM backend, publisher
//! seed URLs) in a JSON file. Every field has a default so a missing or partial
//! file still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::publishers::Publisher;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no adapter registered for publisher key '{0}'")]
    UnknownPublisher(String),
}

/// Generative backend settings (any OpenAI-compatible chat completions endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// USD per 1000 prompt tokens
    #[serde(default = "default_prompt_cost")]
    pub prompt_cost_per_1k: f64,
    /// USD per 1000 completion tokens
    #[serde(default = "default_completion_cost")]
    pub completion_cost_per_1k: f64,
    /// Cap on article characters sent to the backend (None = whole text)
    #[serde(default)]
    pub max_input_chars: Option<usize>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            api_key: None,
            timeout_secs: default_llm_timeout(),
            prompt_cost_per_1k: default_prompt_cost(),
            completion_cost_per_1k: default_completion_cost(),
            max_input_chars: None,
        }
    }
}

impl LlmSettings {
    /// API key for the backend (env var first, then stored setting)
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.api_key.clone().filter(|k| !k.is_empty())
    }
}

/// One publisher family and its seed listing pages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublisherEntry {
    pub key: String,
    #[serde(default)]
    pub seeds: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Where the end-of-run summary goes (None = `<output_dir>/run_summary.json`)
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_page_delay")]
    pub page_delay_ms: u64,
    #[serde(default = "default_max_pdf_size")]
    pub max_pdf_size_mb: u32,
    /// Safety cap on listing pages followed from a single seed
    #[serde(default)]
    pub max_pages_per_seed: Option<u32>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default = "default_publishers")]
    pub publishers: Vec<PublisherEntry>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/all_output")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/downloaded_articles.csv")
}

fn default_concurrency() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    8_000
}

fn default_page_delay() -> u64 {
    500
}

fn default_max_pdf_size() -> u32 {
    50
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; paperharvest/0.3)".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_prompt_cost() -> f64 {
    0.0005
}

fn default_completion_cost() -> f64 {
    0.0015
}

fn entry(key: &str, seeds: &[&str]) -> PublisherEntry {
    PublisherEntry {
        key: key.to_string(),
        seeds: seeds.iter().map(|s| s.to_string()).collect(),
    }
}

/// Seed listing pages harvested by default, in run order
fn default_publishers() -> Vec<PublisherEntry> {
    vec![
        entry("springer", &[
            "https://jast-journal.springeropen.com",
            "https://bioresourcesbioprocessing.springeropen.com",
            "https://applbiolchem.springeropen.com",
            "https://ijmme.springeropen.com",
            "https://mnsl-journal.springeropen.com",
            "https://chembioagro.springeropen.com",
            "https://functionalcompositematerials.springeropen.com",
            "https://materialstheory.springeropen.com",
            "https://nanoconvergencejournal.springeropen.com",
            "https://ejnmmipharmchem.springeropen.com",
            "https://fjps.springeropen.com/",
        ]),
        entry("rsc", &[
            "https://pubs.rsc.org/en/journals/journalissues/sc#!recentarticles&adv",
            "https://pubs.rsc.org/en/journals/journalissues/cc#!recentarticles&adv",
        ]),
        entry("acs", &[
            "https://pubs.acs.org/toc/abmcb8/current",
            "https://pubs.acs.org/toc/accacs/0/0",
            "https://pubs.acs.org/toc/aoiab5/0/0",
            "https://pubs.acs.org/toc/bcches/0/0",
            "https://pubs.acs.org/toc/inocaj/0/0",
            "https://pubs.acs.org/toc/joceah/0/0",
            "https://pubs.acs.org/toc/jacsat/0/0",
            "https://pubs.acs.org/toc/mpohbp/0/0",
            "https://pubs.acs.org/toc/oprdfk/0/0",
            "https://pubs.acs.org/toc/orgnd7/0/0",
            "https://pubs.acs.org/toc/pcrhej/0/0",
            "https://pubs.acs.org/toc/cbehb5/0/0",
        ]),
        entry("nature", &["https://www.nature.com/commschem/research-articles"]),
        entry("peerj", &[
            "https://peerj.com/articles/?section=microbiology",
            "https://peerj.com/articles/?section=biochemistry-biophysics-molecular-biology",
            "https://peerj.com/articles/?journal=ochem",
            "https://peerj.com/articles/?journal=ichem",
        ]),
        entry("aiche", &[
            "https://aiche.onlinelibrary.wiley.com/action/doSearch?SeriesKey=23806761&sortBy=Earliest",
        ]),
        entry("wiley", &[
            "https://chemistry-europe.onlinelibrary.wiley.com/action/doSearch?SeriesKey=27514765&sortBy=Earliest",
            "https://chemistry-europe.onlinelibrary.wiley.com/action/doSearch?SeriesKey=21911363&sortBy=Earliest",
        ]),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            ledger_path: default_ledger_path(),
            summary_path: None,
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            page_delay_ms: default_page_delay(),
            max_pdf_size_mb: default_max_pdf_size(),
            max_pages_per_seed: None,
            user_agent: default_user_agent(),
            llm: LlmSettings::default(),
            publishers: default_publishers(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save settings to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)
    }

    /// Default settings location: `<data_dir>/paperharvest/settings.json`
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .map(|p| p.join("paperharvest"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("settings.json")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.summary_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("run_summary.json"))
    }

    /// Validate publisher keys and resolve them to adapters, keeping file order.
    ///
    /// `only` restricts the result to the given keys (empty = all). A filter key
    /// with no adapter is an error just like an unknown configured key.
    pub fn publisher_plan(&self, only: &[String]) -> Result<Vec<(Publisher, Vec<String>)>, ConfigError> {
        let only = only
            .iter()
            .map(|key| key.parse::<Publisher>().map_err(|_| ConfigError::UnknownPublisher(key.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut plan = Vec::new();
        for entry in &self.publishers {
            let publisher: Publisher = entry
                .key
                .parse()
                .map_err(|_| ConfigError::UnknownPublisher(entry.key.clone()))?;
            if !only.is_empty() && !only.contains(&publisher) {
                continue;
            }
            plan.push((publisher, entry.seeds.clone()));
        }
        Ok(plan)
    }
}
