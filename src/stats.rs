//! Run accounting
//!
//! `PublisherReport` is what `run_publisher` returns; `RunStats` aggregates the
//! reports of one run and is written once, as JSON, when the run ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::coordinator::{DownloadOutcome, ExtractionStatus};
use crate::llm::TokenUsage;
use crate::settings::LlmSettings;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublisherReport {
    pub publisher: String,
    pub seeds_processed: u32,
    pub pages_fetched: u32,
    pub page_failures: u32,
    pub links_found: u32,
    /// PDFs fetched successfully (`total_downloaded`)
    pub downloaded: u32,
    pub skipped_existing: u32,
    pub download_failures: u32,
    pub recorded: u32,
    pub already_recorded: u32,
    pub extraction_failures: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
    pub cancelled: bool,
}

impl PublisherReport {
    pub fn new(publisher: impl Into<String>) -> Self {
        Self { publisher: publisher.into(), ..Self::default() }
    }

    pub fn record(&mut self, outcome: &DownloadOutcome, llm: &LlmSettings) {
        match outcome {
            DownloadOutcome::Downloaded { status, usage, .. } => {
                self.downloaded += 1;
                self.record_extraction(status, *usage, llm);
            }
            DownloadOutcome::SkippedExisting { .. } => self.skipped_existing += 1,
            DownloadOutcome::Failed { .. } => self.download_failures += 1,
        }
    }

    /// Count one extraction attempt (also used by the reprocessing pass)
    pub fn record_extraction(&mut self, status: &ExtractionStatus, usage: Option<TokenUsage>, llm: &LlmSettings) {
        match status {
            ExtractionStatus::Recorded => self.recorded += 1,
            ExtractionStatus::AlreadyExists => self.already_recorded += 1,
            ExtractionStatus::ExtractionFailed(_) => self.extraction_failures += 1,
        }
        if let Some(usage) = usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.completion_tokens += usage.completion_tokens;
            self.cost_usd += usage.cost(llm);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub publishers: Vec<PublisherReport>,
    pub total_downloaded: u32,
    pub total_recorded: u32,
    pub total_failures: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
    pub cancelled: bool,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            publishers: Vec::new(),
            total_downloaded: 0,
            total_recorded: 0,
            total_failures: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            cost_usd: 0.0,
            cancelled: false,
        }
    }

    pub fn add(&mut self, report: PublisherReport) {
        self.total_downloaded += report.downloaded;
        self.total_recorded += report.recorded;
        self.total_failures += report.page_failures + report.download_failures + report.extraction_failures;
        self.prompt_tokens += report.prompt_tokens;
        self.completion_tokens += report.completion_tokens;
        self.cost_usd += report.cost_usd;
        self.cancelled |= report.cancelled;
        self.publishers.push(report);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn write_summary(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    pub fn print_summary(&self) {
        println!("\nHarvest Results:");
        for report in &self.publishers {
            println!(
                "  {:10} {:3} pages  {:4} links  {:4} downloaded  {:4} skipped  {:4} recorded  {:3} failed{}",
                format!("{}:", report.publisher),
                report.pages_fetched,
                report.links_found,
                report.downloaded,
                report.skipped_existing,
                report.recorded,
                report.page_failures + report.download_failures + report.extraction_failures,
                if report.cancelled { "  (cancelled)" } else { "" }
            );
        }

        println!(
            "\nTotal: {} downloaded, {} recorded, {} failures",
            self.total_downloaded, self.total_recorded, self.total_failures
        );
        if self.prompt_tokens + self.completion_tokens > 0 {
            println!(
                "Tokens: {} prompt + {} completion (~${:.4})",
                self.prompt_tokens, self.completion_tokens, self.cost_usd
            );
        }
        if let Some(finished) = self.finished_at {
            println!("Elapsed: {}s", (finished - self.started_at).num_seconds());
        }
    }
}
