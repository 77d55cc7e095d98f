//! Download coordination
//!
//! Publishers, seeds and listing pages are walked strictly in sequence. Within a
//! page, one task per PDF link runs on a bounded pool (`concurrency`, default 5)
//! and the page waits for its whole batch before pagination advances. Each task
//! downloads, extracts text and runs metadata extraction in-line.
//!
//! Stopping conditions for a seed: no next page, a failed listing fetch, a
//! revisited URL, the per-seed page cap, or cancellation. URLs that differ
//! only in their fragment count as the same page, since the fragment never
//! reaches the server.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::http::{Downloader, PageFetcher};
use crate::llm::TokenUsage;
use crate::metadata::{ExtractOutcome, MetadataExtractor};
use crate::papers::pdf_extractor::TextExtractor;
use crate::papers::record_store::RecordStore;
use crate::papers::{derive_doi, filename_from_url};
use crate::publishers::{ListingSource, Publisher, PublisherScraper};
use crate::settings::{LlmSettings, Settings};
use crate::stats::PublisherReport;

/// One discovered PDF link
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub pdf_url: String,
    pub dest_dir: PathBuf,
    pub journal: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionStatus {
    /// New ledger row written
    Recorded,
    AlreadyExists,
    ExtractionFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Downloaded {
        doi: String,
        status: ExtractionStatus,
        usage: Option<TokenUsage>,
    },
    Failed {
        url: String,
        reason: String,
    },
    /// Ledger already holds the derived DOI; nothing was fetched
    SkippedExisting {
        doi: String,
    },
}

/// Cooperative stop signal, checked before every seed and every page
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Download -> text -> metadata for a single article
pub struct ArticlePipeline {
    downloader: Arc<dyn Downloader>,
    extractor: Arc<dyn TextExtractor>,
    metadata: Arc<MetadataExtractor>,
    store: RecordStore,
}

impl ArticlePipeline {
    pub fn new(
        downloader: Arc<dyn Downloader>,
        extractor: Arc<dyn TextExtractor>,
        metadata: Arc<MetadataExtractor>,
        store: RecordStore,
    ) -> Self {
        Self { downloader, extractor, metadata, store }
    }

    pub async fn run(&self, task: &DownloadTask) -> DownloadOutcome {
        let Some(filename) = filename_from_url(&task.pdf_url) else {
            tracing::warn!(url = %task.pdf_url, "[Pipeline] No file name in URL");
            return DownloadOutcome::Failed {
                url: task.pdf_url.clone(),
                reason: "no file name in URL".to_string(),
            };
        };
        let doi = derive_doi(&filename);

        if self.metadata.ledger().contains(&doi) {
            tracing::debug!(doi = %doi, "[Pipeline] Already in ledger, skipping download");
            return DownloadOutcome::SkippedExisting { doi };
        }

        let path = match self.downloader.download(&task.pdf_url, &task.dest_dir).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(publisher = %task.journal, url = %task.pdf_url, error = %e, "[Pipeline] Download failed");
                return DownloadOutcome::Failed {
                    url: task.pdf_url.clone(),
                    reason: e.to_string(),
                };
            }
        };

        let (status, usage) = self.process_file(&path, &doi).await;
        DownloadOutcome::Downloaded { doi, status, usage }
    }

    /// Extract text and metadata from a PDF already on disk
    pub async fn process_file(&self, path: &Path, doi: &str) -> (ExtractionStatus, Option<TokenUsage>) {
        let text = match self.extractor.extract(path).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(doi = %doi, status = "ExtractionFailed", error = %e, "[Pipeline] Text extraction failed");
                return (ExtractionStatus::ExtractionFailed(e.to_string()), None);
            }
        };

        if let Err(e) = self.store.save_text(doi, &text).await {
            tracing::warn!(doi = %doi, error = %e, "[Pipeline] Could not write text");
        }

        match self.metadata.extract_metadata(&text, doi).await {
            Ok(ExtractOutcome::Extracted { usage, .. }) => (ExtractionStatus::Recorded, usage),
            Ok(ExtractOutcome::AlreadyExists) => (ExtractionStatus::AlreadyExists, None),
            Err(e) => {
                tracing::error!(doi = %doi, status = "ExtractionFailed", error = %e, "[Pipeline] Metadata extraction failed");
                (ExtractionStatus::ExtractionFailed(e.to_string()), e.usage())
            }
        }
    }

    pub fn metadata(&self) -> &MetadataExtractor {
        &self.metadata
    }
}

pub struct DownloadCoordinator {
    fetcher: Arc<dyn PageFetcher>,
    pipeline: Arc<ArticlePipeline>,
    output_dir: PathBuf,
    concurrency: usize,
    page_delay: Duration,
    max_pages_per_seed: Option<u32>,
    llm: LlmSettings,
    cancel: CancelFlag,
}

impl DownloadCoordinator {
    pub fn new(
        settings: &Settings,
        fetcher: Arc<dyn PageFetcher>,
        pipeline: Arc<ArticlePipeline>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            fetcher,
            pipeline,
            output_dir: settings.output_dir.clone(),
            concurrency: settings.concurrency.max(1),
            page_delay: Duration::from_millis(settings.page_delay_ms),
            max_pages_per_seed: settings.max_pages_per_seed,
            llm: settings.llm.clone(),
            cancel,
        }
    }

    /// Walk every seed of one publisher
    pub async fn run_publisher(&self, publisher: Publisher, seeds: &[String]) -> PublisherReport {
        let source = PublisherScraper::new(publisher, Arc::clone(&self.fetcher));
        self.run_source(publisher.key(), seeds, &source).await
    }

    /// Same as `run_publisher` with an explicit listing source
    pub async fn run_source(&self, journal: &str, seeds: &[String], source: &dyn ListingSource) -> PublisherReport {
        let mut report = PublisherReport::new(journal);
        tracing::info!(publisher = %journal, seeds = seeds.len(), "[Coordinator] Starting publisher");

        for seed in seeds {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.run_seed(journal, seed, source, &mut report).await;
            report.seeds_processed += 1;
        }

        tracing::info!(
            publisher = %journal,
            downloaded = report.downloaded,
            recorded = report.recorded,
            skipped = report.skipped_existing,
            "[Coordinator] Publisher finished"
        );
        report
    }

    async fn run_seed(&self, journal: &str, seed: &str, source: &dyn ListingSource, report: &mut PublisherReport) {
        let mut visited = HashSet::new();
        let mut current = Some(seed.to_string());
        let mut pages = 0u32;

        while let Some(url) = current.take() {
            if self.cancel.is_cancelled() {
                tracing::info!(publisher = %journal, url = %url, "[Coordinator] Cancelled before page");
                report.cancelled = true;
                return;
            }
            if self.max_pages_per_seed.is_some_and(|max| pages >= max) {
                tracing::info!(publisher = %journal, url = %seed, "[Coordinator] Page cap reached for seed");
                return;
            }
            if !visited.insert(page_key(&url)) {
                tracing::warn!(publisher = %journal, url = %url, "[Coordinator] Pagination revisited a page; stopping seed");
                return;
            }
            if pages > 0 && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }

            let page = match source.fetch_listing(&url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(publisher = %journal, url = %url, error = %e, "[Coordinator] Listing fetch failed");
                    report.page_failures += 1;
                    return;
                }
            };
            pages += 1;
            report.pages_fetched += 1;
            report.links_found += page.pdf_links.len() as u32;

            if page.items_seen == 0 {
                tracing::warn!(
                    publisher = %journal,
                    url = %url,
                    "[Coordinator] No article entries matched; the listing layout may have changed"
                );
            }

            let outcomes = self.run_page(journal, page.pdf_links).await;
            let downloaded = outcomes
                .iter()
                .filter(|o| matches!(o, DownloadOutcome::Downloaded { .. }))
                .count();
            for outcome in &outcomes {
                report.record(outcome, &self.llm);
            }
            tracing::info!(
                publisher = %journal,
                url = %url,
                page = pages,
                downloaded,
                tasks = outcomes.len(),
                "[Coordinator] Page done"
            );

            current = page.next_page_url;
        }
    }

    /// Run one page's tasks on the bounded pool and wait for all of them
    async fn run_page(&self, journal: &str, links: Vec<String>) -> Vec<DownloadOutcome> {
        let tasks = links.into_iter().map(|pdf_url| DownloadTask {
            pdf_url,
            dest_dir: self.output_dir.clone(),
            journal: journal.to_string(),
        });

        stream::iter(tasks)
            .map(|task| {
                let pipeline = Arc::clone(&self.pipeline);
                async move {
                    let url = task.pdf_url.clone();
                    match tokio::spawn(async move { pipeline.run(&task).await }).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            tracing::error!(url = %url, error = %e, "[Coordinator] Download task panicked");
                            DownloadOutcome::Failed { url, reason: "task panicked".to_string() }
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

/// Identity of a listing page for the cycle guard
fn page_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => url.to_string(),
    }
}
