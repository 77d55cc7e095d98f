//! paperharvest - open-access paper harvesting CLI
//!
//! Usage: paperharvest [OPTIONS] <COMMAND>
//!
//! Walks publisher listing pages, downloads open-access PDFs, extracts their
//! text and records structured metadata in a CSV ledger.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use paperharvest_lib::coordinator::{ArticlePipeline, CancelFlag, DownloadCoordinator};
use paperharvest_lib::http::HttpClient;
use paperharvest_lib::llm::OpenAiBackend;
use paperharvest_lib::metadata::MetadataExtractor;
use paperharvest_lib::papers::ledger::Ledger;
use paperharvest_lib::papers::pdf_extractor::PdfTextExtractor;
use paperharvest_lib::papers::record_store::RecordStore;
use paperharvest_lib::papers::derive_doi;
use paperharvest_lib::settings::Settings;
use paperharvest_lib::stats::{PublisherReport, RunStats};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "paperharvest")]
#[command(version, about = "Open-access paper harvester", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Settings file (default: <data dir>/paperharvest/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for PDFs, extracted text and JSON records
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Ledger CSV path
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    /// Concurrent downloads per listing page
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Where to write the JSON run summary
    #[arg(long, global = true)]
    summary: Option<PathBuf>,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape publishers, download PDFs and extract metadata
    Run {
        /// Only these publishers (repeatable, e.g. --publisher rsc --publisher nature)
        #[arg(long = "publisher", short)]
        publishers: Vec<String>,
    },
    /// Extract metadata for PDFs in the output directory that have no ledger row
    Reprocess,
    /// List configured publishers and their seed URLs
    Publishers,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run_cli(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "paperharvest=debug,paperharvest_lib=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    if let Commands::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "paperharvest", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&config_path).map_err(|e| e.to_string())?;
    if let Some(dir) = cli.output_dir {
        settings.output_dir = dir;
    }
    if let Some(ledger) = cli.ledger {
        settings.ledger_path = ledger;
    }
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(summary) = cli.summary {
        settings.summary_path = Some(summary);
    }
    tracing::debug!("Settings loaded from {}", config_path.display());

    match cli.command {
        Commands::Run { publishers } => handle_run(&settings, &publishers).await,
        Commands::Reprocess => handle_reprocess(&settings).await,
        Commands::Publishers => handle_publishers(&settings),
        Commands::Completions { .. } => Ok(()),
    }
}

/// Everything a run needs, built once from settings
struct Harvester {
    http: Arc<HttpClient>,
    pipeline: Arc<ArticlePipeline>,
    store: RecordStore,
}

fn build_harvester(settings: &Settings) -> Result<Harvester, String> {
    let http = Arc::new(HttpClient::new(settings).map_err(|e| e.to_string())?);
    let backend = Arc::new(OpenAiBackend::new(settings).map_err(|e| e.to_string())?);
    let ledger = Arc::new(Ledger::open(&settings.ledger_path).map_err(|e| e.to_string())?);
    let store = RecordStore::new(&settings.output_dir);

    let metadata = Arc::new(MetadataExtractor::new(backend, ledger, store.clone(), &settings.llm));
    let pipeline = Arc::new(ArticlePipeline::new(
        http.clone(),
        Arc::new(PdfTextExtractor),
        metadata,
        store.clone(),
    ));
    Ok(Harvester { http, pipeline, store })
}

async fn handle_run(settings: &Settings, only: &[String]) -> Result<(), String> {
    let plan = settings.publisher_plan(only).map_err(|e| e.to_string())?;
    let harvester = build_harvester(settings)?;

    let cancel = CancelFlag::new();
    spawn_ctrl_c_handler(cancel.clone());

    let coordinator = DownloadCoordinator::new(settings, harvester.http.clone(), harvester.pipeline.clone(), cancel.clone());
    let mut stats = RunStats::new();

    for (publisher, seeds) in &plan {
        if cancel.is_cancelled() {
            stats.cancelled = true;
            break;
        }
        tracing::info!("[Run] Scraping {} ({} seeds)", publisher, seeds.len());
        let report = coordinator.run_publisher(*publisher, seeds).await;
        stats.add(report);
    }

    finish_run(settings, stats)
}

async fn handle_reprocess(settings: &Settings) -> Result<(), String> {
    let harvester = build_harvester(settings)?;
    let pdfs = harvester.store.list_pdfs().await.map_err(|e| e.to_string())?;
    let ledger = harvester.pipeline.metadata().ledger();

    let pending: Vec<_> = pdfs
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            let doi = derive_doi(&name);
            (!ledger.contains(&doi)).then_some((path, doi))
        })
        .collect();
    tracing::info!("[Reprocess] {} PDFs without a ledger row", pending.len());

    let cancel = CancelFlag::new();
    spawn_ctrl_c_handler(cancel.clone());

    let mut report = PublisherReport::new("reprocess");
    for (path, doi) in &pending {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let (status, usage) = harvester.pipeline.process_file(path, doi).await;
        report.record_extraction(&status, usage, &settings.llm);
    }

    let mut stats = RunStats::new();
    stats.add(report);
    finish_run(settings, stats)
}

fn handle_publishers(settings: &Settings) -> Result<(), String> {
    let plan = settings.publisher_plan(&[]).map_err(|e| e.to_string())?;
    for (publisher, seeds) in plan {
        println!("{} ({} seeds)", publisher, seeds.len());
        for seed in seeds {
            println!("  {}", seed);
        }
    }
    Ok(())
}

fn finish_run(settings: &Settings, mut stats: RunStats) -> Result<(), String> {
    stats.finish();
    stats.print_summary();

    let summary_path = settings.summary_path();
    match stats.write_summary(&summary_path) {
        Ok(()) => tracing::info!("[Run] Summary written to {}", summary_path.display()),
        Err(e) => tracing::warn!("[Run] Could not write summary {}: {}", summary_path.display(), e),
    }
    Ok(())
}

/// First Ctrl-C stops the run at the next seed/page boundary
fn spawn_ctrl_c_handler(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("[Run] Ctrl-C received; finishing in-flight downloads, then stopping");
            cancel.cancel();
        }
    });
}
