//! CSV ledger of processed articles
//!
//! The file is append-only. Known DOIs are loaded once at open and kept in a
//! set; the membership check and the append happen under one lock, so two
//! workers can never both record the same DOI. Workers also claim a DOI
//! before calling the language backend, so one article is never sent twice
//! in the same run.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::{ArticleRecord, LEDGER_HEADER};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("ledger append task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Default)]
struct LedgerState {
    known: HashSet<String>,
    in_flight: HashSet<String>,
}

pub struct Ledger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

/// Result of trying to reserve a DOI for processing
pub enum Claim<'a> {
    Claimed(ClaimGuard<'a>),
    /// Already recorded in the ledger
    Exists,
    /// Another worker holds the claim right now
    InFlight,
}

/// Releases the in-flight claim when dropped
pub struct ClaimGuard<'a> {
    ledger: &'a Ledger,
    doi: String,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.ledger.lock().in_flight.remove(&self.doi);
    }
}

impl Ledger {
    /// Open (or create with a header) the ledger at `path` and index its DOIs
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        let io_err = |source| LedgerError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let is_empty = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(io_err(e)),
        };

        let mut known = HashSet::new();
        if is_empty {
            let mut writer = csv::Writer::from_path(path)?;
            writer.write_record(LEDGER_HEADER)?;
            writer.flush().map_err(io_err)?;
        } else {
            let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
            let doi_col = reader
                .headers()?
                .iter()
                .position(|h| h.trim() == "DOI")
                .unwrap_or(0);
            for row in reader.records() {
                if let Some(doi) = row?.get(doi_col).map(str::trim).filter(|d| !d.is_empty()) {
                    known.insert(doi.to_string());
                }
            }
        }

        tracing::info!("[Ledger] {} known articles in {}", known.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(LedgerState { known, in_flight: HashSet::new() }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, doi: &str) -> bool {
        self.lock().known.contains(doi)
    }

    pub fn len(&self) -> usize {
        self.lock().known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve `doi` for processing by the caller
    pub fn claim(&self, doi: &str) -> Claim<'_> {
        let mut state = self.lock();
        if state.known.contains(doi) {
            return Claim::Exists;
        }
        if !state.in_flight.insert(doi.to_string()) {
            return Claim::InFlight;
        }
        Claim::Claimed(ClaimGuard { ledger: self, doi: doi.to_string() })
    }

    /// Append one row unless the DOI is already recorded. Returns whether a row was written.
    pub fn insert_if_absent(&self, record: &ArticleRecord) -> Result<bool, LedgerError> {
        let mut state = self.lock();
        if state.known.contains(&record.doi) {
            return Ok(false);
        }

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|source| LedgerError::Io { path: self.path.clone(), source })?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(&record.ledger_row())?;
        writer
            .flush()
            .map_err(|source| LedgerError::Io { path: self.path.clone(), source })?;

        state.known.insert(record.doi.clone());
        tracing::debug!(doi = %record.doi, "[Ledger] Recorded");
        Ok(true)
    }

    /// `insert_if_absent` on the blocking pool, for callers running on the async runtime
    pub async fn append(self: Arc<Self>, record: ArticleRecord) -> Result<bool, LedgerError> {
        tokio::task::spawn_blocking(move || self.insert_if_absent(&record)).await?
    }

    /// Every data row currently in the file
    pub fn rows(&self) -> Result<Vec<csv::StringRecord>, LedgerError> {
        let _state = self.lock();
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(&self.path)?;
        reader.records().map(|r| r.map_err(LedgerError::from)).collect()
    }
}
