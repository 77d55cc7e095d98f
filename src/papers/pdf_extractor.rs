//! PDF text extraction
//!
//! Wraps the pdf-extract crate:
//! - parsing runs on a blocking thread so a slow PDF never stalls the runtime
//! - a panic inside the parser surfaces as `ExtractionError::Join`
//! - scanned/image-only PDFs (no text layer) are reported as `NoText`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::section_parser::{join_pages, slice_body};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("PDF parse failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no text layer in {0}")]
    NoText(PathBuf),
    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// `extract(pdf_path) -> plain text`, already sliced to the article body
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, pdf_path: &Path) -> Result<String, ExtractionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, pdf_path: &Path) -> Result<String, ExtractionError> {
        let bytes = tokio::fs::read(pdf_path).await.map_err(|source| ExtractionError::Io {
            path: pdf_path.to_path_buf(),
            source,
        })?;

        let path = pdf_path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| ExtractionError::Pdf {
                path,
                message: e.to_string(),
            })
        })
        .await??;

        let full_text = join_pages(&pages);
        if full_text.trim().is_empty() {
            return Err(ExtractionError::NoText(pdf_path.to_path_buf()));
        }

        let body = slice_body(&full_text);
        if !body.sliced {
            tracing::info!(
                "[Extractor] Abstract or References heading not found in {}, keeping full text",
                pdf_path.display()
            );
        }
        tracing::debug!(
            "[Extractor] {} pages, {} chars from {}",
            pages.len(),
            body.text.len(),
            pdf_path.display()
        );
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PdfTextExtractor.extract(&dir.path().join("absent.pdf")).await;
        assert!(matches!(result, Err(ExtractionError::Io { .. })));
    }

    #[tokio::test]
    async fn test_garbage_bytes_fail_without_panicking_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.7\nthis is not really a pdf").unwrap();

        let result = PdfTextExtractor.extract(&path).await;
        assert!(matches!(
            result,
            Err(ExtractionError::Pdf { .. }) | Err(ExtractionError::Join(_)) | Err(ExtractionError::NoText(_))
        ));
    }
}
