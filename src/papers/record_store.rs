//! Per-article files in the output directory
//!
//! `{dir}/{doi}.json` holds the structured record, `{dir}/{doi}.txt` the
//! extracted text; downloaded PDFs live alongside them under their URL file
//! name, which often has no `.pdf` extension.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use super::ArticleRecord;

#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn json_path(&self, doi: &str) -> PathBuf {
        self.dir.join(format!("{}.json", doi))
    }

    pub fn text_path(&self, doi: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", doi))
    }

    pub async fn save_record(&self, record: &ArticleRecord) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.json_path(&record.doi);
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }

    pub async fn load_record(&self, doi: &str) -> io::Result<ArticleRecord> {
        let raw = tokio::fs::read_to_string(self.json_path(doi)).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn save_text(&self, doi: &str, text: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.text_path(doi);
        tokio::fs::write(&path, text).await?;
        Ok(path)
    }

    /// PDFs already on disk, recognised by their `%PDF` header, sorted by name
    pub async fn list_pdfs(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut pdfs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if has_pdf_magic(&path).await? {
                pdfs.push(path);
            }
        }
        pdfs.sort();
        Ok(pdfs)
    }
}

async fn has_pdf_magic(path: &Path) -> io::Result<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic).await {
        Ok(_) => Ok(&magic == b"%PDF"),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::papers::sample_record;

    #[tokio::test]
    async fn test_record_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("out"));
        let record = sample_record("s40543-024-00431-2");

        let path = store.save_record(&record).await.unwrap();
        assert_eq!(path, dir.path().join("out").join("s40543-024-00431-2.json"));

        let loaded = store.load_record("s40543-024-00431-2").await.unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_json_uses_ledger_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path());
        let path = store.save_record(&sample_record("x")).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 12);
        assert_eq!(object["DOI"], "x");
        assert_eq!(object["Relevant fields"][1], "Organic chemistry");
        assert!(object.contains_key("Institute of Origin"));
    }

    #[tokio::test]
    async fn test_list_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.json"), b"{}").unwrap();
        std::fs::create_dir(dir.path().join("dir.pdf")).unwrap();

        let store = RecordStore::new(dir.path());
        let pdfs = store.list_pdfs().await.unwrap();
        let names: Vec<_> = pdfs.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_list_pdfs_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["s40543-024-00431-2", "jacs.4c00001", "aic.18401", "s42004-024-01111-1.pdf"] {
            std::fs::write(dir.path().join(name), b"%PDF-1.7\n").unwrap();
        }
        std::fs::write(dir.path().join("jacs.4c00001.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("jacs.4c00001.txt"), b"Abstract").unwrap();
        std::fs::write(dir.path().join("run_summary.json"), b"{\"publishers\": []}").unwrap();
        std::fs::write(dir.path().join("short"), b"%P").unwrap();

        let store = RecordStore::new(dir.path());
        let pdfs = store.list_pdfs().await.unwrap();
        let names: Vec<_> = pdfs.iter().map(|p| p.file_name().unwrap().to_str().unwrap()).collect();
        assert_eq!(names, vec!["aic.18401", "jacs.4c00001", "s40543-024-00431-2", "s42004-024-01111-1.pdf"]);
    }

    #[tokio::test]
    async fn test_list_pdfs_missing_dir() {
        let store = RecordStore::new("/nonexistent/paperharvest/out");
        assert!(store.list_pdfs().await.unwrap().is_empty());
    }
}
