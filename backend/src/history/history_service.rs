use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use log::info;
use shared::AnalysisResult;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Failed to persist history: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Append-only, capacity-bounded log of past analyses, newest first.
/// The mutex serializes all mutations, including the optional file
/// rewrite, so concurrent appends cannot interleave evictions.
///
/// Memory is mutated before the file rewrite: if persistence fails, the
/// in-memory log keeps the entry and the error propagates to the caller.
pub struct HistoryService {
    entries: Mutex<VecDeque<AnalysisResult>>,
    capacity: usize,
    persist_path: Option<PathBuf>,
}

impl HistoryService {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            persist_path: None,
        }
    }

    /// File-backed variant: loads any existing history (truncated to
    /// capacity) and rewrites the file atomically on every mutation.
    pub async fn with_persistence(
        capacity: usize,
        path: impl AsRef<Path>,
    ) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        let mut entries = VecDeque::with_capacity(capacity);

        match tokio::fs::read(&path).await {
            Ok(data) => {
                let stored: Vec<AnalysisResult> = serde_json::from_slice(&data)?;
                info!("Loaded {} history entries from {}", stored.len(), path.display());
                entries.extend(stored.into_iter().take(capacity));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            entries: Mutex::new(entries),
            capacity,
            persist_path: Some(path),
        })
    }

    pub async fn append(&self, result: AnalysisResult) -> Result<(), HistoryError> {
        let mut entries = self.entries.lock().await;
        entries.push_front(result);
        entries.truncate(self.capacity);
        info!("Added analysis to history ({} entries)", entries.len());
        self.persist(&entries).await
    }

    /// Returns a defensive copy, newest first.
    pub async fn list(&self) -> Vec<AnalysisResult> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub async fn clear(&self) -> Result<(), HistoryError> {
        let mut entries = self.entries.lock().await;
        let removed = entries.len();
        entries.clear();
        info!("History cleared, removed {removed} entries");
        self.persist(&entries).await
    }

    async fn persist(&self, entries: &VecDeque<AnalysisResult>) -> Result<(), HistoryError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let snapshot: Vec<&AnalysisResult> = entries.iter().collect();
        let data = serde_json::to_vec_pretty(&snapshot)?;
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
