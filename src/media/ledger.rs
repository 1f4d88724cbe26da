//! Append-only record of downloads that never made it to disk

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// File name of the ledger inside its root directory
pub const LEDGER_FILE: &str = "not_downloaded.txt";

/// Durable failure ledger, one `<record id>:<path>:<url>` line per failure
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    /// Ledger stored as `not_downloaded.txt` under `root`
    pub fn in_dir(root: &Path) -> Self {
        Self {
            path: root.join(LEDGER_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one failure line
    pub async fn append(&self, record_id: &str, destination: &Path, url: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = format!("{}:{}:{}\n", record_id, destination.display(), url);
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Reads every line recorded so far
    pub async fn entries(&self) -> std::io::Result<Vec<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
