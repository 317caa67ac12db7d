//! Appends captured output to a job's local log file

use crate::Result;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Appends newly observed output bytes to local log files.
///
/// The lenient [`append`](Self::append) swallows I/O failures so a
/// transient file-system hiccup does not halt a polling pass; callers
/// whose bookkeeping depends on the write landing use
/// [`append_strict`](Self::append_strict).
#[derive(Debug, Clone, Default)]
pub struct LogShipper;

impl LogShipper {
    /// Append, logging and swallowing any I/O failure
    pub async fn append(&self, path: &Path, content: &[u8]) {
        if let Err(e) = self.append_strict(path, content).await {
            tracing::warn!("Failed to append {} bytes to {:?}: {}", content.len(), path, e);
        }
    }

    /// Append, propagating I/O failures to the caller
    pub async fn append_strict(&self, path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(content).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_creates_and_appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job-1.log");
        let shipper = LogShipper;

        shipper.append_strict(&path, b"hello\n").await.unwrap();
        shipper.append_strict(&path, b"world\n").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_append_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs").join("job-1").join("out.log");
        let shipper = LogShipper;

        shipper.append_strict(&path, b"x").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_lenient_append_swallows_failures() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = LogShipper;

        // The target is a directory, so the open fails; the lenient
        // variant must not propagate it.
        shipper.append(dir.path(), b"ignored").await;
    }

    #[tokio::test]
    async fn test_strict_append_propagates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let shipper = LogShipper;

        assert!(shipper.append_strict(dir.path(), b"ignored").await.is_err());
    }
}
