//! Derived-size computation run by the scrape scheduler.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{ExporterError, Result};

/// Computes the expensive derived value refreshed by each scrape run.
///
/// Implementations run on the blocking pool, so they may do synchronous I/O.
pub trait SizeComputer: Send + Sync {
    fn compute(&self) -> Result<u64>;
}

/// Sums the sizes of every regular file below a directory.
#[derive(Debug, Clone)]
pub struct DirectorySizeComputer {
    root: PathBuf,
}

impl DirectorySizeComputer {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SizeComputer for DirectorySizeComputer {
    fn compute(&self) -> Result<u64> {
        let meta = fs::metadata(&self.root).map_err(|e| {
            ExporterError::file_operation(format!(
                "Attachment directory {} is not readable: {}",
                self.root.display(),
                e
            ))
        })?;
        if !meta.is_dir() {
            return Err(ExporterError::file_operation(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        // iterative walk, symlinks are counted as neither files nor dirs
        let mut total = 0u64;
        let mut files = 0u64;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    total = total.saturating_add(entry.metadata()?.len());
                    files += 1;
                }
            }
        }

        debug!(
            "Walked {} ({} files, {} bytes)",
            self.root.display(),
            files,
            total
        );
        Ok(total)
    }
}
