//! Human-readable per-sample trace written next to each shard log

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::records::StoreError;

/// Whether a run persists results or only traces them
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RunMode {
    /// Append results to the shard log
    Run,
    /// Echo the trace to stdout; the shard log is left untouched
    Test,
}

/// Append-only text log of one shard run
pub struct RunLog {
    path: PathBuf,
    file: File,
    echo: bool,
}

impl RunLog {
    /// Open (creating if needed) a run log for appending
    pub fn open(path: impl Into<PathBuf>, mode: RunMode) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        Ok(Self {
            path,
            file,
            echo: mode == RunMode::Test,
        })
    }

    pub fn line(&mut self, msg: &str) -> Result<(), StoreError> {
        if self.echo {
            println!("{}", msg);
        }
        writeln!(self.file, "{}", msg).map_err(|e| StoreError::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write the run's error indices as a single `Error Indices: [..]` line.
///
/// Nothing is written when the list is empty.
pub fn write_error_indices(path: &Path, indices: &[usize]) -> Result<(), StoreError> {
    if indices.is_empty() {
        return Ok(());
    }
    let mut log = RunLog::open(path, RunMode::Run)?;
    log.line(&format!("Error Indices: {:?}", indices))
}
