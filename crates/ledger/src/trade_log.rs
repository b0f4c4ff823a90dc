//! Append-only trade log.
//!
//! One human-readable line per processed tick, in the order ticks were
//! processed. Existing content is never truncated, so restarts keep
//! appending to the same file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::policy::LogEntry;

pub struct TradeLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TradeLog {
    /// Create or open the log at `path` in append mode.
    ///
    /// Missing parent directories are created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create trade log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open trade log at {}", path.display()))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entry` as a single line and flush it to the file.
    pub fn append(&mut self, entry: &LogEntry) -> Result<()> {
        writeln!(self.writer, "{entry}").context("failed to write to trade log")?;
        self.writer.flush().context("failed to flush trade log")?;
        Ok(())
    }

    /// All non-empty lines currently in the file.
    pub fn read_lines(&self) -> Result<Vec<String>> {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open trade log {} for reading", self.path.display()))?;
        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.context("failed to read trade log line")?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    /// Number of entries in the file.
    pub fn entry_count(&self) -> Result<usize> {
        Ok(self.read_lines()?.len())
    }
}
