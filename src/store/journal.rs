//! Append-only JSON Lines journal backing the event store.
//!
//! Each stored delivery is one line. The format is crash-safe because
//! complete lines are always valid JSON, while a partial line left by a crash
//! mid-write is detected and truncated on replay. A failed append is rolled
//! back to the previous length, and replay skips any complete line that still
//! fails to parse, so one bad write never hides the lines after it.
//!
//! # Bounding
//!
//! The store only retains its newest `capacity` deliveries, so the journal is
//! periodically compacted down to exactly those entries. Compaction writes a
//! temp file, fsyncs it, renames it over the journal and fsyncs the directory,
//! so a crash leaves either the old or the new journal intact.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use super::fsync::{fsync_dir, fsync_file};
use crate::types::WebhookDelivery;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;

/// An append-only journal of stored deliveries.
pub struct Journal {
    /// The underlying file handle, opened for append.
    file: File,
    /// Path to the journal file.
    path: PathBuf,
    /// Number of complete lines currently in the file.
    lines: usize,
}

impl Journal {
    /// Opens a journal, creating it if needed, and replays its contents.
    ///
    /// Returns the journal ready for appending together with every delivery
    /// it held, oldest first.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<WebhookDelivery>)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let deliveries = Self::replay(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let journal = Journal {
            file,
            path,
            lines: deliveries.len(),
        };
        Ok((journal, deliveries))
    }

    /// Appends one delivery and fsyncs it.
    ///
    /// On failure the file is cut back to its length before the write.
    pub fn append(&mut self, delivery: &WebhookDelivery) -> Result<()> {
        let mut line = serde_json::to_string(delivery)?;
        line.push('\n');

        let start = self.file.metadata()?.len();
        let written = self
            .file
            .write_all(line.as_bytes())
            .and_then(|()| fsync_file(&self.file));
        if let Err(e) = written {
            if let Err(rollback) = self.file.set_len(start) {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "Failed to roll back partial journal write"
                );
            }
            return Err(e.into());
        }

        self.lines += 1;
        Ok(())
    }

    /// Returns true once the journal holds more than twice `capacity` lines.
    pub fn needs_compaction(&self, capacity: usize) -> bool {
        self.lines > capacity.saturating_mul(2)
    }

    /// Rewrites the journal so it contains exactly `retained`, in order.
    pub fn compact<'a>(
        &mut self,
        retained: impl IntoIterator<Item = &'a WebhookDelivery>,
    ) -> Result<()> {
        let tmp_path = self.path.with_extension("jsonl.tmp");
        let mut lines = 0;

        {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            for delivery in retained {
                let json = serde_json::to_string(delivery)?;
                writeln!(tmp, "{}", json)?;
                lines += 1;
            }
            fsync_file(&tmp)?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fsync_dir(parent)?;
        }

        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.lines = lines;
        Ok(())
    }

    /// Returns the number of complete lines in the journal.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Returns the path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every delivery in the journal, truncating a torn final line.
    ///
    /// A final line without its newline is the partial write from a crash; the
    /// file is cut at the start of that line. A complete line that doesn't
    /// parse is skipped with a warning so the entries after it survive.
    /// A missing file replays as empty.
    pub fn replay(path: impl AsRef<Path>) -> Result<Vec<WebhookDelivery>> {
        let path = path.as_ref();

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut deliveries = Vec::new();
        let mut last_valid_pos = 0u64;
        let mut line = Vec::new();

        loop {
            line.clear();
            let bytes_read = reader.read_until(b'\n', &mut line)?;
            if bytes_read == 0 {
                break;
            }

            // A final line without its newline is torn even if it parses.
            if line.last() != Some(&b'\n') {
                break;
            }
            let line_start = last_valid_pos;
            last_valid_pos += bytes_read as u64;

            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_slice::<WebhookDelivery>(trimmed) {
                Ok(delivery) => deliveries.push(delivery),
                Err(e) => warn!(
                    path = %path.display(),
                    offset = line_start,
                    error = %e,
                    "Skipping unreadable journal line"
                ),
            }
        }

        if last_valid_pos < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(last_valid_pos)?;
            fsync_file(&file)?;
        }

        Ok(deliveries)
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("path", &self.path)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}
