//! Log Reader — Sequential scan with corruption reporting
//!
//! Reads `oplog-*.bin` files in index order. Two modes:
//! - strict (`read_all`): the first bad frame anywhere is an error;
//! - best-effort (`recover_all`): a bad frame ends that file's scan,
//!   is reported, and reading continues with the next file.
//!
//! Best-effort is what crash recovery wants. A torn frame at the tail
//! of the newest file is the ordinary signature of an interrupted
//! append, not a reason to refuse to start.

use crate::journal::{FrameError, LogEntry, LogError, LogWriter};
use std::fs;
use std::path::{Path, PathBuf};

// ───────────────────────── Corruption Reports ─────────────────────────

/// One undecodable frame, located for diagnostics.
#[derive(Debug, Clone)]
pub struct CorruptionReport {
    pub file: PathBuf,
    /// Byte offset of the bad frame within its file.
    pub offset: u64,
    pub error: FrameError,
}

impl CorruptionReport {
    /// Torn tails come from interrupted appends; anything else means
    /// the stored bytes changed after they were written.
    pub fn is_torn_tail(&self) -> bool {
        matches!(self.error, FrameError::Truncated { .. })
    }
}

/// Best-effort summary of a single log file. Used by retention logic
/// to decide whether a file is wholly covered by a snapshot.
#[derive(Debug, Clone)]
pub struct FileScan {
    pub path: PathBuf,
    pub entry_count: u64,
    pub first_sequence: Option<u64>,
    pub last_sequence: Option<u64>,
}

// ───────────────────────── Log Reader ─────────────────────────

/// Batch reader over every log file in a directory.
pub struct LogReader {
    files: Vec<PathBuf>,
}

impl LogReader {
    /// Discover `oplog-*.bin` files under `dir`, sorted by index.
    /// A missing directory reads as an empty log.
    pub fn open(dir: &Path) -> Result<Self, LogError> {
        if !dir.exists() {
            return Ok(Self { files: Vec::new() });
        }

        let mut indexed: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                LogWriter::parse_index(&e.file_name().to_string_lossy()).map(|idx| (idx, e.path()))
            })
            .collect();
        indexed.sort_by_key(|(idx, _)| *idx);

        Ok(Self {
            files: indexed.into_iter().map(|(_, p)| p).collect(),
        })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Read every entry, failing on the first bad frame.
    pub fn read_all(&self) -> Result<Vec<LogEntry>, LogError> {
        let mut entries = Vec::new();
        for path in &self.files {
            let (mut file_entries, report) = Self::scan_frames(path)?;
            entries.append(&mut file_entries);
            if let Some(report) = report {
                return Err(LogError::CorruptFrame {
                    file: report.file,
                    offset: report.offset,
                    reason: report.error,
                });
            }
        }
        Ok(entries)
    }

    /// Read every decodable entry, collecting a report per bad frame.
    /// Each file's scan stops at its first bad frame; later files are
    /// still read in full.
    pub fn recover_all(&self) -> Result<(Vec<LogEntry>, Vec<CorruptionReport>), LogError> {
        let mut entries = Vec::new();
        let mut reports = Vec::new();
        for path in &self.files {
            let (mut file_entries, report) = Self::scan_frames(path)?;
            entries.append(&mut file_entries);
            if let Some(report) = report {
                reports.push(report);
            }
        }
        Ok((entries, reports))
    }

    /// Best-effort read of entries with sequence strictly greater than
    /// `sequence`. This is the replay tail after restoring a snapshot.
    pub fn entries_after(
        &self,
        sequence: u64,
    ) -> Result<(Vec<LogEntry>, Vec<CorruptionReport>), LogError> {
        let (entries, reports) = self.recover_all()?;
        let tail = entries.into_iter().filter(|e| e.sequence > sequence).collect();
        Ok((tail, reports))
    }

    /// Summarize one file without holding its entries.
    pub fn scan_file(path: &Path) -> Result<FileScan, LogError> {
        let (entries, _) = Self::scan_frames(path)?;
        Ok(FileScan {
            path: path.to_path_buf(),
            entry_count: entries.len() as u64,
            first_sequence: entries.first().map(|e| e.sequence),
            last_sequence: entries.last().map(|e| e.sequence),
        })
    }

    /// Check that sequences are strictly ascending with no holes.
    pub fn validate_sequences(entries: &[LogEntry]) -> Result<(), LogError> {
        for window in entries.windows(2) {
            let expected = window[0].sequence + 1;
            let found = window[1].sequence;
            if found < expected {
                return Err(LogError::SequenceRegression { expected, found });
            }
            if found > expected {
                return Err(LogError::SequenceGap { expected, found });
            }
        }
        Ok(())
    }

    // ── Internal helpers ──────────────────────────────────────────

    /// Decode frames from the front of a file until the end or the
    /// first undecodable frame.
    fn scan_frames(path: &Path) -> Result<(Vec<LogEntry>, Option<CorruptionReport>), LogError> {
        let data = fs::read(path)?;
        let mut entries = Vec::new();
        let mut pos = 0usize;

        while pos < data.len() {
            match LogEntry::decode(&data[pos..]) {
                Ok((entry, consumed)) => {
                    entries.push(entry);
                    pos += consumed;
                }
                Err(error) => {
                    return Ok((
                        entries,
                        Some(CorruptionReport {
                            file: path.to_path_buf(),
                            offset: pos as u64,
                            error,
                        }),
                    ));
                }
            }
        }
        Ok((entries, None))
    }
}

// ───────────────────────── Tests ─────────────────────────
