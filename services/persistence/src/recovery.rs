//! Crash Recovery — Snapshot restore plus log tail replay
//!
//! Boot sequence:
//! 1. load the newest usable snapshot, or start from `S::default()`;
//! 2. read the log tail past the snapshot's sequence, best-effort;
//! 3. replay entries through the caller's handler while sequences stay
//!    contiguous, stopping at the first hole.
//!
//! Stopping at a hole means an entry is never applied unless every
//! predecessor was. Whatever sits past a hole was written after a
//! corruption event and cannot be trusted to follow from the state.

use crate::journal::{LogEntry, LogError};
use crate::reader::{CorruptionReport, LogReader};
use crate::snapshot::{SnapshotError, SnapshotSkip, SnapshotStore};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

// ───────────────────────── Errors ─────────────────────────

/// Failure to apply one log entry during replay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Malformed payload at sequence {sequence}: {detail}")]
    Malformed { sequence: u64, detail: String },

    #[error("Entry at sequence {sequence} rejected by state: {detail}")]
    Rejected { sequence: u64, detail: String },
}

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Log error: {0}")]
    Log(#[from] LogError),

    #[error("Replay failed at sequence {sequence}: {source}")]
    Replay { sequence: u64, source: ReplayError },
}

// ───────────────────────── Replay Handler ─────────────────────────

/// Applies one log entry to the caller's state type.
///
/// Implementations must be pure functions of `(state, entry)`: no
/// clocks, no randomness, no IO. Replaying the same log against the
/// same starting state must always produce the same bytes.
pub trait ReplayHandler<S> {
    fn apply(&self, state: &mut S, entry: &LogEntry) -> Result<(), ReplayError>;
}

// ───────────────────────── Metrics ─────────────────────────

/// What recovery did, for startup logging.
#[derive(Debug, Clone)]
pub struct RecoveryMetrics {
    /// Sequence of the snapshot restored, if any.
    pub snapshot_sequence: Option<u64>,
    /// Snapshot files that existed but could not be used.
    pub snapshots_skipped: usize,
    pub entries_replayed: u64,
    /// Bad frames the log reader stepped around.
    pub corrupt_frames_skipped: usize,
    /// Highest sequence reflected in the recovered state.
    pub final_sequence: u64,
    pub elapsed: Duration,
}

/// Recovered state plus everything worth reporting about how it was
/// produced.
#[derive(Debug)]
pub struct RecoveryOutcome<S> {
    pub state: S,
    pub metrics: RecoveryMetrics,
    pub snapshot_skips: Vec<SnapshotSkip>,
    pub corruption_reports: Vec<CorruptionReport>,
}

// ───────────────────────── Recovery Engine ─────────────────────────

/// Orchestrates snapshot restore and log replay for one service.
pub struct RecoveryEngine {
    snapshots: SnapshotStore,
    log_dir: PathBuf,
}

impl RecoveryEngine {
    pub fn new(snapshots: SnapshotStore, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshots,
            log_dir: log_dir.into(),
        }
    }

    /// Rebuild state from disk.
    ///
    /// Returns the recovered state and the sequence the log writer
    /// should resume after (`metrics.final_sequence`).
    pub fn recover<S, H>(&self, handler: &H) -> Result<RecoveryOutcome<S>, RecoveryError>
    where
        S: Default + DeserializeOwned,
        H: ReplayHandler<S>,
    {
        let started = Instant::now();

        let (snapshot, snapshot_skips) = self.snapshots.load_latest::<S>()?;
        let (mut state, base_sequence, snapshot_sequence) = match snapshot {
            Some(snap) => {
                let sequence = snap.sequence;
                (snap.state, sequence, Some(sequence))
            }
            None => (S::default(), 0, None),
        };

        let reader = LogReader::open(&self.log_dir)?;
        let (tail, corruption_reports) = reader.entries_after(base_sequence)?;

        let mut expected = base_sequence + 1;
        let mut entries_replayed = 0u64;
        for entry in &tail {
            if entry.sequence != expected {
                break;
            }
            handler
                .apply(&mut state, entry)
                .map_err(|source| RecoveryError::Replay {
                    sequence: entry.sequence,
                    source,
                })?;
            expected += 1;
            entries_replayed += 1;
        }

        let metrics = RecoveryMetrics {
            snapshot_sequence,
            snapshots_skipped: snapshot_skips.len(),
            entries_replayed,
            corrupt_frames_skipped: corruption_reports.len(),
            final_sequence: expected - 1,
            elapsed: started.elapsed(),
        };

        Ok(RecoveryOutcome {
            state,
            metrics,
            snapshot_skips,
            corruption_reports,
        })
    }
}

// ───────────────────────── Tests ─────────────────────────
