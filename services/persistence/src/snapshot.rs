//! Snapshot Store — Full-state checkpoints with integrity hashes
//!
//! A snapshot bounds recovery time: restart loads the newest good
//! checkpoint and replays only the log tail past it. The state type is
//! supplied by the caller; this module stores any `Serialize` +
//! `DeserializeOwned` value.
//!
//! On disk a snapshot is a bincode envelope holding the bincode-encoded
//! state bytes plus a SHA-256 hex digest over exactly those bytes,
//! optionally zstd-compressed (`.snap` vs `.snap.zst`). Writes go to a
//! temp file, fsync, then rename.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot envelope version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// zstd level used for compressed snapshots.
const COMPRESSION_LEVEL: i32 = 3;

// ───────────────────────── Errors ─────────────────────────

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Integrity mismatch: recorded {expected}, computed {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("Unsupported snapshot version {found}, this build supports up to {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

// ───────────────────────── Snapshot ─────────────────────────

/// A verified, decoded snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<S> {
    pub version: u32,
    /// Last log sequence folded into `state`.
    pub sequence: u64,
    /// Wall-clock time the snapshot was taken, unix milliseconds.
    pub taken_at: i64,
    pub state: S,
    /// SHA-256 hex digest over the encoded state bytes.
    pub integrity: String,
}

/// On-disk envelope. State stays as bytes so the digest covers exactly
/// what was stored.
#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    sequence: u64,
    taken_at: i64,
    integrity: String,
    state: Vec<u8>,
}

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A snapshot file that could not be used, with the reason.
#[derive(Debug, Clone)]
pub struct SnapshotSkip {
    pub path: PathBuf,
    pub reason: String,
}

// ───────────────────────── Snapshot Store ─────────────────────────

/// Reads and writes `state-{sequence:012}.snap[.zst]` files in one
/// directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    compress: bool,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            compress,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a checkpoint of `state` as of log position `sequence`.
    pub fn write<S: Serialize>(
        &self,
        state: &S,
        sequence: u64,
        taken_at: i64,
    ) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let state_bytes =
            bincode::serialize(state).map_err(|e| SnapshotError::Encode(e.to_string()))?;
        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            sequence,
            taken_at,
            integrity: digest_hex(&state_bytes),
            state: state_bytes,
        };
        let encoded =
            bincode::serialize(&envelope).map_err(|e| SnapshotError::Encode(e.to_string()))?;

        let (body, ext) = if self.compress {
            (zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL)?, "snap.zst")
        } else {
            (encoded, "snap")
        };

        let filename = format!("state-{:012}.{}", sequence, ext);
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{}.tmp", filename));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        Ok(path)
    }

    /// Load and verify one snapshot file.
    pub fn load<S: DeserializeOwned>(&self, path: &Path) -> Result<Snapshot<S>, SnapshotError> {
        let raw = fs::read(path)?;

        let compressed = path.to_string_lossy().ends_with(".snap.zst");
        let encoded = if compressed {
            zstd::decode_all(raw.as_slice())?
        } else {
            raw
        };

        let envelope: Envelope =
            bincode::deserialize(&encoded).map_err(|e| SnapshotError::Decode(e.to_string()))?;

        if envelope.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: envelope.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let actual = digest_hex(&envelope.state);
        if actual != envelope.integrity {
            return Err(SnapshotError::IntegrityMismatch {
                expected: envelope.integrity,
                actual,
            });
        }

        let state: S = bincode::deserialize(&envelope.state)
            .map_err(|e| SnapshotError::Decode(e.to_string()))?;

        Ok(Snapshot {
            version: envelope.version,
            sequence: envelope.sequence,
            taken_at: envelope.taken_at,
            state,
            integrity: envelope.integrity,
        })
    }

    /// Load the newest usable snapshot.
    ///
    /// Candidates are tried newest-first; ones that fail to load are
    /// returned as skips so the caller can log them. `None` means no
    /// usable snapshot exists and recovery starts from default state.
    pub fn load_latest<S: DeserializeOwned>(
        &self,
    ) -> Result<(Option<Snapshot<S>>, Vec<SnapshotSkip>), SnapshotError> {
        let mut candidates = self.list()?;
        candidates.reverse();

        let mut skips = Vec::new();
        for (_, path) in candidates {
            match self.load(&path) {
                Ok(snapshot) => return Ok((Some(snapshot), skips)),
                Err(err) => skips.push(SnapshotSkip {
                    path,
                    reason: err.to_string(),
                }),
            }
        }
        Ok((None, skips))
    }

    /// All snapshot files as `(sequence, path)`, oldest first.
    pub fn list(&self) -> Result<Vec<(u64, PathBuf)>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(sequence) = Self::parse_sequence(&name) {
                results.push((sequence, entry.path()));
            }
        }
        results.sort_by_key(|(sequence, _)| *sequence);
        Ok(results)
    }

    /// Delete all but the newest `count` snapshots. Returns the paths
    /// removed.
    pub fn retain(&self, count: usize) -> Result<Vec<PathBuf>, SnapshotError> {
        let snapshots = self.list()?;
        let mut removed = Vec::new();
        if snapshots.len() > count {
            for (_, path) in &snapshots[..snapshots.len() - count] {
                fs::remove_file(path)?;
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }

    fn parse_sequence(name: &str) -> Option<u64> {
        let stem = name
            .strip_suffix(".snap.zst")
            .or_else(|| name.strip_suffix(".snap"))?;
        stem.strip_prefix("state-")?.parse().ok()
    }
}

// ───────────────────────── Tests ─────────────────────────
