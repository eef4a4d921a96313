//! Operation Log — Append-only binary log with per-frame checksums
//!
//! Every mutation accepted by a service is encoded as one frame and
//! appended here before the caller observes success. Frames carry a
//! CRC32C checksum so torn writes and bit rot are detected on read.
//!
//! # Binary Format (per frame)
//! ```text
//! [frame_len:   u32]  // length of everything after this field
//! [sequence:    u64]
//! [timestamp:   i64]
//! [payload_len: u32][payload: bytes]
//! [checksum:    u32] // CRC32C over sequence ++ timestamp ++ payload
//! ```
//!
//! Payloads are opaque to this crate. Callers store self-describing
//! encodings (tagged enums under bincode), so no type string is framed.

use crc32c::crc32c;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fixed frame overhead: sequence + timestamp + payload_len + checksum.
const FRAME_FIXED_BYTES: u32 = 8 + 8 + 4 + 4;

/// Frames longer than this are treated as corruption, not data.
const MAX_FRAME_LEN: u32 = 32 * 1024 * 1024;

// ───────────────────────── Errors ─────────────────────────

/// Errors a single frame can fail decoding with.
///
/// Truncation at the end of a file is the normal crash artifact; a
/// checksum mismatch means the bytes themselves went bad.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("Implausible frame length {0}")]
    ImplausibleLength(u32),

    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt frame in {} at byte {offset}: {reason}", file.display())]
    CorruptFrame {
        file: PathBuf,
        offset: u64,
        reason: FrameError,
    },

    #[error("Sequence regression: log is at {expected}, caller requested {found}")]
    SequenceRegression { expected: u64, found: u64 },

    #[error("Sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },
}

// ───────────────────────── Log Entry ─────────────────────────

/// One durable record: an opaque payload plus ordering metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Monotonic, gapless position in the log. Starts at 1.
    pub sequence: u64,
    /// Wall-clock time the entry was appended, unix milliseconds.
    /// Diagnostic metadata only; replay never branches on it.
    pub timestamp: i64,
    /// Caller-encoded record bytes.
    pub payload: Vec<u8>,
    /// CRC32C over sequence, timestamp, and payload.
    pub checksum: u32,
}

impl LogEntry {
    pub fn new(sequence: u64, timestamp: i64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, &payload);
        Self {
            sequence,
            timestamp,
            payload,
            checksum,
        }
    }

    pub fn compute_checksum(sequence: u64, timestamp: i64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.payload)
    }

    /// Encode to the binary frame format.
    pub fn encode(&self) -> Vec<u8> {
        let frame_len = FRAME_FIXED_BYTES + self.payload.len() as u32;
        let mut buf = Vec::with_capacity(4 + frame_len as usize);
        buf.extend_from_slice(&frame_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Decode one frame from the front of `data`.
    ///
    /// Returns the entry and the number of bytes consumed. The stored
    /// checksum is verified here, so a successfully decoded entry is
    /// known-good.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), FrameError> {
        if data.len() < 4 {
            return Err(FrameError::Truncated {
                needed: 4,
                have: data.len(),
            });
        }
        let frame_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);

        if frame_len < FRAME_FIXED_BYTES || frame_len > MAX_FRAME_LEN {
            return Err(FrameError::ImplausibleLength(frame_len));
        }

        let total = 4 + frame_len as usize;
        if data.len() < total {
            return Err(FrameError::Truncated {
                needed: total,
                have: data.len(),
            });
        }

        // frame_len >= FRAME_FIXED_BYTES guarantees the fixed fields
        // below are in bounds, and the payload_len consistency check
        // pins the payload and trailing checksum exactly.
        let body = &data[4..total];
        let sequence = u64::from_le_bytes(body[0..8].try_into().unwrap());
        let timestamp = i64::from_le_bytes(body[8..16].try_into().unwrap());
        let payload_len = u32::from_le_bytes(body[16..20].try_into().unwrap()) as usize;

        if payload_len != frame_len as usize - FRAME_FIXED_BYTES as usize {
            return Err(FrameError::ImplausibleLength(frame_len));
        }

        let payload = body[20..20 + payload_len].to_vec();
        let stored =
            u32::from_le_bytes(body[20 + payload_len..20 + payload_len + 4].try_into().unwrap());

        let computed = Self::compute_checksum(sequence, timestamp, &payload);
        if stored != computed {
            return Err(FrameError::ChecksumMismatch { stored, computed });
        }

        Ok((
            Self {
                sequence,
                timestamp,
                payload,
                checksum: stored,
            },
            total,
        ))
    }
}

// ───────────────────────── Flush / Fsync Policies ─────────────────────────

/// When buffered frames are pushed to the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    EveryEntry,
    EveryN(u32),
}

/// When `fsync` is called. Rotation and explicit `sync` always fsync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    Never,
    EveryEntry,
    EveryN(u32),
}

// ───────────────────────── Configuration ─────────────────────────

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory holding `oplog-*.bin` files.
    pub dir: PathBuf,
    /// Rotate to a fresh file once the current one reaches this size.
    pub max_file_bytes: u64,
    pub flush_policy: FlushPolicy,
    pub fsync_policy: FsyncPolicy,
}

impl LogConfig {
    /// Durable defaults: 16 MiB files, flush and fsync on every entry.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_bytes: 16 * 1024 * 1024,
            flush_policy: FlushPolicy::EveryEntry,
            fsync_policy: FsyncPolicy::EveryEntry,
        }
    }
}

// ───────────────────────── Log Writer ─────────────────────────

/// Append-only writer. Assigns sequence numbers itself: callers hand
/// over a payload and get back the sequence it was logged under.
pub struct LogWriter {
    config: LogConfig,
    writer: BufWriter<File>,
    current_path: PathBuf,
    current_file_len: u64,
    file_index: u64,
    next_sequence: u64,
    entries_since_flush: u32,
    entries_since_fsync: u32,
}

impl LogWriter {
    /// Open the log directory for appending.
    ///
    /// Scans existing files newest-first and resumes numbering after
    /// the last decodable frame, so a reopened log continues where the
    /// previous writer stopped even if its tail was torn.
    pub fn open(config: LogConfig) -> Result<Self, LogError> {
        fs::create_dir_all(&config.dir)?;

        let mut file_index = Self::latest_index(&config.dir);
        let mut current_path = Self::log_path(&config.dir, file_index);

        // A crash can leave undecodable bytes at the tail of the newest
        // file. Readers stop at the first bad frame, so appending after
        // it would strand every new frame. The dirty file is kept as-is
        // and writing moves to the next index.
        if Self::has_undecodable_tail(&current_path)? {
            file_index += 1;
            current_path = Self::log_path(&config.dir, file_index);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&current_path)?;
        let current_file_len = file.metadata()?.len();

        let next_sequence = Self::last_sequence_on_disk(&config.dir)?.map_or(1, |s| s + 1);

        Ok(Self {
            config,
            writer: BufWriter::new(file),
            current_path,
            current_file_len,
            file_index,
            next_sequence,
            entries_since_flush: 0,
            entries_since_fsync: 0,
        })
    }

    /// Override the next sequence, e.g. after snapshot-led recovery of
    /// a log whose older files were already cleaned up. Moving the
    /// counter backwards would mint duplicates and is refused.
    pub fn set_next_sequence(&mut self, sequence: u64) -> Result<(), LogError> {
        if sequence < self.next_sequence {
            return Err(LogError::SequenceRegression {
                expected: self.next_sequence,
                found: sequence,
            });
        }
        self.next_sequence = sequence;
        Ok(())
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn current_file_len(&self) -> u64 {
        self.current_file_len
    }

    /// Append a payload, returning the sequence it was assigned.
    pub fn append(&mut self, payload: &[u8], timestamp: i64) -> Result<u64, LogError> {
        if self.current_file_len >= self.config.max_file_bytes {
            self.rotate()?;
        }

        let sequence = self.next_sequence;
        let entry = LogEntry::new(sequence, timestamp, payload.to_vec());
        let bytes = entry.encode();

        self.writer.write_all(&bytes)?;
        self.current_file_len += bytes.len() as u64;
        self.next_sequence = sequence + 1;
        self.entries_since_flush += 1;
        self.entries_since_fsync += 1;

        self.apply_flush_policy()?;
        self.apply_fsync_policy()?;

        Ok(sequence)
    }

    /// Push buffered frames to the OS without forcing them to media.
    pub fn flush(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        self.entries_since_flush = 0;
        Ok(())
    }

    /// Flush and fsync. Called before shutdown and on rotation.
    pub fn sync(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.entries_since_flush = 0;
        self.entries_since_fsync = 0;
        Ok(())
    }

    // ── Internal helpers ──────────────────────────────────────────

    fn apply_flush_policy(&mut self) -> Result<(), LogError> {
        let due = match self.config.flush_policy {
            FlushPolicy::EveryEntry => true,
            FlushPolicy::EveryN(n) => self.entries_since_flush >= n,
        };
        if due {
            self.flush()?;
        }
        Ok(())
    }

    fn apply_fsync_policy(&mut self) -> Result<(), LogError> {
        let due = match self.config.fsync_policy {
            FsyncPolicy::Never => false,
            FsyncPolicy::EveryEntry => true,
            FsyncPolicy::EveryN(n) => self.entries_since_fsync >= n,
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), LogError> {
        self.sync()?;

        self.file_index += 1;
        self.current_path = Self::log_path(&self.config.dir, self.file_index);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_path)?;
        self.writer = BufWriter::new(file);
        self.current_file_len = 0;
        Ok(())
    }

    pub(crate) fn log_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("oplog-{:06}.bin", index))
    }

    pub(crate) fn parse_index(name: &str) -> Option<u64> {
        name.strip_prefix("oplog-")?
            .strip_suffix(".bin")?
            .parse()
            .ok()
    }

    fn latest_index(dir: &Path) -> u64 {
        fs::read_dir(dir)
            .ok()
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| Self::parse_index(&e.file_name().to_string_lossy()))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    fn has_undecodable_tail(path: &Path) -> Result<bool, LogError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut offset = 0usize;
        while offset < data.len() {
            match LogEntry::decode(&data[offset..]) {
                Ok((_, consumed)) => offset += consumed,
                Err(_) => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Highest sequence among decodable frames, newest file first.
    /// Stops each file at its first bad frame, which on the newest file
    /// is exactly the torn tail a crash leaves behind.
    fn last_sequence_on_disk(dir: &Path) -> Result<Option<u64>, LogError> {
        let mut indexed: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                Self::parse_index(&e.file_name().to_string_lossy()).map(|idx| (idx, e.path()))
            })
            .collect();
        indexed.sort_by_key(|(idx, _)| std::cmp::Reverse(*idx));

        for (_, path) in indexed {
            let data = fs::read(&path)?;
            let mut pos = 0usize;
            let mut last = None;
            while pos < data.len() {
                match LogEntry::decode(&data[pos..]) {
                    Ok((entry, consumed)) => {
                        last = Some(entry.sequence);
                        pos += consumed;
                    }
                    Err(_) => break,
                }
            }
            if last.is_some() {
                return Ok(last);
            }
        }
        Ok(None)
    }
}

// ───────────────────────── Tests ─────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &Path) -> LogConfig {
        LogConfig::new(dir)
    }

    // ─── Frame codec tests ───

    #[test]
    fn test_entry_checksum_verifies() {
        let entry = LogEntry::new(1, 1_700_000_000_000, vec![1, 2, 3]);
        assert!(entry.verify_checksum());
    }

    #[test]
    fn test_entry_checksum_detects_tamper() {
        let mut entry = LogEntry::new(1, 1_700_000_000_000, vec![1, 2, 3]);
        entry.payload = vec![9, 9, 9];
        assert!(!entry.verify_checksum());
    }

    #[test]
    fn test_frame_roundtrip() {
        let entry = LogEntry::new(42, 1_700_000_000_123, vec![7; 300]);
        let bytes = entry.encode();
        let (decoded, consumed) = LogEntry::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_frame_roundtrip_empty_payload() {
        let entry = LogEntry::new(1, 0, vec![]);
        let (decoded, consumed) = LogEntry::decode(&entry.encode()).unwrap();
        assert_eq!(consumed, 4 + FRAME_FIXED_BYTES as usize);
        assert_eq!(decoded.payload, Vec::<u8>::new());
    }

    #[test]
    fn test_decode_truncated_frame() {
        let entry = LogEntry::new(7, 100, vec![1, 2, 3, 4]);
        let bytes = entry.encode();
        let err = LogEntry::decode(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { .. }));
    }

    #[test]
    fn test_decode_flipped_byte_fails_checksum() {
        let entry = LogEntry::new(7, 100, vec![1, 2, 3, 4]);
        let mut bytes = entry.encode();
        let payload_start = 4 + 20;
        bytes[payload_start] ^= 0xFF;
        let err = LogEntry::decode(&bytes).unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_decode_implausible_length() {
        let mut bytes = vec![0u8; 64];
        bytes[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = LogEntry::decode(&bytes).unwrap_err();
        assert_eq!(err, FrameError::ImplausibleLength(u32::MAX));
    }

    // ─── Writer tests ───

    #[test]
    fn test_append_assigns_sequences_from_one() {
        let tmp = TempDir::new().unwrap();
        let mut writer = LogWriter::open(test_config(tmp.path())).unwrap();

        assert_eq!(writer.append(b"a", 100).unwrap(), 1);
        assert_eq!(writer.append(b"b", 200).unwrap(), 2);
        assert_eq!(writer.append(b"c", 300).unwrap(), 3);
        assert_eq!(writer.next_sequence(), 4);
    }

    #[test]
    fn test_reopen_resumes_numbering() {
        let tmp = TempDir::new().unwrap();
        {
            let mut writer = LogWriter::open(test_config(tmp.path())).unwrap();
            for i in 0..5 {
                writer.append(&[i], 1_000 + i as i64).unwrap();
            }
            writer.sync().unwrap();
        }

        let mut writer = LogWriter::open(test_config(tmp.path())).unwrap();
        assert_eq!(writer.next_sequence(), 6);
        assert_eq!(writer.append(b"next", 2_000).unwrap(), 6);
    }

    #[test]
    fn test_reopen_skips_torn_tail() {
        let tmp = TempDir::new().unwrap();
        {
            let mut writer = LogWriter::open(test_config(tmp.path())).unwrap();
            for i in 0..3 {
                writer.append(&[i; 8], 100).unwrap();
            }
            writer.sync().unwrap();
        }

        // Truncate mid-frame, as a crash during the last write would.
        let path = LogWriter::log_path(tmp.path(), 0);
        let data = fs::read(&path).unwrap();
        fs::write(&path, &data[..data.len() - 5]).unwrap();

        // The reopened writer resumes numbering after the last intact
        // frame and leaves the dirty file alone: new frames go to the
        // next file, where readers can reach them.
        let mut writer = LogWriter::open(test_config(tmp.path())).unwrap();
        assert_eq!(writer.next_sequence(), 3);
        assert_eq!(writer.current_path(), LogWriter::log_path(tmp.path(), 1));

        writer.append(b"recovered", 101).unwrap();
        writer.sync().unwrap();

        let fresh = fs::read(LogWriter::log_path(tmp.path(), 1)).unwrap();
        let (entry, _) = LogEntry::decode(&fresh).unwrap();
        assert_eq!(entry.sequence, 3);
        assert_eq!(entry.payload, b"recovered");
    }

    #[test]
    fn test_set_next_sequence_rejects_regression() {
        let tmp = TempDir::new().unwrap();
        let mut writer = LogWriter::open(test_config(tmp.path())).unwrap();
        writer.append(b"x", 1).unwrap();
        writer.append(b"y", 2).unwrap();

        let err = writer.set_next_sequence(1).unwrap_err();
        match err {
            LogError::SequenceRegression { expected, found } => {
                assert_eq!(expected, 3);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        writer.set_next_sequence(10).unwrap();
        assert_eq!(writer.append(b"z", 3).unwrap(), 10);
    }

    #[test]
    fn test_rotation_on_size_limit() {
        let tmp = TempDir::new().unwrap();
        let config = LogConfig {
            max_file_bytes: 64,
            ..test_config(tmp.path())
        };
        let mut writer = LogWriter::open(config).unwrap();

        for i in 0..10u8 {
            writer.append(&[i; 16], i as i64).unwrap();
        }

        let files: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("oplog-"))
            .collect();
        assert!(files.len() > 1, "expected rotation to create multiple files");
        assert_eq!(writer.current_path(), LogWriter::log_path(tmp.path(), files.len() as u64 - 1));
    }

    #[test]
    fn test_rotation_preserves_numbering_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let config = LogConfig {
            max_file_bytes: 64,
            ..test_config(tmp.path())
        };
        {
            let mut writer = LogWriter::open(config.clone()).unwrap();
            for i in 0..10u8 {
                writer.append(&[i; 16], 0).unwrap();
            }
            writer.sync().unwrap();
        }
        let writer = LogWriter::open(config).unwrap();
        assert_eq!(writer.next_sequence(), 11);
    }

    #[test]
    fn test_flush_every_entry_hits_disk() {
        let tmp = TempDir::new().unwrap();
        let mut writer = LogWriter::open(test_config(tmp.path())).unwrap();
        writer.append(b"visible", 1).unwrap();

        let size = fs::metadata(writer.current_path()).unwrap().len();
        assert!(size > 0);
    }

    #[test]
    fn test_deferred_flush_then_sync() {
        let tmp = TempDir::new().unwrap();
        let config = LogConfig {
            flush_policy: FlushPolicy::EveryN(1_000),
            fsync_policy: FsyncPolicy::Never,
            ..test_config(tmp.path())
        };
        let mut writer = LogWriter::open(config).unwrap();
        writer.append(b"buffered", 1).unwrap();
        writer.sync().unwrap();

        let size = fs::metadata(writer.current_path()).unwrap().len();
        assert!(size > 0);
    }

    #[test]
    fn test_log_file_naming() {
        assert_eq!(
            LogWriter::log_path(Path::new("/var/data"), 42),
            PathBuf::from("/var/data/oplog-000042.bin")
        );
        assert_eq!(LogWriter::parse_index("oplog-000042.bin"), Some(42));
        assert_eq!(LogWriter::parse_index("state-000042.snap"), None);
    }

    // ─── Codec property tests ───

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_any_payload_roundtrips(
                sequence in 1u64..u64::MAX,
                timestamp in proptest::num::i64::ANY,
                payload in proptest::collection::vec(any::<u8>(), 0..512),
            ) {
                let entry = LogEntry::new(sequence, timestamp, payload);
                let bytes = entry.encode();
                let (decoded, consumed) = LogEntry::decode(&bytes).unwrap();
                prop_assert_eq!(consumed, bytes.len());
                prop_assert_eq!(decoded, entry);
            }

            #[test]
            fn prop_single_bit_flip_never_decodes_silently(
                payload in proptest::collection::vec(any::<u8>(), 1..128),
                flip_bit in 0usize..8,
                flip_byte_frac in 0.0f64..1.0,
            ) {
                let entry = LogEntry::new(9, 1_700_000_000_000, payload);
                let mut bytes = entry.encode();
                // Corrupt one bit past the length prefix so framing
                // still lines up and the checksum must catch it.
                let idx = 4 + ((bytes.len() - 4) as f64 * flip_byte_frac) as usize;
                let idx = idx.min(bytes.len() - 1);
                bytes[idx] ^= 1 << flip_bit;

                prop_assert!(
                    LogEntry::decode(&bytes).is_err(),
                    "decode accepted a corrupted frame"
                );
            }
        }
    }
}
