//! Crash-safe index snapshots
//!
//! The whole persistent index state lives in one binary snapshot file,
//! replaced atomically on every write. The writer follows the
//! write-fsync-rename pattern:
//!
//! 1. write to the sibling staging file (`<path>_tmp`)
//! 2. fsync the staging file
//! 3. atomic rename over the final path
//! 4. fsync the parent directory
//!
//! Either the complete new snapshot is visible or the old one still is;
//! a partial snapshot never is. Readers that loaded the old file keep a
//! consistent view.
//!
//! ## File layout
//!
//! ```text
//! +-------------------+
//! | Magic (8)         |  "TEXINDEX"
//! +-------------------+
//! | Version (4)       |  format version (1)
//! +-------------------+
//! | Timestamp (8)     |  microseconds since epoch
//! +-------------------+
//! | Watermark (8)     |  last applied update sequence
//! +-------------------+
//! | Payload len (8)   |
//! +-------------------+
//! | Payload           |  bincode-encoded tree
//! +-------------------+
//! | CRC32 (4)         |  checksum of everything above
//! +-------------------+
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Snapshot file magic bytes
pub const SNAPSHOT_MAGIC: &[u8; 8] = b"TEXINDEX";

/// Snapshot format version 1
pub const SNAPSHOT_VERSION: u32 = 1;

/// Header size: Magic(8) + Version(4) + Timestamp(8) + Watermark(8)
pub const SNAPSHOT_HEADER_SIZE: usize = 28;

/// Minimum snapshot size: header + payload length(8) + CRC32(4)
pub const MIN_SNAPSHOT_SIZE: usize = SNAPSHOT_HEADER_SIZE + 8 + 4;

/// Snapshot errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot file too short to hold a header
    #[error("snapshot too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Expected minimum size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Magic bytes did not match
    #[error("invalid magic bytes: expected TEXINDEX, found {found:?}")]
    InvalidMagic {
        /// Bytes found at the start of the file
        found: Vec<u8>,
    },

    /// Format version not understood
    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    /// Payload length field disagrees with the file size
    #[error("truncated payload: header claims {expected} bytes, {actual} present")]
    TruncatedPayload {
        /// Length the header claims
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// CRC32 footer mismatch
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the file
        expected: u32,
        /// Checksum computed over the contents
        actual: u32,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload encoding failed
    #[error("encode error: {0}")]
    Encode(String),

    /// Payload decoding failed
    #[error("decode error: {0}")]
    Decode(String),
}

/// Parsed snapshot header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format version
    pub version: u32,
    /// When the snapshot was written (microseconds since epoch)
    pub timestamp_micros: u64,
    /// Last applied update sequence
    pub last_update: u64,
}

impl SnapshotHeader {
    /// Create a header with the current timestamp
    pub fn new(last_update: u64) -> Self {
        SnapshotHeader {
            version: SNAPSHOT_VERSION,
            timestamp_micros: now_micros(),
            last_update,
        }
    }

    /// Serialize the header, including magic
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SNAPSHOT_HEADER_SIZE);
        buf.extend_from_slice(SNAPSHOT_MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.timestamp_micros.to_le_bytes());
        buf.extend_from_slice(&self.last_update.to_le_bytes());
        buf
    }

    /// Parse a header, validating magic and version
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.len() < SNAPSHOT_HEADER_SIZE {
            return Err(SnapshotError::TooShort {
                expected: SNAPSHOT_HEADER_SIZE,
                actual: data.len(),
            });
        }
        if &data[0..8] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::InvalidMagic {
                found: data[0..8].to_vec(),
            });
        }
        let version = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let timestamp_micros = u64::from_le_bytes(data[12..20].try_into().unwrap());
        let last_update = u64::from_le_bytes(data[20..28].try_into().unwrap());
        Ok(SnapshotHeader {
            version,
            timestamp_micros,
            last_update,
        })
    }
}

/// Info returned after a successful write
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    /// Final path of the snapshot
    pub path: PathBuf,
    /// Update watermark covered
    pub last_update: u64,
    /// Total size in bytes
    pub size_bytes: u64,
}

/// The staging path next to a snapshot path
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push("_tmp");
    path.with_file_name(name)
}

/// Write a snapshot atomically
///
/// Serializes `state` with bincode, frames it with the header and CRC32
/// footer, writes everything to the staging file, fsyncs, renames over
/// `path` and fsyncs the parent directory. A stale staging file from an
/// earlier crashed writer is removed first.
pub fn save_atomic<T: Serialize>(
    path: &Path,
    last_update: u64,
    state: &T,
) -> Result<SnapshotInfo, SnapshotError> {
    let staging = staging_path(path);
    debug!(
        path = %path.display(),
        staging = %staging.display(),
        "starting atomic snapshot write"
    );

    if staging.exists() {
        warn!(path = %staging.display(), "removing stale staging file");
        let _ = std::fs::remove_file(&staging);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let payload =
        bincode::serialize(state).map_err(|e| SnapshotError::Encode(e.to_string()))?;

    let header = SnapshotHeader::new(last_update);
    let mut contents = header.to_bytes();
    contents.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    contents.extend_from_slice(&payload);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&contents);
    let checksum = hasher.finalize();

    let result = (|| -> Result<(), SnapshotError> {
        let mut file = File::create(&staging)?;
        file.write_all(&contents)?;
        file.write_all(&checksum.to_le_bytes())?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = result {
        warn!(path = %staging.display(), error = %e, "write failed, cleaning up staging file");
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&staging, path) {
        warn!(path = %staging.display(), error = %e, "rename failed, cleaning up staging file");
        let _ = std::fs::remove_file(&staging);
        return Err(SnapshotError::Io(e));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            File::open(parent)?.sync_all()?;
        }
    }

    let size_bytes = contents.len() as u64 + 4;
    info!(
        path = %path.display(),
        last_update,
        size_bytes,
        "snapshot written"
    );

    Ok(SnapshotInfo {
        path: path.to_path_buf(),
        last_update,
        size_bytes,
    })
}

/// Load a snapshot, validating magic, version and checksum
///
/// Returns the update watermark and the decoded payload.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<(u64, T), SnapshotError> {
    let data = std::fs::read(path)?;
    if data.len() < MIN_SNAPSHOT_SIZE {
        return Err(SnapshotError::TooShort {
            expected: MIN_SNAPSHOT_SIZE,
            actual: data.len(),
        });
    }

    let (contents, footer) = data.split_at(data.len() - 4);
    let stored_crc = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(contents);
    let computed_crc = hasher.finalize();
    if stored_crc != computed_crc {
        return Err(SnapshotError::ChecksumMismatch {
            expected: stored_crc,
            actual: computed_crc,
        });
    }

    let header = SnapshotHeader::from_bytes(contents)?;
    let payload_len = u64::from_le_bytes(
        contents[SNAPSHOT_HEADER_SIZE..SNAPSHOT_HEADER_SIZE + 8]
            .try_into()
            .unwrap(),
    ) as usize;
    let payload = &contents[SNAPSHOT_HEADER_SIZE + 8..];
    if payload.len() != payload_len {
        return Err(SnapshotError::TruncatedPayload {
            expected: payload_len,
            actual: payload.len(),
        });
    }

    let state =
        bincode::deserialize(payload).map_err(|e| SnapshotError::Decode(e.to_string()))?;
    debug!(
        path = %path.display(),
        last_update = header.last_update,
        "snapshot loaded"
    );
    Ok((header.last_update, state))
}

/// Current time in microseconds since epoch
///
/// Returns 0 if the system clock sits before the Unix epoch.
fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
