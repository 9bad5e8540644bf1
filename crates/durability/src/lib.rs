//! Snapshot persistence for the TeXSearch index
//!
//! One binary snapshot file holds the entire persistent index state,
//! framed with a magic/version header, the update watermark, and a CRC32
//! footer. Writes stage to a sibling `_tmp` file and rename into place,
//! so readers always see a complete snapshot.

pub mod snapshot;

pub use snapshot::{
    load, save_atomic, staging_path, SnapshotError, SnapshotHeader, SnapshotInfo,
    SNAPSHOT_MAGIC, SNAPSHOT_VERSION,
};
