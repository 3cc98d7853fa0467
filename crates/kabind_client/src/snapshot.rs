//! CBOR snapshot persistence for the local store.
//!
//! A snapshot is a single file holding every record. It is rewritten as a
//! whole: encoded to a sibling temp file, synced, then renamed over the
//! previous snapshot so a crash never leaves a half-written file behind.

use crate::error::{ErrorCode, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Current snapshot format version.
pub const SNAPSHOT_FORMAT: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    format: u16,
    records: Vec<SnapshotRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    key: Vec<u8>,
    value: Vec<u8>,
}

/// Loads every record from the snapshot at `path`.
pub fn load(path: &Path) -> StoreResult<BTreeMap<Vec<u8>, Vec<u8>>> {
    let file = File::open(path)?;
    let snapshot: SnapshotFile = ciborium::from_reader(BufReader::new(file))
        .map_err(|e| StoreError::Codec(e.to_string()))?;

    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(StoreError::new(
            ErrorCode::Broken,
            format!(
                "unsupported snapshot format {} (expected {SNAPSHOT_FORMAT})",
                snapshot.format
            ),
        ));
    }

    Ok(snapshot
        .records
        .into_iter()
        .map(|r| (r.key, r.value))
        .collect())
}

/// Writes `records` to `path`, replacing any previous snapshot.
pub fn save(path: &Path, records: &BTreeMap<Vec<u8>, Vec<u8>>) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let snapshot = SnapshotFile {
        format: SNAPSHOT_FORMAT,
        records: records
            .iter()
            .map(|(key, value)| SnapshotRecord {
                key: key.clone(),
                value: value.clone(),
            })
            .collect(),
    };

    let tmp = temp_path(path);
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        ciborium::into_writer(&snapshot, &mut writer)
            .map_err(|e| StoreError::Codec(e.to_string()))?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
