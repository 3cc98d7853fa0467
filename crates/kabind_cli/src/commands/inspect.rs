//! Inspect command implementation.

use super::emit;
use crate::error::CliResult;
use kabind_client::{LocalStore, OpenMode, StoreClient};
use kabind_marshal::Marshaler;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// Snapshot file size in bytes.
    pub snapshot_size: u64,
    /// Number of records.
    pub record_count: i64,
    /// Total bytes of keys and values (first `max_slots` records only).
    pub data_size: usize,
}

/// Collects statistics for the store at `path`.
pub fn inspect(path: &Path) -> CliResult<InspectResult> {
    let store = LocalStore::open(path, OpenMode::Read)?;
    let record_count = store.count()?;

    let marshaler = Marshaler::default();
    let max = usize::try_from(record_count)
        .unwrap_or(0)
        .min(marshaler.config().max_slots);
    let keys = marshaler.match_prefix(&store, b"", max)?;
    let key_refs: Vec<&[u8]> = keys.iter().flatten().collect();
    let values = marshaler.get_bulk(&store, &key_refs)?;
    let data_size = key_refs.iter().map(|k| k.len()).sum::<usize>()
        + values.iter().flatten().map(<[u8]>::len).sum::<usize>();

    Ok(InspectResult {
        path: path.display().to_string(),
        snapshot_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        record_count,
        data_size,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let result = inspect(path)?;
    emit(&result, format, |r| {
        println!("Store: {}", r.path);
        println!("  Snapshot size: {} bytes", r.snapshot_size);
        println!("  Records:       {}", r.record_count);
        println!("  Data size:     {} bytes", r.data_size);
    })
}
