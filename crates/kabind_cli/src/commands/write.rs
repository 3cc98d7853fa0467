//! Mutating commands. Each opens the store in write mode and closes it,
//! writing the snapshot, before returning.

use crate::error::{CliError, CliResult};
use kabind_client::{LocalStore, OpenMode, StoreClient};
use kabind_marshal::Marshaler;
use std::path::Path;
use tracing::info;

/// Splits `KEY=VALUE` arguments at the first `=`.
pub fn parse_pairs(args: &[String]) -> CliResult<Vec<(&str, &str)>> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .ok_or_else(|| CliError::InvalidPair(arg.clone()))
        })
        .collect()
}

fn with_store<T>(path: &Path, f: impl FnOnce(&LocalStore) -> CliResult<T>) -> CliResult<T> {
    let store = LocalStore::open(path, OpenMode::Write)?;
    let result = f(&store)?;
    store.close()?;
    Ok(result)
}

/// Runs `set`.
pub fn run_set(path: &Path, key: &str, value: &str) -> CliResult<()> {
    with_store(path, |store| Ok(store.set(key.as_bytes(), value.as_bytes())?))
}

/// Runs `set-bulk`, returning the number of pairs stored.
pub fn run_set_bulk(path: &Path, args: &[String]) -> CliResult<usize> {
    let pairs = parse_pairs(args)?;
    let byte_pairs: Vec<(&[u8], &[u8])> = pairs
        .iter()
        .map(|(k, v)| (k.as_bytes(), v.as_bytes()))
        .collect();
    let applied = with_store(path, |store| {
        Ok(Marshaler::default().set_bulk(store, &byte_pairs)?)
    })?;
    info!(applied, "stored pairs");
    println!("{applied}");
    Ok(applied)
}

/// Runs `remove-bulk`, returning the number of keys that existed.
pub fn run_remove_bulk(path: &Path, keys: &[String]) -> CliResult<usize> {
    let key_refs: Vec<&[u8]> = keys.iter().map(String::as_bytes).collect();
    let removed = with_store(path, |store| {
        Ok(Marshaler::default().remove_bulk(store, &key_refs)?)
    })?;
    info!(removed, "removed keys");
    println!("{removed}");
    Ok(removed)
}
