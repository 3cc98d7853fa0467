//! Read-only bulk queries: prefix match, pattern match and bulk get.

use super::{emit, text};
use crate::error::CliResult;
use kabind_client::{LocalStore, OpenMode};
use kabind_marshal::{Container, Marshaler};
use serde::Serialize;
use std::path::Path;

/// Keys matched by a prefix or pattern.
#[derive(Debug, Serialize)]
pub struct MatchResult {
    /// The prefix or pattern.
    pub query: String,
    /// The cap that was applied.
    pub max: usize,
    /// Matched keys in ascending order.
    pub keys: Vec<String>,
}

impl MatchResult {
    fn new(query: &str, max: usize, container: &Container) -> Self {
        Self {
            query: query.to_string(),
            max,
            keys: container.iter().flatten().map(text).collect(),
        }
    }
}

/// One bulk-get answer.
#[derive(Debug, Serialize)]
pub struct BulkEntry {
    /// The requested key.
    pub key: String,
    /// The value, `None` when the key does not exist.
    pub value: Option<String>,
}

/// Which matcher a match command uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Keys starting with the query.
    Prefix,
    /// Keys matching the query as a regular expression.
    Regex,
}

/// Matches keys in `store`.
pub fn find(
    store: &LocalStore,
    kind: MatchKind,
    query: &str,
    max: Option<usize>,
) -> CliResult<MatchResult> {
    let marshaler = Marshaler::default();
    let max = marshaler.match_max(max);
    let container = match kind {
        MatchKind::Prefix => marshaler.match_prefix(store, query.as_bytes(), max)?,
        MatchKind::Regex => marshaler.match_regex(store, query, max)?,
    };
    Ok(MatchResult::new(query, max, &container))
}

/// Fetches `keys` from `store`, one entry per key in request order.
pub fn fetch(store: &LocalStore, keys: &[String]) -> CliResult<Vec<BulkEntry>> {
    let key_refs: Vec<&[u8]> = keys.iter().map(String::as_bytes).collect();
    let container = Marshaler::default().get_bulk(store, &key_refs)?;
    Ok(keys
        .iter()
        .zip(container.iter())
        .map(|(key, value)| BulkEntry {
            key: key.clone(),
            value: value.map(text),
        })
        .collect())
}

/// Runs `match-prefix` or `match-regex`.
pub fn run_match(
    path: &Path,
    kind: MatchKind,
    query: &str,
    max: Option<usize>,
    format: &str,
) -> CliResult<()> {
    let store = LocalStore::open(path, OpenMode::Read)?;
    let result = find(&store, kind, query, max)?;
    emit(&result, format, |r| {
        for key in &r.keys {
            println!("{key}");
        }
        if r.keys.len() == r.max {
            println!("(stopped at {} matches)", r.max);
        }
    })
}

/// Runs `get-bulk`.
pub fn run_get_bulk(path: &Path, keys: &[String], format: &str) -> CliResult<()> {
    let store = LocalStore::open(path, OpenMode::Read)?;
    let entries = fetch(&store, keys)?;
    emit(&entries, format, |entries| {
        for entry in entries {
            match &entry.value {
                Some(value) => println!("{}\t{}", entry.key, value),
                None => println!("{}\t(absent)", entry.key),
            }
        }
    })
}
