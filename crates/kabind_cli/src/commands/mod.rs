//! CLI command implementations.

pub mod inspect;
pub mod query;
pub mod write;

use crate::error::CliResult;
use serde::Serialize;

/// Renders bytes for display, replacing invalid UTF-8.
pub(crate) fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Prints `value` as pretty JSON, or with `print_text` for any other format.
pub(crate) fn emit<T: Serialize>(value: &T, format: &str, print_text: impl FnOnce(&T)) -> CliResult<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(value)?),
        _ => print_text(value),
    }
    Ok(())
}
