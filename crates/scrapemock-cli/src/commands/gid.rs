//! Gid computation for a page file

use std::path::Path;

use anyhow::{Result, bail};
use scrapemock_core::{Config, RecordStore};
use serde_json::Value;

use crate::utils::input::read_json;

/// Print the gid a page gets once stored with defaults applied.
///
/// # Errors
///
/// Fails when the page cannot be read or is not a JSON object.
pub fn execute(page: &Path, config: &Config) -> Result<()> {
    let Value::Object(page) = read_json(page)? else {
        bail!("Page must be a JSON object");
    };
    let mut store = RecordStore::with_config(&config.store);
    let stored = store.pages_mut().insert(page);
    match stored.get("gid").and_then(Value::as_str) {
        Some(gid) => println!("{gid}"),
        None => bail!("Page was stored without a gid"),
    }
    Ok(())
}
