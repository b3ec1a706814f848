//! Fixture loading and querying

use std::path::Path;

use anyhow::{Context, Result, bail};
use scrapemock_core::{Config, Executor, Record};
use serde_json::Value;
use tracing::debug;

use crate::utils::input::read_json;

/// Query options for [`execute`].
#[derive(Debug, Clone)]
pub struct QueryArgs<'a> {
    pub collection: &'a str,
    pub filter: Option<&'a str>,
    pub offset: usize,
    pub limit: Option<i64>,
}

/// Build an executor from `fixture`, save its drafts and print the records
/// of `args.collection` matching the filter as a JSON array.
///
/// # Errors
///
/// Fails on unreadable or malformed fixtures, a filter that is not a JSON
/// object, or an unknown collection.
pub fn execute(fixture: &Path, args: &QueryArgs<'_>, config: &Config) -> Result<()> {
    let filter = parse_filter(args.filter)?;
    let fixture = read_json(fixture)?;

    let mut executor = Executor::from_fixture(&fixture, config)?;
    executor.flush();
    debug!(
        pages = executor.saved_pages().len(),
        outputs = executor.saved_outputs().len(),
        "Fixture drafts saved"
    );

    let found = executor
        .store()
        .query(args.collection, &filter, args.offset, args.limit)?;
    let found = Value::Array(found.into_iter().map(Value::Object).collect());
    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}

fn parse_filter(raw: Option<&str>) -> Result<Record> {
    let Some(raw) = raw else {
        return Ok(Record::new());
    };
    match serde_json::from_str::<Value>(raw).context("Filter is not valid JSON")? {
        Value::Object(filter) => Ok(filter),
        _ => bail!("Filter must be a JSON object"),
    }
}
