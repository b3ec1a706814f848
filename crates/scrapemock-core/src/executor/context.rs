//! Capability object handed to scripts.
//!
//! A [`ScriptContext`] only offers the operations of its role. Each allowed
//! name is bound to an [`Operation`] in a lookup table; scripts either call
//! operations by name with JSON arguments ([`ScriptContext::call`]) or use
//! the typed accessors, which check the same table.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Value, json};

use super::fake::{DEFAULT_PER_PAGE, Executor, FindOptions};
use crate::collection::Record;
use crate::{Error, Result};

/// Operation bound to a name in a script context.
pub type Operation = fn(&mut Executor, &[Value]) -> Result<Value>;

/// Every operation name a script context can bind.
pub const OPERATIONS: [&str; 12] = [
    "content",
    "failed_content",
    "page",
    "job_id",
    "pages",
    "outputs",
    "save_pages",
    "save_outputs",
    "find_outputs",
    "find_output",
    "refetch",
    "reparse",
];

/// Implementation behind an operation name, if there is one.
pub fn operation(name: &str) -> Option<(&'static str, Operation)> {
    let bound: Operation = match name {
        "content" => |executor, _| Ok(json!(executor.content())),
        "failed_content" => |executor, _| Ok(json!(executor.failed_content())),
        "page" => |executor, _| Ok(Value::Object(executor.page().clone())),
        "job_id" => |executor, _| Ok(json!(executor.job_id())),
        "pages" => |executor, args| {
            executor.enqueue_pages(records(args)?);
            Ok(to_array(executor.pages()))
        },
        "outputs" => |executor, args| {
            executor.enqueue_outputs(records(args)?);
            Ok(to_array(executor.outputs()))
        },
        "save_pages" => |executor, args| {
            executor.save_pages(&mut records(args)?);
            Ok(Value::Null)
        },
        "save_outputs" => |executor, args| {
            executor.save_outputs(&mut records(args)?);
            Ok(Value::Null)
        },
        "find_outputs" => |executor, args| {
            let collection = str_arg(args, 0, "collection")?
                .unwrap_or(&executor.config().default_collection)
                .to_owned();
            let query = object_arg(args, 1, "query")?.unwrap_or_default();
            let page = int_arg(args, 2, "page")?.unwrap_or(1);
            let per_page = int_arg(args, 3, "per_page")?.unwrap_or(DEFAULT_PER_PAGE);
            let options = options_arg(args, 4)?;
            let found = executor.find_outputs(&collection, &query, page, per_page, &options)?;
            Ok(to_array(&found))
        },
        "find_output" => |executor, args| {
            let collection = str_arg(args, 0, "collection")?
                .unwrap_or(&executor.config().default_collection)
                .to_owned();
            let query = object_arg(args, 1, "query")?.unwrap_or_default();
            let options = options_arg(args, 2)?;
            let found = executor.find_output(&collection, &query, &options)?;
            Ok(found.map_or(Value::Null, Value::Object))
        },
        "refetch" => |executor, args| {
            executor.refetch(required_str(args, 0, "gid")?)?;
            Ok(Value::Null)
        },
        "reparse" => |executor, args| {
            executor.reparse(required_str(args, 0, "gid")?)?;
            Ok(Value::Null)
        },
        _ => return None,
    };
    OPERATIONS
        .iter()
        .find(|known| **known == name)
        .map(|known| (*known, bound))
}

/// Restricted view of an [`Executor`] for one script run.
pub struct ScriptContext<'a> {
    executor: &'a mut Executor,
    operations: BTreeMap<&'static str, Operation>,
}

impl<'a> ScriptContext<'a> {
    /// Bind the operations in `allowed` over `executor`.
    ///
    /// Names without an implementation are ignored.
    pub fn new<S: AsRef<str>>(executor: &'a mut Executor, allowed: &[S]) -> Self {
        let operations = allowed
            .iter()
            .filter_map(|name| operation(name.as_ref()))
            .collect();
        Self {
            executor,
            operations,
        }
    }

    /// Whether `name` is available to the script.
    pub fn exposes(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Names available to the script, sorted.
    pub fn operations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operations.keys().copied()
    }

    /// Call an operation by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleInterface`] when `name` is not exposed,
    /// [`Error::InvalidArgument`] for malformed arguments, or the operation's
    /// own error.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let operation = *self.operations.get(name).ok_or_else(|| not_exposed(name))?;
        operation(&mut *self.executor, args)
    }

    /// Script variable `name`. Variables are readable in every role.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.executor.vars().get(name)
    }

    /// Draft pages.
    pub fn pages(&mut self) -> Result<&mut Vec<Record>> {
        self.require("pages")?;
        Ok(self.executor.pages_mut())
    }

    /// Draft outputs.
    pub fn outputs(&mut self) -> Result<&mut Vec<Record>> {
        self.require("outputs")?;
        Ok(self.executor.outputs_mut())
    }

    /// Page being parsed.
    pub fn page(&self) -> Result<&Record> {
        self.require("page")?;
        Ok(self.executor.page())
    }

    /// Body of the page being parsed.
    pub fn content(&self) -> Result<Option<&str>> {
        self.require("content")?;
        Ok(self.executor.content())
    }

    /// Body of the failed fetch of the page being parsed.
    pub fn failed_content(&self) -> Result<Option<&str>> {
        self.require("failed_content")?;
        Ok(self.executor.failed_content())
    }

    /// Current job id.
    pub fn job_id(&self) -> Result<i64> {
        self.require("job_id")?;
        Ok(self.executor.job_id())
    }

    /// Save pages straight into the store, draining `list`.
    pub fn save_pages(&mut self, list: &mut Vec<Record>) -> Result<()> {
        self.require("save_pages")?;
        self.executor.save_pages(list);
        Ok(())
    }

    /// Save outputs straight into the store, draining `list`.
    pub fn save_outputs(&mut self, list: &mut Vec<Record>) -> Result<()> {
        self.require("save_outputs")?;
        self.executor.save_outputs(list);
        Ok(())
    }

    /// See [`Executor::find_outputs`].
    pub fn find_outputs(
        &self,
        collection: &str,
        query: &Record,
        page: i64,
        per_page: i64,
        options: &FindOptions,
    ) -> Result<Vec<Record>> {
        self.require("find_outputs")?;
        self.executor
            .find_outputs(collection, query, page, per_page, options)
    }

    /// See [`Executor::find_output`].
    pub fn find_output(
        &self,
        collection: &str,
        query: &Record,
        options: &FindOptions,
    ) -> Result<Option<Record>> {
        self.require("find_output")?;
        self.executor.find_output(collection, query, options)
    }

    /// Queue a page of the current job for fetching again.
    pub fn refetch(&mut self, gid: &str) -> Result<()> {
        self.require("refetch")?;
        self.executor.refetch(gid)
    }

    /// Queue a page of the current job for parsing again.
    pub fn reparse(&mut self, gid: &str) -> Result<()> {
        self.require("reparse")?;
        self.executor.reparse(gid)
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.exposes(name) {
            Ok(())
        } else {
            Err(not_exposed(name))
        }
    }
}

impl fmt::Debug for ScriptContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn not_exposed(name: &str) -> Error {
    Error::IncompatibleInterface {
        missing: vec![name.to_owned()],
    }
}

fn to_array(records: &[Record]) -> Value {
    Value::Array(records.iter().cloned().map(Value::Object).collect())
}

/// Flatten object and array-of-object arguments into records.
fn records(args: &[Value]) -> Result<Vec<Record>> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Object(record) => out.push(record.clone()),
            Value::Array(items) => {
                for item in items {
                    let record = item.as_object().ok_or_else(|| {
                        Error::invalid_argument("Records must be objects.")
                    })?;
                    out.push(record.clone());
                }
            },
            _ => return Err(Error::invalid_argument("Records must be objects.")),
        }
    }
    Ok(out)
}

fn str_arg<'v>(args: &'v [Value], index: usize, name: &str) -> Result<Option<&'v str>> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(Error::InvalidArgument(format!("{name} must be a String."))),
    }
}

fn required_str<'v>(args: &'v [Value], index: usize, name: &str) -> Result<&'v str> {
    str_arg(args, index, name)?
        .ok_or_else(|| Error::InvalidArgument(format!("{name} is required.")))
}

fn object_arg(args: &[Value], index: usize, name: &str) -> Result<Option<Record>> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(value)) => Ok(Some(value.clone())),
        Some(_) => Err(Error::InvalidArgument(format!("{name} must be a Hash."))),
    }
}

fn int_arg(args: &[Value], index: usize, name: &str) -> Result<Option<i64>> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::InvalidArgument(format!("{name} must be an Integer."))),
    }
}

fn options_arg(args: &[Value], index: usize) -> Result<FindOptions> {
    let Some(options) = object_arg(args, index, "options")? else {
        return Ok(FindOptions::default());
    };
    let job_id = match options.get("job_id") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_i64()
                .ok_or_else(|| Error::invalid_argument("job_id must be an Integer."))?,
        ),
    };
    let scraper_name = match options.get("scraper_name") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.clone()),
        Some(_) => return Err(Error::invalid_argument("scraper_name must be a String.")),
    };
    Ok(FindOptions {
        job_id,
        scraper_name,
    })
}
