//! The in-memory record store.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::debug;

use super::ids::{fake_uuid, generate_output_id, generate_page_gid, time_stamp};
use super::types::{
    DEFAULT_COLLECTION, JOB_KEYS, JobStatus, OUTPUT_KEYS, PAGE_KEYS, PageStatus, RESET_TIMESTAMP,
};
use crate::collection::{Collection, DefaultValue, HookEvent, Record, field};
use crate::config::StoreConfig;
use crate::{Error, Result};

/// Source of the current time.
pub type Clock = Rc<dyn Fn() -> DateTime<Utc>>;

struct StoreState {
    job_id: i64,
    scraper_name: String,
    page_gid: String,
    allow_page_gid_override: bool,
    allow_job_id_override: bool,
    clock: Clock,
}

impl StoreState {
    fn now(&self) -> String {
        time_stamp((self.clock)())
    }
}

type SharedState = Rc<RefCell<StoreState>>;
type SharedJobs = Rc<RefCell<Collection>>;

/// In-memory fake of the platform's job, page and output persistence.
///
/// The store owns three [`Collection`]s configured with the platform's
/// identity keys, defaults and id generation:
///
/// - **jobs** keyed by `job_id`
/// - **pages** keyed by the content-derived `gid`
/// - **outputs** keyed by `(_id, _collection)`
///
/// Pages and outputs are stamped with the current job, and any job they
/// reference is created on the fly with status `active`.
///
/// ```rust
/// use scrapemock_core::{Record, RecordStore};
/// use serde_json::json;
///
/// let mut store = RecordStore::new();
/// let mut page = Record::new();
/// page.insert("url".into(), json!("https://example.com/a?b=2&a=1"));
/// let gid = store.pages_mut().insert(page)["gid"].clone();
///
/// let mut filter = Record::new();
/// filter.insert("gid".into(), gid);
/// let found = store.query("pages", &filter, 0, None)?;
/// assert_eq!(found[0]["job_id"], json!(1));
/// assert_eq!(found[0]["status"], json!("to_fetch"));
/// # Ok::<(), scrapemock_core::Error>(())
/// ```
pub struct RecordStore {
    state: SharedState,
    jobs: SharedJobs,
    pages: Collection,
    outputs: Collection,
}

impl RecordStore {
    /// Create a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(&StoreConfig::default())
    }

    /// Create a store from configuration.
    pub fn with_config(config: &StoreConfig) -> Self {
        Self::with_clock(config, Utc::now)
    }

    /// Create a store whose timestamps come from `clock`.
    pub fn with_clock<F>(config: &StoreConfig, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + 'static,
    {
        let scraper_name = config.scraper_name.clone().unwrap_or_else(|| {
            let suffix: String = fake_uuid(None).chars().take(8).collect();
            format!("scraper-{suffix}")
        });
        let state = Rc::new(RefCell::new(StoreState {
            job_id: 0,
            scraper_name,
            page_gid: config.page_gid.clone().unwrap_or_else(|| fake_uuid(None)),
            allow_page_gid_override: config.allow_page_gid_override,
            allow_job_id_override: config.allow_job_id_override,
            clock: Rc::new(clock),
        }));
        let jobs = Rc::new(RefCell::new(job_collection(&state)));
        let pages = page_collection(&state, &jobs);
        let outputs = output_collection(&state, &jobs);

        let mut store = Self {
            state,
            jobs,
            pages,
            outputs,
        };
        store.set_job_id(config.job_id);
        store
    }

    /// Current job id.
    pub fn job_id(&self) -> i64 {
        self.state.borrow().job_id
    }

    /// Switch the current job, creating it when unknown.
    ///
    /// `None` picks the next free id (highest stored id + 1, or 1).
    pub fn set_job_id(&mut self, job_id: Option<i64>) {
        let job_id = job_id.unwrap_or_else(|| next_job_id(&self.jobs.borrow()));
        self.state.borrow_mut().job_id = job_id;
        ensure_job(&self.jobs, &json!(job_id));
    }

    /// Current scraper name.
    pub fn scraper_name(&self) -> String {
        self.state.borrow().scraper_name.clone()
    }

    /// Rename the current scraper, including the current job record.
    pub fn set_scraper_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        let job_id = {
            let mut state = self.state.borrow_mut();
            state.scraper_name.clone_from(&name);
            state.job_id
        };
        let mut filter = Record::new();
        filter.insert("job_id".into(), json!(job_id));
        if let Some(job) = self.jobs.borrow_mut().find_match_mut(&filter) {
            job.insert("scraper_name".into(), Value::String(name));
        }
    }

    /// Gid of the page currently being processed.
    pub fn page_gid(&self) -> String {
        self.state.borrow().page_gid.clone()
    }

    /// Set the current page gid; `None` generates a random one.
    pub fn set_page_gid(&mut self, gid: Option<String>) {
        self.state.borrow_mut().page_gid = gid.unwrap_or_else(|| fake_uuid(None));
    }

    /// Whether caller-supplied page gids are kept.
    pub fn allow_page_gid_override(&self) -> bool {
        self.state.borrow().allow_page_gid_override
    }

    /// Keep caller-supplied page gids on insert.
    pub fn enable_page_gid_override(&mut self) {
        self.state.borrow_mut().allow_page_gid_override = true;
    }

    /// Always recompute page gids on insert.
    pub fn disable_page_gid_override(&mut self) {
        self.state.borrow_mut().allow_page_gid_override = false;
    }

    /// Whether caller-supplied job ids are kept on pages and outputs.
    pub fn allow_job_id_override(&self) -> bool {
        self.state.borrow().allow_job_id_override
    }

    /// Keep caller-supplied job ids on page and output insert.
    pub fn enable_job_id_override(&mut self) {
        self.state.borrow_mut().allow_job_id_override = true;
    }

    /// Always stamp pages and outputs with the current job.
    pub fn disable_job_id_override(&mut self) {
        self.state.borrow_mut().allow_job_id_override = false;
    }

    /// Current time in the store's timestamp format.
    pub fn now(&self) -> String {
        self.state.borrow().now()
    }

    /// Stored pages.
    pub const fn pages(&self) -> &Collection {
        &self.pages
    }

    /// Stored pages, for inserts.
    pub const fn pages_mut(&mut self) -> &mut Collection {
        &mut self.pages
    }

    /// Stored outputs.
    pub const fn outputs(&self) -> &Collection {
        &self.outputs
    }

    /// Stored outputs, for inserts.
    pub const fn outputs_mut(&mut self) -> &mut Collection {
        &mut self.outputs
    }

    /// Stored jobs.
    pub fn jobs(&self) -> Ref<'_, Collection> {
        self.jobs.borrow()
    }

    /// Stored jobs, for inserts.
    pub fn jobs_mut(&mut self) -> RefMut<'_, Collection> {
        self.jobs.borrow_mut()
    }

    /// Table-scan search of `jobs`, `pages` or `outputs`.
    ///
    /// A record matches when every filter field equals the record's field; a
    /// `null` filter value also matches a missing field. `offset` matches are
    /// skipped, then at most `limit` are returned. A non-positive `limit`
    /// returns nothing without scanning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for any other collection name.
    pub fn query(
        &self,
        collection: &str,
        filter: &Record,
        offset: usize,
        limit: Option<i64>,
    ) -> Result<Vec<Record>> {
        let limit = match limit {
            None => usize::MAX,
            Some(limit) if limit <= 0 => return Ok(Vec::new()),
            Some(limit) => usize::try_from(limit).unwrap_or(usize::MAX),
        };

        let scan = |items: &[Record]| -> Vec<Record> {
            items
                .iter()
                .filter(|item| matches_filter(item, filter))
                .skip(offset)
                .take(limit)
                .cloned()
                .collect()
        };

        match collection {
            "jobs" => Ok(scan(self.jobs.borrow().records())),
            "pages" => Ok(scan(self.pages.records())),
            "outputs" => Ok(scan(self.outputs.records())),
            other => Err(Error::InvalidArgument(format!("Unknown collection {other}."))),
        }
    }

    /// Latest job of `scraper_name` matching `filter`, by highest job id.
    pub fn latest_job_by(&self, scraper_name: Option<&str>, filter: &Record) -> Option<Record> {
        let scraper_name = scraper_name?;
        self.jobs
            .borrow()
            .iter()
            .filter(|job| field(job, "scraper_name").as_str() == Some(scraper_name))
            .filter(|job| matches_filter(job, filter))
            .max_by_key(|job| field(job, "job_id").as_i64().unwrap_or(i64::MIN))
            .cloned()
    }

    /// Queue a page for fetching again.
    ///
    /// Resets status to `to_fetch` and clears every fetch and parse outcome.
    /// Fetch parameters and `vars` are kept.
    pub fn refetch(&mut self, job_id: i64, gid: &str) -> Result<()> {
        let now = self.now();
        let page = self.page_of_job_mut(job_id, gid)?;
        page.insert("status".into(), json!(PageStatus::ToFetch.as_str()));
        page.insert("freshness".into(), json!(now));
        page.insert("to_fetch".into(), json!(now));
        page.insert("fetched_from".into(), Value::Null);
        page.insert("fetching_at".into(), json!(RESET_TIMESTAMP));
        page.insert("fetched_at".into(), Value::Null);
        page.insert("fetching_try_count".into(), json!(0));
        page.insert("effective_url".into(), Value::Null);
        reset_parse_outcome(page);
        for name in [
            "response_checksum",
            "response_status",
            "response_status_code",
            "response_headers",
            "response_cookie",
            "response_proto",
            "content_type",
            "failed_response_status_code",
            "failed_response_headers",
            "failed_response_cookie",
            "failed_effective_url",
            "failed_at",
            "failed_content_type",
        ] {
            page.insert(name.into(), Value::Null);
        }
        page.insert("content_size".into(), json!(0));
        debug!(job_id, gid, "Page queued for refetch");
        Ok(())
    }

    /// Queue a page for parsing again, keeping fetch outcomes.
    pub fn reparse(&mut self, job_id: i64, gid: &str) -> Result<()> {
        let page = self.page_of_job_mut(job_id, gid)?;
        reset_parse_outcome(page);
        page.insert("status".into(), json!(PageStatus::ToParse.as_str()));
        debug!(job_id, gid, "Page queued for reparse");
        Ok(())
    }

    /// Build a page with store defaults through a throw-away store.
    ///
    /// Gid and job id overrides are enabled, so supplied values are kept.
    pub fn build_page(page: Record, config: &StoreConfig) -> Record {
        let mut store = Self::with_config(config);
        store.enable_page_gid_override();
        store.enable_job_id_override();
        store.pages_mut().insert(page).clone()
    }

    /// Build a page for `url`, defaulting to `https://example.com`.
    pub fn build_fake_page(url: Option<&str>, config: &StoreConfig) -> Record {
        let mut page = Record::new();
        page.insert("url".into(), json!(url.unwrap_or("https://example.com")));
        Self::build_page(page, config)
    }

    /// Build a job with store defaults through a throw-away store.
    pub fn build_job(job: Record, config: &StoreConfig) -> Record {
        let mut store = Self::with_config(config);
        let mut jobs = store.jobs_mut();
        jobs.insert(job).clone()
    }

    /// Build a job with every field defaulted.
    pub fn build_fake_job(config: &StoreConfig) -> Record {
        Self::build_job(Record::new(), config)
    }

    fn page_of_job_mut(&mut self, job_id: i64, gid: &str) -> Result<&mut Record> {
        let mut filter = Record::new();
        filter.insert("gid".into(), json!(gid));
        self.pages
            .find_match_mut(&filter)
            .filter(|page| field(page, "job_id") == &json!(job_id))
            .ok_or_else(|| Error::NotFound(format!("Page {gid} in job {job_id}")))
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("job_id", &self.job_id())
            .field("scraper_name", &self.scraper_name())
            .field("jobs", &self.jobs.borrow().len())
            .field("pages", &self.pages.len())
            .field("outputs", &self.outputs.len())
            .finish_non_exhaustive()
    }
}

fn reset_parse_outcome(page: &mut Record) {
    page.insert("parsing_at".into(), Value::Null);
    page.insert("parsing_failed_at".into(), Value::Null);
    page.insert("parsed_at".into(), Value::Null);
    page.insert("parsing_try_count".into(), json!(0));
    page.insert("parsing_fail_count".into(), json!(0));
    page.insert("parsing_updated_at".into(), json!(RESET_TIMESTAMP));
}

/// Equality filter where `null` also matches a missing field.
pub(crate) fn matches_filter(record: &Record, filter: &Record) -> bool {
    filter
        .iter()
        .all(|(name, expected)| field(record, name) == expected)
}

fn next_job_id(jobs: &Collection) -> i64 {
    let ids: BTreeSet<i64> = jobs
        .iter()
        .filter_map(|job| field(job, "job_id").as_i64())
        .collect();
    match ids.last() {
        None => 1,
        Some(max) => max.checked_add(1).unwrap_or_else(|| {
            // Past i64::MAX, fall back to the lowest free id.
            (1..i64::MAX).find(|id| !ids.contains(id)).unwrap_or(i64::MAX)
        }),
    }
}

fn ensure_job(jobs: &SharedJobs, job_id: &Value) {
    if job_id.is_null() {
        return;
    }
    let mut job = Record::new();
    job.insert("job_id".into(), job_id.clone());
    let mut jobs = jobs.borrow_mut();
    if jobs.find_match(&job).is_some() {
        return;
    }
    debug!(job_id = %job_id, "Creating job on first reference");
    job.insert("status".into(), json!(JobStatus::Active.as_str()));
    jobs.insert(job);
}

fn job_collection(state: &SharedState) -> Collection {
    let scraper = Rc::clone(state);
    let clock = Rc::clone(state);
    let mut jobs = Collection::new(JOB_KEYS)
        .with_default(
            "scraper_name",
            DefaultValue::computed(move |_| json!(scraper.borrow().scraper_name)),
        )
        .with_default("status", DefaultValue::literal(JobStatus::Done.as_str()))
        .with_default(
            "created_at",
            DefaultValue::computed(move |_| json!(clock.borrow().now())),
        );
    jobs.bind(HookEvent::BeforeDefaults, |jobs, job, _| {
        if !field(job, "job_id").is_null() {
            return None;
        }
        let mut job = job.clone();
        job.insert("job_id".into(), json!(next_job_id(jobs)));
        Some(job)
    });
    jobs
}

fn page_collection(state: &SharedState, jobs: &SharedJobs) -> Collection {
    let current_job = Rc::clone(state);
    let mut pages = Collection::new(PAGE_KEYS)
        .with_default("url", DefaultValue::literal(Value::Null))
        .with_default(
            "job_id",
            DefaultValue::computed(move |_| json!(current_job.borrow().job_id)),
        )
        .with_default("status", DefaultValue::literal(PageStatus::ToFetch.as_str()))
        .with_default("method", DefaultValue::literal("GET"))
        .with_default("headers", DefaultValue::literal(json!({})))
        .with_default("fetch_type", DefaultValue::literal("standard"))
        .with_default("cookie", DefaultValue::literal(Value::Null))
        .with_default("no_redirect", DefaultValue::literal(false))
        .with_default("body", DefaultValue::literal(Value::Null))
        .with_default("ua_type", DefaultValue::literal("desktop"))
        .with_default("no_url_encode", DefaultValue::literal(false))
        .with_default("http2", DefaultValue::literal(false))
        .with_default("vars", DefaultValue::literal(json!({})));

    let policy = Rc::clone(state);
    pages.bind(HookEvent::BeforeDefaults, move |_, page, _| {
        strip_unless_allowed(&policy, page, "job_id")
    });

    let policy = Rc::clone(state);
    pages.bind(HookEvent::BeforeMatch, move |_, page, _| {
        let keep = policy.borrow().allow_page_gid_override && !field(page, "gid").is_null();
        if keep {
            return None;
        }
        let mut page = page.clone();
        let gid = generate_page_gid(&page);
        page.insert("gid".into(), Value::String(gid));
        Some(page)
    });

    let jobs = Rc::clone(jobs);
    pages.bind(HookEvent::AfterInsert, move |_, page, _| {
        ensure_job(&jobs, field(page, "job_id"));
        None
    });
    pages
}

fn output_collection(state: &SharedState, jobs: &SharedJobs) -> Collection {
    let current_job = Rc::clone(state);
    let clock = Rc::clone(state);
    let current_page = Rc::clone(state);
    let mut outputs = Collection::new(OUTPUT_KEYS)
        .with_default("_collection", DefaultValue::literal(DEFAULT_COLLECTION))
        .with_default(
            "_job_id",
            DefaultValue::computed(move |_| json!(current_job.borrow().job_id)),
        )
        .with_default(
            "_created_at",
            DefaultValue::computed(move |_| json!(clock.borrow().now())),
        )
        .with_default(
            "_gid",
            DefaultValue::computed(move |_| json!(current_page.borrow().page_gid)),
        );

    let policy = Rc::clone(state);
    outputs.bind(HookEvent::BeforeDefaults, move |_, output, _| {
        strip_unless_allowed(&policy, output, "_job_id")
    });

    outputs.bind(HookEvent::BeforeMatch, |_, output, _| {
        if !field(output, "_id").is_null() {
            return None;
        }
        let mut output = output.clone();
        let id = generate_output_id(&output);
        output.insert("_id".into(), Value::String(id));
        Some(output)
    });

    let jobs = Rc::clone(jobs);
    outputs.bind(HookEvent::AfterInsert, move |_, output, _| {
        ensure_job(&jobs, field(output, "_job_id"));
        None
    });
    outputs
}

fn strip_unless_allowed(state: &SharedState, record: &Record, name: &str) -> Option<Record> {
    if state.borrow().allow_job_id_override || !record.contains_key(name) {
        return None;
    }
    let mut record = record.clone();
    record.remove(name);
    Some(record)
}
