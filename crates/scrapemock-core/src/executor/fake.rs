//! Fake executor state shared by all roles.

use std::cell::Ref;
use std::mem;

use serde_json::{Value, json};

use crate::collection::{Collection, Record};
use crate::config::{Config, ExecutorConfig, StoreConfig};
use crate::store::RecordStore;
use crate::{Error, Result};

/// Default `per_page` for [`Executor::find_outputs`].
pub const DEFAULT_PER_PAGE: i64 = 30;

/// Job selection for [`Executor::find_outputs`].
///
/// `job_id` wins over `scraper_name`. With neither set, the current job is
/// searched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Search this job.
    pub job_id: Option<i64>,
    /// Search the latest job of this scraper.
    pub scraper_name: Option<String>,
}

impl FindOptions {
    /// Search a specific job.
    pub const fn job(job_id: i64) -> Self {
        Self {
            job_id: Some(job_id),
            scraper_name: None,
        }
    }

    /// Search the latest job of `scraper_name`.
    pub fn scraper(scraper_name: impl Into<String>) -> Self {
        Self {
            job_id: None,
            scraper_name: Some(scraper_name.into()),
        }
    }
}

/// Offline stand-in for the platform's script executor.
///
/// Scripts enqueue draft pages and outputs; flushing moves the drafts into the
/// backing [`RecordStore`], where they get ids and defaults exactly as the
/// platform would assign them.
///
/// ```rust
/// use scrapemock_core::{Executor, Record};
/// use serde_json::json;
///
/// let mut executor = Executor::new();
/// let mut output = Record::new();
/// output.insert("name".into(), json!("Widget"));
/// executor.outputs_mut().push(output);
/// executor.flush();
///
/// assert!(executor.outputs().is_empty());
/// assert_eq!(executor.saved_outputs().len(), 1);
/// assert_eq!(executor.saved_outputs()[0]["_collection"], json!("default"));
/// ```
#[derive(Debug)]
pub struct Executor {
    store: RecordStore,
    config: ExecutorConfig,
    pages: Vec<Record>,
    outputs: Vec<Record>,
    page: Record,
    content: Option<String>,
    failed_content: Option<String>,
    vars: Record,
}

impl Executor {
    /// Create an executor with default configuration.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    /// Create an executor from configuration.
    pub fn with_config(config: &Config) -> Self {
        Self::with_store(RecordStore::with_config(&config.store), config)
    }

    /// Create an executor over an existing store.
    ///
    /// The current page is a fake page for `https://example.com`, using the
    /// configured page gid when one is set.
    pub fn with_store(store: RecordStore, config: &Config) -> Self {
        let mut executor = Self {
            store,
            config: config.executor.clone(),
            pages: Vec::new(),
            outputs: Vec::new(),
            page: Record::new(),
            content: None,
            failed_content: None,
            vars: Record::new(),
        };
        let mut page = Record::new();
        page.insert("url".into(), json!("https://example.com"));
        if let Some(gid) = &config.store.page_gid {
            page.insert("gid".into(), json!(gid));
        }
        executor.set_page(page);
        executor
    }

    /// Build an executor from a JSON fixture.
    ///
    /// Recognised keys: `job_id`, `scraper_name`, `page`, `content`,
    /// `failed_content`, `vars`, draft `pages` and `outputs`, and `jobs`
    /// saved straight into the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when the fixture is not an object,
    /// when `pages`, `outputs` or `jobs` is not an array of objects, or when
    /// another key has the wrong type.
    pub fn from_fixture(fixture: &Value, config: &Config) -> Result<Self> {
        let Value::Object(fixture) = fixture else {
            return Err(Error::invalid_argument("Fixture must be an object."));
        };

        let mut config = config.clone();
        match fixture.get("job_id") {
            None | Some(Value::Null) => {},
            Some(value) => {
                let job_id = value
                    .as_i64()
                    .ok_or_else(|| Error::invalid_argument("job_id must be an integer."))?;
                config.store.job_id = Some(job_id);
            },
        }
        if let Some(name) = optional_str(fixture, "scraper_name")? {
            config.store.scraper_name = Some(name.to_owned());
        }

        let mut executor = Self::with_config(&config);
        let mut jobs = records_from(fixture, "jobs")?;
        executor.save_jobs(&mut jobs);
        executor.pages = records_from(fixture, "pages")?;
        executor.outputs = records_from(fixture, "outputs")?;

        match fixture.get("page") {
            None | Some(Value::Null) => {},
            Some(Value::Object(page)) => executor.set_page(page.clone()),
            Some(_) => return Err(Error::invalid_argument("page must be an object.")),
        }
        executor.content = optional_str(fixture, "content")?.map(str::to_owned);
        executor.failed_content = optional_str(fixture, "failed_content")?.map(str::to_owned);
        match fixture.get("vars") {
            None | Some(Value::Null) => {},
            Some(Value::Object(vars)) => executor.vars = vars.clone(),
            Some(_) => return Err(Error::invalid_argument("vars must be an object.")),
        }
        Ok(executor)
    }

    /// Backing store.
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Backing store, mutable.
    pub const fn store_mut(&mut self) -> &mut RecordStore {
        &mut self.store
    }

    /// Executor settings.
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Current job id.
    pub fn job_id(&self) -> i64 {
        self.store.job_id()
    }

    /// Switch the current job, keeping the current page in sync.
    pub fn set_job_id(&mut self, job_id: Option<i64>) {
        self.store.set_job_id(job_id);
        self.page.insert("job_id".into(), json!(self.store.job_id()));
    }

    /// Current scraper name.
    pub fn scraper_name(&self) -> String {
        self.store.scraper_name()
    }

    /// Rename the current scraper and its current job.
    pub fn set_scraper_name(&mut self, name: impl Into<String>) {
        self.store.set_scraper_name(name);
    }

    /// Page being processed.
    pub const fn page(&self) -> &Record {
        &self.page
    }

    /// Replace the page being processed.
    ///
    /// The page gets store defaults with supplied `gid` and `job_id` kept.
    /// Its job becomes the current job and its gid the store's current page
    /// gid, so outputs saved afterwards point at it.
    pub fn set_page(&mut self, page: Record) {
        let config = StoreConfig {
            job_id: Some(self.store.job_id()),
            scraper_name: Some(self.store.scraper_name()),
            ..StoreConfig::default()
        };
        let page = RecordStore::build_page(page, &config);
        let current = self.store.job_id();
        if let Some(job_id) = page
            .get("job_id")
            .and_then(Value::as_i64)
            .filter(|job_id| *job_id != current)
        {
            self.store.set_job_id(Some(job_id));
        }
        if let Some(gid) = page.get("gid").and_then(Value::as_str) {
            self.store.set_page_gid(Some(gid.to_owned()));
        }
        self.page = page;
    }

    /// Body of the fetched page.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Set the body of the fetched page.
    pub fn set_content(&mut self, content: Option<String>) {
        self.content = content;
    }

    /// Body of the last failed fetch.
    pub fn failed_content(&self) -> Option<&str> {
        self.failed_content.as_deref()
    }

    /// Set the body of the last failed fetch.
    pub fn set_failed_content(&mut self, content: Option<String>) {
        self.failed_content = content;
    }

    /// Script variables.
    pub const fn vars(&self) -> &Record {
        &self.vars
    }

    /// Replace script variables.
    pub fn set_vars(&mut self, vars: Record) {
        self.vars = vars;
    }

    /// Draft pages.
    pub fn pages(&self) -> &[Record] {
        &self.pages
    }

    /// Draft pages, for enqueueing.
    pub const fn pages_mut(&mut self) -> &mut Vec<Record> {
        &mut self.pages
    }

    /// Draft outputs.
    pub fn outputs(&self) -> &[Record] {
        &self.outputs
    }

    /// Draft outputs, for enqueueing.
    pub const fn outputs_mut(&mut self) -> &mut Vec<Record> {
        &mut self.outputs
    }

    /// Append draft pages.
    pub fn enqueue_pages(&mut self, pages: impl IntoIterator<Item = Record>) {
        self.pages.extend(pages);
    }

    /// Append draft outputs.
    pub fn enqueue_outputs(&mut self, outputs: impl IntoIterator<Item = Record>) {
        self.outputs.extend(outputs);
    }

    /// Save one page straight into the store.
    pub fn save_page(&mut self, page: Record) -> &Record {
        self.store.pages_mut().insert(page)
    }

    /// Save one output straight into the store.
    pub fn save_output(&mut self, output: Record) -> &Record {
        self.store.outputs_mut().insert(output)
    }

    /// Move every page of `list` into the store, leaving it empty.
    pub fn save_pages(&mut self, list: &mut Vec<Record>) {
        for page in list.drain(..) {
            self.store.pages_mut().insert(page);
        }
    }

    /// Move every output of `list` into the store, leaving it empty.
    pub fn save_outputs(&mut self, list: &mut Vec<Record>) {
        for output in list.drain(..) {
            self.store.outputs_mut().insert(output);
        }
    }

    /// Move every job of `list` into the store, leaving it empty.
    pub fn save_jobs(&mut self, list: &mut Vec<Record>) {
        let mut jobs = self.store.jobs_mut();
        for job in list.drain(..) {
            jobs.insert(job);
        }
    }

    /// Save draft pages.
    pub fn flush_pages(&mut self) {
        let mut drafts = mem::take(&mut self.pages);
        self.save_pages(&mut drafts);
    }

    /// Save draft outputs.
    pub fn flush_outputs(&mut self) {
        let mut drafts = mem::take(&mut self.outputs);
        self.save_outputs(&mut drafts);
    }

    /// Save draft pages, then draft outputs.
    pub fn flush(&mut self) {
        self.flush_pages();
        self.flush_outputs();
    }

    /// Drop draft pages.
    pub fn clear_draft_pages(&mut self) {
        self.pages.clear();
    }

    /// Drop draft outputs.
    pub fn clear_draft_outputs(&mut self) {
        self.outputs.clear();
    }

    /// Pages in the store.
    pub const fn saved_pages(&self) -> &Collection {
        self.store.pages()
    }

    /// Outputs in the store.
    pub const fn saved_outputs(&self) -> &Collection {
        self.store.outputs()
    }

    /// Jobs in the store.
    pub fn saved_jobs(&self) -> Ref<'_, Collection> {
        self.store.jobs()
    }

    /// Page through saved outputs of one collection and job.
    ///
    /// `page` is 1-based; `per_page` must be within `1..=max_per_page`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for out-of-range `page` or
    /// `per_page`.
    pub fn find_outputs(
        &self,
        collection: &str,
        query: &Record,
        page: i64,
        per_page: i64,
        options: &FindOptions,
    ) -> Result<Vec<Record>> {
        if page < 1 {
            return Err(Error::invalid_argument("page must be greater than 0."));
        }
        let max = self.config.max_per_page;
        let per_page_size = usize::try_from(per_page)
            .ok()
            .filter(|size| (1..=max).contains(size))
            .ok_or_else(|| {
                Error::InvalidArgument(format!("per_page must be between 1 and {max}."))
            })?;
        let offset = usize::try_from(page - 1)
            .ok()
            .and_then(|page| page.checked_mul(per_page_size))
            .ok_or_else(|| Error::invalid_argument("page is out of range."))?;

        let job_id = match (&options.job_id, &options.scraper_name) {
            (Some(job_id), _) => json!(job_id),
            (None, Some(name)) => {
                match self.store.latest_job_by(Some(name), &Record::new()) {
                    Some(job) => job.get("job_id").cloned().unwrap_or(Value::Null),
                    None => return Ok(Vec::new()),
                }
            },
            (None, None) => json!(self.job_id()),
        };

        let mut filter = query.clone();
        filter.insert("_collection".into(), json!(collection));
        filter.insert("_job_id".into(), job_id);
        self.store.query("outputs", &filter, offset, Some(per_page))
    }

    /// First saved output matching `query`.
    pub fn find_output(
        &self,
        collection: &str,
        query: &Record,
        options: &FindOptions,
    ) -> Result<Option<Record>> {
        Ok(self
            .find_outputs(collection, query, 1, 1, options)?
            .into_iter()
            .next())
    }

    /// Latest job of `scraper_name` matching `filter`.
    pub fn latest_job_by(&self, scraper_name: Option<&str>, filter: &Record) -> Option<Record> {
        self.store.latest_job_by(scraper_name, filter)
    }

    /// Queue page `gid` of the current job for fetching again.
    pub fn refetch(&mut self, gid: &str) -> Result<()> {
        let job_id = self.job_id();
        self.store.refetch(job_id, gid)
    }

    /// Queue page `gid` of the current job for parsing again.
    pub fn reparse(&mut self, gid: &str) -> Result<()> {
        let job_id = self.job_id();
        self.store.reparse(job_id, gid)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

fn optional_str<'a>(fixture: &'a Record, key: &str) -> Result<Option<&'a str>> {
    match fixture.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(Error::InvalidArgument(format!("{key} must be a string."))),
    }
}

fn records_from(fixture: &Record, key: &str) -> Result<Vec<Record>> {
    match fixture.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object().cloned().ok_or_else(|| {
                    Error::InvalidArgument(format!("{key} must be an array of objects."))
                })
            })
            .collect(),
        Some(_) => Err(Error::InvalidArgument(format!("{key} must be an array."))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_initial_page_is_in_sync() {
        let executor = Executor::new();
        assert_eq!(executor.page()["url"], json!("https://example.com"));
        assert_eq!(executor.page()["job_id"], json!(executor.job_id()));
        assert_eq!(
            executor.page()["gid"],
            json!(executor.store().page_gid())
        );
    }

    #[test]
    fn test_save_lists_are_drained() {
        let mut executor = Executor::new();
        let mut pages = records(json!([{"url": "https://a.com"}, {"url": "https://b.com"}]));
        let mut outputs = records(json!([{"aaa": 1}]));
        executor.save_pages(&mut pages);
        executor.save_outputs(&mut outputs);
        assert!(pages.is_empty());
        assert!(outputs.is_empty());
        assert_eq!(executor.saved_pages().len(), 2);
        assert_eq!(executor.saved_outputs().len(), 1);
    }

    #[test]
    fn test_flush_moves_drafts() {
        let mut executor = Executor::new();
        executor.enqueue_pages([record(json!({"url": "https://hhh.com"}))]);
        executor.enqueue_outputs([record(json!({"hhh": "111"}))]);
        executor.flush();
        assert!(executor.pages().is_empty());
        assert!(executor.outputs().is_empty());
        assert_eq!(executor.saved_pages()[0]["url"], json!("https://hhh.com"));
        assert_eq!(executor.saved_outputs()[0]["hhh"], json!("111"));
    }

    #[test]
    fn test_flush_pages_only() {
        let mut executor = Executor::new();
        executor.enqueue_pages([record(json!({"url": "https://a.com"}))]);
        executor.enqueue_outputs([record(json!({"aaa": 1}))]);
        executor.flush_pages();
        assert_eq!(executor.saved_pages().len(), 1);
        assert!(executor.saved_outputs().is_empty());
        assert_eq!(executor.outputs().len(), 1);
    }

    #[test]
    fn test_clear_drafts() {
        let mut executor = Executor::new();
        executor.enqueue_pages([record(json!({"url": "https://a.com"}))]);
        executor.enqueue_outputs([record(json!({"aaa": 1}))]);
        executor.clear_draft_pages();
        executor.clear_draft_outputs();
        executor.flush();
        assert!(executor.saved_pages().is_empty());
        assert!(executor.saved_outputs().is_empty());
    }

    #[test]
    fn test_find_outputs_by_query() {
        let mut executor = Executor::new();
        let mut outputs = records(json!([
            {"aaa": "1", "ddd": "DDD"},
            {"aaa": "2", "eee": 555},
            {"aaa": "3", "ggg": 777},
            {"aaa": "2", "hhh": "888"},
        ]));
        executor.save_outputs(&mut outputs);

        let found = executor
            .find_outputs("default", &record(json!({"aaa": "2"})), 1, 30, &FindOptions::default())
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0]["eee"], json!(555));
        assert_eq!(found[1]["hhh"], json!("888"));

        let one = executor
            .find_output("default", &record(json!({"aaa": "3"})), &FindOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(one["ggg"], json!(777));
        assert!(executor
            .find_output("other", &Record::new(), &FindOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_outputs_pages() {
        let mut executor = Executor::new();
        let mut outputs: Vec<Record> = (0..5).map(|i| record(json!({"n": i}))).collect();
        executor.save_outputs(&mut outputs);

        let second = executor
            .find_outputs("default", &Record::new(), 2, 2, &FindOptions::default())
            .unwrap();
        let values: Vec<&Value> = second.iter().map(|output| &output["n"]).collect();
        assert_eq!(values, [&json!(2), &json!(3)]);
    }

    #[test]
    fn test_find_outputs_validation() {
        let mut executor = Executor::new();
        executor.save_outputs(&mut vec![record(json!({"aaa": "1"}))]);
        let options = FindOptions::default();
        let query = Record::new();

        let err = executor.find_outputs("default", &query, 0, 1, &options).unwrap_err();
        assert!(err.to_string().contains("page must be greater than 0"));
        for per_page in [0, 501, -1] {
            let err = executor
                .find_outputs("default", &query, 1, per_page, &options)
                .unwrap_err();
            assert!(err.to_string().contains("per_page must be between 1 and 500"));
        }
        assert_eq!(executor.find_outputs("default", &query, 1, 1, &options).unwrap().len(), 1);
        assert_eq!(executor.find_outputs("default", &query, 1, 500, &options).unwrap().len(), 1);
    }

    #[test]
    fn test_find_outputs_by_job_and_scraper() {
        let mut executor = Executor::new();
        executor.store_mut().enable_job_id_override();
        executor.save_jobs(&mut records(json!([
            {"job_id": 111, "scraper_name": "AAA"},
            {"job_id": 222, "scraper_name": "BBB"},
        ])));
        assert_eq!(executor.saved_jobs().len(), 3);
        executor.save_outputs(&mut records(json!([
            {"_job_id": 111, "aaa": "1"},
            {"_job_id": 222, "aaa": "2"},
            {"_job_id": 111, "aaa": "3"},
            {"_job_id": 222, "aaa": "4"},
        ])));

        let by_scraper = executor
            .find_outputs("default", &Record::new(), 1, 4, &FindOptions::scraper("BBB"))
            .unwrap();
        let values: Vec<&Value> = by_scraper.iter().map(|o| &o["aaa"]).collect();
        assert_eq!(values, [&json!("2"), &json!("4")]);

        let by_job = executor
            .find_outputs("default", &Record::new(), 1, 4, &FindOptions::job(111))
            .unwrap();
        let values: Vec<&Value> = by_job.iter().map(|o| &o["aaa"]).collect();
        assert_eq!(values, [&json!("1"), &json!("3")]);

        let unknown = executor
            .find_outputs("default", &Record::new(), 1, 4, &FindOptions::scraper("ZZZ"))
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_set_page_keeps_store_in_sync() {
        let mut executor = Executor::new();
        executor.store_mut().enable_job_id_override();
        executor.set_page(record(json!({"gid": "AAA", "job_id": 111, "url": "https://aaa.com"})));
        assert_eq!(executor.page()["gid"], json!("AAA"));
        assert_eq!(executor.job_id(), 111);
        assert_eq!(executor.store().page_gid(), "AAA");

        executor.set_job_id(Some(222));
        assert_eq!(executor.page()["job_id"], json!(222));

        executor.save_outputs(&mut vec![record(json!({"aaa": 1}))]);
        assert_eq!(executor.saved_outputs()[0]["_gid"], json!("AAA"));
        assert_eq!(executor.saved_outputs()[0]["_job_id"], json!(222));
    }

    #[test]
    fn test_set_scraper_name_syncs_store() {
        let mut executor = Executor::new();
        executor.set_scraper_name("AAA");
        assert_eq!(executor.scraper_name(), "AAA");
        assert_eq!(executor.store().scraper_name(), "AAA");
        assert_eq!(executor.saved_jobs()[0]["scraper_name"], json!("AAA"));
    }

    #[test]
    fn test_refetch_and_reparse_use_current_job() {
        let mut executor = Executor::new();
        let gid = executor.save_page(record(json!({"url": "https://a.com", "status": "parsed"})))["gid"]
            .as_str()
            .unwrap()
            .to_owned();
        executor.reparse(&gid).unwrap();
        assert_eq!(executor.saved_pages()[0]["status"], json!("to_parse"));
        executor.refetch(&gid).unwrap();
        assert_eq!(executor.saved_pages()[0]["status"], json!("to_fetch"));

        executor.set_job_id(None);
        assert!(matches!(executor.refetch(&gid), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_from_fixture() {
        let fixture = json!({
            "job_id": 12,
            "scraper_name": "ebay",
            "page": {"url": "https://ebay.com/item/1", "vars": {"category": "toys"}},
            "content": "<html></html>",
            "vars": {"category": "toys"},
            "pages": [{"url": "https://ebay.com/item/2"}],
            "outputs": [{"name": "Widget"}],
        });
        let executor = Executor::from_fixture(&fixture, &Config::default()).unwrap();
        assert_eq!(executor.job_id(), 12);
        assert_eq!(executor.scraper_name(), "ebay");
        assert_eq!(executor.page()["url"], json!("https://ebay.com/item/1"));
        assert_eq!(executor.content(), Some("<html></html>"));
        assert_eq!(executor.failed_content(), None);
        assert_eq!(executor.vars()["category"], json!("toys"));
        assert_eq!(executor.pages().len(), 1);
        assert_eq!(executor.outputs().len(), 1);
    }

    #[test]
    fn test_from_fixture_rejects_bad_shapes() {
        let config = Config::default();
        for fixture in [
            json!([]),
            json!({"pages": {"url": "https://a.com"}}),
            json!({"outputs": "nope"}),
            json!({"outputs": [1, 2]}),
            json!({"job_id": "abc"}),
            json!({"page": []}),
        ] {
            let err = Executor::from_fixture(&fixture, &config).unwrap_err();
            assert_eq!(err.category(), "invalid_argument", "{fixture}");
        }
    }
}
