//! Identity-matching record collection.
//!
//! A [`Collection`] is an ordered list of [`Record`]s that refuses duplicates:
//! two records are the same when they agree on every configured key field,
//! much like a composite primary key. Inserting a record whose keys match an
//! existing one replaces it, and the replacement is moved to the end.
//!
//! ## Insert pipeline
//!
//! Every [`Collection::insert`] runs these steps in order:
//!
//! 1. `before_defaults` hooks
//! 2. default values for missing or `null` fields
//! 3. `before_match` hooks
//! 4. first-match lookup by key fields (table scan)
//! 5. `before_insert` hooks, which see the matched record
//! 6. removal of the matched record, if any
//! 7. append of the working record
//! 8. `after_insert` hooks, which are informational only
//!
//! ## Example
//!
//! ```rust
//! use scrapemock_core::{Collection, DefaultValue, Record};
//! use serde_json::json;
//!
//! let mut collection = Collection::new(["id"])
//!     .with_default("status", DefaultValue::literal("new"));
//!
//! let mut item = Record::new();
//! item.insert("id".into(), json!(1));
//! collection.insert(item.clone());
//!
//! item.insert("status".into(), json!("done"));
//! collection.insert(item);
//!
//! assert_eq!(collection.len(), 1);
//! assert_eq!(collection[0]["status"], json!("done"));
//! ```

use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use serde_json::{Map, Value};
use tracing::debug;

use crate::{Error, Result};

/// Open mapping of field names to JSON values.
///
/// Records have no schema; fields the collection knows nothing about are
/// stored untouched.
pub type Record = Map<String, Value>;

static NULL: Value = Value::Null;

/// Read a field, treating a missing field as `null`.
pub(crate) fn field<'a>(record: &'a Record, key: &str) -> &'a Value {
    record.get(key).unwrap_or(&NULL)
}

/// Default value for a field, applied when the field is missing or `null`.
pub enum DefaultValue {
    /// A fixed value, cloned into each record.
    Literal(Value),
    /// A generator evaluated against the record being inserted.
    Computed(Box<dyn Fn(&Record) -> Value>),
}

impl DefaultValue {
    /// Build a literal default.
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Build a computed default.
    pub fn computed<F>(generator: F) -> Self
    where
        F: Fn(&Record) -> Value + 'static,
    {
        Self::Computed(Box::new(generator))
    }

    /// Resolve the default for `record`.
    pub fn resolve(&self, record: &Record) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Computed(generator) => generator(record),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// The four points of the insert pipeline where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before defaults are applied.
    BeforeDefaults,
    /// After defaults, before the duplicate lookup.
    BeforeMatch,
    /// After the lookup, before the record is stored.
    BeforeInsert,
    /// After the record is stored.
    AfterInsert,
}

impl HookEvent {
    /// All events in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::BeforeDefaults,
        Self::BeforeMatch,
        Self::BeforeInsert,
        Self::AfterInsert,
    ];

    /// Event name as used by [`Collection::bind_event`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeDefaults => "before_defaults",
            Self::BeforeMatch => "before_match",
            Self::BeforeInsert => "before_insert",
            Self::AfterInsert => "after_insert",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown event '{s}'")))
    }
}

/// Lifecycle callback.
///
/// Receives the collection, the working record and, for `before_insert` and
/// `after_insert`, the matched record. Returning `Some` replaces the working
/// record; `None` leaves it as is. The return value of `after_insert` hooks
/// is ignored.
pub type Hook = Box<dyn Fn(&Collection, &Record, Option<&Record>) -> Option<Record>>;

#[derive(Default)]
struct Events {
    before_defaults: Vec<Hook>,
    before_match: Vec<Hook>,
    before_insert: Vec<Hook>,
    after_insert: Vec<Hook>,
}

impl Events {
    fn slot(&self, event: HookEvent) -> &[Hook] {
        match event {
            HookEvent::BeforeDefaults => &self.before_defaults,
            HookEvent::BeforeMatch => &self.before_match,
            HookEvent::BeforeInsert => &self.before_insert,
            HookEvent::AfterInsert => &self.after_insert,
        }
    }

    fn slot_mut(&mut self, event: HookEvent) -> &mut Vec<Hook> {
        match event {
            HookEvent::BeforeDefaults => &mut self.before_defaults,
            HookEvent::BeforeMatch => &mut self.before_match,
            HookEvent::BeforeInsert => &mut self.before_insert,
            HookEvent::AfterInsert => &mut self.after_insert,
        }
    }
}

/// Ordered record collection with key-based replace-on-insert semantics.
///
/// ## Key matching
///
/// With no key fields, records never match and every insert appends. With
/// key fields, a missing field compares equal to an explicit `null`, so two
/// records that both lack every key field are considered the same record.
pub struct Collection {
    key_fields: Vec<String>,
    defaults: Vec<(String, DefaultValue)>,
    events: Events,
    items: Vec<Record>,
}

impl Collection {
    /// Create an empty collection keyed by `key_fields`.
    pub fn new<I, S>(key_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_fields: key_fields.into_iter().map(Into::into).collect(),
            defaults: Vec::new(),
            events: Events::default(),
            items: Vec::new(),
        }
    }

    /// Add a default value using builder pattern.
    ///
    /// Defaults are applied in declaration order, so a computed default sees
    /// the defaults declared before it.
    #[must_use]
    pub fn with_default(mut self, field: impl Into<String>, value: DefaultValue) -> Self {
        self.set_default(field, value);
        self
    }

    /// Insert initial values through the regular pipeline.
    #[must_use]
    pub fn with_values(mut self, values: impl IntoIterator<Item = Record>) -> Self {
        for value in values {
            self.insert(value);
        }
        self
    }

    /// Declare or replace the default for `field`.
    pub fn set_default(&mut self, field: impl Into<String>, value: DefaultValue) {
        let field = field.into();
        if let Some(slot) = self.defaults.iter_mut().find(|(name, _)| *name == field) {
            slot.1 = value;
        } else {
            self.defaults.push((field, value));
        }
    }

    /// Key fields, in declaration order.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    /// Names of the fields that carry a default.
    pub fn default_fields(&self) -> impl Iterator<Item = &str> {
        self.defaults.iter().map(|(name, _)| name.as_str())
    }

    /// Default declared for `field`, if any.
    pub fn default_for(&self, field: &str) -> Option<&DefaultValue> {
        self.defaults
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Register a hook for `event`.
    pub fn bind<F>(&mut self, event: HookEvent, hook: F)
    where
        F: Fn(&Self, &Record, Option<&Record>) -> Option<Record> + 'static,
    {
        self.events.slot_mut(event).push(Box::new(hook));
    }

    /// Register a hook by event name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] when `event` is not one of
    /// `before_defaults`, `before_match`, `before_insert`, `after_insert`.
    pub fn bind_event<F>(&mut self, event: &str, hook: F) -> Result<()>
    where
        F: Fn(&Self, &Record, Option<&Record>) -> Option<Record> + 'static,
    {
        let event: HookEvent = event.parse()?;
        self.bind(event, hook);
        Ok(())
    }

    /// Check whether two records share the same key values.
    pub fn match_keys(&self, a: &Record, b: &Record) -> bool {
        if self.key_fields.is_empty() {
            return false;
        }
        self.key_fields
            .iter()
            .all(|key| field(a, key) == field(b, key))
    }

    /// First stored record whose key fields equal those of `filter`.
    ///
    /// Uses a table scan.
    pub fn find_match(&self, filter: &Record) -> Option<&Record> {
        self.items.iter().find(|item| self.match_keys(item, filter))
    }

    /// Mutable variant of [`Collection::find_match`].
    ///
    /// Changing key fields through this reference bypasses the uniqueness
    /// check.
    pub fn find_match_mut(&mut self, filter: &Record) -> Option<&mut Record> {
        let position = self.position_of(filter)?;
        self.items.get_mut(position)
    }

    /// Insert `record`, replacing any stored record with the same keys.
    ///
    /// Returns the record as stored, after hooks and defaults.
    pub fn insert(&mut self, record: Record) -> &Record {
        let mut item = self.run_hooks(HookEvent::BeforeDefaults, record, None);
        self.apply_defaults(&mut item);
        let item = self.run_hooks(HookEvent::BeforeMatch, item, None);

        let position = self.position_of(&item);
        let item = self.run_hooks(
            HookEvent::BeforeInsert,
            item,
            position.map(|index| &self.items[index]),
        );

        let replaced = position.map(|index| self.items.remove(index));
        if replaced.is_some() {
            debug!(keys = ?self.key_fields, "Replaced record with matching keys");
        }
        self.items.push(item);

        let this: &Self = self;
        let inserted = &this.items[this.items.len() - 1];
        for hook in this.events.slot(HookEvent::AfterInsert) {
            let _ = hook(this, inserted, replaced.as_ref());
        }
        inserted
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no record is stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored records in insertion order.
    pub fn records(&self) -> &[Record] {
        &self.items
    }

    /// Iterate over stored records.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.items.iter()
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.items.get(index)
    }

    /// First stored record.
    pub fn first(&self) -> Option<&Record> {
        self.items.first()
    }

    /// Last stored record.
    pub fn last(&self) -> Option<&Record> {
        self.items.last()
    }

    /// Remove every record. Defaults and hooks are kept.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    fn position_of(&self, filter: &Record) -> Option<usize> {
        self.items
            .iter()
            .position(|item| self.match_keys(item, filter))
    }

    fn apply_defaults(&self, item: &mut Record) {
        for (name, default) in &self.defaults {
            if item.get(name).is_none_or(Value::is_null) {
                let value = default.resolve(item);
                item.insert(name.clone(), value);
            }
        }
    }

    fn run_hooks(&self, event: HookEvent, record: Record, matched: Option<&Record>) -> Record {
        self.events
            .slot(event)
            .iter()
            .fold(record, |item, hook| hook(self, &item, matched).unwrap_or(item))
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("key_fields", &self.key_fields)
            .field("defaults", &self.defaults)
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl Index<usize> for Collection {
    type Output = Record;

    fn index(&self, index: usize) -> &Record {
        &self.items[index]
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_no_keys_never_match() {
        let collection = Collection::new(Vec::<String>::new());
        let a = record(json!({"aaa": 111}));
        assert!(!collection.match_keys(&a, &a.clone()));
        assert!(!collection.match_keys(&a, &record(json!({"aaa": 222}))));
    }

    #[test]
    fn test_match_on_same_key_values() {
        let collection = Collection::new(["aaa", "bbb"]);
        let a = record(json!({"aaa": 111, "bbb": 222, "ddd": 444}));
        let b = record(json!({"aaa": 111, "bbb": 222, "ccc": 333}));
        assert!(collection.match_keys(&a, &b));
    }

    #[test]
    fn test_no_match_on_different_key_values() {
        let collection = Collection::new(["aaa", "bbb"]);
        let a = record(json!({"aaa": 111, "bbb": 555}));
        let b = record(json!({"aaa": 111, "bbb": 222}));
        assert!(!collection.match_keys(&a, &b));
    }

    #[test]
    fn test_records_absent_at_every_key_match() {
        let collection = Collection::new(["id"]);
        let a = record(json!({"aaa": 1}));
        let b = record(json!({"id": null, "bbb": 2}));
        assert!(collection.match_keys(&a, &b));

        let mut collection = collection;
        collection.insert(a);
        collection.insert(b);
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0], record(json!({"id": null, "bbb": 2})));
    }

    #[test]
    fn test_initialize_with_keys_only() {
        let collection = Collection::new(["_id", "_collection"]);
        assert_eq!(collection.key_fields(), ["_id", "_collection"]);
        assert_eq!(collection.default_fields().count(), 0);
        assert!(collection.is_empty());
    }

    #[test]
    fn test_initialize_with_values_only_appends_everything() {
        let values = vec![
            record(json!({"aaa": 111})),
            record(json!({"aaa": 111})),
            record(json!({"bbb": 333})),
        ];
        let collection = Collection::new(Vec::<String>::new()).with_values(values.clone());
        assert_eq!(collection.records(), values.as_slice());
    }

    #[test]
    fn test_defaults_apply_to_missing_and_null_only() {
        let counter = Rc::new(Cell::new(0));
        let next = Rc::clone(&counter);
        let collection = Collection::new(["id"])
            .with_default(
                "id",
                DefaultValue::computed(move |_| {
                    next.set(next.get() + 1);
                    json!(next.get())
                }),
            )
            .with_default("aaa", DefaultValue::literal(111))
            .with_default(
                "bbb",
                DefaultValue::computed(|item| {
                    if field(item, "ccc").is_null() {
                        json!("No ccc")
                    } else {
                        json!("Has ccc")
                    }
                }),
            )
            .with_values(vec![
                record(json!({"aaa": "Defaults apply on nil values only", "bbb": null})),
                record(json!({"ccc": "ddd"})),
                record(json!({"id": "abc123"})),
            ]);

        let mut collection = collection;
        collection.insert(record(json!({"bbb": "Look mom! no ccc"})));

        let expected = vec![
            record(json!({"id": 1, "aaa": "Defaults apply on nil values only", "bbb": "No ccc"})),
            record(json!({"id": 2, "aaa": 111, "bbb": "Has ccc", "ccc": "ddd"})),
            record(json!({"id": "abc123", "aaa": 111, "bbb": "No ccc"})),
            record(json!({"id": 3, "aaa": 111, "bbb": "Look mom! no ccc"})),
        ];
        assert_eq!(collection.records(), expected.as_slice());
        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn test_find_match() {
        let collection = Collection::new(["id"]).with_values(vec![
            record(json!({"id": 1, "aaa": "AAA"})),
            record(json!({"id": 2, "aaa": "BBB"})),
        ]);
        let found = collection.find_match(&record(json!({"id": 2})));
        assert_eq!(found.unwrap()["aaa"], json!("BBB"));
        assert!(collection.find_match(&record(json!({"id": 3}))).is_none());
    }

    #[test]
    fn test_find_match_on_empty_collection() {
        let collection = Collection::new(["id"]);
        assert!(collection.find_match(&record(json!({"id": 1}))).is_none());
    }

    #[test]
    fn test_bind_event_rejects_unknown_event() {
        let mut collection = Collection::new(["id"]);
        let err = collection.bind_event("after_match", |_, _, _| None).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(ref msg) if msg.contains("after_match")));
    }

    #[test]
    fn test_bind_event_by_name() {
        let mut collection = Collection::new(["id"]);
        collection
            .bind_event("before_defaults", |_, item, _| {
                let mut item = item.clone();
                item.insert("bound".into(), json!(true));
                Some(item)
            })
            .unwrap();
        collection.insert(record(json!({"id": 1})));
        assert_eq!(collection[0]["bound"], json!(true));
    }

    #[test]
    fn test_hooks_run_in_pipeline_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut collection = Collection::new(["id"]).with_default("aaa", DefaultValue::literal(111));

        for event in HookEvent::ALL {
            let calls = Rc::clone(&calls);
            collection.bind(event, move |_, item, matched| {
                calls
                    .borrow_mut()
                    .push((event, item.contains_key("aaa"), matched.is_some()));
                None
            });
        }

        collection.insert(record(json!({"id": 1})));
        collection.insert(record(json!({"id": 1, "bbb": 222})));

        let calls = calls.borrow();
        assert_eq!(
            calls.as_slice(),
            [
                (HookEvent::BeforeDefaults, false, false),
                (HookEvent::BeforeMatch, true, false),
                (HookEvent::BeforeInsert, true, false),
                (HookEvent::AfterInsert, true, false),
                (HookEvent::BeforeDefaults, false, false),
                (HookEvent::BeforeMatch, true, false),
                (HookEvent::BeforeInsert, true, true),
                (HookEvent::AfterInsert, true, true),
            ]
        );
    }

    #[test]
    fn test_before_insert_sees_match_and_can_replace_item() {
        let mut collection = Collection::new(["id"]).with_values(vec![record(json!({"id": 1, "ccc": 333}))]);
        collection.bind(HookEvent::BeforeInsert, |collection, item, matched| {
            assert_eq!(collection.len(), 1);
            let matched = matched?;
            let mut item = item.clone();
            item.insert("previous".into(), matched["ccc"].clone());
            Some(item)
        });

        collection.insert(record(json!({"id": 1, "bbb": 222})));
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[0], record(json!({"id": 1, "bbb": 222, "previous": 333})));
    }

    #[test]
    fn test_after_insert_sees_stored_collection() {
        let seen = Rc::new(Cell::new(0));
        let observed = Rc::clone(&seen);
        let mut collection = Collection::new(["id"]).with_values(vec![record(json!({"id": 1}))]);
        collection.bind(HookEvent::AfterInsert, move |collection, item, matched| {
            observed.set(collection.len());
            assert_eq!(item["bbb"], json!(222));
            assert_eq!(matched.unwrap(), &record(json!({"id": 1})));
            let mut ignored = item.clone();
            ignored.insert("ignored".into(), json!(true));
            Some(ignored)
        });

        let stored = collection.insert(record(json!({"id": 1, "bbb": 222}))).clone();
        assert_eq!(seen.get(), 1);
        assert!(!stored.contains_key("ignored"));
        assert!(!collection[0].contains_key("ignored"));
    }

    #[test]
    fn test_hooks_for_one_event_are_chained() {
        let mut collection = Collection::new(Vec::<String>::new());
        collection.bind(HookEvent::BeforeMatch, |_, item, _| {
            let mut item = item.clone();
            item.insert("step".into(), json!(1));
            Some(item)
        });
        collection.bind(HookEvent::BeforeMatch, |_, _, _| None);
        collection.bind(HookEvent::BeforeMatch, |_, item, _| {
            let mut item = item.clone();
            let step = item["step"].as_i64().unwrap();
            item.insert("step".into(), json!(step + 1));
            Some(item)
        });

        collection.insert(Record::new());
        assert_eq!(collection[0]["step"], json!(2));
    }

    #[test]
    fn test_insert_different_keys_appends() {
        let mut collection = Collection::new(["aaa"]);
        collection.insert(record(json!({"aaa": 1, "bbb": 1})));
        collection.insert(record(json!({"aaa": 2, "bbb": 2})));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.last().unwrap()["aaa"], json!(2));
    }

    #[test]
    fn test_replace_moves_to_end_without_merging() {
        let mut collection = Collection::new(["aaa"]);
        collection.insert(record(json!({"aaa": 1, "bbb": 1, "only_old": true})));
        collection.insert(record(json!({"aaa": 2})));
        collection.insert(record(json!({"aaa": 1, "bbb": 3})));

        assert_eq!(collection.len(), 2);
        assert_eq!(collection[0], record(json!({"aaa": 2})));
        assert_eq!(collection[1], record(json!({"aaa": 1, "bbb": 3})));
    }

    #[test]
    fn test_find_match_mut_updates_in_place() {
        let mut collection = Collection::new(["id"]).with_values(vec![record(json!({"id": 1}))]);
        collection
            .find_match_mut(&record(json!({"id": 1})))
            .unwrap()
            .insert("touched".into(), json!(true));
        assert_eq!(collection[0]["touched"], json!(true));
    }

    #[test]
    fn test_hook_event_round_trip_names() {
        for event in HookEvent::ALL {
            assert_eq!(event.as_str().parse::<HookEvent>().unwrap(), event);
            assert_eq!(event.to_string(), event.as_str());
        }
    }
}
