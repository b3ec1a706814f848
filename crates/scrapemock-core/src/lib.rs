//! # scrapemock-core
//!
//! In-memory fake of a web-scraping platform, for testing seeder, parser and
//! finisher scripts offline.
//!
//! The platform persists jobs, pages and outputs and assigns their ids as a
//! black box. This crate reproduces that behaviour in memory so scripts can be
//! exercised without a platform connection.
//!
//! ## Architecture
//!
//! - **Collection**: ordered records with key-based replace-on-insert,
//!   default values and four lifecycle hooks ([`Collection`])
//! - **Store**: jobs, pages and outputs built from collections, with
//!   content-derived ids and job linkage ([`RecordStore`])
//! - **Executors**: per-role operation surfaces over the store, checked for
//!   compatibility with the real platform ([`RoleExecutor`])
//! - **Cookies**: request/response cookie merging ([`cookie`])
//! - **Configuration** and **errors**: [`Config`], [`Error`]
//!
//! ## Quick Start
//!
//! ```rust
//! use scrapemock_core::{Record, RecordStore};
//! use serde_json::json;
//!
//! let mut store = RecordStore::new();
//!
//! let mut page = Record::new();
//! page.insert("url".into(), json!("https://example.com/?b=2&a=1"));
//! store.pages_mut().insert(page.clone());
//!
//! // Same request with reordered query: same gid, so still one page.
//! page.insert("url".into(), json!("https://example.com/?a=1&b=2"));
//! store.pages_mut().insert(page);
//! assert_eq!(store.pages().len(), 1);
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`]. Nothing is retried:
//! every error is a caller mistake.

/// Identity-matching record collection
pub mod collection;
/// Platform compatibility reports
pub mod compat;
/// Configuration loading and overrides
pub mod config;
/// Cookie header helpers
pub mod cookie;
/// Error types and result aliases
pub mod error;
/// Fake role executors
pub mod executor;
/// Fake job/page/output persistence
pub mod store;

pub use collection::{Collection, DefaultValue, Hook, HookEvent, Record};
pub use compat::{CompatibilityReport, analyze_compatibility, check_compatibility};
pub use config::{Config, ExecutorConfig, StoreConfig};
pub use error::{Error, Result};
pub use executor::{Executor, FindOptions, Role, RoleExecutor, ScriptContext};
pub use store::{JobStatus, PageStatus, RecordStore};
