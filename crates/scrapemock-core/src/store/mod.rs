//! Fake persistence for jobs, pages and outputs.
//!
//! This module emulates the platform database's black-box behaviour on top of
//! [`Collection`](crate::Collection)s: identity keys, default values,
//! content-derived ids and job/page/output linkage.
//!
//! ## Key Types
//!
//! - [`RecordStore`]: the three collections plus the current job, scraper and
//!   page context
//! - [`JobStatus`] / [`PageStatus`]: lifecycle states
//!
//! ## Identifiers
//!
//! - Page `gid`: `<host>-<digest>` over the normalised fetch parameters, see
//!   [`generate_page_gid`]
//! - Output `_id`: digest over the fields not starting with `_`, see
//!   [`generate_output_id`]
//!
//! ```rust
//! use scrapemock_core::store::generate_page_gid;
//! use scrapemock_core::Record;
//! use serde_json::json;
//!
//! let mut a = Record::new();
//! a.insert("url".into(), json!("https://example.com/?b=2&a=1"));
//! let mut b = Record::new();
//! b.insert("url".into(), json!("HTTPS://EXAMPLE.com/?a=1&b=2#section"));
//!
//! assert_eq!(generate_page_gid(&a), generate_page_gid(&b));
//! ```

mod db;
mod ids;
mod types;

pub use db::{Clock, RecordStore};
pub(crate) use db::matches_filter;
pub use ids::{
    PAGE_GID_FIELDS, clean_uri, fake_uuid, generate_output_id, generate_page_gid, page_gid_seed,
    time_stamp,
};
pub use types::{
    DEFAULT_COLLECTION, JOB_KEYS, JobStatus, OUTPUT_KEYS, PAGE_KEYS, PageStatus, RESET_TIMESTAMP,
};
