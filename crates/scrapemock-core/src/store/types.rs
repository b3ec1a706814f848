//! Constants and status enums shared by the record store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Page identity: the content-derived `gid`.
pub const PAGE_KEYS: [&str; 1] = ["gid"];

/// Output identity: `_id` within a `_collection`.
pub const OUTPUT_KEYS: [&str; 2] = ["_id", "_collection"];

/// Job identity.
pub const JOB_KEYS: [&str; 1] = ["job_id"];

/// Collection assigned to outputs saved without `_collection`.
pub const DEFAULT_COLLECTION: &str = "default";

/// Timestamp written to `fetching_at` / `parsing_updated_at` on reset.
pub const RESET_TIMESTAMP: &str = "2001-01-01T00:00:00Z";

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Running; jobs created on first reference start here.
    Active,
    /// Finished. Default for explicitly inserted jobs.
    Done,
    /// Cancelled by the user.
    Cancelled,
    /// Paused by the user.
    Paused,
}

impl JobStatus {
    /// All job statuses.
    pub const ALL: [Self; 4] = [Self::Active, Self::Done, Self::Cancelled, Self::Paused];

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown job status '{s}'")))
    }
}

/// Fetch/parse lifecycle of a page.
///
/// `to_fetch -> fetching -> fetched -> to_parse -> parsing -> parsed`, with
/// `fetching_failed` and `parsing_failed` branching off the active states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Waiting to be fetched. Default for new pages.
    ToFetch,
    /// Fetch in progress.
    Fetching,
    /// Fetch failed.
    FetchingFailed,
    /// Fetched, not yet queued for parsing.
    Fetched,
    /// Waiting to be parsed.
    ToParse,
    /// Parse in progress.
    Parsing,
    /// Parse failed.
    ParsingFailed,
    /// Parsed.
    Parsed,
}

impl PageStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToFetch => "to_fetch",
            Self::Fetching => "fetching",
            Self::FetchingFailed => "fetching_failed",
            Self::Fetched => "fetched",
            Self::ToParse => "to_parse",
            Self::Parsing => "parsing",
            Self::ParsingFailed => "parsing_failed",
            Self::Parsed => "parsed",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
