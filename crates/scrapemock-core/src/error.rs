//! Error types and handling for scrapemock-core operations.
//!
//! Every failure in this crate is a programming or configuration mistake made
//! by the caller: the fake platform is deterministic and in-memory, so there
//! is nothing to retry.
//!
//! ## Error Categories
//!
//! - **Invalid arguments**: unknown collection, hook or role names, malformed
//!   fixtures, out-of-range pagination
//! - **Incompatible interface**: a role exposes operations the reference
//!   platform does not know about
//! - **Not found**: refetch/reparse of a page that is not stored
//! - **Configuration / I/O / serialization**: config and fixture files
//!
//! ```rust
//! use scrapemock_core::{Error, RecordStore, Record};
//!
//! let store = RecordStore::new();
//! match store.query("nope", &Record::new(), 0, None) {
//!     Err(Error::InvalidArgument(msg)) => assert!(msg.contains("nope")),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use thiserror::Error;

/// The main error type for scrapemock-core operations.
///
/// All public functions in scrapemock-core return `Result<T, Error>`.
#[derive(Error, Debug)]
pub enum Error {
    /// An argument had the wrong shape or an unknown value.
    ///
    /// ## Common Causes
    ///
    /// - Querying a collection other than `jobs`, `pages` or `outputs`
    /// - Binding a hook to an event name that does not exist
    /// - Fixture `pages`/`outputs` that are not arrays of objects
    /// - `page` lower than 1 or `per_page` outside the configured bounds
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A role's operation list does not match the reference platform.
    ///
    /// Raised while constructing a role executor, before any script runs,
    /// and when a script calls an operation its role does not expose.
    #[error("Incompatible interface, missing operations: {}", missing.join(", "))]
    IncompatibleInterface {
        /// Operations exposed by the fake but unknown to the reference.
        missing: Vec<String>,
    },

    /// A referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// ## Common Causes
    ///
    /// - Invalid TOML syntax in the config file
    /// - An environment override that cannot be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed while reading config or fixture files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl Error {
    /// Get the error category as a string identifier.
    ///
    /// Useful as a structured logging field:
    ///
    /// ```rust
    /// use scrapemock_core::Error;
    ///
    /// let err = Error::InvalidArgument("Unknown collection aaa.".into());
    /// assert_eq!(err.category(), "invalid_argument");
    /// ```
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::IncompatibleInterface { .. } => "incompatible_interface",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }

    /// Shorthand for building an [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Convenience type alias for Results with our Error type.
pub type Result<T> = std::result::Result<T, Error>;
