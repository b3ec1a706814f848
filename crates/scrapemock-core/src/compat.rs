//! Interface compatibility between fake executors and the real platform.
//!
//! Each executor role exposes a fixed list of operation names. Before a
//! script runs, that list is compared with the reference list the real
//! platform publishes:
//!
//! - an operation the fake exposes but the platform lacks is **missing**
//!   and fatal, since scripts would pass locally and fail in production
//! - an operation the platform has but the fake lacks is **new** and only
//!   warned about
//!
//! ```rust
//! use scrapemock_core::compat::analyze_compatibility;
//!
//! let report = analyze_compatibility(&[1, 2, 3, 4, 5], &[1, 2, 6]);
//! assert_eq!(report.missing, vec![6]);
//! assert_eq!(report.new, vec![3, 4, 5]);
//! assert!(!report.is_compatible);
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Error, Result};

/// Result of comparing an origin list with a fragment of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport<T> {
    /// Items in the fragment but not in the origin.
    pub missing: Vec<T>,
    /// Items in the origin but not in the fragment.
    pub new: Vec<T>,
    /// Whether `missing` is empty.
    pub is_compatible: bool,
}

/// Compare `fragment` against `origin`, keeping input order.
pub fn analyze_compatibility<T>(origin: &[T], fragment: &[T]) -> CompatibilityReport<T>
where
    T: PartialEq + Clone,
{
    let missing: Vec<T> = fragment
        .iter()
        .filter(|item| !origin.contains(item))
        .cloned()
        .collect();
    let new = origin
        .iter()
        .filter(|item| !fragment.contains(item))
        .cloned()
        .collect();
    CompatibilityReport {
        is_compatible: missing.is_empty(),
        missing,
        new,
    }
}

/// Check `exposed` operation names against the platform's `reference` list.
///
/// Warns when the platform has operations the fake does not expose.
///
/// # Errors
///
/// Returns [`Error::IncompatibleInterface`] when `exposed` contains names
/// unknown to `reference`.
pub fn check_compatibility<R, E>(
    reference: &[R],
    exposed: &[E],
) -> Result<CompatibilityReport<String>>
where
    R: AsRef<str>,
    E: AsRef<str>,
{
    let reference: Vec<String> = reference.iter().map(|s| s.as_ref().to_owned()).collect();
    let exposed: Vec<String> = exposed.iter().map(|s| s.as_ref().to_owned()).collect();
    let report = analyze_compatibility(&reference, &exposed);

    if !report.new.is_empty() {
        warn!(
            new = %report.new.join(", "),
            "Platform has new methods not covered by the fake executor"
        );
    }
    if !report.is_compatible {
        return Err(Error::IncompatibleInterface {
            missing: report.missing,
        });
    }
    Ok(report)
}
