//! Compatibility check of a role against the platform's operation list

use std::path::Path;

use anyhow::Result;
use scrapemock_core::{Role, analyze_compatibility, check_compatibility};

use crate::utils::input::{parse_names, read_input};

/// Print the compatibility report of `role` against `reference`.
///
/// # Errors
///
/// Fails when the reference cannot be read, or after printing the report
/// when the role exposes operations missing from the reference.
pub fn execute(role: Role, reference: &Path) -> Result<()> {
    let reference = parse_names(&read_input(reference)?);
    let exposed: Vec<String> = role.operations().iter().map(ToString::to_string).collect();

    let report = analyze_compatibility(&reference, &exposed);
    println!("{}", serde_json::to_string_pretty(&report)?);

    check_compatibility(&reference, &exposed)?;
    Ok(())
}
