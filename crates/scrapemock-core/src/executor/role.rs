//! Executor roles and their compatibility-checked construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::ScriptContext;
use super::fake::Executor;
use crate::collection::Record;
use crate::compat::{CompatibilityReport, check_compatibility};
use crate::config::Config;
use crate::{Error, Result};

const SEEDER_OPERATIONS: &[&str] = &[
    "outputs",
    "pages",
    "save_pages",
    "save_outputs",
    "find_output",
    "find_outputs",
];

const PARSER_OPERATIONS: &[&str] = &[
    "content",
    "failed_content",
    "outputs",
    "pages",
    "page",
    "save_pages",
    "save_outputs",
    "find_output",
    "find_outputs",
    "refetch",
    "reparse",
];

const FINISHER_OPERATIONS: &[&str] = &["outputs", "save_outputs", "find_output", "find_outputs"];

/// Script kind, each with its own operation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Enqueues the first pages of a job.
    Seeder,
    /// Parses one fetched page into outputs and more pages.
    Parser,
    /// Runs once after the job's pages are done.
    Finisher,
}

impl Role {
    /// All roles.
    pub const ALL: [Self; 3] = [Self::Seeder, Self::Parser, Self::Finisher];

    /// Role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seeder => "seeder",
            Self::Parser => "parser",
            Self::Finisher => "finisher",
        }
    }

    /// Operations checked against the platform's reference list.
    #[must_use]
    pub const fn operations(self) -> &'static [&'static str] {
        match self {
            Self::Seeder => SEEDER_OPERATIONS,
            Self::Parser => PARSER_OPERATIONS,
            Self::Finisher => FINISHER_OPERATIONS,
        }
    }

    /// Operations available to scripts of this role.
    ///
    /// Finishers additionally see `job_id`, which the platform provides
    /// outside its published operation list.
    #[must_use]
    pub fn exposed_operations(self) -> Vec<&'static str> {
        let mut operations = self.operations().to_vec();
        if self == Self::Finisher {
            operations.push("job_id");
        }
        operations
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidArgument(format!("Unknown role '{s}'")))
    }
}

/// An [`Executor`] restricted to one role's operations.
///
/// Construction fails before any script runs when the role exposes
/// operations the platform does not know about.
///
/// ```rust
/// use scrapemock_core::{Config, Record, Role, RoleExecutor};
/// use serde_json::json;
///
/// let reference = ["outputs", "pages", "save_pages", "save_outputs", "find_output", "find_outputs"];
/// let mut seeder = RoleExecutor::new(Role::Seeder, &reference, &Config::default())?;
///
/// seeder.run(Record::new(), |ctx| {
///     let mut page = Record::new();
///     page.insert("url".into(), json!("https://example.com/list"));
///     ctx.pages()?.push(page);
///     Ok(())
/// })?;
///
/// assert_eq!(seeder.executor().saved_pages().len(), 1);
/// # Ok::<(), scrapemock_core::Error>(())
/// ```
#[derive(Debug)]
pub struct RoleExecutor {
    role: Role,
    report: CompatibilityReport<String>,
    executor: Executor,
}

impl RoleExecutor {
    /// Check `role` against the platform's `reference` operations and build
    /// a fresh executor from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleInterface`] when the role exposes
    /// operations missing from `reference`.
    pub fn new<S: AsRef<str>>(role: Role, reference: &[S], config: &Config) -> Result<Self> {
        let report = check_compatibility(reference, role.operations())?;
        Ok(Self {
            role,
            report,
            executor: Executor::with_config(config),
        })
    }

    /// Like [`RoleExecutor::new`], over an existing executor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleInterface`] when the role exposes
    /// operations missing from `reference`.
    pub fn with_executor<S: AsRef<str>>(
        role: Role,
        reference: &[S],
        executor: Executor,
    ) -> Result<Self> {
        let report = check_compatibility(reference, role.operations())?;
        Ok(Self {
            role,
            report,
            executor,
        })
    }

    /// Role of this executor.
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Compatibility report from construction.
    pub const fn report(&self) -> &CompatibilityReport<String> {
        &self.report
    }

    /// Underlying executor.
    pub const fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Underlying executor, for test setup.
    pub const fn executor_mut(&mut self) -> &mut Executor {
        &mut self.executor
    }

    /// Consume into the underlying executor.
    pub fn into_executor(self) -> Executor {
        self.executor
    }

    /// Run `script` with `vars`, then flush drafts into the store.
    ///
    /// Drafts are left untouched when the script fails.
    pub fn run<F>(&mut self, vars: Record, script: F) -> Result<()>
    where
        F: FnOnce(&mut ScriptContext<'_>) -> Result<()>,
    {
        self.executor.set_vars(vars);
        let mut context = ScriptContext::new(&mut self.executor, &self.role.exposed_operations());
        script(&mut context)?;
        self.executor.flush();
        debug!(role = %self.role, "Script finished, drafts flushed");
        Ok(())
    }
}
