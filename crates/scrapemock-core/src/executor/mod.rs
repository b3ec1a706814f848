//! Fake seeder, parser and finisher executors.
//!
//! ## Key Types
//!
//! - [`Executor`]: drafts, current page and the backing store
//! - [`Role`] / [`RoleExecutor`]: per-role operation surface, checked
//!   against the platform's reference list at construction
//! - [`ScriptContext`]: what a script actually gets to call
//!
//! ## Example
//!
//! ```rust
//! use scrapemock_core::{Config, Record, Role, RoleExecutor};
//! use serde_json::json;
//!
//! let reference = Role::Parser.operations();
//! let mut parser = RoleExecutor::new(Role::Parser, reference, &Config::default())?;
//! parser.executor_mut().set_content(Some("<h1>Widget</h1>".into()));
//!
//! parser.run(Record::new(), |ctx| {
//!     let title = ctx.content()?.unwrap_or_default().replace("<h1>", "").replace("</h1>", "");
//!     ctx.call("outputs", &[json!({"title": title})])?;
//!     Ok(())
//! })?;
//!
//! let saved = parser.executor().saved_outputs();
//! assert_eq!(saved[0]["title"], json!("Widget"));
//! # Ok::<(), scrapemock_core::Error>(())
//! ```

mod context;
mod fake;
mod role;

pub use context::{OPERATIONS, Operation, ScriptContext, operation};
pub use fake::{DEFAULT_PER_PAGE, Executor, FindOptions};
pub use role::{Role, RoleExecutor};
