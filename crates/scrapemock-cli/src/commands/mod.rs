//! Command implementations for the scrapemock CLI

mod compat;
mod gid;
mod query;

pub use compat::execute as check_compat;
pub use gid::execute as print_gid;
pub use query::{QueryArgs, execute as query_fixture};
