#![forbid(unsafe_code)]
//! planhint-core: identifiers, table sets, the structural query model, and
//! configuration shared by every planhint crate.
//!
//! SQL parsing is not done here. Callers build `SqlQuery` values directly
//! (or obtain them from a parser living outside this workspace).

pub mod config;
pub mod error;
pub mod prelude;
pub mod query;
pub mod table;

pub use error::{Error, Result};
