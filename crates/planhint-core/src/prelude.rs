//! Convenient re-exports for downstream crates.

pub use crate::config::{PlanhintConfig, TonicConfig};
pub use crate::error::{Error, Result};
pub use crate::query::{Explain, FilterPredicate, HintClause, SqlQuery};
pub use crate::table::{ColumnReference, TableReference, TableSet};
