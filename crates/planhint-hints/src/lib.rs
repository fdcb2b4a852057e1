#![forbid(unsafe_code)]
//! planhint-hints: compile join orders, operator assignments and plan
//! parameters into optimizer directives for a concrete database system.
//!
//! Every dialect runs the same staged pipeline (join order, operators, plan
//! parameters, merge, compile, splice). Dialects only contribute lookup
//! tables and renderers through `HintDialect`; callers talk to them through
//! the object-safe `HintProvider`.

pub mod dialect;
pub mod error;
pub mod mysql;
pub mod parts;
pub mod postgres;
pub mod provider;

pub use dialect::{Dialect, DirectedJoinOrder, HintDialect, HintTarget};
pub use error::{HintError, Result};
pub use mysql::MysqlHintProvider;
pub use parts::HintParts;
pub use postgres::PostgresHintProvider;
pub use provider::{hint_provider_for, hint_provider_from_config, HintProvider};
