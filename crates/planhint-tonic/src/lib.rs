#![forbid(unsafe_code)]
//! planhint-tonic: learned physical operator selection.
//!
//! The QEP-S (query execution plan synopsis) is a tree keyed by join
//! sub-patterns. Each node keeps an exponentially decayed cost per join
//! operator; once more than one operator has been observed for a pattern the
//! cheapest one is recommended. `TonicOperatorSelection` wraps the synopsis
//! with a database backend that supplies plans and feedback.
//!
//! The synopsis is single-writer: feedback goes through `&mut self`.

pub mod error;
pub mod qeps;
pub mod strategy;

pub use error::{Result, TonicError};
pub use qeps::{QepsIdentifier, QepsNode, QueryExecutionPlanSynopsis};
pub use strategy::{DatabaseBackend, PhysicalOperatorSelection, TonicOperatorSelection};
