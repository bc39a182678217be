//! The Monitor aggregate: per-user query ownership, validation,
//! scheduling, and scanning (spec.md §4).

pub mod aggregate;
pub mod eta;
pub mod matching;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod validate;

pub use aggregate::Monitor;
pub use query::{MatchMode, Query, QueryStatus};
pub use registry::MonitorRegistry;
