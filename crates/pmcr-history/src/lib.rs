//! # PMCR History
//!
//! Read-only reporting over finished cycles: one [`CycleRecord`] per cycle,
//! kept in a [`HistoryStore`] and summarised by [`analyze`].

pub mod record;
pub mod store;
pub mod trend;

pub use record::CycleRecord;
pub use store::{HistoryStore, InMemoryHistoryStore};
pub use trend::{analyze, TrendReport};
