//! Queue processing
//!
//! - [`dispatcher`]: sends one email and records the outcome
//! - [`scheduler`]: selects due emails and spreads them over workers

pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use scheduler::{partition, DispatchSummary, Scheduler};
