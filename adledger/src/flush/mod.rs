//! Periodic flush of pending counter groups into the ledger.
//!
//! A cycle scans the counter store for pending groups ([`scanner`]), fans them out to
//! workers under a concurrency cap ([`dispatcher`]) and collects every worker's outcome
//! into a [`report::CycleReport`]. The [`scheduler`] runs cycles on a fixed interval and
//! never lets two of them overlap.
//!
//! Merging and clearing a group touch two stores and are not atomic together: a failure
//! after the merge commits leaves the group in place and the next cycle merges it again.

pub mod cycle;
pub mod dispatcher;
pub mod report;
pub mod scanner;
pub mod scheduler;
pub mod worker;
