//! Advertisement event counting with a periodic flush into a durable ledger.
//!
//! Impression and click events are recorded as atomic increments in a fast counter store
//! ([`store::counter`]), one group of counters per advertisement. The [`flush`] pipeline
//! periodically folds every pending group into the advertisement's running totals in the
//! ledger ([`store::aggregate`]) and retires what it merged from the counter store.
//!
//! Delivery into the ledger is at-least-once: a group merged but not cleared because of
//! a failure is merged again by the next cycle.

pub mod concurrency;
pub mod error;
pub mod events;
pub mod failpoints;
pub mod flush;
pub mod keys;
mod macros;
pub mod metrics;
pub mod migrations;
pub mod selection;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
