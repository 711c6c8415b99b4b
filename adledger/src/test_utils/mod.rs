//! Helpers for testing the counter pipeline without external services.
//!
//! [`faulty`] wraps the stores with switchable failures so tests can take a store down in
//! the middle of a cycle. [`failpoints`] configures the named failpoints of the flush
//! worker for the duration of a test. [`database`] and [`redis`] set up isolated live
//! stores for the tests that run against real servers.

pub mod database;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod faulty;
pub mod redis;
pub mod seed;
