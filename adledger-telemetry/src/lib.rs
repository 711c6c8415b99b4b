//! Logging and metrics setup shared by the adledger binaries and tests.

pub mod metrics;
pub mod tracing;
