//! Coordination primitives shared by the scheduler and the flush dispatcher.

pub mod shutdown;
