//! Metric names emitted by the counter pipeline.

/// Label for the final status of a flush cycle.
pub const STATUS_LABEL: &str = "status";

/// Label for the outcome of flushing one group.
pub const OUTCOME_LABEL: &str = "outcome";

/// Label for the counter field of an increment.
pub const FIELD_LABEL: &str = "field";

// Flush cycle metrics

/// Counter of flush cycles by status (`completed`, `partial`, `aborted`).
pub const ADLEDGER_FLUSH_CYCLES_TOTAL: &str = "adledger_flush_cycles_total";

/// Histogram of flush cycle durations in seconds.
pub const ADLEDGER_FLUSH_CYCLE_DURATION_SECONDS: &str = "adledger_flush_cycle_duration_seconds";

/// Counter of scheduler ticks skipped because a cycle was still running.
pub const ADLEDGER_FLUSH_SKIPPED_TICKS_TOTAL: &str = "adledger_flush_skipped_ticks_total";

/// Counter of flushed groups by outcome.
pub const ADLEDGER_FLUSH_GROUPS_TOTAL: &str = "adledger_flush_groups_total";

/// Gauge of flush workers currently running.
pub const ADLEDGER_FLUSH_ACTIVE_WORKERS: &str = "adledger_flush_active_workers";

// Producer metrics

/// Counter of recorded impression and click events.
pub const ADLEDGER_COUNTER_INCREMENTS_TOTAL: &str = "adledger_counter_increments_total";

/// Counter of events that could not be recorded.
pub const ADLEDGER_COUNTER_INCREMENT_FAILURES_TOTAL: &str =
    "adledger_counter_increment_failures_total";
