use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, LedgerResult};

/// Between a committed merge and the clear of its group.
pub const FLUSH_WORKER__AFTER_MERGE_COMMIT: &str = "flush_worker.after_merge_commit";

/// Before the merge transaction starts.
pub const FLUSH_WORKER__BEFORE_MERGE: &str = "flush_worker.before_merge";

/// Returns an error when the named failpoint is configured with `return`.
pub fn ledger_fail_point(name: &str) -> LedgerResult<()> {
    fail_point!(name, |_| {
        bail!(
            ErrorKind::FailpointTriggered,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
