use fail::FailScenario;

/// Configures failpoints for the lifetime of the returned value.
///
/// Every configured failpoint is switched off again on drop, so a failing assertion does
/// not leak its failpoints into the next test.
pub struct FailpointGuard<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> FailpointGuard<'a> {
    /// Applies each `(failpoint, action)` pair, e.g. `("flush_worker.before_merge", "return")`.
    ///
    /// # Panics
    ///
    /// Panics if an action cannot be parsed.
    pub fn setup(failpoints: &[(&str, &str)]) -> FailpointGuard<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            if let Err(err) = fail::cfg(*failpoint, action) {
                panic!("invalid action '{action}' for failpoint '{failpoint}': {err}");
            }
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }

    /// Switches a single failpoint off before the guard is dropped.
    pub fn disable(&self, failpoint: &str) {
        fail::remove(failpoint);
    }
}

impl Drop for FailpointGuard<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            fail::remove(failpoint);
        }
    }
}
