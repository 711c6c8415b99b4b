//! Layout of counter group keys in the counter store.

use crate::{bail, ledger_error};
use crate::error::{ErrorKind, LedgerResult};
use crate::types::AdvertisementId;

/// Suffix shared by every counter group key.
const GROUP_KEY_SUFFIX: &str = "counts";

/// Maps advertisements to counter group keys of the form `<namespace>:<id>:counts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterKeyspace {
    namespace: String,
}

impl CounterKeyspace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the key of the counter group of `advertisement_id`.
    pub fn group_key(&self, advertisement_id: AdvertisementId) -> String {
        format!("{}:{advertisement_id}:{GROUP_KEY_SUFFIX}", self.namespace)
    }

    /// Returns the glob pattern matching every counter group of this namespace.
    pub fn pattern(&self) -> String {
        format!("{}:*:{GROUP_KEY_SUFFIX}", self.namespace)
    }

    /// Extracts the advertisement id from a counter group key.
    pub fn parse(&self, key: &str) -> LedgerResult<AdvertisementId> {
        let id = key
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix(':'))
            .and_then(|rest| rest.strip_suffix(GROUP_KEY_SUFFIX))
            .and_then(|rest| rest.strip_suffix(':'));

        let Some(id) = id else {
            bail!(
                ErrorKind::InvalidCounterKey,
                "Counter key does not belong to the namespace",
                format!("key '{key}' does not match '{}'", self.pattern())
            );
        };

        match id.parse() {
            Ok(id) => Ok(id),
            Err(err) => Err(ledger_error!(
                ErrorKind::InvalidCounterKey,
                "Counter key holds an invalid advertisement id",
                format!("key '{key}'"),
                source: err
            )),
        }
    }
}

impl Default for CounterKeyspace {
    fn default() -> Self {
        Self::new("advertisement")
    }
}
