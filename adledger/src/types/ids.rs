use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, LedgerError};

/// Identifier of an advertisement, shared by its counter group and its ledger row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AdvertisementId(i64);

impl AdvertisementId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AdvertisementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AdvertisementId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Parses a positive decimal id, as found in counter keys and request paths.
impl FromStr for AdvertisementId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_positive_id(s)?))
    }
}

/// Identifier of an advertiser.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct AdvertiserId(i64);

impl AdvertiserId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn into_inner(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AdvertiserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AdvertiserId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(parse_positive_id(s)?))
    }
}

fn parse_positive_id(s: &str) -> Result<i64, LedgerError> {
    let id: i64 = s.parse()?;
    if id <= 0 {
        bail!(
            ErrorKind::InvalidData,
            "Identifier must be positive",
            format!("got {id}")
        );
    }

    Ok(id)
}

/// Identifier of one flush cycle, attached to its logs and report.
///
/// Not persisted anywhere, so it cannot be used to deduplicate merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
