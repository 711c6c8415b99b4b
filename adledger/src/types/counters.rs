use std::collections::HashMap;
use std::fmt;

/// Field of a counter group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    Impression,
    Click,
}

impl CounterField {
    pub const ALL: [CounterField; 2] = [CounterField::Impression, CounterField::Click];

    /// Hash field name inside the counter group.
    pub fn field_name(&self) -> &'static str {
        match self {
            CounterField::Impression => "impression_count",
            CounterField::Click => "click_count",
        }
    }

    /// Short name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterField::Impression => "impression",
            CounterField::Click => "click",
        }
    }
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impression and click deltas of one counter group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDeltas {
    pub impressions: i64,
    pub clicks: i64,
}

impl CounterDeltas {
    pub const fn new(impressions: i64, clicks: i64) -> Self {
        Self {
            impressions,
            clicks,
        }
    }

    /// Builds deltas from raw hash fields. Missing fields count as zero and unknown
    /// fields are ignored.
    pub fn from_fields(fields: &HashMap<String, i64>) -> Self {
        let get = |field: CounterField| fields.get(field.field_name()).copied().unwrap_or(0);

        Self {
            impressions: get(CounterField::Impression),
            clicks: get(CounterField::Click),
        }
    }

    pub fn get(&self, field: CounterField) -> i64 {
        match field {
            CounterField::Impression => self.impressions,
            CounterField::Click => self.clicks,
        }
    }

    pub fn add(&mut self, field: CounterField, by: i64) {
        match field {
            CounterField::Impression => self.impressions += by,
            CounterField::Click => self.clicks += by,
        }
    }

    /// Field-wise difference, used to compute what remains after a merged snapshot.
    pub fn saturating_sub(&self, other: &CounterDeltas) -> CounterDeltas {
        CounterDeltas {
            impressions: (self.impressions - other.impressions).max(0),
            clicks: (self.clicks - other.clicks).max(0),
        }
    }

    /// Returns `true` when there is nothing to merge.
    pub fn is_empty(&self) -> bool {
        self.impressions <= 0 && self.clicks <= 0
    }
}

/// Result of retiring a merged snapshot from the counter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupClear {
    /// Nothing was left and the group no longer exists.
    Removed,
    /// Increments arrived after the snapshot. They stay for the next cycle.
    Retained(CounterDeltas),
}

/// Result of merging deltas into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The deltas were committed to the advertisement's row.
    Applied,
    /// No row exists for the advertisement, nothing was committed.
    AggregateMissing,
}
