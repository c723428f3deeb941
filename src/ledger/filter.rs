//! Conjunctive record filters.

use serde::{Deserialize, Serialize};

use crate::ledger::record::{Outcome, UsageRecord};

/// All set fields must match; time bounds are inclusive epoch milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageFilter {
    pub kind: Option<String>,
    pub host: Option<String>,
    pub caller_key: Option<String>,
    pub outcome: Option<Outcome>,
    pub since_ms: Option<u64>,
    pub until_ms: Option<u64>,
}

impl UsageFilter {
    /// Records no older than `range_secs` before `now_ms`.
    pub fn within(range_secs: u64, now_ms: u64) -> Self {
        Self {
            since_ms: Some(now_ms.saturating_sub(range_secs.saturating_mul(1000))),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, record: &UsageRecord) -> bool {
        let event = &record.event;
        let eq = |want: &Option<String>, have: &str| want.as_deref().is_none_or(|w| w == have);

        eq(&self.kind, &event.kind)
            && eq(&self.host, &event.host)
            && eq(&self.caller_key, &event.caller_key)
            && self.outcome.is_none_or(|o| o == event.outcome)
            && self.since_ms.is_none_or(|t| record.timestamp_ms >= t)
            && self.until_ms.is_none_or(|t| record.timestamp_ms <= t)
    }
}
