//! Running counters across usage dimensions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ledger::record::{Outcome, UsageEvent, UsageRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

impl Counters {
    fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Failure => self.failed += 1,
        }
    }

    /// Percentage of successful records, 0 when empty.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 * 100.0 / self.total as f64
        }
    }
}

/// Totals plus per-dimension breakdowns.
///
/// Counters only grow between clears; evicting records from the buffer does
/// not reduce them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aggregates {
    pub totals: Counters,
    pub by_kind: BTreeMap<String, Counters>,
    pub by_host: BTreeMap<String, Counters>,
    pub by_model: BTreeMap<String, Counters>,
    pub by_caller: BTreeMap<String, Counters>,
}

impl Aggregates {
    pub fn record(&mut self, event: &UsageEvent) {
        self.totals.record(event.outcome);
        for (map, value) in [
            (&mut self.by_kind, &event.kind),
            (&mut self.by_host, &event.host),
            (&mut self.by_model, &event.model),
            (&mut self.by_caller, &event.caller_key),
        ] {
            match map.get_mut(value) {
                Some(counters) => counters.record(event.outcome),
                None => {
                    let mut counters = Counters::default();
                    counters.record(event.outcome);
                    map.insert(value.clone(), counters);
                }
            }
        }
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> Self {
        let mut aggregates = Self::default();
        for record in records {
            aggregates.record(&record.event);
        }
        aggregates
    }

    pub fn report(&self) -> StatsReport {
        StatsReport {
            success_rate: self.totals.success_rate(),
            aggregates: self.clone(),
        }
    }
}

/// Aggregates as returned to the admin console.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    #[serde(flatten)]
    pub aggregates: Aggregates,
    pub success_rate: f64,
}
