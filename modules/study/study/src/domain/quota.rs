//! Quota ledger arithmetic.
//!
//! Storage lives behind [`UserQuotaRepository`](super::repos::UserQuotaRepository);
//! this module owns the key format and the counter rules so every backend
//! applies them identically.

use chrono::NaiveDate;
use study_sdk::{ProblemType, QuotaName, QuotaUnit};

/// Usage a pre-mutation check assumes the operation will add.
pub const PENDING_DELTA: i64 = 1;

/// `<problemType>_<quotaName>`, e.g. `english_word_size`.
#[must_use]
pub fn quota_key(problem_type: ProblemType, name: QuotaName) -> String {
    format!("{}_{}", problem_type.as_str(), name.as_str())
}

/// Counter as stored: a running count and the date it was last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCounter {
    pub count: i64,
    pub date: NaiveDate,
}

impl QuotaCounter {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            count: 0,
            date: today,
        }
    }

    /// Count visible on `today`. A `Day` counter written on another date
    /// reads as zero.
    #[must_use]
    pub fn current(&self, unit: QuotaUnit, today: NaiveDate) -> i64 {
        match unit {
            QuotaUnit::Persistent => self.count,
            QuotaUnit::Day if self.date == today => self.count,
            QuotaUnit::Day => 0,
        }
    }

    #[must_use]
    pub fn is_exceeded(&self, unit: QuotaUnit, limit: i64, today: NaiveDate) -> bool {
        self.current(unit, today) + PENDING_DELTA > limit
    }

    /// Applies `delta` (which may be negative) on `today`, never dropping
    /// below zero.
    #[must_use]
    pub fn apply(&self, unit: QuotaUnit, delta: i64, today: NaiveDate) -> Self {
        let count = self.current(unit, today).saturating_add(delta).max(0);
        Self { count, date: today }
    }
}
