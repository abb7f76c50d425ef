use std::collections::BTreeMap;

use async_trait::async_trait;
use study_sdk::{ProblemId, ProblemType, QuotaUnit, StudyRecord, StudyType, WorkbookId};

use crate::domain::error::DomainError;
use crate::domain::model::Operator;

/// Quota ledger storage. `key` is `<problemType>_<quotaName>`.
///
/// Implementations must serialize concurrent writers on the same
/// `(user, key)` row (row lock or equivalent) for the life of the caller's
/// transaction.
#[async_trait]
pub trait UserQuotaRepository: Send + Sync {
    /// True when one more unit would pass `limit`.
    async fn is_exceeded(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
        limit: i64,
    ) -> Result<bool, DomainError>;

    /// Adds `delta` and reports whether the new usage passes `limit`.
    async fn increment(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
        limit: i64,
        delta: i64,
    ) -> Result<bool, DomainError>;

    /// Subtracts `delta`, never going below zero.
    async fn decrement(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
        limit: i64,
        delta: i64,
    ) -> Result<(), DomainError>;
}

#[async_trait]
pub trait StudyRecordRepository: Send + Sync {
    /// Stored records only; problems never answered are absent.
    async fn find_study_records(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        study_type: StudyType,
    ) -> Result<Vec<StudyRecord>, DomainError>;

    /// Overwrites `result_prev1`/`memorized`, stamps `last_answered_at` and
    /// moves `level` along the recordbook level curve.
    #[allow(clippy::too_many_arguments)]
    async fn set_result(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        study_type: StudyType,
        problem_type: ProblemType,
        problem_id: ProblemId,
        result: bool,
        memorized: bool,
    ) -> Result<StudyRecord, DomainError>;

    async fn count_memorized_problems(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<BTreeMap<StudyType, u64>, DomainError>;
}
