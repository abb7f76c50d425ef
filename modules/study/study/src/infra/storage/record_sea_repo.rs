use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Set,
};
use study_sdk::{ProblemId, ProblemType, QuotaUnit, StudyRecord, StudyType, WorkbookId};
use uuid::Uuid;

use crate::domain::clock::Clock;
use crate::domain::error::DomainError;
use crate::domain::model::Operator;
use crate::domain::quota::QuotaCounter;
use crate::domain::recordbook::next_level;
use crate::domain::repos::{StudyRecordRepository, UserQuotaRepository};

use super::db_err;
use super::entity::{study_record, user_quota};

/// Quota counters, one row per `(user, key)`.
///
/// Rows are upserted, then read `FOR UPDATE`, so concurrent transactions on
/// the same key serialize behind the first writer. SQLite ignores the
/// clause and relies on its database-level write lock instead.
pub struct SeaOrmUserQuotaRepository<'a, C> {
    conn: &'a C,
    clock: Arc<dyn Clock>,
}

impl<'a, C> SeaOrmUserQuotaRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }
}

impl<C: ConnectionTrait + Send + Sync> SeaOrmUserQuotaRepository<'_, C> {
    /// Creates the zero row on first use, then reads it `FOR UPDATE`.
    ///
    /// The upsert makes a concurrent first use wait on the unique index
    /// instead of failing the second insert.
    async fn lock_row(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
    ) -> Result<user_quota::Model, DomainError> {
        user_quota::Entity::insert(user_quota::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(operator.organization_id()),
            app_user_id: Set(operator.app_user_id()),
            quota_key: Set(key.to_owned()),
            unit: Set(unit.as_str().to_owned()),
            count: Set(0),
            date: Set(self.clock.today()),
        })
        .on_conflict(
            OnConflict::columns([user_quota::Column::AppUserId, user_quota::Column::QuotaKey])
                .update_column(user_quota::Column::QuotaKey)
                .to_owned(),
        )
        .exec_without_returning(self.conn)
        .await
        .map_err(db_err)?;

        user_quota::Entity::find()
            .filter(user_quota::Column::AppUserId.eq(operator.app_user_id()))
            .filter(user_quota::Column::QuotaKey.eq(key))
            .lock_exclusive()
            .one(self.conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| {
                DomainError::database(format!("quota row '{key}' missing after upsert"))
            })
    }

    /// Applies `delta` and returns the stored count.
    async fn apply(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
        delta: i64,
    ) -> Result<i64, DomainError> {
        let today = self.clock.today();
        let row = self.lock_row(operator, key, unit).await?;
        let next = QuotaCounter {
            count: row.count,
            date: row.date,
        }
        .apply(unit, delta, today);

        let mut active: user_quota::ActiveModel = row.into();
        active.unit = Set(unit.as_str().to_owned());
        active.count = Set(next.count);
        active.date = Set(next.date);
        active.update(self.conn).await.map_err(db_err)?;
        Ok(next.count)
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> UserQuotaRepository
    for SeaOrmUserQuotaRepository<'a, C>
{
    async fn is_exceeded(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
        limit: i64,
    ) -> Result<bool, DomainError> {
        let row = self.lock_row(operator, key, unit).await?;
        let counter = QuotaCounter {
            count: row.count,
            date: row.date,
        };
        Ok(counter.is_exceeded(unit, limit, self.clock.today()))
    }

    async fn increment(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
        limit: i64,
        delta: i64,
    ) -> Result<bool, DomainError> {
        let count = self.apply(operator, key, unit, delta).await?;
        tracing::debug!(quota = key, count, limit, "quota usage incremented");
        Ok(count > limit)
    }

    async fn decrement(
        &self,
        operator: &dyn Operator,
        key: &str,
        unit: QuotaUnit,
        _limit: i64,
        delta: i64,
    ) -> Result<(), DomainError> {
        let count = self.apply(operator, key, unit, -delta).await?;
        tracing::debug!(quota = key, count, "quota usage decremented");
        Ok(())
    }
}

pub struct SeaOrmStudyRecordRepository<'a, C> {
    conn: &'a C,
    clock: Arc<dyn Clock>,
}

impl<'a, C> SeaOrmStudyRecordRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> StudyRecordRepository
    for SeaOrmStudyRecordRepository<'a, C>
{
    async fn find_study_records(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        study_type: StudyType,
    ) -> Result<Vec<StudyRecord>, DomainError> {
        Ok(study_record::Entity::find()
            .filter(study_record::Column::AppUserId.eq(operator.app_user_id()))
            .filter(study_record::Column::WorkbookId.eq(workbook_id))
            .filter(study_record::Column::StudyType.eq(study_type.as_str()))
            .all(self.conn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    async fn set_result(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        study_type: StudyType,
        problem_type: ProblemType,
        problem_id: ProblemId,
        result: bool,
        memorized: bool,
    ) -> Result<StudyRecord, DomainError> {
        let now = self.clock.now();
        let existing = study_record::Entity::find()
            .filter(study_record::Column::AppUserId.eq(operator.app_user_id()))
            .filter(study_record::Column::WorkbookId.eq(workbook_id))
            .filter(study_record::Column::ProblemId.eq(problem_id))
            .filter(study_record::Column::StudyType.eq(study_type.as_str()))
            .one(self.conn)
            .await
            .map_err(db_err)?;

        let saved = match existing {
            Some(row) => {
                let level = next_level(&StudyRecord::from(row.clone()), result, memorized);
                let mut active: study_record::ActiveModel = row.into();
                active.level = Set(level);
                active.result_prev1 = Set(result);
                active.memorized = Set(memorized);
                active.last_answered_at = Set(Some(now));
                active.update(self.conn).await.map_err(db_err)?
            }
            None => {
                let level = next_level(&StudyRecord::unanswered(problem_id), result, memorized);
                study_record::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    organization_id: Set(operator.organization_id()),
                    app_user_id: Set(operator.app_user_id()),
                    workbook_id: Set(workbook_id),
                    problem_type: Set(problem_type.as_str().to_owned()),
                    problem_id: Set(problem_id),
                    study_type: Set(study_type.as_str().to_owned()),
                    level: Set(level),
                    result_prev1: Set(result),
                    memorized: Set(memorized),
                    last_answered_at: Set(Some(now)),
                }
                .insert(self.conn)
                .await
                .map_err(db_err)?
            }
        };
        Ok(saved.into())
    }

    async fn count_memorized_problems(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<BTreeMap<StudyType, u64>, DomainError> {
        let study_types: Vec<String> = study_record::Entity::find()
            .select_only()
            .column(study_record::Column::StudyType)
            .filter(study_record::Column::AppUserId.eq(operator.app_user_id()))
            .filter(study_record::Column::WorkbookId.eq(workbook_id))
            .filter(study_record::Column::Memorized.eq(true))
            .into_tuple()
            .all(self.conn)
            .await
            .map_err(db_err)?;

        let mut counts = BTreeMap::new();
        for raw in study_types {
            match raw.parse::<StudyType>() {
                Ok(study_type) => *counts.entry(study_type).or_insert(0) += 1,
                Err(e) => tracing::warn!(error = %e, "ignoring study record with unknown type"),
            }
        }
        Ok(counts)
    }
}
