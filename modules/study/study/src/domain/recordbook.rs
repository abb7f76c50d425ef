//! Per workbook, per study type mastery tracking.

use std::collections::BTreeMap;

use study_sdk::{
    ProblemId, ProblemType, RecordbookSummary, StudyRecord, StudyType, Workbook, WorkbookPrivilege,
};

use super::error::DomainError;
use super::model::StudentModel;
use super::repos::RepositoryFactory;

/// Level after answering a problem whose previous state is `prev`.
///
/// Incorrect resets to the minimum, memorized jumps to the maximum, a
/// correct answer climbs by one, or by two when the previous answer was
/// also correct.
#[must_use]
pub fn next_level(prev: &StudyRecord, result: bool, memorized: bool) -> i32 {
    let level = if !result {
        StudyRecord::MIN_LEVEL
    } else if memorized {
        StudyRecord::MAX_LEVEL
    } else if prev.result_prev1 {
        prev.level + 2
    } else {
        prev.level + 1
    };
    level.clamp(StudyRecord::MIN_LEVEL, StudyRecord::MAX_LEVEL)
}

/// `floor(memorized * 100 / total)`, zero for an empty workbook.
#[must_use]
pub fn completion_rate(memorized: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let rate = memorized.min(total) * 100 / total;
    u32::try_from(rate).unwrap_or(100)
}

/// One workbook studied one way by one student.
pub struct Recordbook<'a> {
    student: &'a StudentModel,
    repos: &'a dyn RepositoryFactory,
    workbook: Workbook,
    study_type: StudyType,
}

impl<'a> Recordbook<'a> {
    pub(crate) fn new(
        student: &'a StudentModel,
        repos: &'a dyn RepositoryFactory,
        workbook: Workbook,
        study_type: StudyType,
    ) -> Self {
        Self {
            student,
            repos,
            workbook,
            study_type,
        }
    }

    #[must_use]
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    #[must_use]
    pub fn study_type(&self) -> StudyType {
        self.study_type
    }

    /// One entry per problem in the workbook; problems never answered get
    /// an unanswered record.
    pub async fn get_results(&self) -> Result<BTreeMap<ProblemId, StudyRecord>, DomainError> {
        let problem_ids = self
            .repos
            .problem_repository(self.workbook.problem_type)
            .find_problem_ids(self.student, self.workbook.id)
            .await?;
        let mut stored: BTreeMap<ProblemId, StudyRecord> = self
            .repos
            .study_record_repository()
            .find_study_records(self.student, self.workbook.id, self.study_type)
            .await?
            .into_iter()
            .map(|record| (record.problem_id, record))
            .collect();

        Ok(problem_ids
            .into_iter()
            .map(|id| {
                let record = stored
                    .remove(&id)
                    .unwrap_or_else(|| StudyRecord::unanswered(id));
                (id, record)
            })
            .collect())
    }

    pub async fn set_result(
        &self,
        problem_type: ProblemType,
        problem_id: ProblemId,
        result: bool,
        memorized: bool,
    ) -> Result<StudyRecord, DomainError> {
        if problem_type != self.workbook.problem_type {
            return Err(DomainError::validation(
                "problem_type",
                format!(
                    "workbook holds '{}' problems, not '{problem_type}'",
                    self.workbook.problem_type
                ),
            ));
        }
        if !self.workbook.has_privilege(WorkbookPrivilege::Read) {
            return Err(DomainError::permission_denied(
                self.workbook.id.to_string(),
                WorkbookPrivilege::Read.as_str(),
            ));
        }
        // The problem must live in this workbook.
        self.repos
            .problem_repository(problem_type)
            .find_by_id(self.student, self.workbook.id, problem_id)
            .await?;

        let record = self
            .repos
            .study_record_repository()
            .set_result(
                self.student,
                self.workbook.id,
                self.study_type,
                problem_type,
                problem_id,
                result,
                memorized,
            )
            .await?;
        tracing::debug!(
            workbook_id = %self.workbook.id,
            %problem_id,
            study_type = %self.study_type,
            level = record.level,
            "study result recorded"
        );
        Ok(record)
    }
}

/// Completion rate of every study type for `workbook`.
pub async fn summarize(
    student: &StudentModel,
    repos: &dyn RepositoryFactory,
    workbook: &Workbook,
) -> Result<RecordbookSummary, DomainError> {
    let total = repos
        .problem_repository(workbook.problem_type)
        .count_problems(student, workbook.id)
        .await?;
    let memorized = repos
        .study_record_repository()
        .count_memorized_problems(student, workbook.id)
        .await?;

    let completion_rates = StudyType::ALL
        .iter()
        .map(|study_type| {
            let count = memorized.get(study_type).copied().unwrap_or(0);
            (*study_type, completion_rate(count, total))
        })
        .collect();

    Ok(RecordbookSummary {
        workbook_id: workbook.id,
        completion_rates,
    })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn record(level: i32, result_prev1: bool) -> StudyRecord {
        StudyRecord {
            level,
            result_prev1,
            ..StudyRecord::unanswered(Uuid::nil())
        }
    }

    #[test]
    fn incorrect_resets_and_memorized_maxes() {
        assert_eq!(next_level(&record(7, true), false, false), 0);
        assert_eq!(next_level(&record(2, false), true, true), 10);
    }

    #[test]
    fn consecutive_correct_answers_climb_faster() {
        assert_eq!(next_level(&record(0, false), true, false), 1);
        assert_eq!(next_level(&record(1, true), true, false), 3);
    }

    #[test]
    fn level_stays_in_bounds() {
        assert_eq!(next_level(&record(9, true), true, false), 10);
        assert_eq!(next_level(&record(10, true), true, false), 10);
        for level in 0..=10 {
            for prev in [false, true] {
                for (result, memorized) in [(false, false), (true, false), (true, true)] {
                    let next = next_level(&record(level, prev), result, memorized);
                    assert!((0..=10).contains(&next));
                }
            }
        }
    }

    #[test]
    fn completion_rate_floors_and_handles_empty_workbooks() {
        assert_eq!(completion_rate(0, 0), 0);
        assert_eq!(completion_rate(1, 3), 33);
        assert_eq!(completion_rate(2, 3), 66);
        assert_eq!(completion_rate(3, 3), 100);
    }
}
