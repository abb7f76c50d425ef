use async_trait::async_trait;
use study_sdk::{
    Audio, AudioId, Lang2, NewWorkbook, Problem, ProblemId, ProblemSearchCondition,
    ProblemSearchResult, SpaceId, Workbook, WorkbookId, WorkbookSearchCondition,
    WorkbookSearchResult, WorkbookUpdate,
};

use crate::domain::error::DomainError;
use crate::domain::model::{NewProblem, Operator, ProblemSelector, PropertyCondition};

/// Workbooks come back with the privileges `operator` holds on them, so
/// authorization is decided where the data is loaded.
#[async_trait]
pub trait WorkbookRepository: Send + Sync {
    /// Workbooks of `space_id` readable by `operator`, ordered by name.
    async fn find_workbooks(
        &self,
        operator: &dyn Operator,
        space_id: SpaceId,
        condition: &WorkbookSearchCondition,
    ) -> Result<WorkbookSearchResult, DomainError>;

    /// Fails with `NotFound` when absent and `PermissionDenied` when the
    /// operator may not read it.
    async fn find_by_id(
        &self,
        operator: &dyn Operator,
        id: WorkbookId,
    ) -> Result<Workbook, DomainError>;

    async fn find_by_name(
        &self,
        operator: &dyn Operator,
        space_id: SpaceId,
        name: &str,
    ) -> Result<Workbook, DomainError>;

    /// Requires `write` on the space.
    async fn add(
        &self,
        operator: &dyn Operator,
        space_id: SpaceId,
        new_workbook: NewWorkbook,
    ) -> Result<WorkbookId, DomainError>;

    /// Compare-and-swap on `version`; a mismatch is a `VersionConflict`
    /// and leaves the row untouched.
    async fn update(
        &self,
        operator: &dyn Operator,
        id: WorkbookId,
        version: i32,
        update: WorkbookUpdate,
    ) -> Result<(), DomainError>;

    async fn remove(
        &self,
        operator: &dyn Operator,
        id: WorkbookId,
        version: i32,
    ) -> Result<(), DomainError>;
}

/// Problem storage bound to one content type.
#[async_trait]
pub trait ProblemRepository: Send + Sync {
    async fn find_problems(
        &self,
        operator: &dyn Operator,
        condition: &ProblemSearchCondition,
    ) -> Result<ProblemSearchResult, DomainError>;

    async fn find_all_problems(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<Vec<Problem>, DomainError>;

    async fn find_by_ids(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        ids: &[ProblemId],
    ) -> Result<Vec<Problem>, DomainError>;

    async fn find_by_id(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        id: ProblemId,
    ) -> Result<Problem, DomainError>;

    async fn find_problem_ids(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<Vec<ProblemId>, DomainError>;

    async fn find_problems_by_custom_condition(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        condition: &PropertyCondition,
    ) -> Result<Vec<Problem>, DomainError>;

    async fn count_problems(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<u64, DomainError>;

    async fn add_problem(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        problem: NewProblem,
    ) -> Result<ProblemId, DomainError>;

    /// Compare-and-swap on `selector.version`.
    async fn update_problem(
        &self,
        operator: &dyn Operator,
        selector: &ProblemSelector,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), DomainError>;

    /// Compare-and-swap on `selector.version`.
    async fn remove_problem(
        &self,
        operator: &dyn Operator,
        selector: &ProblemSelector,
    ) -> Result<(), DomainError>;
}

#[async_trait]
pub trait AudioRepository: Send + Sync {
    async fn add_audio(&self, audio: &Audio) -> Result<AudioId, DomainError>;

    async fn find_audio_by_id(&self, id: AudioId) -> Result<Audio, DomainError>;

    async fn find_audio_id_by_text(
        &self,
        lang2: Lang2,
        text: &str,
    ) -> Result<Option<AudioId>, DomainError>;
}
