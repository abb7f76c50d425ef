//! The authenticated-operator view over workbooks, problems, quotas and
//! recordbooks.

use std::io::Read;

use study_sdk::{
    Audio, AudioId, NewWorkbook, Problem, ProblemId, ProblemSearchCondition, ProblemSearchResult,
    ProblemType, QuotaName, RecordbookSummary, Space, StudyType, Workbook, WorkbookId,
    WorkbookPrivilege, WorkbookSearchCondition, WorkbookSearchResult, WorkbookUpdate,
};

use super::error::DomainError;
use super::model::{Operator, ProblemSelector, StudentModel};
use super::processor::{
    ProblemAddParameter, ProblemUpdateParameter, ProcessorRegistry, UpdateCounts,
};
use super::quota::quota_key;
use super::recordbook::{self, Recordbook};
use super::repos::{RepositoryFactory, UserRepositoryFactory};
use super::space;

/// Composes space lookup, workbook access, the quota ledger and the
/// processor registry for one student inside one transaction.
pub struct Student<'a> {
    model: StudentModel,
    registry: &'a ProcessorRegistry,
    repos: &'a dyn RepositoryFactory,
    user_repos: &'a dyn UserRepositoryFactory,
}

impl<'a> Student<'a> {
    #[must_use]
    pub fn new(
        registry: &'a ProcessorRegistry,
        repos: &'a dyn RepositoryFactory,
        user_repos: &'a dyn UserRepositoryFactory,
        model: StudentModel,
    ) -> Self {
        Self {
            model,
            registry,
            repos,
            user_repos,
        }
    }

    #[must_use]
    pub fn model(&self) -> &StudentModel {
        &self.model
    }

    pub async fn find_default_space(&self) -> Result<Space, DomainError> {
        space::find_default_space(self.user_repos, self.model.organization_id()).await
    }

    pub async fn find_personal_space(&self) -> Result<Space, DomainError> {
        space::find_personal_space(
            self.user_repos,
            self.model.organization_id(),
            self.model.app_user_id(),
        )
        .await
    }

    pub async fn find_system_space(&self) -> Result<Space, DomainError> {
        space::find_system_space(self.user_repos, self.model.organization_id()).await
    }

    // Workbooks

    pub async fn find_workbooks_from_personal_space(
        &self,
        condition: &WorkbookSearchCondition,
    ) -> Result<WorkbookSearchResult, DomainError> {
        let space = self.find_personal_space().await?;
        self.repos
            .workbook_repository()
            .find_workbooks(&self.model, space.id, condition)
            .await
    }

    pub async fn find_workbook_by_id(&self, id: WorkbookId) -> Result<Workbook, DomainError> {
        self.repos
            .workbook_repository()
            .find_by_id(&self.model, id)
            .await
    }

    /// Looks the name up in the student's personal space.
    pub async fn find_workbook_by_name(&self, name: &str) -> Result<Workbook, DomainError> {
        let space = self.find_personal_space().await?;
        self.repos
            .workbook_repository()
            .find_by_name(&self.model, space.id, name)
            .await
    }

    pub async fn add_workbook_to_personal_space(
        &self,
        new_workbook: NewWorkbook,
    ) -> Result<WorkbookId, DomainError> {
        self.registry.ensure_registered(new_workbook.problem_type)?;
        validate_workbook_name(&new_workbook.name)?;
        let space = self.find_personal_space().await?;
        let id = self
            .repos
            .workbook_repository()
            .add(&self.model, space.id, new_workbook)
            .await?;
        tracing::info!(workbook_id = %id, space_id = %space.id, "workbook added");
        Ok(id)
    }

    pub async fn update_workbook(
        &self,
        id: WorkbookId,
        version: i32,
        update: WorkbookUpdate,
    ) -> Result<(), DomainError> {
        validate_workbook_name(&update.name)?;
        let workbook = self.find_workbook_by_id(id).await?;
        require(&workbook, WorkbookPrivilege::Update)?;
        self.repos
            .workbook_repository()
            .update(&self.model, workbook.id, version, update)
            .await
    }

    /// Deleting the workbook deletes its problems, so their `size` usage
    /// is released too.
    pub async fn remove_workbook(&self, id: WorkbookId, version: i32) -> Result<(), DomainError> {
        let workbook = self.find_workbook_by_id(id).await?;
        require(&workbook, WorkbookPrivilege::Remove)?;
        let problems = self
            .repos
            .problem_repository(workbook.problem_type)
            .count_problems(&self.model, workbook.id)
            .await?;

        self.repos
            .workbook_repository()
            .remove(&self.model, workbook.id, version)
            .await?;
        if problems > 0 {
            self.decrement_quota_usage(workbook.problem_type, QuotaName::Size, count(problems))
                .await?;
        }
        tracing::info!(workbook_id = %workbook.id, problems, "workbook removed");
        Ok(())
    }

    // Quota ledger

    /// Fails with `QuotaExceeded` when one more unit would pass the limit.
    pub async fn check_quota(
        &self,
        problem_type: ProblemType,
        name: QuotaName,
    ) -> Result<(), DomainError> {
        let (unit, limit) = self
            .registry
            .quota_processor(problem_type)?
            .quota_policy()
            .for_name(name);
        let key = quota_key(problem_type, name);
        if self
            .repos
            .user_quota_repository()
            .is_exceeded(&self.model, &key, unit, limit)
            .await?
        {
            tracing::info!(quota = %key, limit, "quota check rejected");
            return Err(DomainError::quota_exceeded(key));
        }
        Ok(())
    }

    /// Records `delta` units of usage. Passing the limit fails the
    /// operation, which rolls the caller's transaction back.
    pub async fn increment_quota_usage(
        &self,
        problem_type: ProblemType,
        name: QuotaName,
        delta: i64,
    ) -> Result<(), DomainError> {
        let (unit, limit) = self
            .registry
            .quota_processor(problem_type)?
            .quota_policy()
            .for_name(name);
        let key = quota_key(problem_type, name);
        if self
            .repos
            .user_quota_repository()
            .increment(&self.model, &key, unit, limit, delta)
            .await?
        {
            tracing::info!(quota = %key, limit, delta, "quota exceeded after mutation");
            return Err(DomainError::quota_exceeded(key));
        }
        Ok(())
    }

    pub async fn decrement_quota_usage(
        &self,
        problem_type: ProblemType,
        name: QuotaName,
        delta: i64,
    ) -> Result<(), DomainError> {
        let (unit, limit) = self
            .registry
            .quota_processor(problem_type)?
            .quota_policy()
            .for_name(name);
        let key = quota_key(problem_type, name);
        self.repos
            .user_quota_repository()
            .decrement(&self.model, &key, unit, limit, delta)
            .await
    }

    async fn check_mutation_quotas(&self, problem_type: ProblemType) -> Result<(), DomainError> {
        self.check_quota(problem_type, QuotaName::Size).await?;
        self.check_quota(problem_type, QuotaName::Update).await
    }

    // Problems

    pub async fn find_problems(
        &self,
        condition: &ProblemSearchCondition,
    ) -> Result<ProblemSearchResult, DomainError> {
        let workbook = self.find_workbook_by_id(condition.workbook_id).await?;
        self.repos
            .problem_repository(workbook.problem_type)
            .find_problems(&self.model, condition)
            .await
    }

    pub async fn find_all_problems(
        &self,
        workbook_id: WorkbookId,
    ) -> Result<Vec<Problem>, DomainError> {
        let workbook = self.find_workbook_by_id(workbook_id).await?;
        self.repos
            .problem_repository(workbook.problem_type)
            .find_all_problems(&self.model, workbook.id)
            .await
    }

    pub async fn find_problem_by_id(
        &self,
        workbook_id: WorkbookId,
        problem_id: ProblemId,
    ) -> Result<Problem, DomainError> {
        let workbook = self.find_workbook_by_id(workbook_id).await?;
        self.repos
            .problem_repository(workbook.problem_type)
            .find_by_id(&self.model, workbook.id, problem_id)
            .await
    }

    pub async fn find_problems_by_ids(
        &self,
        workbook_id: WorkbookId,
        ids: &[ProblemId],
    ) -> Result<Vec<Problem>, DomainError> {
        let workbook = self.find_workbook_by_id(workbook_id).await?;
        self.repos
            .problem_repository(workbook.problem_type)
            .find_by_ids(&self.model, workbook.id, ids)
            .await
    }

    pub async fn find_problem_ids(
        &self,
        workbook_id: WorkbookId,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let workbook = self.find_workbook_by_id(workbook_id).await?;
        self.repos
            .problem_repository(workbook.problem_type)
            .find_problem_ids(&self.model, workbook.id)
            .await
    }

    /// Checks `size` and `update`, runs the add processor, then meters the
    /// ids it actually created.
    pub async fn add_problem(
        &self,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let workbook = self.find_workbook_by_id(param.workbook_id).await?;
        require(&workbook, WorkbookPrivilege::Update)?;
        self.add_problem_to(&workbook, param).await
    }

    async fn add_problem_to(
        &self,
        workbook: &Workbook,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let problem_type = workbook.problem_type;
        let processor = self.registry.add_processor(problem_type)?;

        self.check_mutation_quotas(problem_type).await?;
        let ids = processor
            .add_problem(self.repos, &self.model, workbook, param)
            .await?;

        let added = count(ids.len());
        self.increment_quota_usage(problem_type, QuotaName::Size, added)
            .await?;
        self.increment_quota_usage(problem_type, QuotaName::Update, added)
            .await?;
        tracing::debug!(workbook_id = %workbook.id, added, "problems added");
        Ok(ids)
    }

    /// Same ordering as [`Self::add_problem`]. Created and rewritten rows
    /// both count against `update`; a negative `added` count releases
    /// `size` usage.
    pub async fn update_problem(
        &self,
        selector: &ProblemSelector,
        param: &ProblemUpdateParameter,
    ) -> Result<UpdateCounts, DomainError> {
        let workbook = self.find_workbook_by_id(selector.workbook_id).await?;
        require(&workbook, WorkbookPrivilege::Update)?;
        let problem_type = workbook.problem_type;
        let processor = self.registry.update_processor(problem_type)?;

        self.check_mutation_quotas(problem_type).await?;
        let counts = processor
            .update_problem(self.repos, &self.model, &workbook, selector, param)
            .await?;

        if counts.added > 0 {
            self.increment_quota_usage(problem_type, QuotaName::Size, counts.added)
                .await?;
        } else if counts.added < 0 {
            self.decrement_quota_usage(problem_type, QuotaName::Size, -counts.added)
                .await?;
        }
        let touched = counts.added.max(0) + counts.updated;
        if touched > 0 {
            self.increment_quota_usage(problem_type, QuotaName::Update, touched)
                .await?;
        }
        tracing::debug!(
            workbook_id = %workbook.id,
            problem_id = %selector.problem_id,
            added = counts.added,
            updated = counts.updated,
            "problem updated"
        );
        Ok(counts)
    }

    /// Releases one unit of `size`; `update` usage is untouched.
    pub async fn remove_problem(&self, selector: &ProblemSelector) -> Result<(), DomainError> {
        let workbook = self.find_workbook_by_id(selector.workbook_id).await?;
        require(&workbook, WorkbookPrivilege::Update)?;
        let problem_type = workbook.problem_type;
        let processor = self.registry.remove_processor(problem_type)?;

        processor
            .remove_problem(self.repos, &self.model, selector)
            .await?;
        self.decrement_quota_usage(problem_type, QuotaName::Size, 1)
            .await?;
        tracing::debug!(
            workbook_id = %workbook.id,
            problem_id = %selector.problem_id,
            "problem removed"
        );
        Ok(())
    }

    /// Adds every row of `source`, metering each row like
    /// [`Self::add_problem`]. Returns the number of problems created.
    pub async fn import_problems(
        &self,
        workbook_id: WorkbookId,
        source: Box<dyn Read + Send>,
    ) -> Result<usize, DomainError> {
        let workbook = self.find_workbook_by_id(workbook_id).await?;
        require(&workbook, WorkbookPrivilege::Update)?;
        let rows = self
            .registry
            .import_processor(workbook.problem_type)?
            .create_reader(workbook.id, source)?;

        let mut created = 0;
        for row in rows {
            let param = row?;
            created += self.add_problem_to(&workbook, &param).await?.len();
        }
        tracing::info!(%workbook_id, created, "problems imported");
        Ok(created)
    }

    pub async fn find_audio(&self, id: AudioId) -> Result<Audio, DomainError> {
        self.repos.audio_repository().find_audio_by_id(id).await
    }

    // Recordbooks

    pub async fn find_recordbook(
        &self,
        workbook_id: WorkbookId,
        study_type: StudyType,
    ) -> Result<Recordbook<'_>, DomainError> {
        let workbook = self.find_workbook_by_id(workbook_id).await?;
        Ok(Recordbook::new(&self.model, self.repos, workbook, study_type))
    }

    pub async fn find_recordbook_summary(
        &self,
        workbook_id: WorkbookId,
    ) -> Result<RecordbookSummary, DomainError> {
        let workbook = self.find_workbook_by_id(workbook_id).await?;
        recordbook::summarize(&self.model, self.repos, &workbook).await
    }
}

fn require(workbook: &Workbook, privilege: WorkbookPrivilege) -> Result<(), DomainError> {
    if workbook.has_privilege(privilege) {
        Ok(())
    } else {
        Err(DomainError::permission_denied(
            format!("workbook_{}", workbook.id),
            privilege.as_str(),
        ))
    }
}

pub(crate) fn validate_workbook_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("name", "must not be blank"));
    }
    if name.chars().count() > 40 {
        return Err(DomainError::validation("name", "must be at most 40 characters"));
    }
    Ok(())
}

fn count<N: TryInto<i64>>(n: N) -> i64 {
    n.try_into().unwrap_or(i64::MAX)
}
