//! Transactional usecase boundary.
//!
//! Every public operation opens one database transaction, binds the
//! repository factory to it, resolves the caller from the
//! [`SecurityContext`] and commits only when the core operation succeeds.
//! Returning early with an error drops the transaction, which rolls it
//! back.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use study_sdk::{
    AppUser, AppUserId, Audio, AudioId, NewAppUser, NewWorkbook, Organization, OrganizationId,
    Problem, ProblemId, ProblemSearchCondition, ProblemSearchResult, ProblemType,
    RecordbookSummary, SecurityContext, Space, StudyRecord, StudyType, Workbook, WorkbookId,
    WorkbookSearchCondition, WorkbookSearchResult, WorkbookUpdate,
};
use tracing::instrument;

use crate::domain::clock::Clock;
use crate::domain::error::DomainError;
use crate::domain::model::{
    ProblemSelector, StudentModel, SystemOwnerModel, SystemStudentModel, SYSTEM_STUDENT_LOGIN_ID,
};
use crate::domain::processor::{
    ProblemAddParameter, ProblemUpdateParameter, ProcessorRegistry, UpdateCounts,
};
use crate::domain::repos::UserRepositoryFactory;
use crate::domain::student::Student;
use crate::domain::system_admin::SystemAdmin;
use crate::domain::system_owner::SystemOwner;
use crate::domain::system_student::SystemStudent;
use crate::infra::storage::{db_err, SeaOrmRepositoryFactory};


/// Configuration for the domain service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl ServiceConfig {
    fn clamp_page(&self, page_no: u64, page_size: u64) -> (u64, u64) {
        let page_size = match page_size {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        };
        (page_no.max(1), page_size)
    }
}

#[derive(Clone)]
pub struct Service {
    db: DatabaseConnection,
    registry: Arc<ProcessorRegistry>,
    clock: Arc<dyn Clock>,
    config: ServiceConfig,
}

impl Service {
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        registry: Arc<ProcessorRegistry>,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            registry,
            clock,
            config,
        }
    }

    async fn begin(&self) -> Result<DatabaseTransaction, DomainError> {
        self.db.begin().await.map_err(db_err)
    }

    fn repos<'t>(
        &self,
        txn: &'t DatabaseTransaction,
    ) -> SeaOrmRepositoryFactory<'t, DatabaseTransaction> {
        SeaOrmRepositoryFactory::new(txn, Arc::clone(&self.clock))
    }

    async fn load_operator(
        repos: &dyn UserRepositoryFactory,
        ctx: &SecurityContext,
    ) -> Result<AppUser, DomainError> {
        if ctx.is_anonymous() {
            return Err(DomainError::permission_denied("operator", "authenticate"));
        }
        repos
            .app_user_repository()
            .find_by_id(ctx.organization_id(), ctx.app_user_id())
            .await
    }

    async fn resolve_student(
        repos: &dyn UserRepositoryFactory,
        ctx: &SecurityContext,
    ) -> Result<StudentModel, DomainError> {
        let user = Self::load_operator(repos, ctx).await?;
        StudentModel::new(user)
            .ok_or_else(|| DomainError::permission_denied("student", "act"))
    }

    async fn resolve_system_owner(
        repos: &dyn UserRepositoryFactory,
        ctx: &SecurityContext,
    ) -> Result<SystemOwnerModel, DomainError> {
        let user = Self::load_operator(repos, ctx).await?;
        SystemOwnerModel::new(user)
            .ok_or_else(|| DomainError::permission_denied("organization", "administer"))
    }

    async fn resolve_system_student(
        repos: &dyn UserRepositoryFactory,
        organization_id: OrganizationId,
    ) -> Result<SystemStudentModel, DomainError> {
        let user = repos
            .app_user_repository()
            .find_by_login_id(organization_id, SYSTEM_STUDENT_LOGIN_ID)
            .await?;
        SystemStudentModel::new(user)
            .ok_or_else(|| DomainError::not_found("SystemStudent", organization_id))
    }

    // Organization bootstrap

    #[instrument(skip(self, first_owner), fields(first_owner = %first_owner.login_id))]
    pub async fn add_organization(
        &self,
        name: &str,
        first_owner: NewAppUser,
    ) -> Result<OrganizationId, DomainError> {
        let txn = self.begin().await?;
        let id = {
            let repos = self.repos(&txn);
            SystemAdmin::new(&repos)
                .add_organization(name, first_owner)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn find_organization_by_name(&self, name: &str) -> Result<Organization, DomainError> {
        let txn = self.begin().await?;
        let org = {
            let repos = self.repos(&txn);
            SystemAdmin::new(&repos).find_organization_by_name(name).await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(org)
    }

    // System owner

    #[instrument(skip(self, ctx, new_user), fields(request_id = ?ctx.request_id(), login_id = %new_user.login_id))]
    pub async fn add_app_user(
        &self,
        ctx: &SecurityContext,
        new_user: NewAppUser,
    ) -> Result<AppUserId, DomainError> {
        let txn = self.begin().await?;
        let id = {
            let repos = self.repos(&txn);
            let owner = Self::resolve_system_owner(&repos, ctx).await?;
            SystemOwner::new(&repos, owner).add_app_user(new_user).await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(id)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_app_user_by_login_id(
        &self,
        ctx: &SecurityContext,
        login_id: &str,
    ) -> Result<AppUser, DomainError> {
        let txn = self.begin().await?;
        let user = {
            let repos = self.repos(&txn);
            let owner = Self::resolve_system_owner(&repos, ctx).await?;
            SystemOwner::new(&repos, owner)
                .find_app_user_by_login_id(login_id)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(user)
    }

    // System student

    #[instrument(skip(self, new_workbook), fields(name = %new_workbook.name))]
    pub async fn add_system_workbook(
        &self,
        organization_id: OrganizationId,
        new_workbook: NewWorkbook,
    ) -> Result<WorkbookId, DomainError> {
        let txn = self.begin().await?;
        let id = {
            let repos = self.repos(&txn);
            let model = Self::resolve_system_student(&repos, organization_id).await?;
            SystemStudent::new(&self.registry, &repos, &repos, model)
                .add_workbook_to_system_space(new_workbook)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn find_system_workbook(
        &self,
        organization_id: OrganizationId,
        name: &str,
    ) -> Result<Workbook, DomainError> {
        let txn = self.begin().await?;
        let workbook = {
            let repos = self.repos(&txn);
            let model = Self::resolve_system_student(&repos, organization_id).await?;
            SystemStudent::new(&self.registry, &repos, &repos, model)
                .find_workbook_from_system_space(name)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(workbook)
    }

    #[instrument(skip(self, param), fields(workbook_id = %param.workbook_id))]
    pub async fn add_system_problem(
        &self,
        organization_id: OrganizationId,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let txn = self.begin().await?;
        let ids = {
            let repos = self.repos(&txn);
            let model = Self::resolve_system_student(&repos, organization_id).await?;
            SystemStudent::new(&self.registry, &repos, &repos, model)
                .add_problem(param)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(ids)
    }

    // Student: spaces and workbooks

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_personal_space(&self, ctx: &SecurityContext) -> Result<Space, DomainError> {
        let txn = self.begin().await?;
        let space = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_personal_space()
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(space)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_workbooks(
        &self,
        ctx: &SecurityContext,
        condition: WorkbookSearchCondition,
    ) -> Result<WorkbookSearchResult, DomainError> {
        let (page_no, page_size) = self
            .config
            .clamp_page(condition.page_no, condition.page_size);
        let condition = WorkbookSearchCondition { page_no, page_size };

        let txn = self.begin().await?;
        let result = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_workbooks_from_personal_space(&condition)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(result)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_workbook_by_id(
        &self,
        ctx: &SecurityContext,
        id: WorkbookId,
    ) -> Result<Workbook, DomainError> {
        let txn = self.begin().await?;
        let workbook = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_workbook_by_id(id)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(workbook)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_workbook_by_name(
        &self,
        ctx: &SecurityContext,
        name: &str,
    ) -> Result<Workbook, DomainError> {
        let txn = self.begin().await?;
        let workbook = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_workbook_by_name(name)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(workbook)
    }

    #[instrument(skip(self, ctx, new_workbook), fields(request_id = ?ctx.request_id(), name = %new_workbook.name))]
    pub async fn add_workbook(
        &self,
        ctx: &SecurityContext,
        new_workbook: NewWorkbook,
    ) -> Result<WorkbookId, DomainError> {
        let txn = self.begin().await?;
        let id = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .add_workbook_to_personal_space(new_workbook)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(id)
    }

    #[instrument(skip(self, ctx, update), fields(request_id = ?ctx.request_id()))]
    pub async fn update_workbook(
        &self,
        ctx: &SecurityContext,
        id: WorkbookId,
        version: i32,
        update: WorkbookUpdate,
    ) -> Result<(), DomainError> {
        let txn = self.begin().await?;
        {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .update_workbook(id, version, update)
                .await?;
        }
        txn.commit().await.map_err(db_err)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn remove_workbook(
        &self,
        ctx: &SecurityContext,
        id: WorkbookId,
        version: i32,
    ) -> Result<(), DomainError> {
        let txn = self.begin().await?;
        {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .remove_workbook(id, version)
                .await?;
        }
        txn.commit().await.map_err(db_err)
    }

    // Student: problems

    #[instrument(skip(self, ctx, condition), fields(request_id = ?ctx.request_id(), workbook_id = %condition.workbook_id))]
    pub async fn find_problems(
        &self,
        ctx: &SecurityContext,
        condition: ProblemSearchCondition,
    ) -> Result<ProblemSearchResult, DomainError> {
        let (page_no, page_size) = self
            .config
            .clamp_page(condition.page_no, condition.page_size);
        let condition = ProblemSearchCondition {
            page_no,
            page_size,
            ..condition
        };

        let txn = self.begin().await?;
        let result = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_problems(&condition)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(result)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_all_problems(
        &self,
        ctx: &SecurityContext,
        workbook_id: WorkbookId,
    ) -> Result<Vec<Problem>, DomainError> {
        let txn = self.begin().await?;
        let problems = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_all_problems(workbook_id)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(problems)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_problem_by_id(
        &self,
        ctx: &SecurityContext,
        workbook_id: WorkbookId,
        problem_id: ProblemId,
    ) -> Result<Problem, DomainError> {
        let txn = self.begin().await?;
        let problem = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_problem_by_id(workbook_id, problem_id)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(problem)
    }

    #[instrument(skip(self, ctx, ids), fields(request_id = ?ctx.request_id(), count = ids.len()))]
    pub async fn find_problems_by_ids(
        &self,
        ctx: &SecurityContext,
        workbook_id: WorkbookId,
        ids: &[ProblemId],
    ) -> Result<Vec<Problem>, DomainError> {
        let txn = self.begin().await?;
        let problems = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_problems_by_ids(workbook_id, ids)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(problems)
    }

    #[instrument(skip(self, ctx, param), fields(request_id = ?ctx.request_id(), workbook_id = %param.workbook_id))]
    pub async fn add_problem(
        &self,
        ctx: &SecurityContext,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let txn = self.begin().await?;
        let ids = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .add_problem(param)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(ids)
    }

    #[instrument(skip(self, ctx, param), fields(request_id = ?ctx.request_id(), problem_id = %selector.problem_id))]
    pub async fn update_problem(
        &self,
        ctx: &SecurityContext,
        selector: ProblemSelector,
        param: &ProblemUpdateParameter,
    ) -> Result<UpdateCounts, DomainError> {
        let txn = self.begin().await?;
        let counts = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .update_problem(&selector, param)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(counts)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id(), problem_id = %selector.problem_id))]
    pub async fn remove_problem(
        &self,
        ctx: &SecurityContext,
        selector: ProblemSelector,
    ) -> Result<(), DomainError> {
        let txn = self.begin().await?;
        {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .remove_problem(&selector)
                .await?;
        }
        txn.commit().await.map_err(db_err)
    }

    /// All rows land or none do: one transaction covers the whole stream.
    #[instrument(skip(self, ctx, source), fields(request_id = ?ctx.request_id()))]
    pub async fn import_problems(
        &self,
        ctx: &SecurityContext,
        workbook_id: WorkbookId,
        source: Box<dyn Read + Send>,
    ) -> Result<usize, DomainError> {
        let txn = self.begin().await?;
        let created = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .import_problems(workbook_id, source)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(created)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_audio(&self, ctx: &SecurityContext, id: AudioId) -> Result<Audio, DomainError> {
        let txn = self.begin().await?;
        let audio = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_audio(id)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(audio)
    }

    // Student: recordbooks

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn get_study_results(
        &self,
        ctx: &SecurityContext,
        workbook_id: WorkbookId,
        study_type: StudyType,
    ) -> Result<BTreeMap<ProblemId, StudyRecord>, DomainError> {
        let txn = self.begin().await?;
        let results = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            let student = Student::new(&self.registry, &repos, &repos, model);
            student
                .find_recordbook(workbook_id, study_type)
                .await?
                .get_results()
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(results)
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn set_study_result(
        &self,
        ctx: &SecurityContext,
        workbook_id: WorkbookId,
        study_type: StudyType,
        problem_type: ProblemType,
        problem_id: ProblemId,
        result: bool,
        memorized: bool,
    ) -> Result<StudyRecord, DomainError> {
        let txn = self.begin().await?;
        let record = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            let student = Student::new(&self.registry, &repos, &repos, model);
            student
                .find_recordbook(workbook_id, study_type)
                .await?
                .set_result(problem_type, problem_id, result, memorized)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(record)
    }

    #[instrument(skip(self, ctx), fields(request_id = ?ctx.request_id()))]
    pub async fn find_recordbook_summary(
        &self,
        ctx: &SecurityContext,
        workbook_id: WorkbookId,
    ) -> Result<RecordbookSummary, DomainError> {
        let txn = self.begin().await?;
        let summary = {
            let repos = self.repos(&txn);
            let model = Self::resolve_student(&repos, ctx).await?;
            Student::new(&self.registry, &repos, &repos, model)
                .find_recordbook_summary(workbook_id)
                .await?
        };
        txn.commit().await.map_err(db_err)?;
        Ok(summary)
    }
}
