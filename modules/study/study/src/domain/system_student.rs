//! Facade for content owned by the organization's system space.
//!
//! The system student writes through its system-space writer binding and
//! is not metered by the quota ledger.

use study_sdk::{NewWorkbook, Problem, ProblemId, Space, Workbook, WorkbookId, WorkbookPrivilege};

use super::error::DomainError;
use super::model::{Operator, SystemStudentModel};
use super::processor::{ProblemAddParameter, ProcessorRegistry};
use super::repos::{RepositoryFactory, UserRepositoryFactory};
use super::space;
use super::student::validate_workbook_name;

pub struct SystemStudent<'a> {
    model: SystemStudentModel,
    registry: &'a ProcessorRegistry,
    repos: &'a dyn RepositoryFactory,
    user_repos: &'a dyn UserRepositoryFactory,
}

impl<'a> SystemStudent<'a> {
    #[must_use]
    pub fn new(
        registry: &'a ProcessorRegistry,
        repos: &'a dyn RepositoryFactory,
        user_repos: &'a dyn UserRepositoryFactory,
        model: SystemStudentModel,
    ) -> Self {
        Self {
            model,
            registry,
            repos,
            user_repos,
        }
    }

    #[must_use]
    pub fn model(&self) -> &SystemStudentModel {
        &self.model
    }

    pub async fn find_system_space(&self) -> Result<Space, DomainError> {
        self.user_repos
            .space_repository()
            .find_by_key(
                self.model.organization_id(),
                study_sdk::SpaceType::System,
                &self.model.app_user_id().to_string(),
            )
            .await
    }

    pub async fn find_default_space(&self) -> Result<Space, DomainError> {
        space::find_default_space(self.user_repos, self.model.organization_id()).await
    }

    pub async fn add_workbook_to_system_space(
        &self,
        new_workbook: NewWorkbook,
    ) -> Result<WorkbookId, DomainError> {
        self.registry.ensure_registered(new_workbook.problem_type)?;
        validate_workbook_name(&new_workbook.name)?;
        let space = self.find_system_space().await?;
        let id = self
            .repos
            .workbook_repository()
            .add(&self.model, space.id, new_workbook)
            .await?;
        tracing::info!(workbook_id = %id, "system workbook added");
        Ok(id)
    }

    pub async fn find_workbook_by_id(&self, id: WorkbookId) -> Result<Workbook, DomainError> {
        self.repos
            .workbook_repository()
            .find_by_id(&self.model, id)
            .await
    }

    pub async fn find_workbook_from_system_space(
        &self,
        name: &str,
    ) -> Result<Workbook, DomainError> {
        let space = self.find_system_space().await?;
        self.repos
            .workbook_repository()
            .find_by_name(&self.model, space.id, name)
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

    pub async fn add_problem(
        &self,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let workbook = self.find_workbook_by_id(param.workbook_id).await?;
        if !workbook.has_privilege(WorkbookPrivilege::Update) {
            return Err(DomainError::permission_denied(
                format!("workbook_{}", workbook.id),
                WorkbookPrivilege::Update.as_str(),
            ));
        }
        self.registry
            .add_processor(workbook.problem_type)?
            .add_problem(self.repos, &self.model, &workbook, param)
            .await
    }
}
