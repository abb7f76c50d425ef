//! Membership administration inside one organization.

use study_sdk::{AppUser, AppUserId, NewAppUser, Space, SpaceId};

use super::error::DomainError;
use super::model::{
    Operator, SystemOwnerModel, PUBLIC_GROUP_KEY, ROLE_STUDENT, SYSTEM_OWNER_LOGIN_ID,
    SYSTEM_STUDENT_LOGIN_ID,
};
use super::rbac;
use super::repos::UserRepositoryFactory;
use super::space;

pub struct SystemOwner<'a> {
    model: SystemOwnerModel,
    user_repos: &'a dyn UserRepositoryFactory,
}

impl<'a> SystemOwner<'a> {
    #[must_use]
    pub fn new(user_repos: &'a dyn UserRepositoryFactory, model: SystemOwnerModel) -> Self {
        Self { model, user_repos }
    }

    #[must_use]
    pub fn model(&self) -> &SystemOwnerModel {
        &self.model
    }

    /// Creates the member, joins it to the public group, allocates its
    /// personal space and binds it as the space writer. All four steps run
    /// against the same repositories, so the caller's transaction covers
    /// them together.
    pub async fn add_app_user(&self, new_user: NewAppUser) -> Result<AppUserId, DomainError> {
        validate_login_id(&new_user.login_id)?;
        let organization_id = self.model.organization_id();
        let login_id = new_user.login_id.clone();

        let mut new_user = new_user;
        if new_user.roles.is_empty() {
            new_user.roles.insert(ROLE_STUDENT.to_owned());
        }
        let user_id = self
            .user_repos
            .app_user_repository()
            .add(organization_id, new_user)
            .await?;

        let public_group = self
            .user_repos
            .user_group_repository()
            .find_by_key(organization_id, PUBLIC_GROUP_KEY)
            .await?;
        self.user_repos
            .rbac_repository()
            .add_grouping_policy(
                organization_id,
                &rbac::user_subject(user_id),
                &rbac::group_subject(public_group.id),
            )
            .await?;

        space::add_personal_space(self.user_repos, organization_id, user_id, &login_id).await?;

        tracing::info!(%organization_id, %user_id, login_id, "app user added");
        Ok(user_id)
    }

    pub async fn find_app_user_by_id(&self, id: AppUserId) -> Result<AppUser, DomainError> {
        self.user_repos
            .app_user_repository()
            .find_by_id(self.model.organization_id(), id)
            .await
    }

    pub async fn find_app_user_by_login_id(&self, login_id: &str) -> Result<AppUser, DomainError> {
        self.user_repos
            .app_user_repository()
            .find_by_login_id(self.model.organization_id(), login_id)
            .await
    }

    pub async fn find_system_student(&self) -> Result<AppUser, DomainError> {
        self.find_app_user_by_login_id(SYSTEM_STUDENT_LOGIN_ID).await
    }

    pub async fn find_default_space(&self) -> Result<Space, DomainError> {
        space::find_default_space(self.user_repos, self.model.organization_id()).await
    }

    pub async fn find_system_space(&self) -> Result<Space, DomainError> {
        space::find_system_space(self.user_repos, self.model.organization_id()).await
    }

    pub async fn add_default_space(&self) -> Result<SpaceId, DomainError> {
        space::add_default_space(self.user_repos, self.model.organization_id()).await
    }

    pub async fn add_system_space(&self) -> Result<SpaceId, DomainError> {
        let system_student = self.find_system_student().await?;
        space::add_system_space(
            self.user_repos,
            self.model.organization_id(),
            system_student.id,
        )
        .await
    }
}

fn validate_login_id(login_id: &str) -> Result<(), DomainError> {
    let trimmed = login_id.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("login_id", "must not be blank"));
    }
    if trimmed == SYSTEM_OWNER_LOGIN_ID || trimmed == SYSTEM_STUDENT_LOGIN_ID {
        return Err(DomainError::validation("login_id", "is reserved"));
    }
    Ok(())
}
