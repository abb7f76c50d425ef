//! Organization bootstrap.

use std::collections::BTreeSet;

use study_sdk::{NewAppUser, Organization, OrganizationId};

use super::error::DomainError;
use super::model::{
    SystemOwnerModel, PUBLIC_GROUP_KEY, ROLE_SYSTEM_OWNER, ROLE_SYSTEM_STUDENT,
    SYSTEM_OWNER_LOGIN_ID, SYSTEM_STUDENT_LOGIN_ID,
};
use super::repos::UserRepositoryFactory;
use super::space;
use super::system_owner::SystemOwner;

/// Role given to the first member of a new organization.
pub const ROLE_OWNER: &str = "Owner";

pub struct SystemAdmin<'a> {
    user_repos: &'a dyn UserRepositoryFactory,
}

impl<'a> SystemAdmin<'a> {
    #[must_use]
    pub fn new(user_repos: &'a dyn UserRepositoryFactory) -> Self {
        Self { user_repos }
    }

    pub async fn find_organization_by_name(&self, name: &str) -> Result<Organization, DomainError> {
        self.user_repos
            .organization_repository()
            .find_by_name(name)
            .await
    }

    /// Creates the organization with its system owner, system student,
    /// public group, default and system spaces, then adds `first_owner` as
    /// a regular member.
    pub async fn add_organization(
        &self,
        name: &str,
        first_owner: NewAppUser,
    ) -> Result<OrganizationId, DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "must not be blank"));
        }
        let organization_id = self
            .user_repos
            .organization_repository()
            .add(name.trim())
            .await?;

        let users = self.user_repos.app_user_repository();
        let owner_id = users
            .add(
                organization_id,
                system_user(SYSTEM_OWNER_LOGIN_ID, "SystemOwner", ROLE_SYSTEM_OWNER),
            )
            .await?;
        let system_student_id = users
            .add(
                organization_id,
                system_user(SYSTEM_STUDENT_LOGIN_ID, "SystemStudent", ROLE_SYSTEM_STUDENT),
            )
            .await?;

        self.user_repos
            .user_group_repository()
            .add(organization_id, PUBLIC_GROUP_KEY, "Public group")
            .await?;

        space::add_default_space(self.user_repos, organization_id).await?;
        space::add_system_space(self.user_repos, organization_id, system_student_id).await?;

        let owner = users.find_by_id(organization_id, owner_id).await?;
        let system_owner = SystemOwnerModel::new(owner).ok_or_else(|| {
            DomainError::database("system owner row does not carry the reserved login id")
        })?;

        let mut first_owner = first_owner;
        first_owner.roles.insert(ROLE_OWNER.to_owned());
        SystemOwner::new(self.user_repos, system_owner)
            .add_app_user(first_owner)
            .await?;

        tracing::info!(%organization_id, name, "organization bootstrapped");
        Ok(organization_id)
    }
}

fn system_user(login_id: &str, username: &str, role: &str) -> NewAppUser {
    NewAppUser {
        login_id: login_id.to_owned(),
        username: username.to_owned(),
        roles: BTreeSet::from([role.to_owned()]),
        ..NewAppUser::default()
    }
}
