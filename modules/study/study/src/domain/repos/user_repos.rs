use async_trait::async_trait;
use study_sdk::{
    AppUser, AppUserId, NewAppUser, Organization, OrganizationId, Space, SpaceId, SpaceType,
    UserGroupId,
};

use crate::domain::error::DomainError;
use crate::domain::model::UserGroup;

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn find_by_id(&self, id: OrganizationId) -> Result<Organization, DomainError>;

    async fn find_by_name(&self, name: &str) -> Result<Organization, DomainError>;

    /// Fails with `AlreadyExists` when the name is taken.
    async fn add(&self, name: &str) -> Result<OrganizationId, DomainError>;
}

#[async_trait]
pub trait AppUserRepository: Send + Sync {
    async fn find_by_id(
        &self,
        organization_id: OrganizationId,
        id: AppUserId,
    ) -> Result<AppUser, DomainError>;

    async fn find_by_login_id(
        &self,
        organization_id: OrganizationId,
        login_id: &str,
    ) -> Result<AppUser, DomainError>;

    /// Fails with `AlreadyExists` when the login id is taken in the organization.
    async fn add(
        &self,
        organization_id: OrganizationId,
        new_user: NewAppUser,
    ) -> Result<AppUserId, DomainError>;
}

#[async_trait]
pub trait UserGroupRepository: Send + Sync {
    async fn find_by_key(
        &self,
        organization_id: OrganizationId,
        key: &str,
    ) -> Result<UserGroup, DomainError>;

    async fn add(
        &self,
        organization_id: OrganizationId,
        key: &str,
        name: &str,
    ) -> Result<UserGroupId, DomainError>;
}

#[async_trait]
pub trait SpaceRepository: Send + Sync {
    async fn find_by_id(
        &self,
        organization_id: OrganizationId,
        id: SpaceId,
    ) -> Result<Space, DomainError>;

    /// Fails with `NotFound` (resource `Space`) when absent.
    async fn find_by_key(
        &self,
        organization_id: OrganizationId,
        space_type: SpaceType,
        key: &str,
    ) -> Result<Space, DomainError>;

    /// Unique per `(organization, type, key)`; a race yields `AlreadyExists`.
    async fn add(
        &self,
        organization_id: OrganizationId,
        space_type: SpaceType,
        key: &str,
        name: &str,
        description: &str,
    ) -> Result<SpaceId, DomainError>;
}

/// Storage of named policies `(subject, object, action)` and grouping
/// policies `(subject, role)`, both scoped to an organization.
#[async_trait]
pub trait RbacRepository: Send + Sync {
    /// Idempotent.
    async fn add_policy(
        &self,
        organization_id: OrganizationId,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<(), DomainError>;

    /// Idempotent.
    async fn add_grouping_policy(
        &self,
        organization_id: OrganizationId,
        subject: &str,
        role: &str,
    ) -> Result<(), DomainError>;

    /// Roles `subject` is directly grouped into.
    async fn find_roles(
        &self,
        organization_id: OrganizationId,
        subject: &str,
    ) -> Result<Vec<String>, DomainError>;

    /// True when any of `subjects` holds `action` on `object`.
    async fn has_policy(
        &self,
        organization_id: OrganizationId,
        subjects: &[String],
        object: &str,
        action: &str,
    ) -> Result<bool, DomainError>;
}
