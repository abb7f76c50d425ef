//! Space lookup and allocation shared by the operator facades.

use study_sdk::{AppUserId, OrganizationId, Space, SpaceId, SpaceType};

use super::error::DomainError;
use super::model::{PUBLIC_GROUP_KEY, SYSTEM_STUDENT_LOGIN_ID};
use super::rbac;
use super::repos::UserRepositoryFactory;

/// Key of the single default space of an organization.
pub const DEFAULT_SPACE_KEY: &str = "default";

pub async fn find_default_space(
    repos: &dyn UserRepositoryFactory,
    organization_id: OrganizationId,
) -> Result<Space, DomainError> {
    repos
        .space_repository()
        .find_by_key(organization_id, SpaceType::Default, DEFAULT_SPACE_KEY)
        .await
}

pub async fn find_personal_space(
    repos: &dyn UserRepositoryFactory,
    organization_id: OrganizationId,
    owner_id: AppUserId,
) -> Result<Space, DomainError> {
    repos
        .space_repository()
        .find_by_key(organization_id, SpaceType::Personal, &owner_id.to_string())
        .await
}

/// The system space is keyed by the organization's system student.
pub async fn find_system_space(
    repos: &dyn UserRepositoryFactory,
    organization_id: OrganizationId,
) -> Result<Space, DomainError> {
    let system_student = repos
        .app_user_repository()
        .find_by_login_id(organization_id, SYSTEM_STUDENT_LOGIN_ID)
        .await?;
    repos
        .space_repository()
        .find_by_key(
            organization_id,
            SpaceType::System,
            &system_student.id.to_string(),
        )
        .await
}

/// Creates the owner's personal space and binds the owner as its writer.
pub async fn add_personal_space(
    repos: &dyn UserRepositoryFactory,
    organization_id: OrganizationId,
    owner_id: AppUserId,
    owner_login_id: &str,
) -> Result<SpaceId, DomainError> {
    let space_id = repos
        .space_repository()
        .add(
            organization_id,
            SpaceType::Personal,
            &owner_id.to_string(),
            &format!("Personal({owner_login_id})"),
            "",
        )
        .await?;
    rbac::grant_space_writer(
        &*repos.rbac_repository(),
        organization_id,
        space_id,
        &rbac::user_subject(owner_id),
    )
    .await?;
    tracing::info!(%organization_id, %owner_id, %space_id, "personal space created");
    Ok(space_id)
}

/// Creates the system space and binds the system student as its writer.
pub async fn add_system_space(
    repos: &dyn UserRepositoryFactory,
    organization_id: OrganizationId,
    system_student_id: AppUserId,
) -> Result<SpaceId, DomainError> {
    let space_id = repos
        .space_repository()
        .add(
            organization_id,
            SpaceType::System,
            &system_student_id.to_string(),
            "System",
            "",
        )
        .await?;
    rbac::grant_space_writer(
        &*repos.rbac_repository(),
        organization_id,
        space_id,
        &rbac::user_subject(system_student_id),
    )
    .await?;
    tracing::info!(%organization_id, %space_id, "system space created");
    Ok(space_id)
}

/// Creates the default space, readable by every member of the public group.
pub async fn add_default_space(
    repos: &dyn UserRepositoryFactory,
    organization_id: OrganizationId,
) -> Result<SpaceId, DomainError> {
    let public_group = repos
        .user_group_repository()
        .find_by_key(organization_id, PUBLIC_GROUP_KEY)
        .await?;
    let space_id = repos
        .space_repository()
        .add(
            organization_id,
            SpaceType::Default,
            DEFAULT_SPACE_KEY,
            "Default",
            "",
        )
        .await?;
    rbac::grant_space_reader(
        &*repos.rbac_repository(),
        organization_id,
        space_id,
        &rbac::group_subject(public_group.id),
    )
    .await?;
    tracing::info!(%organization_id, %space_id, "default space created");
    Ok(space_id)
}
