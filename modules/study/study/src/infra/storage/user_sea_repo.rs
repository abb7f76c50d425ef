use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use study_sdk::{
    AppUser, AppUserId, NewAppUser, Organization, OrganizationId, Space, SpaceId, SpaceType,
    UserGroupId,
};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::model::UserGroup;
use crate::domain::repos::{
    AppUserRepository, OrganizationRepository, RbacRepository, SpaceRepository,
    UserGroupRepository,
};

use super::entity::{app_user, organization, rbac_policy, space, user_group};
use super::mapper::to_json;
use super::{db_err, insert_err};

pub struct SeaOrmOrganizationRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C> SeaOrmOrganizationRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> OrganizationRepository
    for SeaOrmOrganizationRepository<'a, C>
{
    async fn find_by_id(&self, id: OrganizationId) -> Result<Organization, DomainError> {
        organization::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .map_err(db_err)?
            .map(Into::into)
            .ok_or_else(|| DomainError::not_found("Organization", id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Organization, DomainError> {
        organization::Entity::find()
            .filter(organization::Column::Name.eq(name))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .map(Into::into)
            .ok_or_else(|| DomainError::not_found("Organization", name))
    }

    async fn add(&self, name: &str) -> Result<OrganizationId, DomainError> {
        let exists = organization::Entity::find()
            .filter(organization::Column::Name.eq(name))
            .count(self.conn)
            .await
            .map_err(db_err)?;
        if exists > 0 {
            return Err(DomainError::already_exists("Organization", name));
        }

        let id = Uuid::now_v7();
        organization::ActiveModel {
            id: Set(id),
            name: Set(name.to_owned()),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn)
        .await
        .map_err(insert_err("Organization", name))?;
        Ok(id)
    }
}

pub struct SeaOrmAppUserRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C> SeaOrmAppUserRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> AppUserRepository for SeaOrmAppUserRepository<'a, C> {
    async fn find_by_id(
        &self,
        organization_id: OrganizationId,
        id: AppUserId,
    ) -> Result<AppUser, DomainError> {
        app_user::Entity::find_by_id(id)
            .filter(app_user::Column::OrganizationId.eq(organization_id))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("AppUser", id))?
            .try_into()
    }

    async fn find_by_login_id(
        &self,
        organization_id: OrganizationId,
        login_id: &str,
    ) -> Result<AppUser, DomainError> {
        app_user::Entity::find()
            .filter(app_user::Column::OrganizationId.eq(organization_id))
            .filter(app_user::Column::LoginId.eq(login_id))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("AppUser", login_id))?
            .try_into()
    }

    async fn add(
        &self,
        organization_id: OrganizationId,
        new_user: NewAppUser,
    ) -> Result<AppUserId, DomainError> {
        let taken = app_user::Entity::find()
            .filter(app_user::Column::OrganizationId.eq(organization_id))
            .filter(app_user::Column::LoginId.eq(new_user.login_id.as_str()))
            .count(self.conn)
            .await
            .map_err(db_err)?;
        if taken > 0 {
            return Err(DomainError::already_exists("AppUser", &new_user.login_id));
        }

        let id = Uuid::now_v7();
        app_user::ActiveModel {
            id: Set(id),
            organization_id: Set(organization_id),
            login_id: Set(new_user.login_id.clone()),
            username: Set(new_user.username),
            roles: Set(to_json(&new_user.roles)?),
            properties: Set(to_json(&new_user.properties)?),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn)
        .await
        .map_err(insert_err("AppUser", &new_user.login_id))?;
        Ok(id)
    }
}

pub struct SeaOrmUserGroupRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C> SeaOrmUserGroupRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> UserGroupRepository
    for SeaOrmUserGroupRepository<'a, C>
{
    async fn find_by_key(
        &self,
        organization_id: OrganizationId,
        key: &str,
    ) -> Result<UserGroup, DomainError> {
        user_group::Entity::find()
            .filter(user_group::Column::OrganizationId.eq(organization_id))
            .filter(user_group::Column::Key.eq(key))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .map(Into::into)
            .ok_or_else(|| DomainError::not_found("UserGroup", key))
    }

    async fn add(
        &self,
        organization_id: OrganizationId,
        key: &str,
        name: &str,
    ) -> Result<UserGroupId, DomainError> {
        let id = Uuid::now_v7();
        user_group::ActiveModel {
            id: Set(id),
            organization_id: Set(organization_id),
            key: Set(key.to_owned()),
            name: Set(name.to_owned()),
        }
        .insert(self.conn)
        .await
        .map_err(insert_err("UserGroup", key))?;
        Ok(id)
    }
}

pub struct SeaOrmSpaceRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C> SeaOrmSpaceRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> SpaceRepository for SeaOrmSpaceRepository<'a, C> {
    async fn find_by_id(
        &self,
        organization_id: OrganizationId,
        id: SpaceId,
    ) -> Result<Space, DomainError> {
        space::Entity::find_by_id(id)
            .filter(space::Column::OrganizationId.eq(organization_id))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Space", id))?
            .try_into()
    }

    async fn find_by_key(
        &self,
        organization_id: OrganizationId,
        space_type: SpaceType,
        key: &str,
    ) -> Result<Space, DomainError> {
        space::Entity::find()
            .filter(space::Column::OrganizationId.eq(organization_id))
            .filter(space::Column::SpaceType.eq(space_type.as_str()))
            .filter(space::Column::Key.eq(key))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Space", format!("{space_type}/{key}")))?
            .try_into()
    }

    async fn add(
        &self,
        organization_id: OrganizationId,
        space_type: SpaceType,
        key: &str,
        name: &str,
        description: &str,
    ) -> Result<SpaceId, DomainError> {
        let id = Uuid::now_v7();
        space::ActiveModel {
            id: Set(id),
            organization_id: Set(organization_id),
            space_type: Set(space_type.as_str().to_owned()),
            key: Set(key.to_owned()),
            name: Set(name.to_owned()),
            description: Set(description.to_owned()),
        }
        .insert(self.conn)
        .await
        .map_err(insert_err("Space", &format!("{space_type}/{key}")))?;
        Ok(id)
    }
}

pub struct SeaOrmRbacRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C> SeaOrmRbacRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

impl<C: ConnectionTrait + Send + Sync> SeaOrmRbacRepository<'_, C> {
    async fn add_tuple(
        &self,
        organization_id: OrganizationId,
        ptype: &str,
        values: [&str; 3],
    ) -> Result<(), DomainError> {
        let [v0, v1, v2] = values;
        let existing = rbac_policy::Entity::find()
            .filter(rbac_policy::Column::OrganizationId.eq(organization_id))
            .filter(rbac_policy::Column::Ptype.eq(ptype))
            .filter(rbac_policy::Column::V0.eq(v0))
            .filter(rbac_policy::Column::V1.eq(v1))
            .filter(rbac_policy::Column::V2.eq(v2))
            .count(self.conn)
            .await
            .map_err(db_err)?;
        if existing > 0 {
            return Ok(());
        }

        rbac_policy::ActiveModel {
            id: Set(Uuid::now_v7()),
            organization_id: Set(organization_id),
            ptype: Set(ptype.to_owned()),
            v0: Set(v0.to_owned()),
            v1: Set(v1.to_owned()),
            v2: Set(v2.to_owned()),
        }
        .insert(self.conn)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> RbacRepository for SeaOrmRbacRepository<'a, C> {
    async fn add_policy(
        &self,
        organization_id: OrganizationId,
        subject: &str,
        object: &str,
        action: &str,
    ) -> Result<(), DomainError> {
        self.add_tuple(
            organization_id,
            rbac_policy::PTYPE_POLICY,
            [subject, object, action],
        )
        .await
    }

    async fn add_grouping_policy(
        &self,
        organization_id: OrganizationId,
        subject: &str,
        role: &str,
    ) -> Result<(), DomainError> {
        self.add_tuple(organization_id, rbac_policy::PTYPE_GROUPING, [subject, role, ""])
            .await
    }

    async fn find_roles(
        &self,
        organization_id: OrganizationId,
        subject: &str,
    ) -> Result<Vec<String>, DomainError> {
        Ok(rbac_policy::Entity::find()
            .filter(rbac_policy::Column::OrganizationId.eq(organization_id))
            .filter(rbac_policy::Column::Ptype.eq(rbac_policy::PTYPE_GROUPING))
            .filter(rbac_policy::Column::V0.eq(subject))
            .all(self.conn)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(|row| row.v1)
            .collect())
    }

    async fn has_policy(
        &self,
        organization_id: OrganizationId,
        subjects: &[String],
        object: &str,
        action: &str,
    ) -> Result<bool, DomainError> {
        if subjects.is_empty() {
            return Ok(false);
        }
        let matches = rbac_policy::Entity::find()
            .filter(rbac_policy::Column::OrganizationId.eq(organization_id))
            .filter(rbac_policy::Column::Ptype.eq(rbac_policy::PTYPE_POLICY))
            .filter(rbac_policy::Column::V0.is_in(subjects.iter().map(String::as_str)))
            .filter(rbac_policy::Column::V1.eq(object))
            .filter(rbac_policy::Column::V2.eq(action))
            .count(self.conn)
            .await
            .map_err(db_err)?;
        Ok(matches > 0)
    }
}
