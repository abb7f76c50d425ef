//! Infrastructure storage layer: SeaORM entities, migrations and the
//! repository implementations behind the domain repository traits.
//!
//! Every repository borrows one connection or transaction (`&C` where
//! `C: ConnectionTrait`), so a [`SeaOrmRepositoryFactory`] built over a
//! transaction makes all repository calls of one operation atomic.

pub mod entity;
pub mod mapper;
pub mod migrations;

mod content_sea_repo;
mod factory;
mod record_sea_repo;
mod user_sea_repo;

#[cfg(test)]
mod mapper_test;
#[cfg(test)]
mod repos_test;

pub use content_sea_repo::{
    SeaOrmAudioRepository, SeaOrmProblemRepository, SeaOrmWorkbookRepository,
};
pub use factory::SeaOrmRepositoryFactory;
pub use record_sea_repo::{SeaOrmStudyRecordRepository, SeaOrmUserQuotaRepository};
pub use user_sea_repo::{
    SeaOrmAppUserRepository, SeaOrmOrganizationRepository, SeaOrmRbacRepository,
    SeaOrmSpaceRepository, SeaOrmUserGroupRepository,
};

use sea_orm::{DbErr, SqlErr};

use crate::domain::error::DomainError;

pub(crate) fn db_err(e: DbErr) -> DomainError {
    DomainError::database(e.to_string())
}

/// Maps a unique-index violation on insert to `AlreadyExists`.
pub(crate) fn insert_err<'a>(
    resource: &'static str,
    key: &'a str,
) -> impl FnOnce(DbErr) -> DomainError + 'a {
    move |e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => DomainError::already_exists(resource, key),
        _ => db_err(e),
    }
}
