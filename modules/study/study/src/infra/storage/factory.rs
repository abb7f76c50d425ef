use std::sync::Arc;

use sea_orm::ConnectionTrait;
use study_sdk::ProblemType;

use crate::domain::clock::Clock;
use crate::domain::repos::{
    AppUserRepository, AudioRepository, OrganizationRepository, ProblemRepository,
    RbacRepository, RepositoryFactory, SpaceRepository, StudyRecordRepository,
    UserGroupRepository, UserQuotaRepository, UserRepositoryFactory, WorkbookRepository,
};

use super::{
    SeaOrmAppUserRepository, SeaOrmAudioRepository, SeaOrmOrganizationRepository,
    SeaOrmProblemRepository, SeaOrmRbacRepository, SeaOrmSpaceRepository,
    SeaOrmStudyRecordRepository, SeaOrmUserGroupRepository, SeaOrmUserQuotaRepository,
    SeaOrmWorkbookRepository,
};

/// Hands out repositories bound to one connection or transaction.
pub struct SeaOrmRepositoryFactory<'a, C> {
    conn: &'a C,
    clock: Arc<dyn Clock>,
}

impl<'a, C> SeaOrmRepositoryFactory<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }
}

impl<C: ConnectionTrait + Send + Sync> RepositoryFactory for SeaOrmRepositoryFactory<'_, C> {
    fn workbook_repository(&self) -> Box<dyn WorkbookRepository + '_> {
        Box::new(SeaOrmWorkbookRepository::new(self.conn))
    }

    fn problem_repository(&self, problem_type: ProblemType) -> Box<dyn ProblemRepository + '_> {
        Box::new(SeaOrmProblemRepository::new(self.conn, problem_type))
    }

    fn user_quota_repository(&self) -> Box<dyn UserQuotaRepository + '_> {
        Box::new(SeaOrmUserQuotaRepository::new(
            self.conn,
            Arc::clone(&self.clock),
        ))
    }

    fn study_record_repository(&self) -> Box<dyn StudyRecordRepository + '_> {
        Box::new(SeaOrmStudyRecordRepository::new(
            self.conn,
            Arc::clone(&self.clock),
        ))
    }

    fn audio_repository(&self) -> Box<dyn AudioRepository + '_> {
        Box::new(SeaOrmAudioRepository::new(self.conn))
    }
}

impl<C: ConnectionTrait + Send + Sync> UserRepositoryFactory for SeaOrmRepositoryFactory<'_, C> {
    fn organization_repository(&self) -> Box<dyn OrganizationRepository + '_> {
        Box::new(SeaOrmOrganizationRepository::new(self.conn))
    }

    fn app_user_repository(&self) -> Box<dyn AppUserRepository + '_> {
        Box::new(SeaOrmAppUserRepository::new(self.conn))
    }

    fn user_group_repository(&self) -> Box<dyn UserGroupRepository + '_> {
        Box::new(SeaOrmUserGroupRepository::new(self.conn))
    }

    fn space_repository(&self) -> Box<dyn SpaceRepository + '_> {
        Box::new(SeaOrmSpaceRepository::new(self.conn))
    }

    fn rbac_repository(&self) -> Box<dyn RbacRepository + '_> {
        Box::new(SeaOrmRbacRepository::new(self.conn))
    }
}
