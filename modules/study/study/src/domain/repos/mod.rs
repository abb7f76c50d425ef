//! Repository traits consumed by the domain layer.
//!
//! Implementations are bound to one database connection or transaction by a
//! factory; the domain never opens transactions itself.

mod content_repos;
mod record_repos;
mod user_repos;

pub use content_repos::{AudioRepository, ProblemRepository, WorkbookRepository};
pub use record_repos::{StudyRecordRepository, UserQuotaRepository};
pub use user_repos::{
    AppUserRepository, OrganizationRepository, RbacRepository, SpaceRepository,
    UserGroupRepository,
};

use study_sdk::ProblemType;

/// Content repositories sharing one transactional handle.
pub trait RepositoryFactory: Send + Sync {
    fn workbook_repository(&self) -> Box<dyn WorkbookRepository + '_>;

    /// Problem storage for one content type.
    fn problem_repository(&self, problem_type: ProblemType) -> Box<dyn ProblemRepository + '_>;

    fn user_quota_repository(&self) -> Box<dyn UserQuotaRepository + '_>;

    fn study_record_repository(&self) -> Box<dyn StudyRecordRepository + '_>;

    fn audio_repository(&self) -> Box<dyn AudioRepository + '_>;
}

/// Organization / membership repositories sharing one transactional handle.
pub trait UserRepositoryFactory: Send + Sync {
    fn organization_repository(&self) -> Box<dyn OrganizationRepository + '_>;

    fn app_user_repository(&self) -> Box<dyn AppUserRepository + '_>;

    fn user_group_repository(&self) -> Box<dyn UserGroupRepository + '_>;

    fn space_repository(&self) -> Box<dyn SpaceRepository + '_>;

    fn rbac_repository(&self) -> Box<dyn RbacRepository + '_>;
}
