//! Study SDK
//!
//! Public contract of the `study` module:
//!
//! - [`SecurityContext`] - organization + operator identity carried by every call
//! - [`models`] - workbooks, problems, spaces, users, study records
//! - [`StudyError`] - client-facing error taxonomy
//! - [`clients`] - translation / synthesizer / corpus collaborator traits
//!
//! The implementation crate converts its internal domain errors into
//! [`StudyError`] at the API boundary; callers map error kinds onto their
//! transport (HTTP status codes, gRPC codes, ...).

pub mod clients;
pub mod context;
pub mod errors;
pub mod models;

pub use clients::{
    Audio, ClientError, CorpusClient, CorpusSentence, SynthesizerClient, Translation,
    TranslationClient,
};
pub use context::SecurityContext;
pub use errors::{PluginErrorKind, StudyError};
pub use models::{
    AppUser, AppUserId, AudioId, Lang2, NewAppUser, NewWorkbook, Organization, OrganizationId,
    Problem, ProblemId, ProblemSearchCondition, ProblemSearchResult, ProblemType, QuotaName,
    QuotaUnit, RecordbookSummary, Space, SpaceId, SpaceType, StudyRecord, StudyType, UserGroupId,
    WordPos, Workbook, WorkbookId, WorkbookPrivilege, WorkbookPrivileges, WorkbookSearchCondition,
    WorkbookSearchResult, WorkbookUpdate, AUDIO_ENABLED_PROPERTY,
};
