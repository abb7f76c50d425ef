use study_sdk::{ClientError, PluginErrorKind, ProblemType, StudyError};
use thiserror::Error;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} already exists: {key}")]
    AlreadyExists { resource: &'static str, key: String },

    #[error("{resource} {id} was modified concurrently (expected version {version})")]
    VersionConflict {
        resource: &'static str,
        id: String,
        version: i32,
    },

    #[error("Quota exceeded: {key}")]
    QuotaExceeded { key: String },

    #[error("Permission denied: {action} on {object}")]
    PermissionDenied { object: String, action: String },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    /// A workbook references a content type with no registered strategy.
    #[error("No {role} processor registered for problem type '{problem_type}'")]
    ProcessorNotFound {
        problem_type: ProblemType,
        role: &'static str,
    },

    #[error("Plugin error ({kind:?}): {}", messages.join("; "))]
    Plugin {
        kind: PluginErrorKind,
        messages: Vec<String>,
    },

    #[error("{service} call failed: {source}")]
    Upstream {
        service: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn already_exists(resource: &'static str, key: impl ToString) -> Self {
        Self::AlreadyExists {
            resource,
            key: key.to_string(),
        }
    }

    pub fn version_conflict(resource: &'static str, id: impl ToString, version: i32) -> Self {
        Self::VersionConflict {
            resource,
            id: id.to_string(),
            version,
        }
    }

    pub fn quota_exceeded(key: impl Into<String>) -> Self {
        Self::QuotaExceeded { key: key.into() }
    }

    pub fn permission_denied(object: impl Into<String>, action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            object: object.into(),
            action: action.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn processor_not_found(problem_type: ProblemType, role: &'static str) -> Self {
        Self::ProcessorNotFound { problem_type, role }
    }

    #[must_use]
    pub fn plugin_client(messages: Vec<String>) -> Self {
        Self::Plugin {
            kind: PluginErrorKind::Client,
            messages,
        }
    }

    #[must_use]
    pub fn plugin_server(messages: Vec<String>) -> Self {
        Self::Plugin {
            kind: PluginErrorKind::Server,
            messages,
        }
    }

    #[must_use]
    pub fn upstream(service: &'static str, source: ClientError) -> Self {
        Self::Upstream { service, source }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convert domain errors to SDK errors for public API consumption.
impl From<DomainError> for StudyError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound { resource, .. } => Self::not_found(resource),
            DomainError::AlreadyExists { resource, .. } => Self::already_exists(resource),
            DomainError::VersionConflict { resource, .. } => Self::conflict(resource),
            DomainError::QuotaExceeded { key } => Self::quota_exceeded(key),
            DomainError::PermissionDenied { .. } => Self::permission_denied(),
            DomainError::Validation { field, message } => {
                Self::invalid_argument(format!("{field}: {message}"))
            }
            DomainError::Plugin { kind, messages } => Self::plugin(kind, messages),
            DomainError::Upstream { service, source } => Self::plugin(
                PluginErrorKind::Server,
                vec![format!("{service} call failed: {source}")],
            ),
            DomainError::ProcessorNotFound { .. } | DomainError::Database { .. } => {
                Self::internal()
            }
        }
    }
}
