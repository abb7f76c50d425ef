//! Public error types for the study module.
//!
//! These errors are safe to expose to consumers. Every variant except
//! [`StudyError::Internal`] is recoverable and scoped to one operation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a processor failure was caused by the caller's input or by an
/// upstream dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginErrorKind {
    Client,
    Server,
}

/// Errors returned by study operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StudyError {
    /// Workbook, problem, space, user or quota row absent.
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Unique constraint hit.
    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    /// Optimistic-lock version mismatch.
    #[error("{resource} was modified concurrently")]
    Conflict { resource: String },

    /// Metered usage would pass the configured limit.
    #[error("quota exceeded: {quota}")]
    QuotaExceeded { quota: String },

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Content-type specific failure reported by a processor.
    #[error("{kind:?} plugin error: {}", messages.join("; "))]
    Plugin {
        kind: PluginErrorKind,
        messages: Vec<String>,
    },

    #[error("internal error")]
    Internal,
}

impl StudyError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }

    pub fn quota_exceeded(quota: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            quota: quota.into(),
        }
    }

    #[must_use]
    pub fn permission_denied() -> Self {
        Self::PermissionDenied
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn plugin(kind: PluginErrorKind, messages: Vec<String>) -> Self {
        Self::Plugin { kind, messages }
    }

    #[must_use]
    pub fn internal() -> Self {
        Self::Internal
    }

    /// True when the caller can fix the request and retry.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Plugin { kind, .. } => *kind == PluginErrorKind::Client,
            Self::Internal => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_error_lists_messages() {
        let err = StudyError::plugin(
            PluginErrorKind::Client,
            vec!["word not found".to_owned(), "check spelling".to_owned()],
        );
        assert_eq!(
            err.to_string(),
            "Client plugin error: word not found; check spelling"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn server_side_failures_are_not_client_errors() {
        assert!(!StudyError::internal().is_client_error());
        assert!(!StudyError::plugin(PluginErrorKind::Server, vec![]).is_client_error());
        assert!(StudyError::quota_exceeded("english_word_size").is_client_error());
    }
}
