//! Per content type strategies and the registry that selects them.
//!
//! Each [`ProblemType`] registers up to five independent roles. A role that
//! is not registered surfaces as [`DomainError::ProcessorNotFound`] when an
//! operation needs it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use study_sdk::{ProblemId, ProblemType, QuotaName, QuotaUnit, Workbook, WorkbookId};

use super::error::DomainError;
use super::model::{Operator, ProblemSelector};
use super::repos::RepositoryFactory;

#[cfg(test)]
mod registry_test;

/// Free-form input for creating a problem, interpreted by the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemAddParameter {
    pub workbook_id: WorkbookId,
    pub number: Option<i32>,
    pub properties: BTreeMap<String, String>,
}

impl ProblemAddParameter {
    #[must_use]
    pub fn new(workbook_id: WorkbookId) -> Self {
        Self {
            workbook_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_owned(), value.into());
        self
    }

    /// Trimmed property value, `None` when absent or blank.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        non_blank(self.properties.get(key))
    }
}

/// Free-form input for modifying a problem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemUpdateParameter {
    pub properties: BTreeMap<String, String>,
}

impl ProblemUpdateParameter {
    #[must_use]
    pub fn with_property(mut self, key: &str, value: impl Into<String>) -> Self {
        self.properties.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        non_blank(self.properties.get(key))
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Rows an update actually touched. `added` is signed: an update that
/// shrinks the workbook reports a negative value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateCounts {
    pub added: i64,
    pub updated: i64,
}

/// Lazy, finite, non-restartable sequence of add parameters read from an
/// import stream. An `Err` item means the stream is structurally unusable.
pub type ProblemAddParameterIter =
    Box<dyn Iterator<Item = Result<ProblemAddParameter, DomainError>> + Send>;

#[async_trait]
pub trait ProblemAddProcessor: Send + Sync {
    /// May create more than one problem for a single parameter.
    async fn add_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        workbook: &Workbook,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError>;
}

#[async_trait]
pub trait ProblemUpdateProcessor: Send + Sync {
    async fn update_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        workbook: &Workbook,
        selector: &ProblemSelector,
        param: &ProblemUpdateParameter,
    ) -> Result<UpdateCounts, DomainError>;
}

#[async_trait]
pub trait ProblemRemoveProcessor: Send + Sync {
    async fn remove_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        selector: &ProblemSelector,
    ) -> Result<(), DomainError>;
}

pub trait ProblemImportProcessor: Send + Sync {
    /// Wraps `source` without reading ahead beyond what a header needs.
    fn create_reader(
        &self,
        workbook_id: WorkbookId,
        source: Box<dyn Read + Send>,
    ) -> Result<ProblemAddParameterIter, DomainError>;
}

/// Limits a content type wants enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaPolicy {
    pub size_unit: QuotaUnit,
    pub size_limit: i64,
    pub update_unit: QuotaUnit,
    pub update_limit: i64,
}

impl QuotaPolicy {
    /// `(unit, limit)` for one metered name.
    #[must_use]
    pub fn for_name(&self, name: QuotaName) -> (QuotaUnit, i64) {
        match name {
            QuotaName::Size => (self.size_unit, self.size_limit),
            QuotaName::Update => (self.update_unit, self.update_limit),
        }
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            size_unit: QuotaUnit::Persistent,
            size_limit: 5000,
            update_unit: QuotaUnit::Day,
            update_limit: 1000,
        }
    }
}

pub trait ProblemQuotaProcessor: Send + Sync {
    fn quota_policy(&self) -> QuotaPolicy;
}

/// Strategy roles registered for one content type.
#[derive(Clone, Default)]
pub struct ProcessorSet {
    pub add: Option<Arc<dyn ProblemAddProcessor>>,
    pub update: Option<Arc<dyn ProblemUpdateProcessor>>,
    pub remove: Option<Arc<dyn ProblemRemoveProcessor>>,
    pub import: Option<Arc<dyn ProblemImportProcessor>>,
    pub quota: Option<Arc<dyn ProblemQuotaProcessor>>,
}

impl fmt::Debug for ProcessorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorSet")
            .field("add", &self.add.is_some())
            .field("update", &self.update.is_some())
            .field("remove", &self.remove.is_some())
            .field("import", &self.import.is_some())
            .field("quota", &self.quota.is_some())
            .finish()
    }
}

/// Immutable after construction; shared across requests behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ProcessorRegistry {
    sets: HashMap<ProblemType, ProcessorSet>,
}

impl ProcessorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any set already registered for `problem_type`.
    #[must_use]
    pub fn register(mut self, problem_type: ProblemType, set: ProcessorSet) -> Self {
        tracing::debug!(%problem_type, roles = ?set, "processor set registered");
        self.sets.insert(problem_type, set);
        self
    }

    #[must_use]
    pub fn is_registered(&self, problem_type: ProblemType) -> bool {
        self.sets.contains_key(&problem_type)
    }

    /// Fails with a validation error for content types nothing can process.
    pub fn ensure_registered(&self, problem_type: ProblemType) -> Result<(), DomainError> {
        if self.is_registered(problem_type) {
            Ok(())
        } else {
            Err(DomainError::validation(
                "problem_type",
                format!("unsupported problem type '{problem_type}'"),
            ))
        }
    }

    fn role<T: ?Sized>(
        &self,
        problem_type: ProblemType,
        role: &'static str,
        select: impl FnOnce(&ProcessorSet) -> Option<&Arc<T>>,
    ) -> Result<&T, DomainError> {
        self.sets
            .get(&problem_type)
            .and_then(select)
            .map(|arc| &**arc)
            .ok_or_else(|| {
                tracing::error!(%problem_type, role, "processor lookup miss");
                DomainError::processor_not_found(problem_type, role)
            })
    }

    pub fn add_processor(
        &self,
        problem_type: ProblemType,
    ) -> Result<&dyn ProblemAddProcessor, DomainError> {
        self.role(problem_type, "add", |s| s.add.as_ref())
    }

    pub fn update_processor(
        &self,
        problem_type: ProblemType,
    ) -> Result<&dyn ProblemUpdateProcessor, DomainError> {
        self.role(problem_type, "update", |s| s.update.as_ref())
    }

    pub fn remove_processor(
        &self,
        problem_type: ProblemType,
    ) -> Result<&dyn ProblemRemoveProcessor, DomainError> {
        self.role(problem_type, "remove", |s| s.remove.as_ref())
    }

    pub fn import_processor(
        &self,
        problem_type: ProblemType,
    ) -> Result<&dyn ProblemImportProcessor, DomainError> {
        self.role(problem_type, "import", |s| s.import.as_ref())
    }

    pub fn quota_processor(
        &self,
        problem_type: ProblemType,
    ) -> Result<&dyn ProblemQuotaProcessor, DomainError> {
        self.role(problem_type, "quota", |s| s.quota.as_ref())
    }
}
