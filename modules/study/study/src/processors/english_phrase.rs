//! `english_phrase`: hand-entered phrase/translation pairs.

use async_trait::async_trait;
use serde_json::{Map, Value};
use study_sdk::{ProblemId, ProblemType, Workbook};

use crate::domain::error::DomainError;
use crate::domain::model::{NewProblem, Operator, ProblemSelector};
use crate::domain::processor::{
    ProblemAddParameter, ProblemAddProcessor, ProblemQuotaProcessor, ProblemRemoveProcessor,
    ProblemUpdateParameter, ProblemUpdateProcessor, QuotaPolicy, UpdateCounts,
};
use crate::domain::repos::RepositoryFactory;

const PROBLEM_TYPE: ProblemType = ProblemType::EnglishPhrase;

pub const TEXT: &str = "text";
pub const TRANSLATED: &str = "translated";

pub struct EnglishPhraseProcessor {
    quota: QuotaPolicy,
}

impl EnglishPhraseProcessor {
    #[must_use]
    pub fn new(quota: QuotaPolicy) -> Self {
        Self { quota }
    }
}

/// Both values are required; every missing one is reported.
fn phrase_properties(
    text: Option<&str>,
    translated: Option<&str>,
) -> Result<Map<String, Value>, DomainError> {
    match (text, translated) {
        (Some(text), Some(translated)) => {
            let mut props = Map::new();
            props.insert(TEXT.to_owned(), Value::from(text));
            props.insert(TRANSLATED.to_owned(), Value::from(translated));
            Ok(props)
        }
        (None, None) => Err(DomainError::validation(
            "text, translated",
            "must not be blank",
        )),
        (None, Some(_)) => Err(DomainError::validation(TEXT, "must not be blank")),
        (Some(_), None) => Err(DomainError::validation(TRANSLATED, "must not be blank")),
    }
}

#[async_trait]
impl ProblemAddProcessor for EnglishPhraseProcessor {
    async fn add_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        workbook: &Workbook,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let properties = phrase_properties(param.property(TEXT), param.property(TRANSLATED))?;
        let id = repos
            .problem_repository(PROBLEM_TYPE)
            .add_problem(
                operator,
                workbook.id,
                NewProblem {
                    number: param.number,
                    properties,
                },
            )
            .await?;
        Ok(vec![id])
    }
}

#[async_trait]
impl ProblemUpdateProcessor for EnglishPhraseProcessor {
    async fn update_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        _workbook: &Workbook,
        selector: &ProblemSelector,
        param: &ProblemUpdateParameter,
    ) -> Result<UpdateCounts, DomainError> {
        let properties = phrase_properties(param.property(TEXT), param.property(TRANSLATED))?;
        repos
            .problem_repository(PROBLEM_TYPE)
            .update_problem(operator, selector, properties)
            .await?;
        Ok(UpdateCounts {
            added: 0,
            updated: 1,
        })
    }
}

#[async_trait]
impl ProblemRemoveProcessor for EnglishPhraseProcessor {
    async fn remove_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        selector: &ProblemSelector,
    ) -> Result<(), DomainError> {
        repos
            .problem_repository(PROBLEM_TYPE)
            .remove_problem(operator, selector)
            .await
    }
}

impl ProblemQuotaProcessor for EnglishPhraseProcessor {
    fn quota_policy(&self) -> QuotaPolicy {
        self.quota
    }
}
