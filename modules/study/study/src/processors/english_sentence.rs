//! `english_sentence`: sentence pairs, typed in or pulled from the corpus.

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use study_sdk::{
    CorpusClient, Lang2, ProblemId, ProblemType, SynthesizerClient, Workbook, WorkbookId,
};

use crate::domain::error::DomainError;
use crate::domain::model::{NewProblem, Operator, ProblemSelector, PropertyCondition};
use crate::domain::processor::{
    ProblemAddParameter, ProblemAddParameterIter, ProblemAddProcessor, ProblemImportProcessor,
    ProblemQuotaProcessor, ProblemRemoveProcessor, QuotaPolicy,
};
use crate::domain::repos::RepositoryFactory;

use super::{client_err, find_or_synthesize_audio};

const PROBLEM_TYPE: ProblemType = ProblemType::EnglishSentence;

pub const TEXT: &str = "text";
pub const TRANSLATED: &str = "translated";
pub const SENTENCE_NUMBER: &str = "sentenceNumber";
pub const TRANSLATED_SENTENCE_NUMBER: &str = "translatedSentenceNumber";
pub const AUTHOR: &str = "author";
pub const AUDIO_ID: &str = "audioId";

/// Tab-separated corpus export:
/// `srcNumber, srcLang2, srcText, dstNumber, dstLang2, dstText`.
const TSV_COLUMNS: usize = 6;

pub struct EnglishSentenceProcessor {
    corpus: Arc<dyn CorpusClient>,
    synthesizer: Arc<dyn SynthesizerClient>,
    quota: QuotaPolicy,
}

impl EnglishSentenceProcessor {
    #[must_use]
    pub fn new(
        corpus: Arc<dyn CorpusClient>,
        synthesizer: Arc<dyn SynthesizerClient>,
        quota: QuotaPolicy,
    ) -> Self {
        Self {
            corpus,
            synthesizer,
            quota,
        }
    }

    async fn from_corpus(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        workbook: &Workbook,
        raw_number: &str,
    ) -> Result<Map<String, Value>, DomainError> {
        let number: i64 = raw_number
            .parse()
            .map_err(|_| DomainError::validation(SENTENCE_NUMBER, "must be an integer"))?;

        let duplicates = repos
            .problem_repository(PROBLEM_TYPE)
            .find_problems_by_custom_condition(
                operator,
                workbook.id,
                &PropertyCondition {
                    key: SENTENCE_NUMBER.to_owned(),
                    value: Value::from(number),
                },
            )
            .await?;
        if !duplicates.is_empty() {
            return Err(DomainError::already_exists(
                "Problem",
                format!("{SENTENCE_NUMBER}={number}"),
            ));
        }

        let sentence = self
            .corpus
            .find_sentence_by_sentence_number(number)
            .await
            .map_err(client_err("corpus", || {
                format!("sentence {number} is not in the corpus")
            }))?;

        let mut props = Map::new();
        props.insert(TEXT.to_owned(), Value::from(sentence.text));
        props.insert(TRANSLATED.to_owned(), Value::from(sentence.translated));
        props.insert(SENTENCE_NUMBER.to_owned(), Value::from(number));
        props.insert(
            TRANSLATED_SENTENCE_NUMBER.to_owned(),
            Value::from(sentence.translated_sentence_number),
        );
        props.insert(AUTHOR.to_owned(), Value::from(sentence.author));
        Ok(props)
    }
}

#[async_trait]
impl ProblemAddProcessor for EnglishSentenceProcessor {
    /// `sentenceNumber` wins over explicit `text`/`translated`.
    async fn add_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        workbook: &Workbook,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let mut properties = match param.property(SENTENCE_NUMBER) {
            Some(number) => self.from_corpus(repos, operator, workbook, number).await?,
            None => {
                let text = param
                    .property(TEXT)
                    .ok_or_else(|| DomainError::validation(TEXT, "must not be blank"))?;
                let translated = param
                    .property(TRANSLATED)
                    .ok_or_else(|| DomainError::validation(TRANSLATED, "must not be blank"))?;
                let mut props = Map::new();
                props.insert(TEXT.to_owned(), Value::from(text));
                props.insert(TRANSLATED.to_owned(), Value::from(translated));
                props
            }
        };

        if workbook.audio_enabled() {
            let text = properties
                .get(TEXT)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let audio_id =
                find_or_synthesize_audio(repos, self.synthesizer.as_ref(), Lang2::EN, &text)
                    .await?;
            properties.insert(AUDIO_ID.to_owned(), Value::from(audio_id.to_string()));
        }

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
impl ProblemRemoveProcessor for EnglishSentenceProcessor {
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

impl ProblemImportProcessor for EnglishSentenceProcessor {
    fn create_reader(
        &self,
        workbook_id: WorkbookId,
        source: Box<dyn Read + Send>,
    ) -> Result<ProblemAddParameterIter, DomainError> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(source);

        let rows = reader
            .into_records()
            .enumerate()
            .filter_map(move |(index, record)| {
                let line = index + 1;
                match record {
                    Ok(record) => tsv_row(workbook_id, &record, line).map(Ok),
                    Err(e) => {
                        tracing::warn!(line, error = %e, "skipping unreadable tsv row");
                        None
                    }
                }
            });
        Ok(Box::new(rows))
    }
}

fn tsv_row(
    workbook_id: WorkbookId,
    record: &csv::StringRecord,
    line: usize,
) -> Option<ProblemAddParameter> {
    if record.len() < TSV_COLUMNS {
        tracing::warn!(line, columns = record.len(), "skipping short tsv row");
        return None;
    }
    let field = |i: usize| record.get(i).map(str::trim).unwrap_or_default();

    let numbers_ok = field(0).parse::<i64>().is_ok() && field(3).parse::<i64>().is_ok();
    let langs_ok = field(1).parse::<Lang2>().is_ok() && field(4).parse::<Lang2>().is_ok();
    if !numbers_ok || !langs_ok {
        tracing::warn!(line, "skipping malformed tsv row");
        return None;
    }
    let (text, translated) = (field(2), field(5));
    if text.is_empty() || translated.is_empty() {
        tracing::warn!(line, "skipping tsv row without sentence text");
        return None;
    }

    Some(
        ProblemAddParameter::new(workbook_id)
            .with_property(TEXT, text)
            .with_property(TRANSLATED, translated),
    )
}

impl ProblemQuotaProcessor for EnglishSentenceProcessor {
    fn quota_policy(&self) -> QuotaPolicy {
        self.quota
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use study_sdk::{PluginErrorKind, QuotaName, StudyError};
    use tracing_test::traced_test;

    use super::*;
    use crate::domain::quota::quota_key;
    use crate::test_support::TestEnv;

    fn processor(env: &TestEnv) -> EnglishSentenceProcessor {
        EnglishSentenceProcessor::new(
            env.mocks.corpus.clone(),
            env.mocks.synthesizer.clone(),
            QuotaPolicy::default(),
        )
    }

    #[tokio::test]
    async fn corpus_sentence_is_added_once_per_workbook() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, PROBLEM_TYPE, "sentences").await;
        let param = ProblemAddParameter::new(wb).with_property(SENTENCE_NUMBER, "1");

        let ids = env.service.add_problem(&ctx, &param).await.unwrap();
        let problem = env.service.find_problem_by_id(&ctx, wb, ids[0]).await.unwrap();
        assert_eq!(problem.property_str(TEXT), Some("I have a pen."));
        assert_eq!(problem.properties.get(SENTENCE_NUMBER), Some(&Value::from(1)));

        let err = env.service.add_problem(&ctx, &param).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyExists { .. }));
        assert_eq!(env.service.find_all_problems(&ctx, wb).await.unwrap().len(), 1);
        let size = quota_key(PROBLEM_TYPE, QuotaName::Size);
        assert_eq!(env.quota_count(&ctx, &size).await, 1);
    }

    #[tokio::test]
    async fn unknown_sentence_number_is_a_client_error() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, PROBLEM_TYPE, "sentences").await;

        let err = env
            .service
            .add_problem(
                &ctx,
                &ProblemAddParameter::new(wb).with_property(SENTENCE_NUMBER, "404"),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            StudyError::from(err),
            StudyError::Plugin {
                kind: PluginErrorKind::Client,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn explicit_pair_needs_both_sides() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, PROBLEM_TYPE, "sentences").await;

        let err = env
            .service
            .add_problem(
                &ctx,
                &ProblemAddParameter::new(wb).with_property(TEXT, "Hello there."),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == TRANSLATED));

        let ids = env
            .service
            .add_problem(
                &ctx,
                &ProblemAddParameter::new(wb)
                    .with_property(TEXT, "Hello there.")
                    .with_property(TRANSLATED, "やあ。"),
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn tsv_reader_keeps_well_formed_pairs() {
        let env = TestEnv::new().await;
        let tsv = "1\ten\tI have a pen.\t100001\tja\t私はペンを持っています。\n\
                   2\ten\tshort row\n\
                   x\ten\tBad number.\t3\tja\t悪い。\n\
                   4\ten\tIt's \"quoted\".\t5\tja\t引用。\n";
        let params: Vec<ProblemAddParameter> = processor(&env)
            .create_reader(WorkbookId::nil(), Box::new(Cursor::new(tsv.as_bytes().to_vec())))
            .unwrap()
            .map(Result::unwrap)
            .collect();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].property(TRANSLATED), Some("私はペンを持っています。"));
        assert_eq!(params[1].property(TEXT), Some("It's \"quoted\"."));
        assert!(logs_contain("skipping short tsv row"));
        assert!(logs_contain("skipping malformed tsv row"));
    }

    #[tokio::test]
    async fn import_and_remove_keep_size_usage_in_step() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, PROBLEM_TYPE, "sentences").await;
        let tsv = "1\ten\tOne.\t11\tja\t一。\n2\ten\tTwo.\t12\tja\t二。\n";

        let created = env
            .service
            .import_problems(&ctx, wb, Box::new(Cursor::new(tsv.as_bytes().to_vec())))
            .await
            .unwrap();
        assert_eq!(created, 2);

        let problem = env.service.find_all_problems(&ctx, wb).await.unwrap()[0].clone();
        env.service
            .remove_problem(
                &ctx,
                ProblemSelector {
                    workbook_id: wb,
                    problem_id: problem.id,
                    version: problem.version,
                },
            )
            .await
            .unwrap();

        let size = quota_key(PROBLEM_TYPE, QuotaName::Size);
        let update = quota_key(PROBLEM_TYPE, QuotaName::Update);
        assert_eq!(env.quota_count(&ctx, &size).await, 1);
        assert_eq!(env.quota_count(&ctx, &update).await, 2);
    }
}
