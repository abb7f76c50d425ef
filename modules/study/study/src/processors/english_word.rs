//! `english_word`: dictionary-backed vocabulary problems.
//!
//! A word problem stores `text`, `pos`, `translated` and, when the workbook
//! enables audio, the `audioId` of the spoken word. Omitting the
//! translation asks the translation service; omitting the part of speech
//! too fans out into one problem per dictionary entry.

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use study_sdk::{
    Lang2, ProblemId, ProblemType, SynthesizerClient, Translation, TranslationClient, WordPos,
    Workbook, WorkbookId,
};

use crate::domain::error::DomainError;
use crate::domain::model::{NewProblem, Operator, ProblemSelector};
use crate::domain::processor::{
    ProblemAddParameter, ProblemAddParameterIter, ProblemAddProcessor, ProblemImportProcessor,
    ProblemQuotaProcessor, ProblemRemoveProcessor, ProblemUpdateParameter,
    ProblemUpdateProcessor, QuotaPolicy, UpdateCounts,
};
use crate::domain::repos::RepositoryFactory;

use super::{client_err, find_or_synthesize_audio};

const PROBLEM_TYPE: ProblemType = ProblemType::EnglishWord;
const SOURCE_LANG: Lang2 = Lang2::EN;

pub const TEXT: &str = "text";
pub const POS: &str = "pos";
pub const TRANSLATED: &str = "translated";
pub const AUDIO_ID: &str = "audioId";

pub struct EnglishWordProcessor {
    translation: Arc<dyn TranslationClient>,
    synthesizer: Arc<dyn SynthesizerClient>,
    quota: QuotaPolicy,
}

impl EnglishWordProcessor {
    #[must_use]
    pub fn new(
        translation: Arc<dyn TranslationClient>,
        synthesizer: Arc<dyn SynthesizerClient>,
        quota: QuotaPolicy,
    ) -> Self {
        Self {
            translation,
            synthesizer,
            quota,
        }
    }

    /// Translations for `text` under the given hints.
    ///
    /// An explicit translation is used as-is. Otherwise a known part of
    /// speech selects one dictionary entry and `Other` returns all of them.
    async fn resolve(
        &self,
        text: &str,
        pos: WordPos,
        translated: Option<&str>,
        target: Lang2,
    ) -> Result<Vec<Translation>, DomainError> {
        if let Some(translated) = translated {
            return Ok(vec![Translation {
                text: text.to_owned(),
                pos,
                translated: translated.to_owned(),
                lang2: target,
            }]);
        }

        let not_found = || format!("no translation found for '{text}'");
        let found = if pos == WordPos::Other {
            self.translation
                .dictionary_lookup(SOURCE_LANG, target, text)
                .await
                .map_err(client_err("translation", not_found))?
        } else {
            vec![self
                .translation
                .dictionary_lookup_with_pos(SOURCE_LANG, target, text, pos)
                .await
                .map_err(client_err("translation", not_found))?]
        };
        if found.is_empty() {
            return Err(DomainError::plugin_client(vec![not_found()]));
        }
        Ok(found)
    }

    async fn audio_property(
        &self,
        repos: &dyn RepositoryFactory,
        workbook: &Workbook,
        text: &str,
    ) -> Result<Option<String>, DomainError> {
        if !workbook.audio_enabled() {
            return Ok(None);
        }
        let id = find_or_synthesize_audio(repos, self.synthesizer.as_ref(), SOURCE_LANG, text)
            .await?;
        Ok(Some(id.to_string()))
    }
}

fn parse_pos(value: Option<&str>) -> Result<WordPos, DomainError> {
    value.map_or(Ok(WordPos::Other), |raw| {
        raw.parse::<WordPos>()
            .map_err(|e| DomainError::validation(POS, e.to_string()))
    })
}

fn properties(entry: &Translation, audio_id: Option<&str>) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert(TEXT.to_owned(), Value::from(entry.text.as_str()));
    props.insert(POS.to_owned(), Value::from(entry.pos.as_str()));
    props.insert(TRANSLATED.to_owned(), Value::from(entry.translated.as_str()));
    if let Some(id) = audio_id {
        props.insert(AUDIO_ID.to_owned(), Value::from(id));
    }
    props
}

#[async_trait]
impl ProblemAddProcessor for EnglishWordProcessor {
    async fn add_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        workbook: &Workbook,
        param: &ProblemAddParameter,
    ) -> Result<Vec<ProblemId>, DomainError> {
        let text = param
            .property(TEXT)
            .ok_or_else(|| DomainError::validation(TEXT, "must not be blank"))?;
        let pos = parse_pos(param.property(POS))?;
        let entries = self
            .resolve(text, pos, param.property(TRANSLATED), workbook.lang2)
            .await?;
        let audio_id = self.audio_property(repos, workbook, text).await?;

        let problem_repo = repos.problem_repository(PROBLEM_TYPE);
        let single = entries.len() == 1;
        let mut ids = Vec::with_capacity(entries.len());
        for entry in &entries {
            let id = problem_repo
                .add_problem(
                    operator,
                    workbook.id,
                    NewProblem {
                        number: if single { param.number } else { None },
                        properties: properties(entry, audio_id.as_deref()),
                    },
                )
                .await?;
            ids.push(id);
        }
        tracing::debug!(
            workbook_id = %workbook.id,
            text,
            created = ids.len(),
            "word problems added"
        );
        Ok(ids)
    }
}

#[async_trait]
impl ProblemUpdateProcessor for EnglishWordProcessor {
    /// Rewrites the selected problem with the first resolved translation.
    /// Extra dictionary entries become new problems and are reported as
    /// `added`.
    async fn update_problem(
        &self,
        repos: &dyn RepositoryFactory,
        operator: &dyn Operator,
        workbook: &Workbook,
        selector: &ProblemSelector,
        param: &ProblemUpdateParameter,
    ) -> Result<UpdateCounts, DomainError> {
        let problem_repo = repos.problem_repository(PROBLEM_TYPE);
        let current = problem_repo
            .find_by_id(operator, selector.workbook_id, selector.problem_id)
            .await?;

        let text = param
            .property(TEXT)
            .ok_or_else(|| DomainError::validation(TEXT, "must not be blank"))?;
        let pos = parse_pos(param.property(POS))?;
        let entries = self
            .resolve(text, pos, param.property(TRANSLATED), workbook.lang2)
            .await?;

        let audio_id = if current.property_str(TEXT) == Some(text) {
            current.property_str(AUDIO_ID).map(str::to_owned)
        } else {
            self.audio_property(repos, workbook, text).await?
        };

        let mut entries = entries.into_iter();
        let Some(first) = entries.next() else {
            return Ok(UpdateCounts::default());
        };
        problem_repo
            .update_problem(operator, selector, properties(&first, audio_id.as_deref()))
            .await?;

        let mut added = 0;
        for entry in entries {
            problem_repo
                .add_problem(
                    operator,
                    workbook.id,
                    NewProblem {
                        number: None,
                        properties: properties(&entry, audio_id.as_deref()),
                    },
                )
                .await?;
            added += 1;
        }
        Ok(UpdateCounts { added, updated: 1 })
    }
}

#[async_trait]
impl ProblemRemoveProcessor for EnglishWordProcessor {
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

impl ProblemImportProcessor for EnglishWordProcessor {
    /// Reads CSV with a `pos,text,translated` header. Column order is free
    /// and only `text` is mandatory.
    fn create_reader(
        &self,
        workbook_id: WorkbookId,
        source: Box<dyn Read + Send>,
    ) -> Result<ProblemAddParameterIter, DomainError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let columns = match reader.headers() {
            Ok(headers) => CsvColumns::locate(headers),
            Err(e) => Err(DomainError::validation("csv", e.to_string())),
        };
        let columns = match columns {
            Ok(columns) => columns,
            Err(e) => return Ok(Box::new(std::iter::once(Err::<ProblemAddParameter, _>(e)))),
        };

        let rows = reader
            .into_records()
            .enumerate()
            .filter_map(move |(index, record)| {
                // Header is line 1.
                let line = index + 2;
                let record = match record {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(line, error = %e, "skipping unreadable csv row");
                        return None;
                    }
                };
                columns.to_param(workbook_id, &record, line).map(Ok)
            });
        Ok(Box::new(rows))
    }
}

#[derive(Debug, Clone, Copy)]
struct CsvColumns {
    text: usize,
    pos: Option<usize>,
    translated: Option<usize>,
}

impl CsvColumns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, DomainError> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let text = find(TEXT)
            .ok_or_else(|| DomainError::validation("csv", "header has no 'text' column"))?;
        Ok(Self {
            text,
            pos: find(POS),
            translated: find(TRANSLATED),
        })
    }

    fn to_param(
        self,
        workbook_id: WorkbookId,
        record: &csv::StringRecord,
        line: usize,
    ) -> Option<ProblemAddParameter> {
        let text = record.get(self.text).filter(|t| !t.is_empty());
        let Some(text) = text else {
            tracing::warn!(line, "skipping csv row without text");
            return None;
        };

        let mut param = ProblemAddParameter::new(workbook_id).with_property(TEXT, text);
        if let Some(pos) = self.pos.and_then(|i| record.get(i)).filter(|p| !p.is_empty()) {
            if pos.parse::<WordPos>().is_err() {
                tracing::warn!(line, pos, "skipping csv row with unknown part of speech");
                return None;
            }
            param = param.with_property(POS, pos);
        }
        if let Some(translated) = self.translated.and_then(|i| record.get(i)) {
            param = param.with_property(TRANSLATED, translated);
        }
        Some(param)
    }
}

impl ProblemQuotaProcessor for EnglishWordProcessor {
    fn quota_policy(&self) -> QuotaPolicy {
        self.quota
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::Ordering;

    use study_sdk::{
        PluginErrorKind, ProblemType, QuotaName, StudyError, WorkbookPrivilege,
        AUDIO_ENABLED_PROPERTY,
    };
    use tracing_test::traced_test;

    use super::*;
    use crate::config::QuotaSettings;
    use crate::domain::quota::quota_key;
    use crate::test_support::{new_workbook, TestEnv};

    fn source(csv: &str) -> Box<dyn Read + Send> {
        Box::new(Cursor::new(csv.to_owned().into_bytes()))
    }

    fn processor(env: &TestEnv) -> EnglishWordProcessor {
        EnglishWordProcessor::new(
            env.mocks.translation.clone(),
            env.mocks.synthesizer.clone(),
            QuotaPolicy::default(),
        )
    }

    #[tokio::test]
    async fn explicit_translation_creates_one_problem_without_lookup() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;

        let param = ProblemAddParameter::new(wb)
            .with_property(TEXT, "pen")
            .with_property(POS, "noun")
            .with_property(TRANSLATED, "ペン");
        let ids = env.service.add_problem(&ctx, &param).await.unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(env.mocks.translation.calls.load(Ordering::SeqCst), 0);
        let problem = env.service.find_problem_by_id(&ctx, wb, ids[0]).await.unwrap();
        assert_eq!(problem.property_str(TRANSLATED), Some("ペン"));
        assert_eq!(problem.property_str(POS), Some("noun"));
        assert_eq!(problem.property_str(AUDIO_ID), None);
    }

    #[tokio::test]
    async fn blank_translation_and_pos_fan_out_per_dictionary_entry() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;

        let param = ProblemAddParameter::new(wb).with_property(TEXT, "book");
        let ids = env.service.add_problem(&ctx, &param).await.unwrap();

        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        let mut translated: Vec<String> = env
            .service
            .find_all_problems(&ctx, wb)
            .await
            .unwrap()
            .iter()
            .filter_map(|p| p.property_str(TRANSLATED).map(str::to_owned))
            .collect();
        translated.sort();
        assert_eq!(translated, vec!["予約する".to_owned(), "本".to_owned()]);
    }

    #[tokio::test]
    async fn known_pos_selects_a_single_dictionary_entry() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;

        let param = ProblemAddParameter::new(wb)
            .with_property(TEXT, "book")
            .with_property(POS, "verb");
        let ids = env.service.add_problem(&ctx, &param).await.unwrap();

        assert_eq!(ids.len(), 1);
        let problem = env.service.find_problem_by_id(&ctx, wb, ids[0]).await.unwrap();
        assert_eq!(problem.property_str(TRANSLATED), Some("予約する"));
    }

    #[tokio::test]
    async fn unknown_word_is_a_client_plugin_error() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;

        let param = ProblemAddParameter::new(wb).with_property(TEXT, "qwxz");
        let err = env.service.add_problem(&ctx, &param).await.unwrap_err();

        match StudyError::from(err) {
            StudyError::Plugin { kind, messages } => {
                assert_eq!(kind, PluginErrorKind::Client);
                assert!(messages[0].contains("qwxz"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(env.service.find_all_problems(&ctx, wb).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn translator_outage_is_a_server_side_failure() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;
        env.mocks.translation.set_unavailable(true);

        let param = ProblemAddParameter::new(wb).with_property(TEXT, "book");
        let err = env.service.add_problem(&ctx, &param).await.unwrap_err();

        assert!(matches!(err, DomainError::Upstream { service: "translation", .. }));
        assert!(!StudyError::from(err).is_client_error());
    }

    #[tokio::test]
    async fn audio_is_synthesized_once_per_text_when_enabled() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let mut new_wb = new_workbook(ProblemType::EnglishWord, "spoken");
        new_wb
            .properties
            .insert(AUDIO_ENABLED_PROPERTY.to_owned(), "true".to_owned());
        let wb = env.service.add_workbook(&ctx, new_wb).await.unwrap();

        let param = ProblemAddParameter::new(wb).with_property(TEXT, "book");
        let ids = env.service.add_problem(&ctx, &param).await.unwrap();

        assert_eq!(env.mocks.synthesizer.calls.load(Ordering::SeqCst), 1);
        let problems = env.service.find_problems_by_ids(&ctx, wb, &ids).await.unwrap();
        let audio_ids: Vec<&str> = problems
            .iter()
            .filter_map(|p| p.property_str(AUDIO_ID))
            .collect();
        assert_eq!(audio_ids.len(), 2);
        assert_eq!(audio_ids[0], audio_ids[1]);

        let audio_id = audio_ids[0].parse().unwrap();
        let audio = env.service.find_audio(&ctx, audio_id).await.unwrap();
        assert_eq!(audio.text, "book");
    }

    #[tokio::test]
    async fn update_fan_out_reports_extra_rows_as_added() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;
        let ids = env
            .service
            .add_problem(
                &ctx,
                &ProblemAddParameter::new(wb)
                    .with_property(TEXT, "apple")
                    .with_property(TRANSLATED, "りんご"),
            )
            .await
            .unwrap();
        let problem = env.service.find_problem_by_id(&ctx, wb, ids[0]).await.unwrap();

        let selector = ProblemSelector {
            workbook_id: wb,
            problem_id: problem.id,
            version: problem.version,
        };
        let counts = env
            .service
            .update_problem(
                &ctx,
                selector,
                &ProblemUpdateParameter::default().with_property(TEXT, "book"),
            )
            .await
            .unwrap();

        assert_eq!(counts, UpdateCounts { added: 1, updated: 1 });
        assert_eq!(env.service.find_all_problems(&ctx, wb).await.unwrap().len(), 2);
        let updated = env.service.find_problem_by_id(&ctx, wb, problem.id).await.unwrap();
        assert_eq!(updated.property_str(TEXT), Some("book"));
        assert_eq!(updated.version, problem.version + 1);

        let size = quota_key(PROBLEM_TYPE, QuotaName::Size);
        let update = quota_key(PROBLEM_TYPE, QuotaName::Update);
        assert_eq!(env.quota_count(&ctx, &size).await, 2);
        // One for the add, then one each for the rewritten and the extra row.
        assert_eq!(env.quota_count(&ctx, &update).await, 3);
    }

    #[tokio::test]
    async fn stale_version_update_is_a_conflict() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;
        let ids = env
            .service
            .add_problem(
                &ctx,
                &ProblemAddParameter::new(wb)
                    .with_property(TEXT, "apple")
                    .with_property(TRANSLATED, "りんご"),
            )
            .await
            .unwrap();

        let selector = ProblemSelector {
            workbook_id: wb,
            problem_id: ids[0],
            version: 99,
        };
        let err = env
            .service
            .update_problem(
                &ctx,
                selector,
                &ProblemUpdateParameter::default()
                    .with_property(TEXT, "apple")
                    .with_property(TRANSLATED, "林檎"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::VersionConflict { .. }));
        let problem = env.service.find_problem_by_id(&ctx, wb, ids[0]).await.unwrap();
        assert_eq!(problem.property_str(TRANSLATED), Some("りんご"));
    }

    #[tokio::test]
    async fn other_students_cannot_add_to_a_personal_workbook() {
        let env = TestEnv::new().await;
        let owner = env.owner_ctx().await;
        let wb = env.add_workbook(&owner, ProblemType::EnglishWord, "words").await;
        let intruder = env.add_student("mallory").await;

        let param = ProblemAddParameter::new(wb).with_property(TEXT, "book");
        let err = env.service.add_problem(&intruder, &param).await.unwrap_err();

        assert!(matches!(err, DomainError::PermissionDenied { .. }));
        let workbook = env.service.find_workbook_by_id(&owner, wb).await.unwrap();
        assert!(workbook.has_privilege(WorkbookPrivilege::Update));
    }

    #[tokio::test]
    #[traced_test]
    async fn csv_import_skips_malformed_rows() {
        let env = TestEnv::new().await;
        let reader = processor(&env)
            .create_reader(
                WorkbookId::nil(),
                source("pos,text,translated\nnoun,pen,ペン\nnoun,,空\nflying,cat,猫\n,book,\n"),
            )
            .unwrap();

        let params: Vec<ProblemAddParameter> = reader.map(Result::unwrap).collect();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].property(TEXT), Some("pen"));
        assert_eq!(params[0].property(TRANSLATED), Some("ペン"));
        assert_eq!(params[1].property(TEXT), Some("book"));
        assert_eq!(params[1].property(POS), None);
        assert!(logs_contain("skipping csv row without text"));
        assert!(logs_contain("skipping csv row with unknown part of speech"));
    }

    #[tokio::test]
    async fn csv_without_text_column_fails_the_iterator() {
        let env = TestEnv::new().await;
        let mut reader = processor(&env)
            .create_reader(WorkbookId::nil(), source("pos,word\nnoun,pen\n"))
            .unwrap();

        assert!(matches!(reader.next(), Some(Err(DomainError::Validation { .. }))));
        assert!(reader.next().is_none());
    }

    #[tokio::test]
    async fn import_adds_every_row_through_the_service() {
        let env = TestEnv::new().await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;

        let created = env
            .service
            .import_problems(&ctx, wb, source("text,translated\npen,ペン\nbook,\n"))
            .await
            .unwrap();

        assert_eq!(created, 3);
        assert_eq!(env.service.find_all_problems(&ctx, wb).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn quota_policy_comes_from_configuration() {
        let mut quotas = QuotaSettings::default();
        quotas.english_word.size_limit = 7;
        let env = TestEnv::with_quotas(quotas).await;
        let ctx = env.owner_ctx().await;
        let wb = env.add_workbook(&ctx, ProblemType::EnglishWord, "words").await;

        for text in ["a", "b", "c", "d", "e", "f", "g"] {
            env.service
                .add_problem(
                    &ctx,
                    &ProblemAddParameter::new(wb)
                        .with_property(TEXT, text)
                        .with_property(TRANSLATED, text),
                )
                .await
                .unwrap();
        }
        let err = env
            .service
            .add_problem(
                &ctx,
                &ProblemAddParameter::new(wb)
                    .with_property(TEXT, "h")
                    .with_property(TRANSLATED, "h"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::QuotaExceeded { ref key } if key == "english_word_size"));
    }
}
