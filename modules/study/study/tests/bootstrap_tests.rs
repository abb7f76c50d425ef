#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Wiring a service from configuration alone, with collaborators that are
//! never reachable.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use study::config::StudyConfig;
use study::{bootstrap, DomainError, ProblemAddParameter, ProcessorClients};
use study_sdk::{
    Audio, ClientError, CorpusClient, CorpusSentence, Lang2, NewAppUser, NewWorkbook, ProblemType,
    SynthesizerClient, Translation, TranslationClient, WordPos,
};

struct Offline;

fn offline() -> ClientError {
    ClientError::Unavailable("offline".to_owned())
}

#[async_trait]
impl TranslationClient for Offline {
    async fn dictionary_lookup(
        &self,
        _from: Lang2,
        _to: Lang2,
        _text: &str,
    ) -> Result<Vec<Translation>, ClientError> {
        Err(offline())
    }

    async fn dictionary_lookup_with_pos(
        &self,
        _from: Lang2,
        _to: Lang2,
        _text: &str,
        _pos: WordPos,
    ) -> Result<Translation, ClientError> {
        Err(offline())
    }
}

#[async_trait]
impl SynthesizerClient for Offline {
    async fn synthesize(&self, _lang2: Lang2, _text: &str) -> Result<Audio, ClientError> {
        Err(offline())
    }
}

#[async_trait]
impl CorpusClient for Offline {
    async fn find_sentence_by_sentence_number(
        &self,
        _sentence_number: i64,
    ) -> Result<CorpusSentence, ClientError> {
        Err(offline())
    }
}

fn clients() -> ProcessorClients {
    let offline = Arc::new(Offline);
    ProcessorClients {
        translation: offline.clone(),
        synthesizer: offline.clone(),
        corpus: offline,
    }
}

fn first_owner() -> NewAppUser {
    NewAppUser {
        login_id: "owner".to_owned(),
        username: "Owner".to_owned(),
        ..NewAppUser::default()
    }
}

fn system_words() -> NewWorkbook {
    NewWorkbook {
        problem_type: ProblemType::EnglishWord,
        name: "basic words".to_owned(),
        lang2: Lang2::JA,
        question_text: String::new(),
        properties: BTreeMap::new(),
    }
}

#[tokio::test]
async fn bootstrapped_service_serves_system_content() {
    let service = bootstrap(&StudyConfig::default(), &clients()).await.unwrap();
    let org = service.add_organization("acme", first_owner()).await.unwrap();
    assert_eq!(service.find_organization_by_name("acme").await.unwrap().id, org);

    let wb = service.add_system_workbook(org, system_words()).await.unwrap();
    let ids = service
        .add_system_problem(
            org,
            &ProblemAddParameter::new(wb)
                .with_property("text", "apple")
                .with_property("translated", "りんご"),
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(service.find_system_workbook(org, "basic words").await.unwrap().id, wb);
}

#[tokio::test]
async fn unreachable_translator_surfaces_as_upstream_error() {
    let service = bootstrap(&StudyConfig::default(), &clients()).await.unwrap();
    let org = service.add_organization("acme", first_owner()).await.unwrap();
    let wb = service.add_system_workbook(org, system_words()).await.unwrap();

    let err = service
        .add_system_problem(org, &ProblemAddParameter::new(wb).with_property("text", "apple"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Upstream { .. }));
}

#[tokio::test]
async fn invalid_configuration_is_refused() {
    let mut config = StudyConfig::default();
    config.database.url = String::new();

    assert!(bootstrap(&config, &clients()).await.is_err());
}
