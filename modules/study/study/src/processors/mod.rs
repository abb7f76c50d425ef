//! Concrete content-type strategies and the registry wiring them up.

pub mod english_phrase;
pub mod english_sentence;
pub mod english_word;

use std::sync::Arc;

use study_sdk::{
    Audio, AudioId, ClientError, CorpusClient, Lang2, ProblemType, SynthesizerClient,
    TranslationClient,
};

use crate::config::QuotaSettings;
use crate::domain::error::DomainError;
use crate::domain::processor::{ProcessorRegistry, ProcessorSet};
use crate::domain::repos::RepositoryFactory;

pub use english_phrase::EnglishPhraseProcessor;
pub use english_sentence::EnglishSentenceProcessor;
pub use english_word::EnglishWordProcessor;

/// Outbound services the processors call.
#[derive(Clone)]
pub struct ProcessorClients {
    pub translation: Arc<dyn TranslationClient>,
    pub synthesizer: Arc<dyn SynthesizerClient>,
    pub corpus: Arc<dyn CorpusClient>,
}

/// Registry with every built-in content type, limits taken from `quotas`.
#[must_use]
pub fn default_registry(quotas: &QuotaSettings, clients: &ProcessorClients) -> ProcessorRegistry {
    let word = Arc::new(EnglishWordProcessor::new(
        Arc::clone(&clients.translation),
        Arc::clone(&clients.synthesizer),
        quotas.policy(ProblemType::EnglishWord),
    ));
    let phrase = Arc::new(EnglishPhraseProcessor::new(
        quotas.policy(ProblemType::EnglishPhrase),
    ));
    let sentence = Arc::new(EnglishSentenceProcessor::new(
        Arc::clone(&clients.corpus),
        Arc::clone(&clients.synthesizer),
        quotas.policy(ProblemType::EnglishSentence),
    ));

    ProcessorRegistry::new()
        .register(
            ProblemType::EnglishWord,
            ProcessorSet {
                add: Some(word.clone()),
                update: Some(word.clone()),
                remove: Some(word.clone()),
                import: Some(word.clone()),
                quota: Some(word),
            },
        )
        .register(
            ProblemType::EnglishPhrase,
            ProcessorSet {
                add: Some(phrase.clone()),
                update: Some(phrase.clone()),
                remove: Some(phrase.clone()),
                import: None,
                quota: Some(phrase),
            },
        )
        .register(
            ProblemType::EnglishSentence,
            ProcessorSet {
                add: Some(sentence.clone()),
                update: None,
                remove: Some(sentence.clone()),
                import: Some(sentence.clone()),
                quota: Some(sentence),
            },
        )
}

/// `NotFound` from a collaborator is the caller's fault; anything else is
/// an upstream failure.
pub(crate) fn client_err(
    service: &'static str,
    not_found_message: impl FnOnce() -> String,
) -> impl FnOnce(ClientError) -> DomainError {
    move |e| match e {
        ClientError::NotFound => DomainError::plugin_client(vec![not_found_message()]),
        other => DomainError::upstream(service, other),
    }
}

/// Reuses a stored clip for `(lang2, text)` or synthesizes and stores one.
pub(crate) async fn find_or_synthesize_audio(
    repos: &dyn RepositoryFactory,
    synthesizer: &dyn SynthesizerClient,
    lang2: Lang2,
    text: &str,
) -> Result<AudioId, DomainError> {
    let audio_repo = repos.audio_repository();
    if let Some(id) = audio_repo.find_audio_id_by_text(lang2, text).await? {
        return Ok(id);
    }
    let audio: Audio = synthesizer
        .synthesize(lang2, text)
        .await
        .map_err(client_err("synthesizer", || {
            format!("speech for '{text}' is not available")
        }))?;
    let id = audio_repo.add_audio(&audio).await?;
    tracing::debug!(%lang2, text, audio_id = %id, "audio synthesized");
    Ok(id)
}
