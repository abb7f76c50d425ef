//! Outbound collaborators used by content processors.
//!
//! Implementations live outside this module (HTTP clients for the
//! translation, speech synthesis and sentence corpus services). Timeouts and
//! retries belong to those implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Lang2, WordPos};

/// Errors returned by collaborator clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered but had nothing for the request.
    #[error("not found")]
    NotFound,

    /// The service could not be reached or answered with a failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// One dictionary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub text: String,
    pub pos: WordPos,
    pub translated: String,
    pub lang2: Lang2,
}

#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// Every known translation of `text`, one per part of speech.
    ///
    /// Returns [`ClientError::NotFound`] when the dictionary has no entry.
    async fn dictionary_lookup(
        &self,
        from: Lang2,
        to: Lang2,
        text: &str,
    ) -> Result<Vec<Translation>, ClientError>;

    /// The translation of `text` used as `pos`.
    async fn dictionary_lookup_with_pos(
        &self,
        from: Lang2,
        to: Lang2,
        text: &str,
        pos: WordPos,
    ) -> Result<Translation, ClientError>;
}

/// Synthesized speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audio {
    pub lang2: Lang2,
    pub text: String,
    /// Base64-encoded audio payload.
    pub content: String,
}

#[async_trait]
pub trait SynthesizerClient: Send + Sync {
    async fn synthesize(&self, lang2: Lang2, text: &str) -> Result<Audio, ClientError>;
}

/// A sentence pair from the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusSentence {
    pub sentence_number: i64,
    pub lang2: Lang2,
    pub text: String,
    pub translated_sentence_number: i64,
    pub translated_lang2: Lang2,
    pub translated: String,
    pub author: String,
}

#[async_trait]
pub trait CorpusClient: Send + Sync {
    /// Returns [`ClientError::NotFound`] for unknown sentence numbers.
    async fn find_sentence_by_sentence_number(
        &self,
        sentence_number: i64,
    ) -> Result<CorpusSentence, ClientError>;
}
