//! Module configuration.
//!
//! Layered with figment: built-in defaults, then an optional YAML file, then
//! `STUDY__`-prefixed environment variables where `__` separates nesting
//! levels (`STUDY__QUOTAS__ENGLISH_WORD__SIZE_LIMIT=100`).

use std::path::Path;

use anyhow::{bail, Context};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use study_sdk::ProblemType;

use crate::domain::processor::QuotaPolicy;
use crate::domain::service::ServiceConfig;

pub const ENV_PREFIX: &str = "STUDY__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    pub database: DatabaseConfig,
    pub service: ServiceConfig,
    pub logging: LoggingConfig,
    pub quotas: QuotaSettings,
}

impl StudyConfig {
    /// Loads defaults, `path` when given, then the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("failed to load study configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database.url.trim().is_empty() {
            bail!("database.url must not be empty");
        }
        if self.service.default_page_size == 0 {
            bail!("service.default_page_size must be positive");
        }
        if self.service.max_page_size < self.service.default_page_size {
            bail!("service.max_page_size must not be below service.default_page_size");
        }
        for problem_type in ProblemType::ALL {
            let policy = self.quotas.policy(*problem_type);
            if policy.size_limit < 0 || policy.update_limit < 0 {
                bail!("quotas.{problem_type}: limits must not be negative");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SeaORM connection URL, e.g. `sqlite://study.db?mode=rwc`.
    pub url: String,
    /// Pool size; the driver default when unset.
    pub max_connections: Option<u32>,
    /// Apply pending migrations on startup.
    pub migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_owned(),
            max_connections: None,
            migrate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Text,
        }
    }
}

/// Limits per content type, handed to the processors' quota role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaSettings {
    pub english_word: QuotaPolicy,
    pub english_phrase: QuotaPolicy,
    pub english_sentence: QuotaPolicy,
}

impl QuotaSettings {
    #[must_use]
    pub fn policy(&self, problem_type: ProblemType) -> QuotaPolicy {
        match problem_type {
            ProblemType::EnglishWord => self.english_word,
            ProblemType::EnglishPhrase => self.english_phrase,
            ProblemType::EnglishSentence => self.english_sentence,
        }
    }
}
