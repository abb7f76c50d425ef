#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Shared fixtures: in-memory database, fixed clock, collaborator mocks and
//! a bootstrapped organization.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;
use study_sdk::{
    Audio, ClientError, CorpusClient, CorpusSentence, Lang2, NewAppUser, NewWorkbook,
    OrganizationId, ProblemType, SecurityContext, SynthesizerClient, Translation,
    TranslationClient, WordPos, WorkbookId,
};

use crate::config::QuotaSettings;
use crate::domain::clock::Clock;
use crate::domain::model::{SYSTEM_OWNER_LOGIN_ID, SYSTEM_STUDENT_LOGIN_ID};
use crate::domain::processor::ProcessorRegistry;
use crate::domain::repos::UserRepositoryFactory;
use crate::domain::service::{Service, ServiceConfig};
use crate::infra::storage::entity::user_quota;
use crate::infra::storage::migrations::Migrator;
use crate::infra::storage::SeaOrmRepositoryFactory;
use crate::processors::{default_registry, ProcessorClients};

/// Fresh in-memory SQLite database with all migrations applied.
pub async fn inmem_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn at_noon(year: i32, month: u32, day: u32) -> Self {
        Self::new(Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap())
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn translation(text: &str, pos: WordPos, translated: &str) -> Translation {
    Translation {
        text: text.to_owned(),
        pos,
        translated: translated.to_owned(),
        lang2: Lang2::JA,
    }
}

/// Dictionary keyed by source text.
#[derive(Default)]
pub struct MockTranslationClient {
    entries: Mutex<HashMap<String, Vec<Translation>>>,
    unavailable: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl MockTranslationClient {
    pub fn with_entries(entries: Vec<Translation>) -> Self {
        let client = Self::default();
        for entry in entries {
            client
                .entries
                .lock()
                .unwrap()
                .entry(entry.text.clone())
                .or_default()
                .push(entry);
        }
        client
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    fn lookup(&self, text: &str) -> Result<Vec<Translation>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.unavailable.lock().unwrap() {
            return Err(ClientError::Unavailable("translator is down".to_owned()));
        }
        match self.entries.lock().unwrap().get(text) {
            Some(found) if !found.is_empty() => Ok(found.clone()),
            _ => Err(ClientError::NotFound),
        }
    }
}

#[async_trait]
impl TranslationClient for MockTranslationClient {
    async fn dictionary_lookup(
        &self,
        _from: Lang2,
        _to: Lang2,
        text: &str,
    ) -> Result<Vec<Translation>, ClientError> {
        self.lookup(text)
    }

    async fn dictionary_lookup_with_pos(
        &self,
        _from: Lang2,
        _to: Lang2,
        text: &str,
        pos: WordPos,
    ) -> Result<Translation, ClientError> {
        self.lookup(text)?
            .into_iter()
            .find(|t| t.pos == pos)
            .ok_or(ClientError::NotFound)
    }
}

/// Returns a deterministic payload per text and counts calls.
#[derive(Default)]
pub struct MockSynthesizerClient {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SynthesizerClient for MockSynthesizerClient {
    async fn synthesize(&self, lang2: Lang2, text: &str) -> Result<Audio, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Audio {
            lang2,
            text: text.to_owned(),
            content: format!("audio:{text}"),
        })
    }
}

#[derive(Default)]
pub struct MockCorpusClient {
    sentences: BTreeMap<i64, CorpusSentence>,
}

impl MockCorpusClient {
    pub fn with_sentence(mut self, number: i64, text: &str, translated: &str) -> Self {
        self.sentences.insert(
            number,
            CorpusSentence {
                sentence_number: number,
                lang2: Lang2::EN,
                text: text.to_owned(),
                translated_sentence_number: number + 100_000,
                translated_lang2: Lang2::JA,
                translated: translated.to_owned(),
                author: "corpus".to_owned(),
            },
        );
        self
    }
}

#[async_trait]
impl CorpusClient for MockCorpusClient {
    async fn find_sentence_by_sentence_number(
        &self,
        sentence_number: i64,
    ) -> Result<CorpusSentence, ClientError> {
        self.sentences
            .get(&sentence_number)
            .cloned()
            .ok_or(ClientError::NotFound)
    }
}

/// Mocks behind [`ProcessorClients`], kept concrete for assertions.
pub struct Mocks {
    pub translation: Arc<MockTranslationClient>,
    pub synthesizer: Arc<MockSynthesizerClient>,
    pub corpus: Arc<MockCorpusClient>,
}

impl Default for Mocks {
    fn default() -> Self {
        Self {
            translation: Arc::new(MockTranslationClient::with_entries(vec![
                translation("book", WordPos::Noun, "本"),
                translation("book", WordPos::Verb, "予約する"),
                translation("apple", WordPos::Noun, "りんご"),
            ])),
            synthesizer: Arc::new(MockSynthesizerClient::default()),
            corpus: Arc::new(
                MockCorpusClient::default()
                    .with_sentence(1, "I have a pen.", "私はペンを持っています。")
                    .with_sentence(2, "It is raining.", "雨が降っています。"),
            ),
        }
    }
}

impl Mocks {
    pub fn clients(&self) -> ProcessorClients {
        ProcessorClients {
            translation: self.translation.clone(),
            synthesizer: self.synthesizer.clone(),
            corpus: self.corpus.clone(),
        }
    }
}

pub const ORG_NAME: &str = "acme";
pub const FIRST_OWNER_LOGIN_ID: &str = "owner";

/// A bootstrapped organization behind a [`Service`].
pub struct TestEnv {
    pub db: DatabaseConnection,
    pub clock: Arc<FixedClock>,
    pub mocks: Mocks,
    pub service: Service,
    pub organization_id: OrganizationId,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_quotas(QuotaSettings::default()).await
    }

    pub async fn with_quotas(quotas: QuotaSettings) -> Self {
        let mocks = Mocks::default();
        let registry = default_registry(&quotas, &mocks.clients());
        Self::with_registry(registry, mocks).await
    }

    pub async fn with_registry(registry: ProcessorRegistry, mocks: Mocks) -> Self {
        let db = inmem_db().await;
        let clock = Arc::new(FixedClock::at_noon(2024, 4, 1));
        let service = Service::new(
            db.clone(),
            Arc::new(registry),
            clock.clone(),
            ServiceConfig::default(),
        );
        let organization_id = service
            .add_organization(ORG_NAME, new_user(FIRST_OWNER_LOGIN_ID))
            .await
            .unwrap();
        Self {
            db,
            clock,
            mocks,
            service,
            organization_id,
        }
    }

    pub fn repos(&self) -> SeaOrmRepositoryFactory<'_, DatabaseConnection> {
        SeaOrmRepositoryFactory::new(&self.db, self.clock.clone())
    }

    pub async fn ctx_for(&self, login_id: &str) -> SecurityContext {
        let user = self
            .repos()
            .app_user_repository()
            .find_by_login_id(self.organization_id, login_id)
            .await
            .unwrap();
        SecurityContext::builder()
            .organization_id(self.organization_id)
            .app_user_id(user.id)
            .request_id("test")
            .build()
    }

    pub async fn system_owner_ctx(&self) -> SecurityContext {
        self.ctx_for(SYSTEM_OWNER_LOGIN_ID).await
    }

    pub async fn system_student_ctx(&self) -> SecurityContext {
        self.ctx_for(SYSTEM_STUDENT_LOGIN_ID).await
    }

    /// The member created with the organization.
    pub async fn owner_ctx(&self) -> SecurityContext {
        self.ctx_for(FIRST_OWNER_LOGIN_ID).await
    }

    pub async fn add_student(&self, login_id: &str) -> SecurityContext {
        let owner = self.system_owner_ctx().await;
        self.service
            .add_app_user(&owner, new_user(login_id))
            .await
            .unwrap();
        self.ctx_for(login_id).await
    }

    /// Raw stored counter, 0 when the row does not exist yet.
    pub async fn quota_count(&self, ctx: &SecurityContext, key: &str) -> i64 {
        user_quota::Entity::find()
            .filter(user_quota::Column::AppUserId.eq(ctx.app_user_id()))
            .filter(user_quota::Column::QuotaKey.eq(key))
            .one(&self.db)
            .await
            .unwrap()
            .map_or(0, |row| row.count)
    }

    pub async fn add_workbook(
        &self,
        ctx: &SecurityContext,
        problem_type: ProblemType,
        name: &str,
    ) -> WorkbookId {
        self.service
            .add_workbook(ctx, new_workbook(problem_type, name))
            .await
            .unwrap()
    }
}

pub fn new_user(login_id: &str) -> NewAppUser {
    NewAppUser {
        login_id: login_id.to_owned(),
        username: login_id.to_uppercase(),
        ..NewAppUser::default()
    }
}

pub fn new_workbook(problem_type: ProblemType, name: &str) -> NewWorkbook {
    NewWorkbook {
        problem_type,
        name: name.to_owned(),
        lang2: Lang2::JA,
        question_text: String::new(),
        properties: BTreeMap::new(),
    }
}
