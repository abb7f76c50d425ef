//! Public models for the study module.
//!
//! These are transport-agnostic data structures that define the contract
//! between the study module and its consumers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an organization (tenant).
pub type OrganizationId = Uuid;
/// Unique identifier for an organization member.
pub type AppUserId = Uuid;
/// Unique identifier for a user group.
pub type UserGroupId = Uuid;
/// Unique identifier for a space.
pub type SpaceId = Uuid;
/// Unique identifier for a workbook.
pub type WorkbookId = Uuid;
/// Unique identifier for a problem.
pub type ProblemId = Uuid;
/// Unique identifier for a synthesized audio clip.
pub type AudioId = Uuid;

/// A string value did not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseModelError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseModelError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// All variants in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseModelError::new($kind, s)),
                }
            }
        }
    };
}

string_enum! {
    /// Content type of a workbook and of every problem inside it.
    ProblemType, "problem type" {
        EnglishWord => "english_word",
        EnglishPhrase => "english_phrase",
        EnglishSentence => "english_sentence",
    }
}

string_enum! {
    /// How a recordbook is studied.
    StudyType, "study type" {
        Memorization => "memorization",
        Dictation => "dictation",
    }
}

string_enum! {
    /// Metered resource.
    QuotaName, "quota name" {
        /// How many problems exist.
        Size => "size",
        /// How many mutations happened in the unit window.
        Update => "update",
    }
}

string_enum! {
    /// Accounting unit of a quota counter.
    QuotaUnit, "quota unit" {
        /// Never resets.
        Persistent => "persistent",
        /// Resets when the calendar day changes.
        Day => "day",
    }
}

string_enum! {
    SpaceType, "space type" {
        Default => "default",
        Personal => "personal",
        System => "system",
    }
}

string_enum! {
    /// What the current caller may do to a workbook.
    WorkbookPrivilege, "workbook privilege" {
        Read => "read",
        Update => "update",
        Remove => "remove",
    }
}

string_enum! {
    /// Part of speech of an English word.
    WordPos, "part of speech" {
        Adjective => "adj",
        Adverb => "adv",
        Conjunction => "conj",
        Determiner => "det",
        Modal => "modal",
        Noun => "noun",
        Preposition => "prep",
        Pronoun => "pron",
        Verb => "verb",
        /// Unspecified.
        Other => "other",
    }
}

/// Two-letter ISO 639-1 language code, always lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Lang2([u8; 2]);

impl Lang2 {
    pub const EN: Self = Self(*b"en");
    pub const JA: Self = Self(*b"ja");

    #[must_use]
    pub fn as_str(&self) -> &str {
        // Constructed only from two ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl FromStr for Lang2 {
    type Err = ParseModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(ParseModelError::new("language code", s));
        }
        Ok(Self([
            bytes[0].to_ascii_lowercase(),
            bytes[1].to_ascii_lowercase(),
        ]))
    }
}

impl TryFrom<String> for Lang2 {
    type Error = ParseModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Lang2> for String {
    fn from(value: Lang2) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for Lang2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
}

/// Organization member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: AppUserId,
    pub organization_id: OrganizationId,
    pub login_id: String,
    pub username: String,
    pub roles: BTreeSet<String>,
    pub properties: BTreeMap<String, String>,
}

/// Input for creating an organization member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAppUser {
    pub login_id: String,
    pub username: String,
    pub roles: BTreeSet<String>,
    pub properties: BTreeMap<String, String>,
}

/// Resource container scoped to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub organization_id: OrganizationId,
    pub space_type: SpaceType,
    /// Personal spaces are keyed by the owner id, the system space by the
    /// system student id, the default space by `"default"`.
    pub key: String,
    pub name: String,
    pub description: String,
}

/// Set of privileges the caller holds on a workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookPrivileges(BTreeSet<WorkbookPrivilege>);

impl WorkbookPrivileges {
    #[must_use]
    pub fn new(privileges: impl IntoIterator<Item = WorkbookPrivilege>) -> Self {
        Self(privileges.into_iter().collect())
    }

    #[must_use]
    pub fn has(&self, privilege: WorkbookPrivilege) -> bool {
        self.0.contains(&privilege)
    }

    pub fn iter(&self) -> impl Iterator<Item = WorkbookPrivilege> + '_ {
        self.0.iter().copied()
    }
}

/// Property key toggling speech synthesis for a workbook.
pub const AUDIO_ENABLED_PROPERTY: &str = "audioEnabled";

/// Owned collection of problems of one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub id: WorkbookId,
    pub version: i32,
    pub space_id: SpaceId,
    pub owner_id: AppUserId,
    pub problem_type: ProblemType,
    pub name: String,
    pub lang2: Lang2,
    pub question_text: String,
    pub properties: BTreeMap<String, String>,
    /// Computed by the repository for the caller that loaded the workbook.
    pub privileges: WorkbookPrivileges,
}

impl Workbook {
    #[must_use]
    pub fn has_privilege(&self, privilege: WorkbookPrivilege) -> bool {
        self.privileges.has(privilege)
    }

    #[must_use]
    pub fn audio_enabled(&self) -> bool {
        self.properties
            .get(AUDIO_ENABLED_PROPERTY)
            .is_some_and(|v| v == "true")
    }
}

/// Input for creating a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkbook {
    pub problem_type: ProblemType,
    pub name: String,
    pub lang2: Lang2,
    pub question_text: String,
    pub properties: BTreeMap<String, String>,
}

/// Full replacement of a workbook's mutable attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookUpdate {
    pub name: String,
    pub question_text: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkbookSearchCondition {
    /// 1-based.
    pub page_no: u64,
    pub page_size: u64,
}

impl Default for WorkbookSearchCondition {
    fn default() -> Self {
        Self {
            page_no: 1,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookSearchResult {
    pub total_count: u64,
    pub results: Vec<Workbook>,
}

/// An item inside exactly one workbook.
///
/// `properties` is a JSON object interpreted only by the processor
/// registered for `problem_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: ProblemId,
    pub version: i32,
    pub workbook_id: WorkbookId,
    pub number: i32,
    pub problem_type: ProblemType,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Problem {
    /// String value of a top-level property, if present.
    #[must_use]
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemSearchCondition {
    pub workbook_id: WorkbookId,
    /// 1-based.
    pub page_no: u64,
    pub page_size: u64,
    /// Case-insensitive substring match on the `text` property.
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProblemSearchResult {
    pub total_count: u64,
    pub results: Vec<Problem>,
}

/// Mastery state of one problem for one study type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub problem_id: ProblemId,
    /// Always within `0..=StudyRecord::MAX_LEVEL`.
    pub level: i32,
    pub result_prev1: bool,
    pub memorized: bool,
    pub last_answered_at: Option<DateTime<Utc>>,
}

impl StudyRecord {
    pub const MIN_LEVEL: i32 = 0;
    pub const MAX_LEVEL: i32 = 10;

    /// Record of a problem that has never been answered.
    #[must_use]
    pub fn unanswered(problem_id: ProblemId) -> Self {
        Self {
            problem_id,
            level: Self::MIN_LEVEL,
            result_prev1: false,
            memorized: false,
            last_answered_at: None,
        }
    }
}

/// Completion percentage per study type for one workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordbookSummary {
    pub workbook_id: WorkbookId,
    pub completion_rates: BTreeMap<StudyType, u32>,
}
