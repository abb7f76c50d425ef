//! Conversions between SeaORM rows and SDK contract types.
//!
//! Text columns holding enums or JSON are parsed here; a row that does not
//! parse is reported as a database error.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use study_sdk::{
    AppUser, Audio, Organization, Problem, Space, StudyRecord, Workbook, WorkbookPrivileges,
};

use crate::domain::error::DomainError;
use crate::domain::model::UserGroup;

use super::entity::{
    app_user, audio, organization, problem, space, study_record, user_group, workbook,
};

fn parse<T>(column: &str, value: &str) -> Result<T, DomainError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| DomainError::database(format!("column {column}: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, value: &str) -> Result<T, DomainError> {
    serde_json::from_str(value)
        .map_err(|e| DomainError::database(format!("column {column}: {e}")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DomainError> {
    serde_json::to_string(value).map_err(|e| DomainError::database(e.to_string()))
}

impl From<organization::Model> for Organization {
    fn from(m: organization::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
        }
    }
}

impl From<user_group::Model> for UserGroup {
    fn from(m: user_group::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            key: m.key,
            name: m.name,
        }
    }
}

impl TryFrom<audio::Model> for Audio {
    type Error = DomainError;

    fn try_from(m: audio::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            lang2: parse("lang2", &m.lang2)?,
            text: m.text,
            content: m.content,
        })
    }
}

impl TryFrom<app_user::Model> for AppUser {
    type Error = DomainError;

    fn try_from(m: app_user::Model) -> Result<Self, Self::Error> {
        let roles: BTreeSet<String> = from_json("roles", &m.roles)?;
        let properties: BTreeMap<String, String> = from_json("properties", &m.properties)?;
        Ok(Self {
            id: m.id,
            organization_id: m.organization_id,
            login_id: m.login_id,
            username: m.username,
            roles,
            properties,
        })
    }
}

impl TryFrom<space::Model> for Space {
    type Error = DomainError;

    fn try_from(m: space::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: m.id,
            organization_id: m.organization_id,
            space_type: parse("space_type", &m.space_type)?,
            key: m.key,
            name: m.name,
            description: m.description,
        })
    }
}

/// Privileges are computed per caller and are not part of the row.
pub(crate) fn workbook_from_model(
    m: workbook::Model,
    privileges: WorkbookPrivileges,
) -> Result<Workbook, DomainError> {
    Ok(Workbook {
        id: m.id,
        version: m.version,
        space_id: m.space_id,
        owner_id: m.owner_id,
        problem_type: parse("problem_type", &m.problem_type)?,
        name: m.name,
        lang2: parse("lang2", &m.lang2)?,
        question_text: m.question_text,
        properties: from_json("properties", &m.properties)?,
        privileges,
    })
}

impl TryFrom<problem::Model> for Problem {
    type Error = DomainError;

    fn try_from(m: problem::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: m.id,
            version: m.version,
            workbook_id: m.workbook_id,
            number: m.number,
            problem_type: parse("problem_type", &m.problem_type)?,
            properties: from_json("properties", &m.properties)?,
        })
    }
}

impl From<study_record::Model> for StudyRecord {
    fn from(m: study_record::Model) -> Self {
        Self {
            problem_id: m.problem_id,
            level: m.level.clamp(Self::MIN_LEVEL, Self::MAX_LEVEL),
            result_prev1: m.result_prev1,
            memorized: m.memorized,
            last_answered_at: m.last_answered_at,
        }
    }
}
