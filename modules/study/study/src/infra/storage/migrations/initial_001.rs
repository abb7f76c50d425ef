use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::ConnectionTrait;

#[derive(DeriveMigrationName)]
pub struct Migration;

const POSTGRES_UP: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id UUID PRIMARY KEY NOT NULL,
    name VARCHAR(40) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_organizations_name ON organizations(name);

CREATE TABLE IF NOT EXISTS app_users (
    id UUID PRIMARY KEY NOT NULL,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    login_id VARCHAR(200) NOT NULL,
    username VARCHAR(40) NOT NULL,
    roles TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_app_users_login_id ON app_users(organization_id, login_id);

CREATE TABLE IF NOT EXISTS user_groups (
    id UUID PRIMARY KEY NOT NULL,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    key VARCHAR(20) NOT NULL,
    name VARCHAR(40) NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_user_groups_key ON user_groups(organization_id, key);

CREATE TABLE IF NOT EXISTS spaces (
    id UUID PRIMARY KEY NOT NULL,
    organization_id UUID NOT NULL REFERENCES organizations(id),
    space_type VARCHAR(20) NOT NULL,
    key VARCHAR(40) NOT NULL,
    name VARCHAR(40) NOT NULL,
    description TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_spaces_key ON spaces(organization_id, space_type, key);

CREATE TABLE IF NOT EXISTS rbac_policies (
    id UUID PRIMARY KEY NOT NULL,
    organization_id UUID NOT NULL,
    ptype VARCHAR(8) NOT NULL,
    v0 VARCHAR(100) NOT NULL,
    v1 VARCHAR(100) NOT NULL,
    v2 VARCHAR(100) NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_rbac_policies_tuple ON rbac_policies(organization_id, ptype, v0, v1, v2);

CREATE TABLE IF NOT EXISTS workbooks (
    id UUID PRIMARY KEY NOT NULL,
    version INTEGER NOT NULL,
    organization_id UUID NOT NULL,
    space_id UUID NOT NULL REFERENCES spaces(id),
    owner_id UUID NOT NULL REFERENCES app_users(id),
    problem_type VARCHAR(40) NOT NULL,
    name VARCHAR(40) NOT NULL,
    lang2 VARCHAR(2) NOT NULL,
    question_text TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_workbooks_name ON workbooks(space_id, name);

CREATE TABLE IF NOT EXISTS problems (
    id UUID PRIMARY KEY NOT NULL,
    version INTEGER NOT NULL,
    organization_id UUID NOT NULL,
    workbook_id UUID NOT NULL REFERENCES workbooks(id) ON DELETE CASCADE,
    problem_type VARCHAR(40) NOT NULL,
    number INTEGER NOT NULL,
    properties TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_problems_workbook ON problems(workbook_id, number);

CREATE TABLE IF NOT EXISTS audios (
    id UUID PRIMARY KEY NOT NULL,
    lang2 VARCHAR(2) NOT NULL,
    text VARCHAR(100) NOT NULL,
    content TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_audios_text ON audios(lang2, text);

CREATE TABLE IF NOT EXISTS user_quotas (
    id UUID PRIMARY KEY NOT NULL,
    organization_id UUID NOT NULL,
    app_user_id UUID NOT NULL REFERENCES app_users(id),
    quota_key VARCHAR(60) NOT NULL,
    unit VARCHAR(20) NOT NULL,
    count BIGINT NOT NULL,
    date DATE NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_user_quotas_key ON user_quotas(app_user_id, quota_key);

CREATE TABLE IF NOT EXISTS study_records (
    id UUID PRIMARY KEY NOT NULL,
    organization_id UUID NOT NULL,
    app_user_id UUID NOT NULL REFERENCES app_users(id),
    workbook_id UUID NOT NULL REFERENCES workbooks(id) ON DELETE CASCADE,
    problem_type VARCHAR(40) NOT NULL,
    problem_id UUID NOT NULL,
    study_type VARCHAR(20) NOT NULL,
    level INTEGER NOT NULL,
    result_prev1 BOOLEAN NOT NULL,
    memorized BOOLEAN NOT NULL,
    last_answered_at TIMESTAMPTZ NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_study_records_problem
    ON study_records(app_user_id, workbook_id, problem_id, study_type);
"#;

const MYSQL_UP: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    name VARCHAR(40) NOT NULL,
    created_at TIMESTAMP NOT NULL,
    UNIQUE KEY idx_organizations_name (name)
);

CREATE TABLE IF NOT EXISTS app_users (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    login_id VARCHAR(200) NOT NULL,
    username VARCHAR(40) NOT NULL,
    roles TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL,
    UNIQUE KEY idx_app_users_login_id (organization_id, login_id)
);

CREATE TABLE IF NOT EXISTS user_groups (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    `key` VARCHAR(20) NOT NULL,
    name VARCHAR(40) NOT NULL,
    UNIQUE KEY idx_user_groups_key (organization_id, `key`)
);

CREATE TABLE IF NOT EXISTS spaces (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    space_type VARCHAR(20) NOT NULL,
    `key` VARCHAR(40) NOT NULL,
    name VARCHAR(40) NOT NULL,
    description TEXT NOT NULL,
    UNIQUE KEY idx_spaces_key (organization_id, space_type, `key`)
);

CREATE TABLE IF NOT EXISTS rbac_policies (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    ptype VARCHAR(8) NOT NULL,
    v0 VARCHAR(100) NOT NULL,
    v1 VARCHAR(100) NOT NULL,
    v2 VARCHAR(100) NOT NULL,
    UNIQUE KEY idx_rbac_policies_tuple (organization_id, ptype, v0, v1, v2)
);

CREATE TABLE IF NOT EXISTS workbooks (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    version INT NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    space_id VARCHAR(36) NOT NULL,
    owner_id VARCHAR(36) NOT NULL,
    problem_type VARCHAR(40) NOT NULL,
    name VARCHAR(40) NOT NULL,
    lang2 VARCHAR(2) NOT NULL,
    question_text TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL,
    UNIQUE KEY idx_workbooks_name (space_id, name)
);

CREATE TABLE IF NOT EXISTS problems (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    version INT NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    workbook_id VARCHAR(36) NOT NULL,
    problem_type VARCHAR(40) NOT NULL,
    number INT NOT NULL,
    properties TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL,
    updated_at TIMESTAMP NOT NULL,
    KEY idx_problems_workbook (workbook_id, number)
);

CREATE TABLE IF NOT EXISTS audios (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    lang2 VARCHAR(2) NOT NULL,
    text VARCHAR(100) NOT NULL,
    content MEDIUMTEXT NOT NULL,
    UNIQUE KEY idx_audios_text (lang2, text)
);

CREATE TABLE IF NOT EXISTS user_quotas (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    app_user_id VARCHAR(36) NOT NULL,
    quota_key VARCHAR(60) NOT NULL,
    unit VARCHAR(20) NOT NULL,
    count BIGINT NOT NULL,
    date DATE NOT NULL,
    UNIQUE KEY idx_user_quotas_key (app_user_id, quota_key)
);

CREATE TABLE IF NOT EXISTS study_records (
    id VARCHAR(36) PRIMARY KEY NOT NULL,
    organization_id VARCHAR(36) NOT NULL,
    app_user_id VARCHAR(36) NOT NULL,
    workbook_id VARCHAR(36) NOT NULL,
    problem_type VARCHAR(40) NOT NULL,
    problem_id VARCHAR(36) NOT NULL,
    study_type VARCHAR(20) NOT NULL,
    level INT NOT NULL,
    result_prev1 BOOLEAN NOT NULL,
    memorized BOOLEAN NOT NULL,
    last_answered_at TIMESTAMP NULL,
    UNIQUE KEY idx_study_records_problem (app_user_id, workbook_id, problem_id, study_type)
);
"#;

const SQLITE_UP: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_organizations_name ON organizations(name);

CREATE TABLE IF NOT EXISTS app_users (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    login_id TEXT NOT NULL,
    username TEXT NOT NULL,
    roles TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_app_users_login_id ON app_users(organization_id, login_id);

CREATE TABLE IF NOT EXISTS user_groups (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    key TEXT NOT NULL,
    name TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_user_groups_key ON user_groups(organization_id, key);

CREATE TABLE IF NOT EXISTS spaces (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    space_type TEXT NOT NULL,
    key TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_spaces_key ON spaces(organization_id, space_type, key);

CREATE TABLE IF NOT EXISTS rbac_policies (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    ptype TEXT NOT NULL,
    v0 TEXT NOT NULL,
    v1 TEXT NOT NULL,
    v2 TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_rbac_policies_tuple ON rbac_policies(organization_id, ptype, v0, v1, v2);

CREATE TABLE IF NOT EXISTS workbooks (
    id TEXT PRIMARY KEY NOT NULL,
    version INTEGER NOT NULL,
    organization_id TEXT NOT NULL,
    space_id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    problem_type TEXT NOT NULL,
    name TEXT NOT NULL,
    lang2 TEXT NOT NULL,
    question_text TEXT NOT NULL,
    properties TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_workbooks_name ON workbooks(space_id, name);

CREATE TABLE IF NOT EXISTS problems (
    id TEXT PRIMARY KEY NOT NULL,
    version INTEGER NOT NULL,
    organization_id TEXT NOT NULL,
    workbook_id TEXT NOT NULL,
    problem_type TEXT NOT NULL,
    number INTEGER NOT NULL,
    properties TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_problems_workbook ON problems(workbook_id, number);

CREATE TABLE IF NOT EXISTS audios (
    id TEXT PRIMARY KEY NOT NULL,
    lang2 TEXT NOT NULL,
    text TEXT NOT NULL,
    content TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_audios_text ON audios(lang2, text);

CREATE TABLE IF NOT EXISTS user_quotas (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    app_user_id TEXT NOT NULL,
    quota_key TEXT NOT NULL,
    unit TEXT NOT NULL,
    count INTEGER NOT NULL,
    date TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_user_quotas_key ON user_quotas(app_user_id, quota_key);

CREATE TABLE IF NOT EXISTS study_records (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    app_user_id TEXT NOT NULL,
    workbook_id TEXT NOT NULL,
    problem_type TEXT NOT NULL,
    problem_id TEXT NOT NULL,
    study_type TEXT NOT NULL,
    level INTEGER NOT NULL,
    result_prev1 INTEGER NOT NULL,
    memorized INTEGER NOT NULL,
    last_answered_at TEXT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_study_records_problem
    ON study_records(app_user_id, workbook_id, problem_id, study_type);
"#;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let conn = manager.get_connection();

        let sql = match backend {
            sea_orm::DatabaseBackend::Postgres => POSTGRES_UP,
            sea_orm::DatabaseBackend::MySql => MYSQL_UP,
            sea_orm::DatabaseBackend::Sqlite => SQLITE_UP,
        };

        // MySQL rejects multi-statement strings on a prepared connection.
        for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            conn.execute_unprepared(statement).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for table in [
            "study_records",
            "user_quotas",
            "audios",
            "problems",
            "workbooks",
            "rbac_policies",
            "spaces",
            "user_groups",
            "app_users",
            "organizations",
        ] {
            conn.execute_unprepared(&format!("DROP TABLE IF EXISTS {table};"))
                .await?;
        }
        Ok(())
    }
}
