use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use study_sdk::{
    Audio, AudioId, Lang2, NewWorkbook, Problem, ProblemId, ProblemSearchCondition,
    ProblemSearchResult, ProblemType, SpaceId, Workbook, WorkbookId, WorkbookPrivilege,
    WorkbookPrivileges, WorkbookSearchCondition, WorkbookSearchResult, WorkbookUpdate,
};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::model::{NewProblem, Operator, ProblemSelector, PropertyCondition};
use crate::domain::rbac::{self, RbacAction, RbacEnforcer};
use crate::domain::repos::{AudioRepository, ProblemRepository, WorkbookRepository};

use super::entity::{audio, problem, study_record, workbook};
use super::mapper::{to_json, workbook_from_model};
use super::user_sea_repo::SeaOrmRbacRepository;
use super::{db_err, insert_err};

pub struct SeaOrmWorkbookRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C> SeaOrmWorkbookRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

impl<C: ConnectionTrait + Send + Sync> SeaOrmWorkbookRepository<'_, C> {
    /// `read` grants `Read`; `write` grants `Update` and `Remove`.
    async fn privileges(
        &self,
        operator: &dyn Operator,
        space_id: SpaceId,
    ) -> Result<WorkbookPrivileges, DomainError> {
        let rbac_repo = SeaOrmRbacRepository::new(self.conn);
        let actions = RbacEnforcer::new(&rbac_repo, operator.organization_id())
            .allowed_actions(
                &rbac::user_subject(operator.app_user_id()),
                &rbac::space_object(space_id),
            )
            .await?;

        Ok(WorkbookPrivileges::new(actions.into_iter().flat_map(
            |action| match action {
                RbacAction::Read => vec![WorkbookPrivilege::Read],
                RbacAction::Write => vec![WorkbookPrivilege::Update, WorkbookPrivilege::Remove],
            },
        )))
    }

    async fn load_readable(
        &self,
        operator: &dyn Operator,
        row: Option<workbook::Model>,
        missing: impl FnOnce() -> DomainError + Send,
    ) -> Result<Workbook, DomainError> {
        let row = row.ok_or_else(missing)?;
        let privileges = self.privileges(operator, row.space_id).await?;
        if !privileges.has(WorkbookPrivilege::Read) {
            return Err(DomainError::permission_denied(
                format!("workbook_{}", row.id),
                WorkbookPrivilege::Read.as_str(),
            ));
        }
        workbook_from_model(row, privileges)
    }

    async fn load_for(
        &self,
        operator: &dyn Operator,
        id: WorkbookId,
        privilege: WorkbookPrivilege,
    ) -> Result<Workbook, DomainError> {
        let workbook = self.find_by_id(operator, id).await?;
        if !workbook.has_privilege(privilege) {
            return Err(DomainError::permission_denied(
                format!("workbook_{id}"),
                privilege.as_str(),
            ));
        }
        Ok(workbook)
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> WorkbookRepository
    for SeaOrmWorkbookRepository<'a, C>
{
    async fn find_workbooks(
        &self,
        operator: &dyn Operator,
        space_id: SpaceId,
        condition: &WorkbookSearchCondition,
    ) -> Result<WorkbookSearchResult, DomainError> {
        let privileges = self.privileges(operator, space_id).await?;
        if !privileges.has(WorkbookPrivilege::Read) {
            tracing::debug!(%space_id, "space not readable, returning no workbooks");
            return Ok(WorkbookSearchResult {
                total_count: 0,
                results: Vec::new(),
            });
        }

        let paginator = workbook::Entity::find()
            .filter(workbook::Column::OrganizationId.eq(operator.organization_id()))
            .filter(workbook::Column::SpaceId.eq(space_id))
            .order_by_asc(workbook::Column::Name)
            .paginate(self.conn, condition.page_size.max(1));
        let total_count = paginator.num_items().await.map_err(db_err)?;
        let rows = paginator
            .fetch_page(condition.page_no.saturating_sub(1))
            .await
            .map_err(db_err)?;

        let results = rows
            .into_iter()
            .map(|row| workbook_from_model(row, privileges.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WorkbookSearchResult {
            total_count,
            results,
        })
    }

    async fn find_by_id(
        &self,
        operator: &dyn Operator,
        id: WorkbookId,
    ) -> Result<Workbook, DomainError> {
        let row = workbook::Entity::find_by_id(id)
            .filter(workbook::Column::OrganizationId.eq(operator.organization_id()))
            .one(self.conn)
            .await
            .map_err(db_err)?;
        self.load_readable(operator, row, || DomainError::not_found("Workbook", id))
            .await
    }

    async fn find_by_name(
        &self,
        operator: &dyn Operator,
        space_id: SpaceId,
        name: &str,
    ) -> Result<Workbook, DomainError> {
        let row = workbook::Entity::find()
            .filter(workbook::Column::OrganizationId.eq(operator.organization_id()))
            .filter(workbook::Column::SpaceId.eq(space_id))
            .filter(workbook::Column::Name.eq(name))
            .one(self.conn)
            .await
            .map_err(db_err)?;
        let name = name.to_owned();
        self.load_readable(operator, row, move || {
            DomainError::not_found("Workbook", name)
        })
        .await
    }

    async fn add(
        &self,
        operator: &dyn Operator,
        space_id: SpaceId,
        new_workbook: NewWorkbook,
    ) -> Result<WorkbookId, DomainError> {
        let privileges = self.privileges(operator, space_id).await?;
        if !privileges.has(WorkbookPrivilege::Update) {
            return Err(DomainError::permission_denied(
                rbac::space_object(space_id),
                RbacAction::Write.as_str(),
            ));
        }

        let taken = workbook::Entity::find()
            .filter(workbook::Column::SpaceId.eq(space_id))
            .filter(workbook::Column::Name.eq(new_workbook.name.as_str()))
            .count(self.conn)
            .await
            .map_err(db_err)?;
        if taken > 0 {
            return Err(DomainError::already_exists("Workbook", &new_workbook.name));
        }

        let id = Uuid::now_v7();
        let now = Utc::now();
        workbook::ActiveModel {
            id: Set(id),
            version: Set(1),
            organization_id: Set(operator.organization_id()),
            space_id: Set(space_id),
            owner_id: Set(operator.app_user_id()),
            problem_type: Set(new_workbook.problem_type.as_str().to_owned()),
            name: Set(new_workbook.name.clone()),
            lang2: Set(new_workbook.lang2.to_string()),
            question_text: Set(new_workbook.question_text),
            properties: Set(to_json(&new_workbook.properties)?),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.conn)
        .await
        .map_err(insert_err("Workbook", &new_workbook.name))?;
        Ok(id)
    }

    async fn update(
        &self,
        operator: &dyn Operator,
        id: WorkbookId,
        version: i32,
        update: WorkbookUpdate,
    ) -> Result<(), DomainError> {
        self.load_for(operator, id, WorkbookPrivilege::Update).await?;

        let result = workbook::Entity::update_many()
            .col_expr(workbook::Column::Name, Expr::value(update.name))
            .col_expr(workbook::Column::QuestionText, Expr::value(update.question_text))
            .col_expr(
                workbook::Column::Properties,
                Expr::value(to_json(&update.properties)?),
            )
            .col_expr(workbook::Column::Version, Expr::value(version + 1))
            .col_expr(workbook::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(workbook::Column::Id.eq(id))
            .filter(workbook::Column::Version.eq(version))
            .exec(self.conn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(DomainError::version_conflict("Workbook", id, version));
        }
        Ok(())
    }

    async fn remove(
        &self,
        operator: &dyn Operator,
        id: WorkbookId,
        version: i32,
    ) -> Result<(), DomainError> {
        self.load_for(operator, id, WorkbookPrivilege::Remove).await?;

        let result = workbook::Entity::delete_many()
            .filter(workbook::Column::Id.eq(id))
            .filter(workbook::Column::Version.eq(version))
            .exec(self.conn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(DomainError::version_conflict("Workbook", id, version));
        }

        study_record::Entity::delete_many()
            .filter(study_record::Column::WorkbookId.eq(id))
            .exec(self.conn)
            .await
            .map_err(db_err)?;
        problem::Entity::delete_many()
            .filter(problem::Column::WorkbookId.eq(id))
            .exec(self.conn)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

/// Problem storage for one content type. Every call first loads the owning
/// workbook through [`SeaOrmWorkbookRepository`], so the caller's workbook
/// privileges gate problem access too.
pub struct SeaOrmProblemRepository<'a, C> {
    conn: &'a C,
    problem_type: ProblemType,
}

impl<'a, C> SeaOrmProblemRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C, problem_type: ProblemType) -> Self {
        Self { conn, problem_type }
    }
}

impl<C: ConnectionTrait + Send + Sync> SeaOrmProblemRepository<'_, C> {
    async fn workbook(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        privilege: WorkbookPrivilege,
    ) -> Result<Workbook, DomainError> {
        let workbook = SeaOrmWorkbookRepository::new(self.conn)
            .load_for(operator, workbook_id, privilege)
            .await?;
        if workbook.problem_type != self.problem_type {
            return Err(DomainError::validation(
                "problem_type",
                format!(
                    "workbook {workbook_id} holds '{}' problems, not '{}'",
                    workbook.problem_type, self.problem_type
                ),
            ));
        }
        Ok(workbook)
    }

    async fn rows(&self, workbook_id: WorkbookId) -> Result<Vec<problem::Model>, DomainError> {
        problem::Entity::find()
            .filter(problem::Column::WorkbookId.eq(workbook_id))
            .order_by_asc(problem::Column::Number)
            .all(self.conn)
            .await
            .map_err(db_err)
    }

    async fn next_number(&self, workbook_id: WorkbookId) -> Result<i32, DomainError> {
        let last = problem::Entity::find()
            .filter(problem::Column::WorkbookId.eq(workbook_id))
            .order_by_desc(problem::Column::Number)
            .one(self.conn)
            .await
            .map_err(db_err)?;
        Ok(last.map_or(1, |row| row.number + 1))
    }

    /// After a CAS touched nothing: the row is either gone or newer.
    async fn cas_failure(&self, selector: &ProblemSelector) -> Result<DomainError, DomainError> {
        let exists = problem::Entity::find_by_id(selector.problem_id)
            .filter(problem::Column::WorkbookId.eq(selector.workbook_id))
            .count(self.conn)
            .await
            .map_err(db_err)?;
        Ok(if exists > 0 {
            DomainError::version_conflict("Problem", selector.problem_id, selector.version)
        } else {
            DomainError::not_found("Problem", selector.problem_id)
        })
    }
}

fn to_problems(rows: Vec<problem::Model>) -> Result<Vec<Problem>, DomainError> {
    rows.into_iter().map(Problem::try_from).collect()
}

fn matches_keyword(problem: &Problem, keyword: &str) -> bool {
    problem
        .property_str("text")
        .is_some_and(|text| text.to_lowercase().contains(keyword))
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> ProblemRepository
    for SeaOrmProblemRepository<'a, C>
{
    async fn find_problems(
        &self,
        operator: &dyn Operator,
        condition: &ProblemSearchCondition,
    ) -> Result<ProblemSearchResult, DomainError> {
        let workbook = self
            .workbook(operator, condition.workbook_id, WorkbookPrivilege::Read)
            .await?;
        let page_size = condition.page_size.max(1);
        let page = condition.page_no.saturating_sub(1);

        let keyword = condition
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase);

        let Some(keyword) = keyword else {
            let paginator = problem::Entity::find()
                .filter(problem::Column::WorkbookId.eq(workbook.id))
                .order_by_asc(problem::Column::Number)
                .paginate(self.conn, page_size);
            let total_count = paginator.num_items().await.map_err(db_err)?;
            let rows = paginator.fetch_page(page).await.map_err(db_err)?;
            return Ok(ProblemSearchResult {
                total_count,
                results: to_problems(rows)?,
            });
        };

        let matching: Vec<Problem> = to_problems(self.rows(workbook.id).await?)?
            .into_iter()
            .filter(|p| matches_keyword(p, &keyword))
            .collect();
        let total_count = u64::try_from(matching.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(page.saturating_mul(page_size)).unwrap_or(usize::MAX);
        let take = usize::try_from(page_size).unwrap_or(usize::MAX);
        Ok(ProblemSearchResult {
            total_count,
            results: matching.into_iter().skip(skip).take(take).collect(),
        })
    }

    async fn find_all_problems(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<Vec<Problem>, DomainError> {
        self.workbook(operator, workbook_id, WorkbookPrivilege::Read)
            .await?;
        to_problems(self.rows(workbook_id).await?)
    }

    async fn find_by_ids(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        ids: &[ProblemId],
    ) -> Result<Vec<Problem>, DomainError> {
        self.workbook(operator, workbook_id, WorkbookPrivilege::Read)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = problem::Entity::find()
            .filter(problem::Column::WorkbookId.eq(workbook_id))
            .filter(problem::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(problem::Column::Number)
            .all(self.conn)
            .await
            .map_err(db_err)?;
        to_problems(rows)
    }

    async fn find_by_id(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        id: ProblemId,
    ) -> Result<Problem, DomainError> {
        self.workbook(operator, workbook_id, WorkbookPrivilege::Read)
            .await?;
        problem::Entity::find_by_id(id)
            .filter(problem::Column::WorkbookId.eq(workbook_id))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Problem", id))?
            .try_into()
    }

    async fn find_problem_ids(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<Vec<ProblemId>, DomainError> {
        self.workbook(operator, workbook_id, WorkbookPrivilege::Read)
            .await?;
        problem::Entity::find()
            .select_only()
            .column(problem::Column::Id)
            .filter(problem::Column::WorkbookId.eq(workbook_id))
            .order_by_asc(problem::Column::Number)
            .into_tuple::<Uuid>()
            .all(self.conn)
            .await
            .map_err(db_err)
    }

    async fn find_problems_by_custom_condition(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        condition: &PropertyCondition,
    ) -> Result<Vec<Problem>, DomainError> {
        self.workbook(operator, workbook_id, WorkbookPrivilege::Read)
            .await?;
        Ok(to_problems(self.rows(workbook_id).await?)?
            .into_iter()
            .filter(|p| p.properties.get(&condition.key) == Some(&condition.value))
            .collect())
    }

    async fn count_problems(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
    ) -> Result<u64, DomainError> {
        self.workbook(operator, workbook_id, WorkbookPrivilege::Read)
            .await?;
        problem::Entity::find()
            .filter(problem::Column::WorkbookId.eq(workbook_id))
            .count(self.conn)
            .await
            .map_err(db_err)
    }

    async fn add_problem(
        &self,
        operator: &dyn Operator,
        workbook_id: WorkbookId,
        new_problem: NewProblem,
    ) -> Result<ProblemId, DomainError> {
        self.workbook(operator, workbook_id, WorkbookPrivilege::Update)
            .await?;
        let number = match new_problem.number {
            Some(number) => number,
            None => self.next_number(workbook_id).await?,
        };

        let id = Uuid::now_v7();
        let now = Utc::now();
        problem::ActiveModel {
            id: Set(id),
            version: Set(1),
            organization_id: Set(operator.organization_id()),
            workbook_id: Set(workbook_id),
            problem_type: Set(self.problem_type.as_str().to_owned()),
            number: Set(number),
            properties: Set(to_json(&new_problem.properties)?),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.conn)
        .await
        .map_err(db_err)?;
        Ok(id)
    }

    async fn update_problem(
        &self,
        operator: &dyn Operator,
        selector: &ProblemSelector,
        properties: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), DomainError> {
        self.workbook(operator, selector.workbook_id, WorkbookPrivilege::Update)
            .await?;
        let result = problem::Entity::update_many()
            .col_expr(problem::Column::Properties, Expr::value(to_json(&properties)?))
            .col_expr(problem::Column::Version, Expr::value(selector.version + 1))
            .col_expr(problem::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(problem::Column::Id.eq(selector.problem_id))
            .filter(problem::Column::WorkbookId.eq(selector.workbook_id))
            .filter(problem::Column::Version.eq(selector.version))
            .exec(self.conn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(self.cas_failure(selector).await?);
        }
        Ok(())
    }

    async fn remove_problem(
        &self,
        operator: &dyn Operator,
        selector: &ProblemSelector,
    ) -> Result<(), DomainError> {
        self.workbook(operator, selector.workbook_id, WorkbookPrivilege::Update)
            .await?;
        let result = problem::Entity::delete_many()
            .filter(problem::Column::Id.eq(selector.problem_id))
            .filter(problem::Column::WorkbookId.eq(selector.workbook_id))
            .filter(problem::Column::Version.eq(selector.version))
            .exec(self.conn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(self.cas_failure(selector).await?);
        }

        study_record::Entity::delete_many()
            .filter(study_record::Column::ProblemId.eq(selector.problem_id))
            .exec(self.conn)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

pub struct SeaOrmAudioRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C> SeaOrmAudioRepository<'a, C> {
    #[must_use]
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'a, C: ConnectionTrait + Send + Sync> AudioRepository for SeaOrmAudioRepository<'a, C> {
    /// Identical `(lang2, text)` clips are stored once.
    async fn add_audio(&self, audio: &Audio) -> Result<AudioId, DomainError> {
        if let Some(id) = self.find_audio_id_by_text(audio.lang2, &audio.text).await? {
            return Ok(id);
        }
        let id = Uuid::now_v7();
        audio::ActiveModel {
            id: Set(id),
            lang2: Set(audio.lang2.to_string()),
            text: Set(audio.text.clone()),
            content: Set(audio.content.clone()),
        }
        .insert(self.conn)
        .await
        .map_err(insert_err("Audio", &audio.text))?;
        Ok(id)
    }

    async fn find_audio_by_id(&self, id: AudioId) -> Result<Audio, DomainError> {
        audio::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| DomainError::not_found("Audio", id))?
            .try_into()
    }

    async fn find_audio_id_by_text(
        &self,
        lang2: Lang2,
        text: &str,
    ) -> Result<Option<AudioId>, DomainError> {
        Ok(audio::Entity::find()
            .filter(audio::Column::Lang2.eq(lang2.as_str()))
            .filter(audio::Column::Text.eq(text))
            .one(self.conn)
            .await
            .map_err(db_err)?
            .map(|row| row.id))
    }
}
