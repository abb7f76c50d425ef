use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "study_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub app_user_id: Uuid,
    pub workbook_id: Uuid,
    pub problem_type: String,
    pub problem_id: Uuid,
    pub study_type: String,
    pub level: i32,
    pub result_prev1: bool,
    pub memorized: bool,
    pub last_answered_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
