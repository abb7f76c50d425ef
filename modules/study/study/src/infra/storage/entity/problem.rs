use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "problems")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub version: i32,
    pub organization_id: Uuid,
    pub workbook_id: Uuid,
    pub problem_type: String,
    pub number: i32,
    /// JSON object interpreted by the processor of `problem_type`.
    pub properties: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::workbook::Entity",
        from = "Column::WorkbookId",
        to = "super::workbook::Column::Id"
    )]
    Workbook,
}

impl Related<super::workbook::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workbook.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
