use sea_orm::entity::prelude::*;

/// `ptype` is `p` for `(subject, object, action)` policies and `g` for
/// `(subject, role)` grouping policies; unused columns hold `""`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rbac_policies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    pub v2: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const PTYPE_POLICY: &str = "p";
pub const PTYPE_GROUPING: &str = "g";
