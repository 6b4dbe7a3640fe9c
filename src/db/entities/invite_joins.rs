use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "invite_joins")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: i64,
    pub member_id: i64,
    pub member_name: String,
    pub inviter_id: Option<i64>,
    pub inviter_name: Option<String>,
    pub invite_code: String,
    pub invite_uses: i64,
    pub joined_at: DateTimeWithTimeZone,
    /// Set once a leave has been charged against this join.
    pub left_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
