use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Eq)]
#[sea_orm(table_name = "invite_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,
    pub enabled: bool,
    pub config: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Tunables stored in the `config` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteTrackingConfig {
    /// A leave within this many hours of joining counts as fake. Zero disables it.
    pub fake_threshold_hours: u32,
    pub leaderboard_limit: u32,
}

impl Default for InviteTrackingConfig {
    fn default() -> Self {
        Self {
            fake_threshold_hours: 0,
            leaderboard_limit: 10,
        }
    }
}
