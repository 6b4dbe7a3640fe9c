use super::error::InviteError;
use super::model::{InviteView, JoinRecord};
use super::stats::{InviterStats, StatsUpdate};
use crate::db::entities::invite_configs::{self, InviteTrackingConfig};
use crate::db::entities::{invite_joins, invite_stats, invites};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

/// Per-guild settings as stored, or defaults when the guild never configured anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSettings {
    pub enabled: bool,
    pub config: InviteTrackingConfig,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            config: InviteTrackingConfig::default(),
        }
    }
}

/// Persistent side of invite tracking: invite metadata, join records and inviter stats.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn settings(&self, guild_id: u64) -> Result<GuildSettings, InviteError>;

    async fn save_settings(&self, guild_id: u64, settings: &GuildSettings) -> Result<(), InviteError>;

    async fn save_invites(&self, guild_id: u64, invites: &[InviteView]) -> Result<(), InviteError>;

    async fn delete_invite(&self, guild_id: u64, code: &str) -> Result<(), InviteError>;

    async fn record_join(&self, record: &JoinRecord) -> Result<(), InviteError>;

    /// Most recent join record for the member, if the join was attributed.
    async fn latest_join(&self, guild_id: u64, member_id: u64) -> Result<Option<JoinRecord>, InviteError>;

    /// Marks the member's most recent join as left and returns it.
    /// `None` when there is no join on record or it was already closed by an earlier leave.
    async fn close_join(&self, guild_id: u64, member_id: u64) -> Result<Option<JoinRecord>, InviteError>;

    /// Returns the counters after the update, or `None` when the update was skipped
    /// because the inviter has no stats yet and the update cannot create them.
    async fn apply_stats(
        &self,
        guild_id: u64,
        user_id: u64,
        update: StatsUpdate,
    ) -> Result<Option<InviterStats>, InviteError>;

    async fn stats(&self, guild_id: u64, user_id: u64) -> Result<Option<InviterStats>, InviteError>;

    /// Inviters ordered by derived total, highest first.
    async fn top_inviters(&self, guild_id: u64, limit: usize) -> Result<Vec<(u64, InviterStats)>, InviteError>;
}

pub struct DbLedger {
    db: DatabaseConnection,
}

impl DbLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn latest_join_row(
        &self,
        guild_id: u64,
        member_id: u64,
    ) -> Result<Option<invite_joins::Model>, InviteError> {
        let row = invite_joins::Entity::find()
            .filter(invite_joins::Column::GuildId.eq(guild_id as i64))
            .filter(invite_joins::Column::MemberId.eq(member_id as i64))
            .order_by_desc(invite_joins::Column::Id)
            .one(&self.db)
            .await?;

        Ok(row)
    }
}

impl From<&invite_joins::Model> for JoinRecord {
    fn from(row: &invite_joins::Model) -> Self {
        Self {
            guild_id: row.guild_id as u64,
            member_id: row.member_id as u64,
            member_name: row.member_name.clone(),
            inviter_id: row.inviter_id.map(|id| id as u64),
            inviter_name: row.inviter_name.clone(),
            invite_code: row.invite_code.clone(),
            observed_uses: row.invite_uses as u64,
            joined_at: row.joined_at.into(),
        }
    }
}

#[async_trait]
impl Ledger for DbLedger {
    async fn settings(&self, guild_id: u64) -> Result<GuildSettings, InviteError> {
        let row = invite_configs::Entity::find_by_id(guild_id as i64)
            .one(&self.db)
            .await?;

        match row {
            Some(row) => Ok(GuildSettings {
                enabled: row.enabled,
                config: serde_json::from_value(row.config)?,
            }),
            None => Ok(GuildSettings::default()),
        }
    }

    async fn save_settings(&self, guild_id: u64, settings: &GuildSettings) -> Result<(), InviteError> {
        let model = invite_configs::ActiveModel {
            guild_id: Set(guild_id as i64),
            enabled: Set(settings.enabled),
            config: Set(serde_json::to_value(&settings.config)?),
        };

        invite_configs::Entity::insert(model)
            .on_conflict(
                OnConflict::column(invite_configs::Column::GuildId)
                    .update_columns([invite_configs::Column::Enabled, invite_configs::Column::Config])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn save_invites(&self, guild_id: u64, current: &[InviteView]) -> Result<(), InviteError> {
        let now = Utc::now();

        for invite in current {
            let model = invites::ActiveModel {
                guild_id: Set(guild_id as i64),
                code: Set(invite.code.clone()),
                uses: Set(invite.uses as i64),
                creator_id: Set(invite.inviter_id.map(|id| id as i64)),
                channel_id: Set(invite.channel_id.map(|id| id as i64)),
                max_uses: Set(invite.max_uses.map(|v| v as i32)),
                max_age: Set(invite.max_age.map(|v| v as i32)),
                created_at: Set(invite.created_at.into()),
                last_synced_at: Set(now.into()),
            };

            invites::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([invites::Column::GuildId, invites::Column::Code])
                        .update_columns([invites::Column::Uses, invites::Column::LastSyncedAt])
                        .to_owned(),
                )
                .exec(&self.db)
                .await?;
        }

        Ok(())
    }

    async fn delete_invite(&self, guild_id: u64, code: &str) -> Result<(), InviteError> {
        invites::Entity::delete_many()
            .filter(invites::Column::GuildId.eq(guild_id as i64))
            .filter(invites::Column::Code.eq(code))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn record_join(&self, record: &JoinRecord) -> Result<(), InviteError> {
        let model = invite_joins::ActiveModel {
            guild_id: Set(record.guild_id as i64),
            member_id: Set(record.member_id as i64),
            member_name: Set(record.member_name.clone()),
            inviter_id: Set(record.inviter_id.map(|id| id as i64)),
            inviter_name: Set(record.inviter_name.clone()),
            invite_code: Set(record.invite_code.clone()),
            invite_uses: Set(record.observed_uses as i64),
            joined_at: Set(record.joined_at.into()),
            ..Default::default()
        };

        model.insert(&self.db).await?;
        Ok(())
    }

    async fn latest_join(&self, guild_id: u64, member_id: u64) -> Result<Option<JoinRecord>, InviteError> {
        let row = self.latest_join_row(guild_id, member_id).await?;
        Ok(row.as_ref().map(JoinRecord::from))
    }

    async fn close_join(&self, guild_id: u64, member_id: u64) -> Result<Option<JoinRecord>, InviteError> {
        let Some(row) = self.latest_join_row(guild_id, member_id).await? else {
            return Ok(None);
        };
        if row.left_at.is_some() {
            return Ok(None);
        }

        let record = JoinRecord::from(&row);

        let mut active: invite_joins::ActiveModel = row.into();
        active.left_at = Set(Some(Utc::now().into()));
        active.update(&self.db).await?;

        Ok(Some(record))
    }

    async fn apply_stats(
        &self,
        guild_id: u64,
        user_id: u64,
        update: StatsUpdate,
    ) -> Result<Option<InviterStats>, InviteError> {
        let existing = invite_stats::Entity::find_by_id((guild_id as i64, user_id as i64))
            .one(&self.db)
            .await?;

        let now = Utc::now();

        match existing {
            Some(row) => {
                let next = InviterStats::from(&row).apply(update);

                let mut active: invite_stats::ActiveModel = row.into();
                active.regular_invites = Set(next.regular);
                active.left_invites = Set(next.left);
                active.fake_invites = Set(next.fake);
                active.bonus_invites = Set(next.bonus);
                active.updated_at = Set(now.into());
                active.update(&self.db).await?;

                Ok(Some(next))
            }
            None if InviterStats::creates_row(update) => {
                let next = InviterStats::default().apply(update);

                let model = invite_stats::ActiveModel {
                    guild_id: Set(guild_id as i64),
                    user_id: Set(user_id as i64),
                    regular_invites: Set(next.regular),
                    left_invites: Set(next.left),
                    fake_invites: Set(next.fake),
                    bonus_invites: Set(next.bonus),
                    updated_at: Set(now.into()),
                };
                model.insert(&self.db).await?;

                Ok(Some(next))
            }
            None => {
                tracing::debug!(
                    "Skipping {:?} for untracked inviter: guild={}, inviter={}",
                    update,
                    guild_id,
                    user_id
                );
                Ok(None)
            }
        }
    }

    async fn stats(&self, guild_id: u64, user_id: u64) -> Result<Option<InviterStats>, InviteError> {
        let row = invite_stats::Entity::find_by_id((guild_id as i64, user_id as i64))
            .one(&self.db)
            .await?;

        Ok(row.as_ref().map(InviterStats::from))
    }

    async fn top_inviters(&self, guild_id: u64, limit: usize) -> Result<Vec<(u64, InviterStats)>, InviteError> {
        let rows = invite_stats::Entity::find()
            .filter(invite_stats::Column::GuildId.eq(guild_id as i64))
            .all(&self.db)
            .await?;

        let mut ranked: Vec<(u64, InviterStats)> = rows
            .iter()
            .map(|row| (row.user_id as u64, InviterStats::from(row)))
            .collect();

        // Totals are derived, so ordering happens here rather than in SQL.
        ranked.sort_by(|(a_id, a), (b_id, b)| b.total().cmp(&a.total()).then(a_id.cmp(b_id)));
        ranked.truncate(limit);

        Ok(ranked)
    }
}
