use super::error::InviteError;
use super::model::InviteView;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Where live invite lists come from.
#[async_trait]
pub trait InviteSource: Send + Sync {
    async fn fetch_invites(&self, guild_id: u64) -> Result<Vec<InviteView>, InviteError>;
}

/// Reads invites through Discord's REST API. Requires "Manage Server".
pub struct DiscordInviteSource {
    http: Arc<serenity::Http>,
}

impl DiscordInviteSource {
    pub fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl InviteSource for DiscordInviteSource {
    async fn fetch_invites(&self, guild_id: u64) -> Result<Vec<InviteView>, InviteError> {
        let invites = serenity::GuildId::new(guild_id)
            .invites(&self.http)
            .await
            .map_err(|e| InviteError::from_fetch(guild_id, e))?;

        Ok(invites.iter().map(InviteView::from).collect())
    }
}
