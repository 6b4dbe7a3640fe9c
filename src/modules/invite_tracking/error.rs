use poise::serenity_prelude as serenity;
use thiserror::Error;

/// Failure kinds surfaced by the invite tracker.
#[derive(Error, Debug)]
pub enum InviteError {
    /// The bot lacks "Manage Server" and cannot list invites.
    #[error("missing permission to list invites in guild {guild_id}")]
    MissingPermission { guild_id: u64 },

    #[error("invite list for guild {guild_id} was not found")]
    NotFound { guild_id: u64 },

    /// Rate limits, timeouts and any other failure talking to Discord.
    #[error("failed to fetch invites for guild {guild_id}: {message}")]
    Transient { guild_id: u64, message: String },

    #[error(transparent)]
    Persistence(#[from] sea_orm::DbErr),

    #[error("malformed invite tracking config: {0}")]
    Config(#[from] serde_json::Error),
}

impl InviteError {
    /// Classifies a failed invite fetch by its HTTP status.
    pub fn from_fetch(guild_id: u64, err: serenity::Error) -> Self {
        let status = match &err {
            serenity::Error::Http(http_err) => http_err.status_code().map(|s| s.as_u16()),
            _ => None,
        };

        match status {
            Some(403) => Self::MissingPermission { guild_id },
            Some(404) => Self::NotFound { guild_id },
            _ => Self::Transient {
                guild_id,
                message: err.to_string(),
            },
        }
    }

    /// Errors that only mean "this join cannot be attributed".
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingPermission { .. } | Self::NotFound { .. } | Self::Transient { .. }
        )
    }
}
