//! Plain value types at the boundary between serenity's models and the tracker.

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

/// Counters cached per invite code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteCounters {
    pub uses: u64,
    pub inviter_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub max_uses: Option<u32>,
    /// Seconds.
    pub max_age: Option<u32>,
}

/// A live invite as returned by Discord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteView {
    pub code: String,
    pub uses: u64,
    pub inviter_id: Option<u64>,
    pub inviter_name: Option<String>,
    pub channel_id: Option<u64>,
    pub max_uses: Option<u32>,
    pub max_age: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl InviteView {
    pub fn counters(&self) -> InviteCounters {
        InviteCounters {
            uses: self.uses,
            inviter_id: self.inviter_id,
            created_at: self.created_at,
            max_uses: self.max_uses,
            max_age: self.max_age,
        }
    }
}

/// The member side of a join or leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberView {
    pub guild_id: u64,
    pub user_id: u64,
    pub name: String,
    pub bot: bool,
}

/// A join that was matched to an invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRecord {
    pub guild_id: u64,
    pub member_id: u64,
    pub member_name: String,
    pub inviter_id: Option<u64>,
    pub inviter_name: Option<String>,
    pub invite_code: String,
    pub observed_uses: u64,
    pub joined_at: DateTime<Utc>,
}

// Discord reports "unlimited" as zero.
fn non_zero(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

fn to_utc(ts: serenity::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}

impl From<&serenity::RichInvite> for InviteView {
    fn from(invite: &serenity::RichInvite) -> Self {
        Self {
            code: invite.code.clone(),
            uses: u64::from(invite.uses),
            inviter_id: invite.inviter.as_ref().map(|u| u.id.get()),
            inviter_name: invite.inviter.as_ref().map(|u| u.name.clone()),
            channel_id: Some(invite.channel.id.get()),
            max_uses: non_zero(u32::from(invite.max_uses)),
            max_age: non_zero(u32::from(invite.max_age)),
            created_at: to_utc(invite.created_at),
        }
    }
}

impl From<&serenity::InviteCreateEvent> for InviteView {
    fn from(event: &serenity::InviteCreateEvent) -> Self {
        Self {
            code: event.code.clone(),
            uses: u64::from(event.uses),
            inviter_id: event.inviter.as_ref().map(|u| u.id.get()),
            inviter_name: event.inviter.as_ref().map(|u| u.name.clone()),
            channel_id: Some(event.channel_id.get()),
            max_uses: non_zero(u32::from(event.max_uses)),
            max_age: non_zero(u32::from(event.max_age)),
            created_at: to_utc(event.created_at),
        }
    }
}

impl MemberView {
    pub fn from_user(guild_id: serenity::GuildId, user: &serenity::User) -> Self {
        Self {
            guild_id: guild_id.get(),
            user_id: user.id.get(),
            name: user.name.clone(),
            bot: user.bot,
        }
    }
}

impl From<&serenity::Member> for MemberView {
    fn from(member: &serenity::Member) -> Self {
        Self::from_user(member.guild_id, &member.user)
    }
}
