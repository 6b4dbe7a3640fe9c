use super::model::{InviteView, MemberView};
use super::tracker::{BootstrapOutcome, JoinOutcome};
use crate::{Data, Error};
use poise::serenity_prelude as serenity;

pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move { handle_event(ctx, event, data).await })
}

async fn handle_event(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::GuildCreate { guild, .. } => {
            handle_guild_available(guild.id, data).await?;
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            // An unavailable guild is an outage, not a removal.
            if !incomplete.unavailable {
                data.invites.guild_removed(incomplete.id.get());
            }
        }
        serenity::FullEvent::InviteCreate { data: invite_data, .. } => {
            handle_invite_create(invite_data, data).await?;
        }
        serenity::FullEvent::InviteDelete { data: invite_data, .. } => {
            handle_invite_delete(invite_data, data).await?;
        }
        serenity::FullEvent::GuildMemberAddition { new_member, .. } => {
            handle_member_join(new_member, data).await?;
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            let member = MemberView::from_user(*guild_id, user);
            data.invites.member_left(&member).await?;
        }
        _ => {}
    }

    Ok(())
}

async fn handle_guild_available(guild_id: serenity::GuildId, data: &Data) -> Result<(), Error> {
    match data.invites.bootstrap_guild(guild_id.get()).await? {
        BootstrapOutcome::Synced { .. } | BootstrapOutcome::Disabled => {}
        BootstrapOutcome::MissingPermission => {
            tracing::debug!("Guild {} has no invite snapshot", guild_id);
        }
    }
    Ok(())
}

async fn handle_invite_create(
    invite_event: &serenity::InviteCreateEvent,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = invite_event.guild_id else {
        tracing::warn!("Invite created without guild_id");
        return Ok(());
    };

    data.invites
        .invite_created(guild_id.get(), InviteView::from(invite_event))
        .await?;
    Ok(())
}

async fn handle_invite_delete(
    invite_event: &serenity::InviteDeleteEvent,
    data: &Data,
) -> Result<(), Error> {
    let Some(guild_id) = invite_event.guild_id else {
        tracing::warn!("Invite deleted without guild_id");
        return Ok(());
    };

    data.invites
        .invite_deleted(guild_id.get(), &invite_event.code)
        .await?;
    Ok(())
}

async fn handle_member_join(member: &serenity::Member, data: &Data) -> Result<(), Error> {
    let member = MemberView::from(member);

    if let JoinOutcome::Unattributed = data.invites.member_joined(&member).await? {
        tracing::debug!(
            "No invite attributed for {} in guild {}",
            member.user_id,
            member.guild_id
        );
    }
    Ok(())
}
