use super::ledger::GuildSettings;
use super::model::JoinRecord;
use super::stats::{InviterStats, StatsUpdate};
use super::tracker::BootstrapOutcome;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// View invite statistics
#[poise::command(
    slash_command,
    guild_only,
    subcommands("stats", "leaderboard", "refresh", "bonus", "configure")
)]
pub async fn invites(ctx: Context<'_>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content("Please use a subcommand: `/invites stats`, `/invites leaderboard`, `/invites refresh`, `/invites bonus` or `/invites configure`")
            .ephemeral(true),
    )
    .await?;

    Ok(())
}

/// View invite statistics for a user
#[poise::command(slash_command, guild_only)]
pub async fn stats(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let target = user.as_ref().unwrap_or_else(|| ctx.author());
    let ledger = ctx.data().invites.ledger();

    if !ledger.settings(guild_id.get()).await?.enabled {
        return reply_disabled(ctx).await;
    }

    ctx.defer().await?;

    let stats = ledger.stats(guild_id.get(), target.id.get()).await?;
    let join = ledger.latest_join(guild_id.get(), target.id.get()).await?;

    ctx.send(poise::CreateReply::default().content(format_stats(&target.name, stats, join.as_ref())))
        .await?;

    Ok(())
}

/// View server invite leaderboard
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Number of users to show"]
    #[min = 1]
    #[max = 50]
    limit: Option<u32>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let ledger = ctx.data().invites.ledger();

    let settings = ledger.settings(guild_id.get()).await?;
    if !settings.enabled {
        return reply_disabled(ctx).await;
    }

    let limit = limit.unwrap_or(settings.config.leaderboard_limit).clamp(1, 50);

    ctx.defer().await?;

    let top = ledger.top_inviters(guild_id.get(), limit as usize).await?;

    ctx.send(poise::CreateReply::default().content(format_leaderboard(limit, &top)))
        .await?;

    Ok(())
}

/// Re-read all invites from Discord (Admin only)
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn refresh(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    ctx.defer_ephemeral().await?;

    let content = match ctx.data().invites.bootstrap_guild(guild_id.get()).await {
        Ok(BootstrapOutcome::Synced { invites }) => format!("🔄 Invite cache refreshed ({invites} invites)."),
        Ok(BootstrapOutcome::Disabled) => "Invite tracking is not enabled on this server.".to_string(),
        Ok(BootstrapOutcome::MissingPermission) => {
            "I need the **Manage Server** permission to read invites.".to_string()
        }
        Err(e) => {
            tracing::error!("Manual invite refresh failed for guild {}: {:?}", guild_id, e);
            format!("Failed to refresh invites: {e}")
        }
    };

    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;

    Ok(())
}

/// Add or remove bonus invites for a user (Admin only)
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn bonus(
    ctx: Context<'_>,
    #[description = "User to adjust"] user: serenity::User,
    #[description = "Invites to add (negative to remove)"] amount: i32,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let ledger = ctx.data().invites.ledger();

    if !ledger.settings(guild_id.get()).await?.enabled {
        return reply_disabled(ctx).await;
    }

    let updated = ledger
        .apply_stats(guild_id.get(), user.id.get(), StatsUpdate::Bonus(amount))
        .await?
        .unwrap_or_default();

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "🎁 {} now has **{}** bonus invites ({} total).",
                user.name,
                updated.bonus,
                updated.total()
            ))
            .ephemeral(true),
    )
    .await?;

    Ok(())
}

/// Configure invite tracking for this server (Admin only)
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn configure(
    ctx: Context<'_>,
    #[description = "Track invites on this server"] enabled: Option<bool>,
    #[description = "Leaves within this many hours count as fake (0 disables)"]
    fake_threshold_hours: Option<u32>,
    #[description = "Default leaderboard size"]
    #[min = 1]
    #[max = 50]
    leaderboard_limit: Option<u32>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let ledger = ctx.data().invites.ledger();

    let mut settings = ledger.settings(guild_id.get()).await?;
    let was_enabled = settings.enabled;
    if let Some(enabled) = enabled {
        settings.enabled = enabled;
    }
    if let Some(hours) = fake_threshold_hours {
        settings.config.fake_threshold_hours = hours;
    }
    if let Some(limit) = leaderboard_limit {
        settings.config.leaderboard_limit = limit;
    }

    ledger.save_settings(guild_id.get(), &settings).await?;

    // Snapshot is stale after being disabled for a while.
    if settings.enabled && !was_enabled {
        if let Err(e) = ctx.data().invites.bootstrap_guild(guild_id.get()).await {
            tracing::error!("Failed to sync invites for guild {}: {:?}", guild_id, e);
        }
    }

    ctx.send(
        poise::CreateReply::default()
            .content(format_settings(&settings))
            .ephemeral(true),
    )
    .await?;

    Ok(())
}

pub fn commands() -> Vec<poise::Command<crate::Data, Error>> {
    vec![invites()]
}

async fn reply_disabled(ctx: Context<'_>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content("Invite tracking is not enabled on this server.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn format_stats(name: &str, stats: Option<InviterStats>, join: Option<&JoinRecord>) -> String {
    let mut response = format!("📊 **Invite Statistics for {}**\n\n", name);

    match stats {
        Some(stats) => {
            response.push_str(&format!("📈 Total Invites: **{}**\n", stats.total()));
            response.push_str(&format!("✅ Regular: **{}**\n", stats.regular));
            response.push_str(&format!("❌ Left: **{}**\n", stats.left));
            response.push_str(&format!("⚠️ Fake: **{}**\n", stats.fake));
            response.push_str(&format!("🎁 Bonus: **{}**\n", stats.bonus));
        }
        None => response.push_str("No invites recorded yet.\n"),
    }

    response.push_str("\n**How they joined:**\n");
    match join {
        Some(join) => {
            match join.inviter_id {
                Some(id) => response.push_str(&format!("👤 Invited by: <@{}>\n", id)),
                None => response.push_str("👤 Invited by: nobody (vanity or widget)\n"),
            }
            response.push_str(&format!("🎫 Invite code: `{}`\n", join.invite_code));
        }
        None => response.push_str("Not tracked.\n"),
    }

    response
}

fn format_leaderboard(limit: u32, top: &[(u64, InviterStats)]) -> String {
    let mut response = format!("🏆 **Top {} Inviters**\n\n", limit);

    if top.is_empty() {
        response.push_str("No invite data available yet.");
        return response;
    }

    for (idx, (user_id, stats)) in top.iter().enumerate() {
        let medal = match idx {
            0 => "🥇",
            1 => "🥈",
            2 => "🥉",
            _ => "  ",
        };
        response.push_str(&format!(
            "{} **#{}** <@{}> - {} invites ({} regular, {} left, {} fake, {} bonus)\n",
            medal,
            idx + 1,
            user_id,
            stats.total(),
            stats.regular,
            stats.left,
            stats.fake,
            stats.bonus
        ));
    }

    response
}

fn format_settings(settings: &GuildSettings) -> String {
    let fake = match settings.config.fake_threshold_hours {
        0 => "off".to_string(),
        hours => format!("{} hours", hours),
    };
    format!(
        "⚙️ **Invite Tracking**\nEnabled: **{}**\nFake threshold: **{}**\nLeaderboard size: **{}**",
        if settings.enabled { "yes" } else { "no" },
        fake,
        settings.config.leaderboard_limit
    )
}
