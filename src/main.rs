use anyhow::Context as _;
use clap::Parser as _;
use dotenvy::dotenv;
use modules::invite_tracking::ledger::DbLedger;
use modules::invite_tracking::source::DiscordInviteSource;
use modules::invite_tracking::InviteTracker;
use poise::serenity_prelude as serenity;
use services::event_manager::ModuleHandler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod db;
mod modules;
mod services;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Publish commands. If no guild ID is provided, publish globally.
    #[arg(long, num_args = 0..)]
    publish: Option<Vec<u64>>,

    /// Clear all commands instead of publishing them.
    #[arg(long)]
    clear: bool,

    /// Rollback the specified number of migrations and run all migrations again.
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    refresh_migrations: Option<u32>,

    /// Wait this long after a join before reading invite counters.
    #[arg(long, env = "INVITE_JOIN_DELAY_MS", default_value_t = 1000)]
    join_delay_ms: u64,
}

// Custom user data passed to all command functions
#[derive(Clone)]
pub struct Data {
    pub invites: Arc<InviteTracker>,
    pub event_handlers: Arc<Vec<ModuleHandler>>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting invite tracker...");

    let db = db::establish_connection()
        .await
        .context("Failed to connect to database")?;

    use sea_orm_migration::MigratorTrait;
    if let Some(depth) = args.refresh_migrations {
        info!("Refreshing migrations (down {}, then up)...", depth);
        db::migrations::Migrator::down(&db, Some(depth))
            .await
            .context("Failed to rollback migration")?;
    }

    db::migrations::Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    if args.refresh_migrations.is_some() {
        info!("Migrations refreshed successfully.");
        return Ok(());
    }

    let token = std::env::var("DISCORD_TOKEN").context("missing DISCORD_TOKEN")?;
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_INVITES;

    let all_modules = modules::get_modules();
    for module in &all_modules {
        info!(
            "Loaded module {}: {}",
            module.definition.name, module.definition.description
        );
    }
    let event_handlers = Arc::new(services::event_manager::collect_handlers(&all_modules));
    let commands = modules::commands();

    if let Some(guild_ids) = args.publish {
        return publish_commands(&token, &commands, guild_ids, args.clear).await;
    }

    let ledger = Arc::new(DbLedger::new(db));
    let join_delay = Duration::from_millis(args.join_delay_ms);

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands,
            event_handler: |ctx, event, framework, data| {
                Box::pin(services::event_manager::dispatch(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                let source = Arc::new(DiscordInviteSource::new(ctx.http.clone()));
                let invites = Arc::new(InviteTracker::new(ledger, source, join_delay));

                // Guilds that were available before the framework finished setting up.
                let guild_ids: Vec<u64> = ready.guilds.iter().map(|g| g.id.get()).collect();
                let tracker = invites.clone();
                tokio::spawn(async move {
                    for guild_id in guild_ids {
                        if let Err(e) = tracker.bootstrap_guild(guild_id).await {
                            error!("Failed to sync invites for guild {}: {:?}", guild_id, e);
                        }
                    }
                });

                Ok(Data {
                    invites,
                    event_handlers,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .context("Failed to create client")?;

    info!("Bot is ready!");
    client.start_autosharded().await.context("Client error")?;

    Ok(())
}

async fn publish_commands(
    token: &str,
    commands: &[poise::Command<Data, Error>],
    guild_ids: Vec<u64>,
    clear: bool,
) -> anyhow::Result<()> {
    let http = serenity::HttpBuilder::new(token).build();
    let bot_user = http
        .get_current_user()
        .await
        .context("Failed to fetch bot user info")?;
    http.set_application_id(serenity::ApplicationId::new(bot_user.id.get()));

    info!("Fetched Application ID: {}", bot_user.id);

    let empty_commands = vec![];
    let commands = if clear { &empty_commands[..] } else { commands };

    if guild_ids.is_empty() {
        if clear {
            info!("Clearing commands globally...");
        } else {
            info!("Registering commands globally...");
        }

        if let Err(e) = poise::builtins::register_globally(&http, commands).await {
            error!("Failed to register commands globally: {}", e);
        } else {
            info!("Global command operation successful");
        }
        return Ok(());
    }

    for guild_id in guild_ids {
        if clear {
            info!("Clearing commands in guild {}...", guild_id);
        } else {
            info!("Registering commands in guild {}...", guild_id);
        }

        if let Err(e) =
            poise::builtins::register_in_guild(&http, commands, serenity::GuildId::new(guild_id)).await
        {
            error!("Failed to register commands in guild {}: {}", guild_id, e);
        } else {
            info!("Guild command operation successful for guild {}", guild_id);
        }
    }

    Ok(())
}
