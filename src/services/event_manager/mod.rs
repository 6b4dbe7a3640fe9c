use crate::modules::EventHandler;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Copy)]
pub struct ModuleHandler {
    pub module_id: &'static str,
    pub handler: EventHandler,
}

pub fn collect_handlers(modules: &[crate::modules::Module]) -> Vec<ModuleHandler> {
    modules
        .iter()
        .flat_map(|module| {
            module.event_handlers.iter().map(|handler| ModuleHandler {
                module_id: module.definition.id,
                handler: *handler,
            })
        })
        .collect()
}

/// Framework-level event hook. Logs lifecycle events, then fans the event out to every module.
pub async fn dispatch(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot, .. } => {
            info!("Logged in as {}", data_about_bot.user.name);
        }
        serenity::FullEvent::GuildCreate { guild, is_new, .. } => {
            if is_new.unwrap_or(false) {
                info!("Joined new guild: {} ({})", guild.name, guild.id);
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            if !incomplete.unavailable {
                info!("Left guild: {}", incomplete.id);
            }
        }
        _ => {}
    }

    // One clone of the event shared by every spawned handler.
    let event_arc = Arc::new(event.clone());

    for module_handler in data.event_handlers.iter().copied() {
        let ctx = ctx.clone();
        let event_arc = event_arc.clone();
        let data = data.clone();

        tokio::spawn(async move {
            if let Err(e) = (module_handler.handler)(&ctx, &event_arc, &data).await {
                error!(
                    "Error in event handler for module {}: {:?}",
                    module_handler.module_id, e
                );
            }
        });
    }

    Ok(())
}
