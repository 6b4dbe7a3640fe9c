pub mod commands;
pub mod error;
pub mod events;
pub mod ledger;
pub mod model;
pub mod reconcile;
pub mod snapshot;
pub mod source;
pub mod stats;
pub mod tracker;

use crate::modules::{Module, ModuleDefinition};

pub use tracker::InviteTracker;

pub const DEFINITION: ModuleDefinition = ModuleDefinition {
    id: "invite_tracking",
    name: "Invite Tracking",
    description: "Works out which invite each new member used and keeps inviter stats.",
};

pub fn module() -> Module {
    Module {
        definition: DEFINITION,
        commands: commands::commands(),
        event_handlers: vec![events::handler],
    }
}
