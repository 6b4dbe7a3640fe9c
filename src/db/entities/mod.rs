pub mod invite_configs;
pub mod invite_joins;
pub mod invite_stats;
pub mod invites;
