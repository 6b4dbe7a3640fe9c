use super::model::InviteCounters;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type GuildSnapshot = HashMap<String, InviteCounters>;

/// Last observed invite counters, keyed by guild and then by invite code.
#[derive(Default)]
pub struct SnapshotStore {
    guilds: DashMap<u64, GuildSnapshot>,
    // Serializes reconciliation per guild. Never pruned; one entry per guild seen.
    locks: DashMap<u64, Arc<Mutex<()>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a snapshot already existed, creating an empty one if not.
    pub fn ensure_guild(&self, guild_id: u64) -> bool {
        match self.guilds.entry(guild_id) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(GuildSnapshot::new());
                false
            }
        }
    }

    pub fn contains_guild(&self, guild_id: u64) -> bool {
        self.guilds.contains_key(&guild_id)
    }

    pub fn upsert_entry(&self, guild_id: u64, code: &str, counters: InviteCounters) {
        self.guilds
            .entry(guild_id)
            .or_default()
            .insert(code.to_string(), counters);
    }

    pub fn remove_entry(&self, guild_id: u64, code: &str) -> Option<InviteCounters> {
        self.guilds
            .get_mut(&guild_id)
            .and_then(|mut guild| guild.remove(code))
    }

    pub fn get_entry(&self, guild_id: u64, code: &str) -> Option<InviteCounters> {
        self.guilds
            .get(&guild_id)
            .and_then(|guild| guild.get(code).cloned())
    }

    pub fn replace_guild(&self, guild_id: u64, entries: GuildSnapshot) {
        self.guilds.insert(guild_id, entries);
    }

    pub fn remove_guild(&self, guild_id: u64) -> bool {
        self.guilds.remove(&guild_id).is_some()
    }

    /// Runs `f` against the guild's entries while holding the shard lock.
    /// Returns `None` when there is no snapshot for the guild.
    pub fn with_guild<R>(&self, guild_id: u64, f: impl FnOnce(&mut GuildSnapshot) -> R) -> Option<R> {
        self.guilds.get_mut(&guild_id).map(|mut guild| f(&mut guild))
    }

    pub fn len(&self, guild_id: u64) -> usize {
        self.guilds.get(&guild_id).map(|g| g.len()).unwrap_or(0)
    }

    /// Waits for exclusive access to the guild's reconciliation section.
    pub async fn lock_guild(&self, guild_id: u64) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(guild_id).or_default().clone();
        lock.lock_owned().await
    }
}
