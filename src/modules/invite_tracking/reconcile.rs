//! Inferring the invite a member used from counters that moved between two fetches.

use super::model::InviteView;
use super::snapshot::{GuildSnapshot, SnapshotStore};

/// Result of diffing one fetch against the guild snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No prior snapshot; one was built from the fetch and nothing can be attributed.
    Bootstrapped { entries: usize },
    /// The first invite, in fetch order, whose uses advanced.
    Matched {
        invite: InviteView,
        previous_uses: u64,
    },
    NoMatch,
}

/// Builds a first snapshot from a fetch that already includes the triggering join.
pub fn bootstrap_entries(current: &[InviteView]) -> GuildSnapshot {
    current
        .iter()
        .map(|invite| {
            let mut counters = invite.counters();
            counters.uses = invite.uses.saturating_sub(1);
            (invite.code.clone(), counters)
        })
        .collect()
}

/// Diffs `current` against `entries` and resyncs `entries` in the same pass.
///
/// Only the first advanced code is reported even if several moved. Codes not yet
/// cached are inserted with their live counters and never count as a match.
/// Cached codes missing from `current` are left alone.
pub fn apply_diff<'a>(
    entries: &mut GuildSnapshot,
    current: &'a [InviteView],
) -> Option<(&'a InviteView, u64)> {
    let mut matched = None;

    for invite in current {
        match entries.get_mut(&invite.code) {
            Some(cached) => {
                if matched.is_none() && invite.uses > cached.uses {
                    matched = Some((invite, cached.uses));
                }
                cached.uses = invite.uses;
            }
            None => {
                entries.insert(invite.code.clone(), invite.counters());
            }
        }
    }

    matched
}

/// Runs one reconciliation for a guild against the shared store.
pub fn reconcile(store: &SnapshotStore, guild_id: u64, current: &[InviteView]) -> Reconciliation {
    if !store.ensure_guild(guild_id) {
        let entries = bootstrap_entries(current);
        let count = entries.len();
        store.replace_guild(guild_id, entries);
        return Reconciliation::Bootstrapped { entries: count };
    }

    let matched = store
        .with_guild(guild_id, |entries| {
            apply_diff(entries, current).map(|(invite, previous_uses)| (invite.clone(), previous_uses))
        })
        .flatten();

    match matched {
        Some((invite, previous_uses)) => Reconciliation::Matched {
            invite,
            previous_uses,
        },
        None => Reconciliation::NoMatch,
    }
}
