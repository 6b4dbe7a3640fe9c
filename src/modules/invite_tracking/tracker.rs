use super::error::InviteError;
use super::ledger::Ledger;
use super::model::{InviteView, JoinRecord, MemberView};
use super::reconcile::{reconcile, Reconciliation};
use super::snapshot::SnapshotStore;
use super::source::InviteSource;
use super::stats::StatsUpdate;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Disabled,
    /// The bot cannot list invites here; joins stay unattributed until a later refresh.
    MissingPermission,
    Synced { invites: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Bot,
    Disabled,
    /// First observation of the guild; a snapshot was built instead of attributing.
    Bootstrapped { invites: usize },
    Attributed(JoinRecord),
    Unattributed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    Bot,
    Disabled,
    /// No attributed join on record.
    Untracked,
    /// Joined through an invite without an inviter (vanity, widget).
    NoInviter,
    Counted { inviter_id: u64, update: StatsUpdate },
}

/// Attributes joins to invites and keeps the ledger in step.
pub struct InviteTracker {
    store: SnapshotStore,
    ledger: Arc<dyn Ledger>,
    source: Arc<dyn InviteSource>,
    join_delay: Duration,
}

impl InviteTracker {
    pub fn new(ledger: Arc<dyn Ledger>, source: Arc<dyn InviteSource>, join_delay: Duration) -> Self {
        Self {
            store: SnapshotStore::new(),
            ledger,
            source,
            join_delay,
        }
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    /// Replaces the guild snapshot with the live invite list.
    /// Runs when a guild becomes available and on manual refresh.
    pub async fn bootstrap_guild(&self, guild_id: u64) -> Result<BootstrapOutcome, InviteError> {
        if !self.ledger.settings(guild_id).await?.enabled {
            return Ok(BootstrapOutcome::Disabled);
        }

        let _guard = self.store.lock_guild(guild_id).await;

        let invites = match self.source.fetch_invites(guild_id).await {
            Ok(invites) => invites,
            Err(InviteError::MissingPermission { .. }) => {
                warn!(
                    "Missing Manage Server permission in guild {}, invite tracking skipped",
                    guild_id
                );
                return Ok(BootstrapOutcome::MissingPermission);
            }
            Err(e) => return Err(e),
        };

        let entries = invites
            .iter()
            .map(|invite| (invite.code.clone(), invite.counters()))
            .collect();
        self.store.replace_guild(guild_id, entries);

        self.ledger.save_invites(guild_id, &invites).await?;

        info!("Synced {} invites for guild {}", invites.len(), guild_id);
        Ok(BootstrapOutcome::Synced {
            invites: invites.len(),
        })
    }

    /// Drops the snapshot after the bot is removed from a guild.
    pub fn guild_removed(&self, guild_id: u64) {
        if self.store.remove_guild(guild_id) {
            debug!("Discarded invite snapshot for guild {}", guild_id);
        }
    }

    pub async fn invite_created(&self, guild_id: u64, invite: InviteView) -> Result<bool, InviteError> {
        if !self.ledger.settings(guild_id).await?.enabled {
            return Ok(false);
        }

        {
            let _guard = self.store.lock_guild(guild_id).await;
            self.store
                .upsert_entry(guild_id, &invite.code, invite.counters());
        }

        info!("Invite created: {} in guild {}", invite.code, guild_id);
        self.ledger
            .save_invites(guild_id, std::slice::from_ref(&invite))
            .await?;

        Ok(true)
    }

    pub async fn invite_deleted(&self, guild_id: u64, code: &str) -> Result<bool, InviteError> {
        if !self.ledger.settings(guild_id).await?.enabled {
            return Ok(false);
        }

        {
            let _guard = self.store.lock_guild(guild_id).await;
            self.store.remove_entry(guild_id, code);
        }

        info!("Invite deleted: {} in guild {}", code, guild_id);
        self.ledger.delete_invite(guild_id, code).await?;

        Ok(true)
    }

    /// Works out which invite the member used.
    ///
    /// Holds the guild lock from before the settle delay until the ledger is written,
    /// so two joins into one guild never diff against the same snapshot.
    pub async fn member_joined(&self, member: &MemberView) -> Result<JoinOutcome, InviteError> {
        if member.bot {
            return Ok(JoinOutcome::Bot);
        }

        let guild_id = member.guild_id;
        if !self.ledger.settings(guild_id).await?.enabled {
            return Ok(JoinOutcome::Disabled);
        }

        let _guard = self.store.lock_guild(guild_id).await;

        // Discord's counters lag the join event slightly.
        if !self.join_delay.is_zero() {
            tokio::time::sleep(self.join_delay).await;
        }

        let current = match self.source.fetch_invites(guild_id).await {
            Ok(current) => current,
            Err(e) if e.is_fetch_failure() => {
                warn!(
                    "Join of {} in guild {} left unattributed: {}",
                    member.user_id, guild_id, e
                );
                return Ok(JoinOutcome::Unattributed);
            }
            Err(e) => return Err(e),
        };

        let outcome = match reconcile(&self.store, guild_id, &current) {
            Reconciliation::Bootstrapped { entries } => {
                info!(
                    "Built invite snapshot for guild {} on join of {} ({} invites)",
                    guild_id, member.user_id, entries
                );
                return Ok(JoinOutcome::Bootstrapped { invites: entries });
            }
            Reconciliation::NoMatch => {
                info!(
                    "Could not determine invite used by {} in guild {}",
                    member.user_id, guild_id
                );
                JoinOutcome::Unattributed
            }
            Reconciliation::Matched {
                invite,
                previous_uses,
            } => {
                let record = JoinRecord {
                    guild_id,
                    member_id: member.user_id,
                    member_name: member.name.clone(),
                    inviter_id: invite.inviter_id,
                    inviter_name: invite.inviter_name.clone(),
                    invite_code: invite.code.clone(),
                    observed_uses: invite.uses,
                    joined_at: Utc::now(),
                };

                info!(
                    "Member {} joined guild {} via {} (uses {} -> {}, inviter {:?})",
                    member.user_id,
                    guild_id,
                    record.invite_code,
                    previous_uses,
                    record.observed_uses,
                    record.inviter_id
                );

                self.ledger.record_join(&record).await?;
                if let Some(inviter_id) = record.inviter_id {
                    self.ledger
                        .apply_stats(guild_id, inviter_id, StatsUpdate::Join)
                        .await?;
                }

                JoinOutcome::Attributed(record)
            }
        };

        self.ledger.save_invites(guild_id, &current).await?;

        Ok(outcome)
    }

    /// Reverses the inviter's credit for a member that left.
    ///
    /// Waits on the guild lock so a leave during the settle delay sees the pending join.
    pub async fn member_left(&self, member: &MemberView) -> Result<LeaveOutcome, InviteError> {
        if member.bot {
            return Ok(LeaveOutcome::Bot);
        }

        let guild_id = member.guild_id;
        let settings = self.ledger.settings(guild_id).await?;
        if !settings.enabled {
            return Ok(LeaveOutcome::Disabled);
        }

        let _guard = self.store.lock_guild(guild_id).await;

        let Some(record) = self.ledger.close_join(guild_id, member.user_id).await? else {
            debug!(
                "Member {} left guild {} without an open tracked join",
                member.user_id, guild_id
            );
            return Ok(LeaveOutcome::Untracked);
        };

        let Some(inviter_id) = record.inviter_id else {
            return Ok(LeaveOutcome::NoInviter);
        };

        let threshold = settings.config.fake_threshold_hours;
        let stayed = Utc::now() - record.joined_at;
        let update = if threshold > 0 && stayed.num_hours() < i64::from(threshold) {
            StatsUpdate::FakeLeave
        } else {
            StatsUpdate::Leave
        };

        info!(
            "Member {} left guild {}, inviter {} ({:?})",
            member.user_id, guild_id, inviter_id, update
        );
        self.ledger.apply_stats(guild_id, inviter_id, update).await?;

        Ok(LeaveOutcome::Counted { inviter_id, update })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::db::entities::invite_configs::InviteTrackingConfig;
    use crate::db::entities::invites;
    use crate::modules::invite_tracking::ledger::{DbLedger, GuildSettings};
    use crate::modules::invite_tracking::stats::InviterStats;
    use sea_orm::{EntityTrait, PaginatorTrait};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    const GUILD: u64 = 1;

    #[derive(Default)]
    struct ScriptedSource {
        invites: Mutex<HashMap<u64, Vec<InviteView>>>,
        denied: Mutex<HashSet<u64>>,
        unreachable: Mutex<HashSet<u64>>,
    }

    impl ScriptedSource {
        fn set(&self, guild_id: u64, invites: Vec<InviteView>) {
            self.invites.lock().unwrap().insert(guild_id, invites);
        }

        fn deny(&self, guild_id: u64) {
            self.denied.lock().unwrap().insert(guild_id);
        }

        fn fail(&self, guild_id: u64) {
            self.unreachable.lock().unwrap().insert(guild_id);
        }
    }

    #[async_trait]
    impl InviteSource for ScriptedSource {
        async fn fetch_invites(&self, guild_id: u64) -> Result<Vec<InviteView>, InviteError> {
            if self.denied.lock().unwrap().contains(&guild_id) {
                return Err(InviteError::MissingPermission { guild_id });
            }
            if self.unreachable.lock().unwrap().contains(&guild_id) {
                return Err(InviteError::Transient {
                    guild_id,
                    message: "gateway timeout".to_string(),
                });
            }
            Ok(self
                .invites
                .lock()
                .unwrap()
                .get(&guild_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn invite(code: &str, uses: u64, inviter: Option<u64>) -> InviteView {
        InviteView {
            code: code.to_string(),
            uses,
            inviter_id: inviter,
            inviter_name: inviter.map(|id| format!("user{id}")),
            channel_id: Some(99),
            max_uses: None,
            max_age: None,
            created_at: Utc::now(),
        }
    }

    fn member(user_id: u64) -> MemberView {
        MemberView {
            guild_id: GUILD,
            user_id,
            name: format!("member{user_id}"),
            bot: false,
        }
    }

    async fn setup() -> (InviteTracker, Arc<ScriptedSource>, Arc<DbLedger>) {
        let ledger = Arc::new(DbLedger::new(connect_in_memory().await));
        let source = Arc::new(ScriptedSource::default());
        let tracker = InviteTracker::new(ledger.clone(), source.clone(), Duration::ZERO);
        (tracker, source, ledger)
    }

    /// Delegates to a real ledger but refuses to store join records.
    struct BrokenJoinLedger {
        inner: DbLedger,
    }

    #[async_trait]
    impl Ledger for BrokenJoinLedger {
        async fn settings(&self, guild_id: u64) -> Result<GuildSettings, InviteError> {
            self.inner.settings(guild_id).await
        }

        async fn save_settings(&self, guild_id: u64, settings: &GuildSettings) -> Result<(), InviteError> {
            self.inner.save_settings(guild_id, settings).await
        }

        async fn save_invites(&self, guild_id: u64, invites: &[InviteView]) -> Result<(), InviteError> {
            self.inner.save_invites(guild_id, invites).await
        }

        async fn delete_invite(&self, guild_id: u64, code: &str) -> Result<(), InviteError> {
            self.inner.delete_invite(guild_id, code).await
        }

        async fn record_join(&self, _record: &JoinRecord) -> Result<(), InviteError> {
            Err(sea_orm::DbErr::Custom("connection reset".to_string()).into())
        }

        async fn latest_join(&self, guild_id: u64, member_id: u64) -> Result<Option<JoinRecord>, InviteError> {
            self.inner.latest_join(guild_id, member_id).await
        }

        async fn close_join(&self, guild_id: u64, member_id: u64) -> Result<Option<JoinRecord>, InviteError> {
            self.inner.close_join(guild_id, member_id).await
        }

        async fn apply_stats(
            &self,
            guild_id: u64,
            user_id: u64,
            update: StatsUpdate,
        ) -> Result<Option<InviterStats>, InviteError> {
            self.inner.apply_stats(guild_id, user_id, update).await
        }

        async fn stats(&self, guild_id: u64, user_id: u64) -> Result<Option<InviterStats>, InviteError> {
            self.inner.stats(guild_id, user_id).await
        }

        async fn top_inviters(&self, guild_id: u64, limit: usize) -> Result<Vec<(u64, InviterStats)>, InviteError> {
            self.inner.top_inviters(guild_id, limit).await
        }
    }

    #[tokio::test]
    async fn join_through_advanced_invite_is_attributed() {
        let (tracker, source, ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        source.set(GUILD, vec![invite("abc", 6, Some(100))]);
        let outcome = tracker.member_joined(&member(42)).await.unwrap();

        let JoinOutcome::Attributed(record) = outcome else {
            panic!("expected attribution, got {outcome:?}");
        };
        assert_eq!(record.member_id, 42);
        assert_eq!(record.inviter_id, Some(100));
        assert_eq!(record.invite_code, "abc");
        assert_eq!(record.observed_uses, 6);

        let stats = ledger.stats(GUILD, 100).await.unwrap().unwrap();
        assert_eq!(stats.regular, 1);
        assert_eq!(stats.total(), 1);
        assert_eq!(tracker.snapshots().get_entry(GUILD, "abc").map(|c| c.uses), Some(6));
        let stored = ledger.latest_join(GUILD, 42).await.unwrap().unwrap();
        assert_eq!(stored.invite_code, record.invite_code);
        assert_eq!(stored.inviter_name.as_deref(), Some("user100"));
    }

    #[tokio::test]
    async fn first_join_without_snapshot_only_bootstraps() {
        let (tracker, source, ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 6, Some(100))]);

        let outcome = tracker.member_joined(&member(42)).await.unwrap();

        assert_eq!(outcome, JoinOutcome::Bootstrapped { invites: 1 });
        assert_eq!(tracker.snapshots().get_entry(GUILD, "abc").map(|c| c.uses), Some(5));
        assert!(ledger.latest_join(GUILD, 42).await.unwrap().is_none());
        assert!(ledger.stats(GUILD, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bootstrap_on_join_persists_nothing() {
        let db = connect_in_memory().await;
        let ledger = Arc::new(DbLedger::new(db.clone()));
        let source = Arc::new(ScriptedSource::default());
        let tracker = InviteTracker::new(ledger.clone(), source.clone(), Duration::ZERO);
        source.set(GUILD, vec![invite("abc", 6, Some(100))]);

        let outcome = tracker.member_joined(&member(42)).await.unwrap();

        assert_eq!(outcome, JoinOutcome::Bootstrapped { invites: 1 });
        assert_eq!(invites::Entity::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_snapshot_untouched() {
        let (tracker, source, ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        source.set(GUILD, vec![invite("abc", 6, Some(100))]);
        source.fail(GUILD);
        let outcome = tracker.member_joined(&member(42)).await.unwrap();

        assert_eq!(outcome, JoinOutcome::Unattributed);
        assert_eq!(tracker.snapshots().get_entry(GUILD, "abc").map(|c| c.uses), Some(5));
        assert!(ledger.latest_join(GUILD, 42).await.unwrap().is_none());
        assert!(ledger.stats(GUILD, 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ledger_failure_keeps_advanced_snapshot() {
        let ledger = Arc::new(BrokenJoinLedger {
            inner: DbLedger::new(connect_in_memory().await),
        });
        let source = Arc::new(ScriptedSource::default());
        let tracker = InviteTracker::new(ledger.clone(), source.clone(), Duration::ZERO);
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        source.set(GUILD, vec![invite("abc", 6, Some(100))]);
        let err = tracker.member_joined(&member(42)).await.unwrap_err();

        assert!(matches!(err, InviteError::Persistence(_)));
        assert_eq!(tracker.snapshots().get_entry(GUILD, "abc").map(|c| c.uses), Some(6));
        assert!(ledger.stats(GUILD, 100).await.unwrap().is_none());

        // The next join diffs against the advanced snapshot, not the old one.
        assert_eq!(
            tracker.member_joined(&member(43)).await.unwrap(),
            JoinOutcome::Unattributed
        );
    }

    #[tokio::test]
    async fn join_without_advanced_counter_is_unattributed() {
        let (tracker, source, ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        let outcome = tracker.member_joined(&member(42)).await.unwrap();

        assert_eq!(outcome, JoinOutcome::Unattributed);
        assert!(ledger.latest_join(GUILD, 42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bots_are_ignored() {
        let (tracker, source, _ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 1, Some(100))]);

        let mut bot = member(42);
        bot.bot = true;

        assert_eq!(tracker.member_joined(&bot).await.unwrap(), JoinOutcome::Bot);
        assert_eq!(tracker.member_left(&bot).await.unwrap(), LeaveOutcome::Bot);
        assert!(!tracker.snapshots().contains_guild(GUILD));
    }

    #[tokio::test]
    async fn missing_permission_skips_guild() {
        let (tracker, source, _ledger) = setup().await;
        source.deny(GUILD);

        assert_eq!(
            tracker.bootstrap_guild(GUILD).await.unwrap(),
            BootstrapOutcome::MissingPermission
        );
        assert!(!tracker.snapshots().contains_guild(GUILD));
        assert_eq!(
            tracker.member_joined(&member(42)).await.unwrap(),
            JoinOutcome::Unattributed
        );
    }

    #[tokio::test]
    async fn disabled_guild_is_left_alone() {
        let (tracker, source, ledger) = setup().await;
        ledger
            .save_settings(
                GUILD,
                &GuildSettings {
                    enabled: false,
                    config: InviteTrackingConfig::default(),
                },
            )
            .await
            .unwrap();
        source.set(GUILD, vec![invite("abc", 1, Some(100))]);

        assert_eq!(
            tracker.bootstrap_guild(GUILD).await.unwrap(),
            BootstrapOutcome::Disabled
        );
        assert_eq!(
            tracker.member_joined(&member(42)).await.unwrap(),
            JoinOutcome::Disabled
        );
        assert!(!tracker
            .invite_created(GUILD, invite("new", 0, Some(1)))
            .await
            .unwrap());
        assert!(!tracker.snapshots().contains_guild(GUILD));
    }

    #[tokio::test]
    async fn created_invite_becomes_attributable() {
        let (tracker, source, _ledger) = setup().await;
        source.set(GUILD, vec![]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        assert!(tracker
            .invite_created(GUILD, invite("fresh", 0, Some(7)))
            .await
            .unwrap());
        assert_eq!(tracker.snapshots().get_entry(GUILD, "fresh").map(|c| c.uses), Some(0));

        source.set(GUILD, vec![invite("fresh", 1, Some(7))]);
        match tracker.member_joined(&member(42)).await.unwrap() {
            JoinOutcome::Attributed(record) => assert_eq!(record.inviter_id, Some(7)),
            other => panic!("expected attribution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deleted_invite_leaves_snapshot() {
        let (tracker, source, _ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 2, Some(7))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        assert!(tracker.invite_deleted(GUILD, "abc").await.unwrap());
        assert!(tracker.snapshots().get_entry(GUILD, "abc").is_none());
        assert!(tracker.snapshots().contains_guild(GUILD));
    }

    #[tokio::test]
    async fn vanity_join_has_no_inviter_to_credit() {
        let (tracker, source, ledger) = setup().await;
        source.set(GUILD, vec![invite("vanity", 10, None)]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        source.set(GUILD, vec![invite("vanity", 11, None)]);
        match tracker.member_joined(&member(42)).await.unwrap() {
            JoinOutcome::Attributed(record) => assert_eq!(record.inviter_id, None),
            other => panic!("expected attribution, got {other:?}"),
        }
        assert!(ledger.top_inviters(GUILD, 10).await.unwrap().is_empty());
        assert_eq!(
            tracker.member_left(&member(42)).await.unwrap(),
            LeaveOutcome::NoInviter
        );
    }

    #[tokio::test]
    async fn leave_reverses_inviter_credit() {
        let (tracker, source, ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();
        source.set(GUILD, vec![invite("abc", 6, Some(100))]);
        tracker.member_joined(&member(42)).await.unwrap();

        let outcome = tracker.member_left(&member(42)).await.unwrap();

        assert_eq!(
            outcome,
            LeaveOutcome::Counted {
                inviter_id: 100,
                update: StatsUpdate::Leave
            }
        );
        let stats = ledger.stats(GUILD, 100).await.unwrap().unwrap();
        assert_eq!(stats.regular, 0);
        assert_eq!(stats.left, 1);
        assert_eq!(stats.fake, 0);
    }

    #[tokio::test]
    async fn second_leave_after_unattributed_rejoin_is_not_charged() {
        let (tracker, source, ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();
        source.set(GUILD, vec![invite("abc", 6, Some(100))]);
        tracker.member_joined(&member(42)).await.unwrap();
        tracker.member_left(&member(42)).await.unwrap();

        assert_eq!(
            tracker.member_joined(&member(42)).await.unwrap(),
            JoinOutcome::Unattributed
        );
        assert_eq!(
            tracker.member_left(&member(42)).await.unwrap(),
            LeaveOutcome::Untracked
        );

        let stats = ledger.stats(GUILD, 100).await.unwrap().unwrap();
        assert_eq!(stats.regular, 0);
        assert_eq!(stats.left, 1);
    }

    #[tokio::test]
    async fn leave_during_join_delay_waits_for_the_join() {
        let ledger = Arc::new(DbLedger::new(connect_in_memory().await));
        let source = Arc::new(ScriptedSource::default());
        let tracker = Arc::new(InviteTracker::new(
            ledger.clone(),
            source.clone(),
            Duration::from_millis(200),
        ));
        ledger
            .save_settings(
                GUILD,
                &GuildSettings {
                    enabled: true,
                    config: InviteTrackingConfig {
                        fake_threshold_hours: 1,
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        source.set(GUILD, vec![invite("abc", 6, Some(100))]);
        let join = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.member_joined(&member(42)).await.unwrap() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let leave = tracker.member_left(&member(42)).await.unwrap();

        assert!(matches!(join.await.unwrap(), JoinOutcome::Attributed(_)));
        assert_eq!(
            leave,
            LeaveOutcome::Counted {
                inviter_id: 100,
                update: StatsUpdate::FakeLeave
            }
        );
        let stats = ledger.stats(GUILD, 100).await.unwrap().unwrap();
        assert_eq!(stats.regular, 0);
        assert_eq!(stats.fake, 1);
        assert_eq!(stats.left, 0);
    }

    #[tokio::test]
    async fn leave_without_record_changes_nothing() {
        let (tracker, _source, ledger) = setup().await;

        assert_eq!(
            tracker.member_left(&member(42)).await.unwrap(),
            LeaveOutcome::Untracked
        );
        assert!(ledger.top_inviters(GUILD, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn quick_leave_counts_as_fake_when_enabled() {
        let (tracker, source, ledger) = setup().await;
        ledger
            .save_settings(
                GUILD,
                &GuildSettings {
                    enabled: true,
                    config: InviteTrackingConfig {
                        fake_threshold_hours: 24,
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();
        source.set(GUILD, vec![invite("abc", 6, Some(100))]);
        tracker.member_joined(&member(42)).await.unwrap();

        let outcome = tracker.member_left(&member(42)).await.unwrap();

        assert_eq!(
            outcome,
            LeaveOutcome::Counted {
                inviter_id: 100,
                update: StatsUpdate::FakeLeave
            }
        );
        let stats = ledger.stats(GUILD, 100).await.unwrap().unwrap();
        assert_eq!(stats.fake, 1);
        assert_eq!(stats.left, 0);
    }

    #[tokio::test]
    async fn guild_removal_discards_snapshot() {
        let (tracker, source, _ledger) = setup().await;
        source.set(GUILD, vec![invite("abc", 1, Some(7))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        tracker.guild_removed(GUILD);
        assert!(!tracker.snapshots().contains_guild(GUILD));
    }

    #[tokio::test]
    async fn concurrent_joins_are_each_attributed_once() {
        let (tracker, source, ledger) = setup().await;
        let tracker = Arc::new(tracker);
        source.set(GUILD, vec![invite("abc", 5, Some(100))]);
        tracker.bootstrap_guild(GUILD).await.unwrap();

        // Both joins already happened by the time either fetch runs.
        source.set(GUILD, vec![invite("abc", 7, Some(100))]);
        let first = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.member_joined(&member(1)).await.unwrap() })
        };
        let second = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.member_joined(&member(2)).await.unwrap() })
        };
        let outcomes = [first.await.unwrap(), second.await.unwrap()];

        let attributed = outcomes
            .iter()
            .filter(|o| matches!(o, JoinOutcome::Attributed(_)))
            .count();
        assert_eq!(attributed, 1);
        assert_eq!(ledger.stats(GUILD, 100).await.unwrap().unwrap().regular, 1);
    }
}
