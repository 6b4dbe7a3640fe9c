use crate::db::entities::invite_stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsUpdate {
    Join,
    Leave,
    FakeLeave,
    /// Manual adjustment; negative values take bonus away.
    Bonus(i32),
}

/// Stored counters for one inviter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InviterStats {
    pub regular: i32,
    pub left: i32,
    pub fake: i32,
    pub bonus: i32,
}

impl InviterStats {
    /// Display total. Recomputed on every read, never stored.
    pub fn total(&self) -> i64 {
        i64::from(self.regular) + i64::from(self.bonus) - i64::from(self.left) - i64::from(self.fake)
    }

    /// Applies one update. Counters never drop below zero.
    pub fn apply(mut self, update: StatsUpdate) -> Self {
        match update {
            StatsUpdate::Join => self.regular = self.regular.saturating_add(1),
            StatsUpdate::Leave => {
                self.regular = (self.regular - 1).max(0);
                self.left = self.left.saturating_add(1);
            }
            StatsUpdate::FakeLeave => {
                self.regular = (self.regular - 1).max(0);
                self.fake = self.fake.saturating_add(1);
            }
            StatsUpdate::Bonus(amount) => self.bonus = self.bonus.saturating_add(amount).max(0),
        }
        self
    }

    /// Whether an update may create a stats row for an inviter that has none.
    pub fn creates_row(update: StatsUpdate) -> bool {
        matches!(update, StatsUpdate::Join | StatsUpdate::Bonus(_))
    }
}

impl From<&invite_stats::Model> for InviterStats {
    fn from(model: &invite_stats::Model) -> Self {
        Self {
            regular: model.regular_invites,
            left: model.left_invites,
            fake: model.fake_invites,
            bonus: model.bonus_invites,
        }
    }
}
