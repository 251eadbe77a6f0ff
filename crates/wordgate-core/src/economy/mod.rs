//! Learner economy: xp, currency, lives and the daily engagement clock.
//!
//! All transitions here are pure: they take a [`Learner`] by reference and
//! return the next value together with the ledger entries that explain it.
//! Persisting the result is the caller's job.

mod clock;
mod ledger;
mod shop;

pub use clock::{next_streak, EconomyClock, Reconciliation};
pub use ledger::{Delta, LedgerEntry, ReasonCode, RewardLedger, Settlement};
pub use shop::{LifeShop, Payment, Purchase};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::EconomyConfig;

/// Hard cap on lives (hearts).
pub const MAX_LIVES: u32 = 5;

/// Grade assigned when registration does not name one.
pub const DEFAULT_GRADE: &str = "GRADE1";

pub type LearnerId = i64;

/// A point in time as seen by one logical operation.
///
/// `today` is carried separately from `now` so every comparison in a unit
/// of work uses the same calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub now: DateTime<Utc>,
    pub today: NaiveDate,
}

impl Moment {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            today: now.date_naive(),
        }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Noon UTC on the given day.
    pub fn on(today: NaiveDate) -> Self {
        let now = today
            .and_hms_opt(12, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);
        Self { now, today }
    }
}

/// A learner and their mutable economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learner {
    pub id: LearnerId,
    pub display_name: String,
    pub grade_level: String,
    #[serde(default)]
    pub is_admin: bool,
    pub xp: u32,
    pub currency: u32,
    pub lives: u32,
    pub streak: u32,
    pub last_active_date: Option<NaiveDate>,
    pub last_life_refill_date: Option<NaiveDate>,
}

impl Learner {
    /// A fresh learner with the configured starting economy. The id is
    /// assigned by storage.
    pub fn register(
        display_name: &str,
        grade_level: Option<&str>,
        is_admin: bool,
        config: &EconomyConfig,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: 0,
            display_name: display_name.to_string(),
            grade_level: grade_level.unwrap_or(DEFAULT_GRADE).to_string(),
            is_admin,
            xp: 0,
            currency: config.starting_currency,
            lives: config.starting_lives.min(MAX_LIVES),
            streak: 0,
            last_active_date: None,
            last_life_refill_date: Some(today),
        }
    }

    /// Graded attempts are blocked while the learner has no lives.
    pub fn is_out_of_lives(&self) -> bool {
        self.lives == 0
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::day;
    use super::*;

    #[test]
    fn register_uses_starting_economy() {
        let today = day(2024, 3, 10);
        let learner = Learner::register("Lan", None, false, &EconomyConfig::default(), today);
        assert_eq!(learner.currency, 500);
        assert_eq!(learner.lives, MAX_LIVES);
        assert_eq!(learner.streak, 0);
        assert_eq!(learner.grade_level, "GRADE1");
        assert_eq!(learner.last_life_refill_date, Some(today));
        assert_eq!(learner.last_active_date, None);
    }

    #[test]
    fn moment_on_day_keeps_the_day() {
        let m = Moment::on(day(2024, 12, 31));
        assert_eq!(m.today, day(2024, 12, 31));
        assert_eq!(m.now.date_naive(), m.today);
    }
}
