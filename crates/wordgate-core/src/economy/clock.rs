//! Daily engagement clock: streak arithmetic and free life regeneration.

use chrono::{Days, NaiveDate};
use tracing::debug;

use super::ledger::{Delta, LedgerEntry, ReasonCode, RewardLedger};
use super::{Learner, Moment, MAX_LIVES};
use crate::error::Result;

/// Streak after an xp-earning event on `today`.
///
/// - never active, or last active before yesterday: restart at 1
/// - last active yesterday: extend by one
/// - already active today: unchanged
pub fn next_streak(streak: u32, last_active: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(last) = last_active else {
        return 1;
    };
    let yesterday = today.checked_sub_days(Days::new(1));
    if Some(last) == yesterday {
        streak.saturating_add(1)
    } else if last >= today {
        // Same day, or a date from a skewed clock.
        streak
    } else {
        1
    }
}

/// Outcome of [`EconomyClock::reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub learner: Learner,
    /// The `FREE_REFILL` entry, when lives were actually granted.
    pub entry: Option<LedgerEntry>,
}

impl Reconciliation {
    pub fn changed(&self, before: &Learner) -> bool {
        self.learner != *before
    }
}

/// Lazily regenerates lives once per calendar day.
#[derive(Debug, Clone)]
pub struct EconomyClock {
    daily_refill: u32,
    ledger: RewardLedger,
}

impl EconomyClock {
    pub fn new(daily_refill: u32) -> Self {
        Self {
            daily_refill,
            ledger: RewardLedger::new(),
        }
    }

    /// Bring `learner` up to date for `at.today`.
    ///
    /// Idempotent per day: once `last_life_refill_date == today` this
    /// returns the learner unchanged.
    pub fn reconcile(&self, learner: &Learner, at: Moment) -> Result<Reconciliation> {
        let due = match learner.last_life_refill_date {
            None => true,
            Some(last) => last < at.today,
        };
        if !due {
            return Ok(Reconciliation {
                learner: learner.clone(),
                entry: None,
            });
        }

        let missing = MAX_LIVES.saturating_sub(learner.lives);
        let refill = self.daily_refill.min(missing);

        let (mut next, entry) = if refill > 0 {
            let (next, entry) = self.ledger.apply_with_note(
                learner,
                Delta::lives(i64::from(refill)),
                ReasonCode::FreeRefill,
                Some("daily free refill"),
                at,
            )?;
            (next, Some(entry))
        } else {
            (learner.clone(), None)
        };

        // Advance even when nothing was missing so the day is not re-checked.
        next.last_life_refill_date = Some(at.today);
        debug!(
            learner = learner.id,
            refill,
            lives = next.lives,
            "daily life reconciliation"
        );

        Ok(Reconciliation {
            learner: next,
            entry,
        })
    }
}

impl Default for EconomyClock {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::fixtures::{day, learner};

    #[test]
    fn streak_extends_on_consecutive_day() {
        let d = day(2024, 5, 1);
        assert_eq!(next_streak(4, Some(d), day(2024, 5, 2)), 5);
    }

    #[test]
    fn streak_resets_after_gap() {
        let d = day(2024, 5, 1);
        assert_eq!(next_streak(4, Some(d), day(2024, 5, 4)), 1);
    }

    #[test]
    fn streak_unchanged_same_day() {
        let d = day(2024, 5, 1);
        assert_eq!(next_streak(4, Some(d), d), 4);
    }

    #[test]
    fn streak_starts_at_one_when_never_active() {
        assert_eq!(next_streak(0, None, day(2024, 5, 1)), 1);
    }

    #[test]
    fn streak_crosses_month_boundary() {
        assert_eq!(next_streak(9, Some(day(2024, 2, 29)), day(2024, 3, 1)), 10);
    }

    #[test]
    fn refill_grants_two_and_logs_once() {
        let clock = EconomyClock::default();
        let today = day(2024, 5, 2);
        let mut l = learner();
        l.lives = 3;
        l.last_life_refill_date = Some(day(2024, 5, 1));

        let r = clock.reconcile(&l, Moment::on(today)).unwrap();
        assert_eq!(r.learner.lives, 5);
        assert_eq!(r.learner.last_life_refill_date, Some(today));
        let entry = r.entry.expect("refill entry");
        assert_eq!(entry.reason, ReasonCode::FreeRefill);
        assert_eq!(entry.lives_delta, 2);
    }

    #[test]
    fn refill_is_capped_by_missing_lives() {
        let clock = EconomyClock::default();
        let mut l = learner();
        l.lives = 4;
        let r = clock.reconcile(&l, Moment::on(day(2024, 5, 2))).unwrap();
        assert_eq!(r.learner.lives, MAX_LIVES);
        assert_eq!(r.entry.unwrap().lives_delta, 1);
    }

    #[test]
    fn full_lives_advance_date_without_entry() {
        let clock = EconomyClock::default();
        let today = day(2024, 5, 2);
        let l = learner();
        let r = clock.reconcile(&l, Moment::on(today)).unwrap();
        assert!(r.entry.is_none());
        assert_eq!(r.learner.lives, MAX_LIVES);
        assert_eq!(r.learner.last_life_refill_date, Some(today));
    }

    #[test]
    fn second_call_same_day_is_noop() {
        let clock = EconomyClock::default();
        let at = Moment::on(day(2024, 5, 2));
        let mut l = learner();
        l.lives = 0;
        let first = clock.reconcile(&l, at).unwrap();
        assert_eq!(first.learner.lives, 2);
        let second = clock.reconcile(&first.learner, at).unwrap();
        assert!(second.entry.is_none());
        assert!(!second.changed(&first.learner));
    }

    #[test]
    fn reconcile_does_not_touch_streak() {
        let clock = EconomyClock::default();
        let mut l = learner();
        l.lives = 1;
        l.streak = 6;
        l.last_active_date = Some(day(2024, 4, 1));
        let r = clock.reconcile(&l, Moment::on(day(2024, 5, 2))).unwrap();
        assert_eq!(r.learner.streak, 6);
        assert_eq!(r.learner.last_active_date, Some(day(2024, 4, 1)));
    }
}
