//! Reward ledger: the only place economy values change.
//!
//! Every call to [`RewardLedger::apply`] yields exactly one immutable
//! [`LedgerEntry`]; the entry history is the audit trail of the economy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::clock::next_streak;
use super::{Learner, LearnerId, Moment, MAX_LIVES};
use crate::error::{CoreError, Result};

/// Why an economy mutation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    FreeRefill,
    GateBonus,
    TestPass,
    TestFail,
    QuizPass,
    QuizMistakes,
    LessonComplete,
    BuyLivesXp,
    BuyLivesCurrency,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::FreeRefill => "FREE_REFILL",
            ReasonCode::GateBonus => "GATE_BONUS",
            ReasonCode::TestPass => "TEST_PASS",
            ReasonCode::TestFail => "TEST_FAIL",
            ReasonCode::QuizPass => "QUIZ_PASS",
            ReasonCode::QuizMistakes => "QUIZ_MISTAKES",
            ReasonCode::LessonComplete => "LESSON_COMPLETE",
            ReasonCode::BuyLivesXp => "BUY_LIVES_XP",
            ReasonCode::BuyLivesCurrency => "BUY_LIVES_CURRENCY",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let code = match s {
            "FREE_REFILL" => ReasonCode::FreeRefill,
            "GATE_BONUS" => ReasonCode::GateBonus,
            "TEST_PASS" => ReasonCode::TestPass,
            "TEST_FAIL" => ReasonCode::TestFail,
            "QUIZ_PASS" => ReasonCode::QuizPass,
            "QUIZ_MISTAKES" => ReasonCode::QuizMistakes,
            "LESSON_COMPLETE" => ReasonCode::LessonComplete,
            "BUY_LIVES_XP" => ReasonCode::BuyLivesXp,
            "BUY_LIVES_CURRENCY" => ReasonCode::BuyLivesCurrency,
            other => {
                return Err(CoreError::InvariantViolation(format!(
                    "unknown ledger reason code '{other}'"
                )))
            }
        };
        Ok(code)
    }
}

/// Requested change to a learner's economy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delta {
    pub xp: i64,
    pub currency: i64,
    pub lives: i64,
}

impl Delta {
    pub fn xp(xp: i64) -> Self {
        Self {
            xp,
            ..Self::default()
        }
    }

    pub fn currency(currency: i64) -> Self {
        Self {
            currency,
            ..Self::default()
        }
    }

    pub fn lives(lives: i64) -> Self {
        Self {
            lives,
            ..Self::default()
        }
    }

    pub fn with_currency(mut self, currency: i64) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_lives(mut self, lives: i64) -> Self {
        self.lives = lives;
        self
    }
}

/// Append-only audit record of one economy mutation.
///
/// Deltas are the ones actually applied, so `lives_delta` reflects clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub learner_id: LearnerId,
    pub xp_delta: i64,
    pub currency_delta: i64,
    pub lives_delta: i64,
    pub reason: ReasonCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

fn offset(value: u32, delta: i64, field: &str) -> Result<u32> {
    let next = i64::from(value) + delta;
    if next < 0 {
        return Err(CoreError::precondition(format!(
            "{field} would drop below zero ({value} {delta:+})"
        )));
    }
    u32::try_from(next)
        .map_err(|_| CoreError::precondition(format!("{field} overflow ({value} {delta:+})")))
}

/// Applies deltas and writes the matching ledger entry.
#[derive(Debug, Clone, Default)]
pub struct RewardLedger;

impl RewardLedger {
    pub fn new() -> Self {
        Self
    }

    /// Apply `delta` to `learner`.
    ///
    /// Lives are clamped to `[0, MAX_LIVES]`. Xp and currency are never
    /// clamped: a delta that would make either negative is rejected, so
    /// callers must check affordability first. A positive xp delta also
    /// advances the streak and stamps `last_active_date`.
    pub fn apply(
        &self,
        learner: &Learner,
        delta: Delta,
        reason: ReasonCode,
        at: Moment,
    ) -> Result<(Learner, LedgerEntry)> {
        self.apply_with_note(learner, delta, reason, None, at)
    }

    pub fn apply_with_note(
        &self,
        learner: &Learner,
        delta: Delta,
        reason: ReasonCode,
        note: Option<&str>,
        at: Moment,
    ) -> Result<(Learner, LedgerEntry)> {
        let mut next = learner.clone();

        next.xp = offset(learner.xp, delta.xp, "xp")?;
        next.currency = offset(learner.currency, delta.currency, "currency")?;

        let lives = (i64::from(learner.lives) + delta.lives).clamp(0, i64::from(MAX_LIVES));
        next.lives = lives as u32;

        if delta.xp > 0 {
            next.streak = next_streak(learner.streak, learner.last_active_date, at.today);
            next.last_active_date = Some(at.today);
        }

        let entry = LedgerEntry {
            learner_id: learner.id,
            xp_delta: delta.xp,
            currency_delta: delta.currency,
            lives_delta: i64::from(next.lives) - i64::from(learner.lives),
            reason,
            note: note.map(str::to_string),
            at: at.now,
        };
        debug!(
            learner = learner.id,
            reason = %reason,
            xp = entry.xp_delta,
            currency = entry.currency_delta,
            lives = entry.lives_delta,
            "ledger entry"
        );
        Ok((next, entry))
    }
}

/// Learner value plus the entries posted during one unit of work.
///
/// Operations that touch the economy several times (quiz pass, lesson
/// completion, gate bonus) thread a settlement through each step and the
/// caller persists the final learner and all entries together.
#[derive(Debug, Clone)]
pub struct Settlement {
    learner: Learner,
    entries: Vec<LedgerEntry>,
    ledger: RewardLedger,
}

impl Settlement {
    pub fn new(learner: Learner) -> Self {
        Self {
            learner,
            entries: Vec::new(),
            ledger: RewardLedger::new(),
        }
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Apply and record one delta.
    pub fn post(&mut self, delta: Delta, reason: ReasonCode, at: Moment) -> Result<&LedgerEntry> {
        self.post_with_note(delta, reason, None, at)
    }

    pub fn post_with_note(
        &mut self,
        delta: Delta,
        reason: ReasonCode,
        note: Option<&str>,
        at: Moment,
    ) -> Result<&LedgerEntry> {
        let (next, entry) = self
            .ledger
            .apply_with_note(&self.learner, delta, reason, note, at)?;
        self.learner = next;
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Record an entry produced elsewhere (e.g. by the clock) whose
    /// effect is already reflected in `learner`.
    pub fn absorb(&mut self, learner: Learner, entry: Option<LedgerEntry>) {
        self.learner = learner;
        self.entries.extend(entry);
    }

    pub fn into_parts(self) -> (Learner, Vec<LedgerEntry>) {
        (self.learner, self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::fixtures::{day, learner};

    #[test]
    fn every_apply_writes_one_entry() {
        let ledger = RewardLedger::new();
        let (next, entry) = ledger
            .apply(&learner(), Delta::currency(50), ReasonCode::GateBonus, Moment::on(day(2024, 1, 1)))
            .unwrap();
        assert_eq!(next.currency, 550);
        assert_eq!(entry.currency_delta, 50);
        assert_eq!(entry.reason, ReasonCode::GateBonus);
    }

    #[test]
    fn lives_clamp_both_ways() {
        let ledger = RewardLedger::new();
        let at = Moment::on(day(2024, 1, 1));
        let mut l = learner();
        l.lives = 1;
        let (down, entry) = ledger.apply(&l, Delta::lives(-3), ReasonCode::TestFail, at).unwrap();
        assert_eq!(down.lives, 0);
        assert_eq!(entry.lives_delta, -1);

        let (up, entry) = ledger.apply(&down, Delta::lives(9), ReasonCode::FreeRefill, at).unwrap();
        assert_eq!(up.lives, MAX_LIVES);
        assert_eq!(entry.lives_delta, 5);
    }

    #[test]
    fn negative_xp_is_rejected() {
        let ledger = RewardLedger::new();
        let err = ledger
            .apply(&learner(), Delta::xp(-1), ReasonCode::BuyLivesXp, Moment::on(day(2024, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, CoreError::PreconditionFailed(_)));
    }

    #[test]
    fn xp_event_drives_streak() {
        let ledger = RewardLedger::new();
        let mut l = learner();
        l.streak = 3;
        l.last_active_date = Some(day(2024, 1, 1));

        let (next, _) = ledger
            .apply(&l, Delta::xp(15), ReasonCode::QuizPass, Moment::on(day(2024, 1, 2)))
            .unwrap();
        assert_eq!(next.streak, 4);
        assert_eq!(next.last_active_date, Some(day(2024, 1, 2)));

        let (reset, _) = ledger
            .apply(&l, Delta::xp(15), ReasonCode::QuizPass, Moment::on(day(2024, 1, 4)))
            .unwrap();
        assert_eq!(reset.streak, 1);

        let (same, _) = ledger
            .apply(&l, Delta::xp(15), ReasonCode::QuizPass, Moment::on(day(2024, 1, 1)))
            .unwrap();
        assert_eq!(same.streak, 3);
    }

    #[test]
    fn non_xp_events_leave_streak_alone() {
        let ledger = RewardLedger::new();
        let mut l = learner();
        l.streak = 3;
        l.last_active_date = Some(day(2024, 1, 1));
        let (next, _) = ledger
            .apply(&l, Delta::currency(10), ReasonCode::LessonComplete, Moment::on(day(2024, 1, 9)))
            .unwrap();
        assert_eq!(next.streak, 3);
        assert_eq!(next.last_active_date, Some(day(2024, 1, 1)));
    }

    #[test]
    fn reason_codes_round_trip_through_text() {
        for code in [ReasonCode::FreeRefill, ReasonCode::BuyLivesCurrency, ReasonCode::TestFail] {
            assert_eq!(code.as_str().parse::<ReasonCode>().unwrap(), code);
        }
        assert!("NOPE".parse::<ReasonCode>().is_err());
    }

    #[test]
    fn settlement_accumulates_entries() {
        let at = Moment::on(day(2024, 1, 1));
        let mut s = Settlement::new(learner());
        s.post(Delta::xp(15), ReasonCode::QuizPass, at).unwrap();
        s.post(Delta::currency(10), ReasonCode::LessonComplete, at).unwrap();
        let (l, entries) = s.into_parts();
        assert_eq!(l.xp, 15);
        assert_eq!(l.currency, 510);
        assert_eq!(entries.len(), 2);
    }
}
