//! Learner-facing operations over the database.
//!
//! Each operation is one unit of work in a `BEGIN IMMEDIATE` transaction:
//! load the learner, reconcile the daily clock, apply the pure
//! transitions from the engine modules, then persist the learner, the new
//! ledger entries, changed progress rows and granted gates together.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::daily::{streak_badges_due, Achievement, DailyActivity, DailyGoal};
use crate::economy::{
    Delta, EconomyClock, Learner, LearnerId, LedgerEntry, LifeShop, Moment, Payment, ReasonCode,
    Settlement, MAX_LIVES,
};
use crate::error::{CoreError, Result};
use crate::gate::{GateBonus, GateRewardEngine, GrantedGates};
use crate::leaderboard::Leaderboard;
use crate::mastery::{authorize_completion, MasteryProof};
use crate::milestone::{CheckpointTest, MilestoneTestGate, TestId, TestOutcome};
use crate::path::{
    Catalog, CatalogFile, CompletionResult, LessonPathResolver, PathEntry, ProgressBook, UnitId,
};
use crate::quiz::{Answers, QuizGrader, QuizResult};
use crate::storage::{Config, Database, ImportSummary, RewardsConfig, Store};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub learner: Learner,
    pub path: Vec<PathEntry>,
    pub completed_units: usize,
    pub total_units: usize,
    pub available_test: Option<CheckpointTest>,
    pub daily_goal: DailyGoal,
    pub achievements: Vec<Achievement>,
    pub leaderboard_unlocked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub result: QuizResult,
    pub lives_lost: u32,
    pub xp_awarded: u32,
    /// Set when the submission proved mastery.
    pub completion: Option<CompletionResult>,
    pub learner: Learner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonCompletion {
    pub completion: CompletionResult,
    pub learner: Learner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSubmission {
    pub test_id: TestId,
    pub outcome: TestOutcome,
    pub learner: Learner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifePurchase {
    pub amount: u32,
    pub payment: Payment,
    pub cost: u32,
    pub learner: Learner,
}

/// State loaded for one operation and written back by [`Work::finish`].
struct Work<'c> {
    store: Store<'c>,
    at: Moment,
    before: Learner,
    settlement: Settlement,
    book: ProgressBook,
    granted: GrantedGates,
    goal: DailyGoal,
    goal_touched: bool,
}

impl<'c> Work<'c> {
    fn begin(store: Store<'c>, clock: &EconomyClock, learner_id: LearnerId, at: Moment) -> Result<Self> {
        let before = store.learner(learner_id)?;
        let reconciled = clock.reconcile(&before, at)?;

        let mut settlement = Settlement::new(before.clone());
        if reconciled.changed(&before) {
            if store.claim_daily_refill(learner_id, at.today)? {
                settlement.absorb(reconciled.learner, reconciled.entry);
            } else {
                // Someone else reconciled first; start from their result.
                settlement = Settlement::new(store.learner(learner_id)?);
            }
        }

        Ok(Self {
            store,
            at,
            settlement,
            book: store.progress_book(learner_id)?,
            granted: store.granted_gates(learner_id)?,
            goal: store.daily_goal(learner_id, at.today)?,
            goal_touched: false,
            before,
        })
    }

    fn learner(&self) -> &Learner {
        self.settlement.learner()
    }

    fn learner_id(&self) -> LearnerId {
        self.before.id
    }

    fn record(&mut self, activity: DailyActivity) {
        self.goal_touched |= self.goal.record(activity);
    }

    fn require_lives(&self) -> Result<()> {
        if self.learner().is_out_of_lives() {
            return Err(CoreError::precondition(
                "no lives left; wait for the daily refill or buy more",
            ));
        }
        Ok(())
    }

    /// Complete a unit whose mastery is already authorized, then settle
    /// the lesson reward and any gate bonus.
    fn complete_unit(
        &mut self,
        catalog: &Catalog,
        rewards: &RewardsConfig,
        unit_id: UnitId,
        score: u8,
        xp: u32,
    ) -> Result<CompletionResult> {
        let already = CompletionResult {
            already_completed: true,
            gate_reward: None,
        };

        let completion =
            LessonPathResolver::new(catalog).mark_completed(&mut self.book, unit_id, score, self.at.now)?;
        if completion.already_completed {
            return Ok(already);
        }
        if !self.store.claim_completion(self.learner_id(), &completion.progress)? {
            return Ok(already);
        }

        self.settlement.post_with_note(
            Delta::xp(i64::from(xp)).with_currency(i64::from(rewards.lesson_currency)),
            ReasonCode::LessonComplete,
            Some(&format!("unit {unit_id}")),
            self.at,
        )?;

        let gate = GateRewardEngine::new(catalog, GateBonus::from(rewards)).on_unit_completed(
            &mut self.book,
            &mut self.granted,
            &mut self.settlement,
            unit_id,
            self.at,
        )?;

        Ok(CompletionResult {
            already_completed: false,
            gate_reward: Some(gate).filter(|g| g.gate_completed),
        })
    }

    fn finish(mut self) -> Result<Learner> {
        let store = self.store;
        let id = self.learner_id();

        for row in self.book.take_dirty() {
            store.upsert_progress(id, &row)?;
        }
        for gate in self.granted.take_added() {
            if !store.record_gate_reward(id, gate, self.at.now)? {
                return Err(CoreError::InvariantViolation(format!(
                    "{gate} bonus was already granted to learner {id}"
                )));
            }
        }
        if self.goal_touched {
            store.save_daily_goal(id, &self.goal)?;
        }

        let (learner, entries) = self.settlement.into_parts();
        if learner != self.before {
            store.update_learner(&learner)?;
        }
        for entry in &entries {
            store.append_ledger(entry)?;
        }

        if learner.streak > self.before.streak {
            let owned = store.achievements(id)?;
            for badge in streak_badges_due(learner.streak, &owned, self.at.today) {
                if store.add_achievement(id, &badge)? {
                    info!(learner = id, badge = %badge.name, "achievement earned");
                }
            }
        }
        Ok(learner)
    }
}

/// Entry point for every learner-facing operation.
pub struct ProgressService {
    db: Database,
    config: Config,
}

impl ProgressService {
    pub fn new(db: Database, config: Config) -> Self {
        Self { db, config }
    }

    /// Database and configuration from the data directory.
    pub fn open() -> Result<Self> {
        Ok(Self::new(Database::open()?, Config::load()?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn clock(config: &Config) -> EconomyClock {
        EconomyClock::new(config.economy.daily_refill)
    }

    pub fn register_learner(
        &mut self,
        display_name: &str,
        grade_level: Option<&str>,
        is_admin: bool,
        at: Moment,
    ) -> Result<Learner> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(CoreError::precondition("display name must not be empty"));
        }
        let grade_level = grade_level.map(str::trim).filter(|g| !g.is_empty());
        let mut learner =
            Learner::register(display_name, grade_level, is_admin, &self.config.economy, at.today);
        let id = self.db.immediate(|store| store.insert_learner(&learner))?;
        learner.id = id;
        info!(learner = learner.id, admin = is_admin, "learner registered");
        Ok(learner)
    }

    pub fn learners(&self) -> Result<Vec<Learner>> {
        self.db.store().learners()
    }

    /// Validate and store a catalog file.
    pub fn load_catalog(&mut self, file: &CatalogFile) -> Result<ImportSummary> {
        let summary = self.db.immediate(|store| store.import_catalog(file))?;
        info!(units = summary.units, tests = summary.tests, "catalog loaded");
        Ok(summary)
    }

    pub fn catalog(&self) -> Result<Catalog> {
        self.db.store().catalog()
    }

    /// Apply the daily clock without any other change.
    pub fn reconcile(&mut self, learner_id: LearnerId, at: Moment) -> Result<Learner> {
        let clock = Self::clock(&self.config);
        self.db
            .immediate(|store| Work::begin(*store, &clock, learner_id, at)?.finish())
    }

    pub fn resolve_path(&mut self, learner_id: LearnerId, at: Moment) -> Result<Vec<PathEntry>> {
        let clock = Self::clock(&self.config);
        self.db.immediate(|store| {
            let catalog = store.catalog()?;
            let mut work = Work::begin(*store, &clock, learner_id, at)?;
            let path = LessonPathResolver::new(&catalog).resolve_path(&mut work.book);
            work.finish()?;
            Ok(path)
        })
    }

    pub fn load_dashboard(&mut self, learner_id: LearnerId, at: Moment) -> Result<Dashboard> {
        let config = &self.config;
        let clock = Self::clock(config);
        self.db.immediate(|store| {
            let catalog = store.catalog()?;
            let tests = store.test_table()?;
            let mut work = Work::begin(*store, &clock, learner_id, at)?;
            let path = LessonPathResolver::new(&catalog).resolve_path(&mut work.book);
            let completed_units = work.book.completed_count();
            let available_test = tests.available_test(work.learner(), completed_units).cloned();
            let daily_goal = work.goal.clone();
            let learner = work.finish()?;

            Ok(Dashboard {
                learner,
                total_units: catalog.len(),
                completed_units,
                available_test,
                daily_goal,
                achievements: store.achievements(learner_id)?,
                leaderboard_unlocked: completed_units >= config.leaderboard.unlock_after_units as usize,
                path,
            })
        })
    }

    /// Grade a unit quiz.
    ///
    /// Every wrong answer costs a life. A pass pays the unit's xp and
    /// counts toward the daily goal. Only a perfect submission
    /// also completes the unit.
    pub fn submit_quiz(
        &mut self,
        learner_id: LearnerId,
        unit_id: UnitId,
        answers: &Answers,
        at: Moment,
    ) -> Result<QuizSubmission> {
        let rewards = &self.config.rewards;
        let clock = Self::clock(&self.config);
        self.db.immediate(|store| {
            let catalog = store.catalog()?;
            let unit = catalog
                .get(unit_id)
                .ok_or_else(|| CoreError::not_found("unit", unit_id))?;

            let mut work = Work::begin(*store, &clock, learner_id, at)?;
            work.require_lives()?;
            LessonPathResolver::new(&catalog).resolve_path(&mut work.book);
            if !work.book.is_unlocked(unit_id) {
                return Err(CoreError::precondition(format!("unit {unit_id} is locked")));
            }

            let questions = store.unit_questions(unit_id)?;
            if questions.is_empty() {
                return Err(CoreError::precondition(format!("unit {unit_id} has no quiz questions")));
            }
            let result = QuizGrader::new(u32::from(rewards.quiz_pass_percent)).grade(&questions, answers)?;

            let mut lives_lost = 0;
            if result.wrong() > 0 {
                let entry = work.settlement.post_with_note(
                    Delta::lives(-i64::from(result.wrong())),
                    ReasonCode::QuizMistakes,
                    Some(&format!("unit {unit_id}")),
                    at,
                )?;
                lives_lost = u32::try_from(entry.lives_delta.unsigned_abs()).unwrap_or(MAX_LIVES);
            }

            let mut xp_awarded = 0;
            if result.passed {
                work.settlement.post_with_note(
                    Delta::xp(i64::from(unit.xp_reward)),
                    ReasonCode::QuizPass,
                    Some(&format!("unit {unit_id}")),
                    at,
                )?;
                xp_awarded = unit.xp_reward;
                work.record(DailyActivity::Quiz);
            }

            let completion = match MasteryProof::from_quiz(&result) {
                Some(proof) => Some(work.complete_unit(&catalog, rewards, unit_id, proof.score(), 0)?),
                None => None,
            };

            info!(
                learner = learner_id,
                unit = unit_id,
                correct = result.correct,
                total = result.total,
                passed = result.passed,
                mastered = completion.is_some(),
                "quiz submitted"
            );
            let learner = work.finish()?;
            Ok(QuizSubmission {
                result,
                lives_lost,
                xp_awarded,
                completion,
                learner,
            })
        })
    }

    /// Manual completion, allowed only through the mastery override.
    pub fn complete_lesson(&mut self, learner_id: LearnerId, unit_id: UnitId, at: Moment) -> Result<LessonCompletion> {
        let rewards = &self.config.rewards;
        let clock = Self::clock(&self.config);
        self.db.immediate(|store| {
            let catalog = store.catalog()?;
            let unit = catalog
                .get(unit_id)
                .ok_or_else(|| CoreError::not_found("unit", unit_id))?;
            let mut work = Work::begin(*store, &clock, learner_id, at)?;
            let proof = authorize_completion(work.learner())?;
            let completion = work.complete_unit(&catalog, rewards, unit_id, proof.score(), unit.xp_reward)?;
            if !completion.already_completed {
                work.record(DailyActivity::Lesson);
            }
            let learner = work.finish()?;
            Ok(LessonCompletion { completion, learner })
        })
    }

    pub fn available_test(&mut self, learner_id: LearnerId, at: Moment) -> Result<Option<CheckpointTest>> {
        let clock = Self::clock(&self.config);
        self.db.immediate(|store| {
            let tests = store.test_table()?;
            let work = Work::begin(*store, &clock, learner_id, at)?;
            let test = tests
                .available_test(work.learner(), work.book.completed_count())
                .cloned();
            work.finish()?;
            Ok(test)
        })
    }

    /// Grade a checkpoint test. The test must belong to the learner's
    /// grade and its unit threshold must have been reached.
    pub fn submit_test(
        &mut self,
        learner_id: LearnerId,
        test_id: TestId,
        answers: &Answers,
        at: Moment,
    ) -> Result<TestSubmission> {
        let clock = Self::clock(&self.config);
        self.db.immediate(|store| {
            let test = store.checkpoint_test(test_id)?;
            let mut work = Work::begin(*store, &clock, learner_id, at)?;
            work.require_lives()?;

            let completed = work.book.completed_count();
            if test.grade_level != work.learner().grade_level
                || completed < test.after_units_completed as usize
            {
                return Err(CoreError::precondition(format!(
                    "test {test_id} is not available yet ({completed} of {} units completed)",
                    test.after_units_completed
                )));
            }

            let questions = store.test_questions(test_id)?;
            let outcome =
                MilestoneTestGate::new().submit_test(&test, &questions, answers, &mut work.settlement, at)?;
            let learner = work.finish()?;
            Ok(TestSubmission {
                test_id,
                outcome,
                learner,
            })
        })
    }

    pub fn buy_lives(
        &mut self,
        learner_id: LearnerId,
        amount: u32,
        payment: Payment,
        at: Moment,
    ) -> Result<LifePurchase> {
        let shop = LifeShop::new(self.config.shop.clone());
        let clock = Self::clock(&self.config);
        self.db.immediate(|store| {
            let mut work = Work::begin(*store, &clock, learner_id, at)?;
            let purchase = shop.buy(work.learner(), amount, payment, at)?;
            work.settlement.absorb(purchase.learner, Some(purchase.entry));
            let learner = work.finish()?;
            info!(learner = learner_id, amount, ?payment, cost = purchase.cost, "lives purchased");
            Ok(LifePurchase {
                amount,
                payment,
                cost: purchase.cost,
                learner,
            })
        })
    }

    /// Ledger history, oldest first, optionally only the last `limit`.
    pub fn ledger(&self, learner_id: LearnerId, limit: Option<u32>) -> Result<Vec<LedgerEntry>> {
        let store = self.db.store();
        store.learner(learner_id)?;
        store.ledger(learner_id, limit)
    }

    pub fn achievements(&self, learner_id: LearnerId) -> Result<Vec<Achievement>> {
        let store = self.db.store();
        store.learner(learner_id)?;
        store.achievements(learner_id)
    }

    pub fn leaderboard(&self, viewer_id: LearnerId) -> Result<Leaderboard> {
        let store = self.db.store();
        store.learner(viewer_id)?;
        let completed = store.progress_book(viewer_id)?.completed_count();
        let ranked = store.top_learners(self.config.leaderboard.size)?;
        Ok(Leaderboard::view(&self.config.leaderboard, completed, &ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> Moment {
        Moment::on(NaiveDate::from_ymd_opt(2024, 5, d).unwrap())
    }

    fn service() -> ProgressService {
        let mut svc = ProgressService::new(Database::open_memory().unwrap(), Config::default());
        let file = CatalogFile::from_toml_str(
            r#"
            [[units]]
            id = 1
            order_index = 1
            group = "CỬA 1"
            questions = [{ id = 11, correct_option = "A" }, { id = 12, correct_option = "B" }]

            [[units]]
            id = 2
            order_index = 2
            group = "CỬA 1"
            questions = [{ id = 21, correct_option = "A" }]
            "#,
        )
        .unwrap();
        svc.load_catalog(&file).unwrap();
        svc
    }

    fn answers(pairs: &[(i64, &str)]) -> Answers {
        pairs.iter().map(|(q, a)| (*q, a.to_string())).collect()
    }

    #[test]
    fn register_rejects_blank_name() {
        let mut svc = service();
        assert!(svc.register_learner("  ", None, false, day(1)).is_err());
        let l = svc.register_learner("Lan", Some(""), false, day(1)).unwrap();
        assert_eq!(l.grade_level, "GRADE1");
        assert!(l.id > 0);
    }

    #[test]
    fn perfect_quiz_completes_unit() {
        let mut svc = service();
        let l = svc.register_learner("Lan", None, false, day(1)).unwrap();
        let out = svc
            .submit_quiz(l.id, 1, &answers(&[(11, "a"), (12, "B")]), day(1))
            .unwrap();
        assert!(out.result.perfect);
        assert_eq!(out.xp_awarded, 15);
        assert_eq!(out.completion.as_ref().map(|c| c.already_completed), Some(false));
        assert_eq!(out.learner.xp, 15);
        assert_eq!(out.learner.currency, 510);

        let path = svc.resolve_path(l.id, day(1)).unwrap();
        assert!(path[0].progress.completed);
        assert!(path[1].progress.unlocked);
    }

    #[test]
    fn imperfect_quiz_costs_lives_without_completing() {
        let mut svc = service();
        let l = svc.register_learner("Lan", None, false, day(1)).unwrap();
        let out = svc.submit_quiz(l.id, 1, &answers(&[(11, "A")]), day(1)).unwrap();
        assert!(!out.result.passed);
        assert_eq!(out.lives_lost, 1);
        assert!(out.completion.is_none());
        assert_eq!(out.learner.lives, 4);
    }

    #[test]
    fn locked_unit_quiz_is_rejected() {
        let mut svc = service();
        let l = svc.register_learner("Lan", None, false, day(1)).unwrap();
        let err = svc.submit_quiz(l.id, 2, &answers(&[(21, "A")]), day(1)).unwrap_err();
        assert!(matches!(err, CoreError::PreconditionFailed(_)));
        assert_eq!(svc.ledger(l.id, None).unwrap().len(), 0);
    }

    #[test]
    fn manual_completion_requires_admin() {
        let mut svc = service();
        let learner = svc.register_learner("Lan", None, false, day(1)).unwrap();
        assert!(svc.complete_lesson(learner.id, 1, day(1)).is_err());

        let admin = svc.register_learner("Admin", None, true, day(1)).unwrap();
        let done = svc.complete_lesson(admin.id, 1, day(1)).unwrap();
        assert!(!done.completion.already_completed);
        assert_eq!(done.learner.xp, 15);
        assert_eq!(done.learner.currency, 510);
    }
}
