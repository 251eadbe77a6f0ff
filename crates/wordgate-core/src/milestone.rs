//! Checkpoint tests unlocked by the number of completed units.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::economy::{Delta, Learner, Moment, ReasonCode, Settlement, MAX_LIVES};
use crate::error::{CoreError, Result, ValidationError};
use crate::quiz::{percent, tally, AnswerKey, Answers};

pub type TestId = i64;

fn default_passing_score() -> u8 {
    70
}

fn default_lives_lost() -> u32 {
    1
}

fn default_test_xp() -> u32 {
    20
}

fn default_test_currency() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointTest {
    pub id: TestId,
    #[serde(default)]
    pub title: String,
    pub grade_level: String,
    pub after_units_completed: u32,
    /// Minimum score (0-100) to pass.
    #[serde(default = "default_passing_score")]
    pub passing_score: u8,
    #[serde(default = "default_lives_lost")]
    pub lives_lost_on_fail: u32,
    #[serde(default = "default_test_xp")]
    pub xp_reward: u32,
    #[serde(default = "default_test_currency")]
    pub currency_reward: u32,
}

impl CheckpointTest {
    pub fn new(id: TestId, grade_level: &str, after_units_completed: u32) -> Self {
        Self {
            id,
            title: String::new(),
            grade_level: grade_level.to_string(),
            after_units_completed,
            passing_score: default_passing_score(),
            lives_lost_on_fail: default_lives_lost(),
            xp_reward: default_test_xp(),
            currency_reward: default_test_currency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub score: u8,
    pub correct: u32,
    pub total: u32,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub result: TestResult,
    /// Lives actually removed (after clamping at zero).
    pub lives_lost: u32,
    /// Graded attempts must be blocked until lives regenerate.
    pub out_of_lives: bool,
}

/// Configured tests, at most one per `(grade_level, after_units_completed)`.
#[derive(Debug, Clone, Default)]
pub struct TestTable {
    by_trigger: HashMap<(String, u32), CheckpointTest>,
}

impl TestTable {
    pub fn new(tests: impl IntoIterator<Item = CheckpointTest>) -> Result<Self, ValidationError> {
        let mut by_trigger = HashMap::new();
        for test in tests {
            let key = (test.grade_level.clone(), test.after_units_completed);
            if by_trigger.contains_key(&key) {
                return Err(ValidationError::DuplicateTrigger {
                    grade_level: key.0,
                    after_units_completed: key.1,
                });
            }
            by_trigger.insert(key, test);
        }
        Ok(Self { by_trigger })
    }

    pub fn len(&self) -> usize {
        self.by_trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_trigger.is_empty()
    }

    /// The test for the learner's grade whose threshold equals the
    /// number of units they have completed.
    pub fn available_test(&self, learner: &Learner, completed_count: usize) -> Option<&CheckpointTest> {
        let count = u32::try_from(completed_count).ok()?;
        self.by_trigger.get(&(learner.grade_level.clone(), count))
    }
}

/// Grades checkpoint tests and applies their asymmetric consequences.
#[derive(Debug, Clone, Default)]
pub struct MilestoneTestGate;

impl MilestoneTestGate {
    pub fn new() -> Self {
        Self
    }

    /// Score a submission against `test.passing_score`.
    pub fn grade<Q: AnswerKey>(
        &self,
        test: &CheckpointTest,
        questions: &[Q],
        answers: &Answers,
    ) -> Result<TestResult> {
        if questions.is_empty() {
            return Err(CoreError::precondition(format!(
                "test {} has no questions",
                test.id
            )));
        }
        let (correct, total) = tally(questions, answers)?;
        let score = percent(correct, total);
        Ok(TestResult {
            score,
            correct,
            total,
            passed: score >= test.passing_score,
        })
    }

    /// Grade and settle: a pass pays `TEST_PASS`, a fail costs lives
    /// with `TEST_FAIL`.
    pub fn submit_test<Q: AnswerKey>(
        &self,
        test: &CheckpointTest,
        questions: &[Q],
        answers: &Answers,
        settlement: &mut Settlement,
        at: Moment,
    ) -> Result<TestOutcome> {
        let result = self.grade(test, questions, answers)?;
        let note = format!("test {} scored {}", test.id, result.score);

        let lives_lost = if result.passed {
            settlement.post_with_note(
                Delta::xp(i64::from(test.xp_reward))
                    .with_currency(i64::from(test.currency_reward)),
                ReasonCode::TestPass,
                Some(&note),
                at,
            )?;
            0
        } else {
            let entry = settlement.post_with_note(
                Delta::lives(-i64::from(test.lives_lost_on_fail)),
                ReasonCode::TestFail,
                Some(&note),
                at,
            )?;
            u32::try_from(entry.lives_delta.unsigned_abs()).unwrap_or(MAX_LIVES)
        };

        let out_of_lives = settlement.learner().is_out_of_lives();
        info!(
            learner = settlement.learner().id,
            test = test.id,
            score = result.score,
            passed = result.passed,
            out_of_lives,
            "checkpoint test submitted"
        );

        Ok(TestOutcome {
            result,
            lives_lost,
            out_of_lives,
        })
    }
}
