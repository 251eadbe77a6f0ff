//! SQLite storage for learners, the catalog, progress and the ledger.
//!
//! [`Database`] owns the connection and runs units of work in
//! `BEGIN IMMEDIATE` transactions. [`Store`] holds the row-level queries
//! and works over any `&Connection`, so the same code runs inside and
//! outside a transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{data_dir, migrations};
use crate::daily::{Achievement, DailyGoal};
use crate::economy::{Learner, LearnerId, LedgerEntry, ReasonCode};
use crate::error::{CoreError, DatabaseError, Result};
use crate::gate::GrantedGates;
use crate::milestone::{CheckpointTest, TestId, TestTable};
use crate::path::{Catalog, CatalogFile, GateId, LearningUnit, ProgressBook, UnitId, UnitProgress};
use crate::quiz::ChoiceQuestion;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite database handle.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data_dir>/wordgate.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("wordgate.db");
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Read-only access outside a transaction.
    pub fn store(&self) -> Store<'_> {
        Store::new(&self.conn)
    }

    /// Run `f` in one `BEGIN IMMEDIATE` transaction. The write lock is
    /// taken up front, so concurrent writers serialize instead of racing
    /// between read and write. Any error rolls everything back.
    pub fn immediate<T>(&mut self, f: impl FnOnce(&Store<'_>) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&Store::new(&tx))?;
        tx.commit()?;
        Ok(out)
    }
}

/// What a catalog import wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub units: usize,
    pub tests: usize,
    pub questions: usize,
}

/// Row-level reads and writes.
#[derive(Clone, Copy)]
pub struct Store<'c> {
    conn: &'c Connection,
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn datetime_col(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| conversion_error(idx, e))
        })
        .transpose()
}

fn date_str(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

const LEARNER_COLUMNS: &str = "id, display_name, grade_level, is_admin, xp, currency, lives, \
                               streak, last_active_date, last_life_refill_date";

fn row_to_learner(row: &Row) -> rusqlite::Result<Learner> {
    Ok(Learner {
        id: row.get(0)?,
        display_name: row.get(1)?,
        grade_level: row.get(2)?,
        is_admin: row.get(3)?,
        xp: row.get(4)?,
        currency: row.get(5)?,
        lives: row.get(6)?,
        streak: row.get(7)?,
        last_active_date: date_col(row, 8)?,
        last_life_refill_date: date_col(row, 9)?,
    })
}

fn row_to_unit(row: &Row) -> rusqlite::Result<LearningUnit> {
    let group_label: Option<String> = row.get(3)?;
    Ok(LearningUnit {
        id: row.get(0)?,
        title: row.get(1)?,
        order_index: row.get(2)?,
        gate: group_label.as_deref().and_then(crate::path::parse_gate_ordinal),
        group_label,
        grade_level: row.get(4)?,
        xp_reward: row.get(5)?,
    })
}

const TEST_COLUMNS: &str = "id, title, grade_level, after_units_completed, passing_score, \
                            lives_lost_on_fail, xp_reward, currency_reward";

fn row_to_test(row: &Row) -> rusqlite::Result<CheckpointTest> {
    Ok(CheckpointTest {
        id: row.get(0)?,
        title: row.get(1)?,
        grade_level: row.get(2)?,
        after_units_completed: row.get(3)?,
        passing_score: row.get(4)?,
        lives_lost_on_fail: row.get(5)?,
        xp_reward: row.get(6)?,
        currency_reward: row.get(7)?,
    })
}

fn row_to_ledger_entry(row: &Row) -> rusqlite::Result<LedgerEntry> {
    let reason: String = row.get(4)?;
    Ok(LedgerEntry {
        learner_id: row.get(0)?,
        xp_delta: row.get(1)?,
        currency_delta: row.get(2)?,
        lives_delta: row.get(3)?,
        reason: reason.parse::<ReasonCode>().map_err(|e| conversion_error(4, e))?,
        note: row.get(5)?,
        at: datetime_col(row, 6)?.unwrap_or_else(Utc::now),
    })
}

impl<'c> Store<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ── learners ────────────────────────────────────────────────────────

    /// Insert and return the assigned id.
    pub fn insert_learner(&self, learner: &Learner) -> Result<LearnerId> {
        self.conn.execute(
            "INSERT INTO learners (display_name, grade_level, is_admin, xp, currency, lives,
                                   streak, last_active_date, last_life_refill_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                learner.display_name,
                learner.grade_level,
                learner.is_admin,
                learner.xp,
                learner.currency,
                learner.lives,
                learner.streak,
                date_str(learner.last_active_date),
                date_str(learner.last_life_refill_date),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn learner(&self, id: LearnerId) -> Result<Learner> {
        self.conn
            .query_row(
                &format!("SELECT {LEARNER_COLUMNS} FROM learners WHERE id = ?1"),
                [id],
                row_to_learner,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("learner", id))
    }

    pub fn learners(&self) -> Result<Vec<Learner>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {LEARNER_COLUMNS} FROM learners ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_learner)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Highest xp first; ties broken by id.
    pub fn top_learners(&self, limit: u32) -> Result<Vec<Learner>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LEARNER_COLUMNS} FROM learners ORDER BY xp DESC, id ASC LIMIT ?1"
        ))?;
        let rows = stmt.query_map([limit], row_to_learner)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn update_learner(&self, learner: &Learner) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE learners
             SET display_name = ?2, grade_level = ?3, is_admin = ?4, xp = ?5, currency = ?6,
                 lives = ?7, streak = ?8, last_active_date = ?9, last_life_refill_date = ?10
             WHERE id = ?1",
            params![
                learner.id,
                learner.display_name,
                learner.grade_level,
                learner.is_admin,
                learner.xp,
                learner.currency,
                learner.lives,
                learner.streak,
                date_str(learner.last_active_date),
                date_str(learner.last_life_refill_date),
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found("learner", learner.id));
        }
        Ok(())
    }

    /// Claim today's refill. Returns `false` if it was already claimed,
    /// in which case no refill may be granted.
    pub fn claim_daily_refill(&self, learner_id: LearnerId, today: NaiveDate) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE learners SET last_life_refill_date = ?2
             WHERE id = ?1 AND (last_life_refill_date IS NULL OR last_life_refill_date < ?2)",
            params![learner_id, today.format(DATE_FORMAT).to_string()],
        )?;
        Ok(changed == 1)
    }

    // ── catalog ─────────────────────────────────────────────────────────

    pub fn units(&self) -> Result<Vec<LearningUnit>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, order_index, group_label, grade_level, xp_reward
             FROM units ORDER BY order_index, id",
        )?;
        let rows = stmt.query_map([], row_to_unit)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn catalog(&self) -> Result<Catalog> {
        Ok(Catalog::new(self.units()?)?)
    }

    pub fn unit_questions(&self, unit_id: UnitId) -> Result<Vec<ChoiceQuestion>> {
        self.questions("unit_id", unit_id)
    }

    pub fn test_questions(&self, test_id: TestId) -> Result<Vec<ChoiceQuestion>> {
        self.questions("test_id", test_id)
    }

    fn questions(&self, owner_column: &str, owner: i64) -> Result<Vec<ChoiceQuestion>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, prompt, correct_option FROM questions WHERE {owner_column} = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map([owner], |row| {
            Ok(ChoiceQuestion {
                id: row.get(0)?,
                prompt: row.get(1)?,
                correct_option: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn checkpoint_tests(&self) -> Result<Vec<CheckpointTest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEST_COLUMNS} FROM checkpoint_tests ORDER BY grade_level, after_units_completed"
        ))?;
        let rows = stmt.query_map([], row_to_test)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn checkpoint_test(&self, id: TestId) -> Result<CheckpointTest> {
        self.conn
            .query_row(
                &format!("SELECT {TEST_COLUMNS} FROM checkpoint_tests WHERE id = ?1"),
                [id],
                row_to_test,
            )
            .optional()?
            .ok_or_else(|| CoreError::not_found("test", id))
    }

    pub fn test_table(&self) -> Result<TestTable> {
        Ok(TestTable::new(self.checkpoint_tests()?)?)
    }

    /// Validate and upsert a catalog file. Question sets of the imported
    /// units and tests are replaced; progress rows are kept.
    pub fn import_catalog(&self, file: &CatalogFile) -> Result<ImportSummary> {
        file.catalog()?;
        TestTable::new(file.tests.iter().map(|t| t.test.clone()))?;

        let mut summary = ImportSummary::default();
        for spec in &file.units {
            self.conn.execute(
                "INSERT INTO units (id, title, order_index, group_label, grade_level, xp_reward)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title, order_index = excluded.order_index,
                    group_label = excluded.group_label, grade_level = excluded.grade_level,
                    xp_reward = excluded.xp_reward",
                params![
                    spec.id,
                    spec.title,
                    spec.order_index,
                    spec.group,
                    spec.grade_level,
                    spec.xp_reward
                ],
            )?;
            self.conn
                .execute("DELETE FROM questions WHERE unit_id = ?1", [spec.id])?;
            for q in &spec.questions {
                self.insert_question(q, Some(spec.id), None)?;
            }
            summary.units += 1;
            summary.questions += spec.questions.len();
        }

        for spec in &file.tests {
            let t = &spec.test;
            self.conn.execute(
                "INSERT INTO checkpoint_tests (id, title, grade_level, after_units_completed,
                     passing_score, lives_lost_on_fail, xp_reward, currency_reward)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title, grade_level = excluded.grade_level,
                    after_units_completed = excluded.after_units_completed,
                    passing_score = excluded.passing_score,
                    lives_lost_on_fail = excluded.lives_lost_on_fail,
                    xp_reward = excluded.xp_reward, currency_reward = excluded.currency_reward",
                params![
                    t.id,
                    t.title,
                    t.grade_level,
                    t.after_units_completed,
                    t.passing_score,
                    t.lives_lost_on_fail,
                    t.xp_reward,
                    t.currency_reward
                ],
            )?;
            self.conn
                .execute("DELETE FROM questions WHERE test_id = ?1", [t.id])?;
            for q in &spec.questions {
                self.insert_question(q, None, Some(t.id))?;
            }
            summary.tests += 1;
            summary.questions += spec.questions.len();
        }

        // The merged catalog must still be a valid order.
        self.catalog()?;
        self.test_table()?;
        debug!(?summary, "catalog imported");
        Ok(summary)
    }

    fn insert_question(&self, q: &ChoiceQuestion, unit: Option<UnitId>, test: Option<TestId>) -> Result<()> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO questions (id, unit_id, test_id, prompt, correct_option)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![q.id, unit, test, q.prompt, q.correct_option],
        )?;
        if inserted == 0 {
            return Err(crate::error::ValidationError::DuplicateId {
                collection: "question".into(),
                id: q.id,
            }
            .into());
        }
        Ok(())
    }

    // ── progress ────────────────────────────────────────────────────────

    pub fn progress_rows(&self, learner_id: LearnerId) -> Result<Vec<UnitProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT unit_id, completed, unlocked, score, completed_at
             FROM unit_progress WHERE learner_id = ?1 ORDER BY unit_id",
        )?;
        let rows = stmt.query_map([learner_id], |row| {
            Ok(UnitProgress {
                unit_id: row.get(0)?,
                completed: row.get(1)?,
                unlocked: row.get(2)?,
                score: row.get(3)?,
                completed_at: datetime_col(row, 4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn progress_book(&self, learner_id: LearnerId) -> Result<ProgressBook> {
        Ok(ProgressBook::from_rows(self.progress_rows(learner_id)?))
    }

    /// Insert or merge one row. `unlocked` and `completed` only ever go
    /// from 0 to 1; score and timestamp are frozen once completed.
    pub fn upsert_progress(&self, learner_id: LearnerId, row: &UnitProgress) -> Result<()> {
        self.conn.execute(
            "INSERT INTO unit_progress (learner_id, unit_id, completed, unlocked, score, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(learner_id, unit_id) DO UPDATE SET
                score = CASE WHEN unit_progress.completed = 0 AND excluded.completed = 1
                             THEN excluded.score ELSE unit_progress.score END,
                completed_at = CASE WHEN unit_progress.completed = 0 AND excluded.completed = 1
                             THEN excluded.completed_at ELSE unit_progress.completed_at END,
                completed = MAX(unit_progress.completed, excluded.completed),
                unlocked = MAX(unit_progress.unlocked, excluded.unlocked, excluded.completed)",
            params![
                learner_id,
                row.unit_id,
                row.completed,
                row.unlocked || row.completed,
                row.score,
                row.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Compare-and-swap the completion of one unit. Returns `false` if the
    /// row was already completed, in which case nothing was written.
    pub fn claim_completion(&self, learner_id: LearnerId, row: &UnitProgress) -> Result<bool> {
        self.conn.execute(
            "INSERT OR IGNORE INTO unit_progress (learner_id, unit_id, completed, unlocked)
             VALUES (?1, ?2, 0, 1)",
            params![learner_id, row.unit_id],
        )?;
        let changed = self.conn.execute(
            "UPDATE unit_progress SET completed = 1, unlocked = 1, score = ?3, completed_at = ?4
             WHERE learner_id = ?1 AND unit_id = ?2 AND completed = 0",
            params![
                learner_id,
                row.unit_id,
                row.score,
                row.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(changed == 1)
    }

    // ── ledger ──────────────────────────────────────────────────────────

    pub fn append_ledger(&self, entry: &LedgerEntry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO ledger (learner_id, xp_delta, currency_delta, lives_delta, reason, note, at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.learner_id,
                entry.xp_delta,
                entry.currency_delta,
                entry.lives_delta,
                entry.reason.as_str(),
                entry.note,
                entry.at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Oldest first. `limit` keeps the most recent entries.
    pub fn ledger(&self, learner_id: LearnerId, limit: Option<u32>) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT learner_id, xp_delta, currency_delta, lives_delta, reason, note, at
             FROM (SELECT * FROM ledger WHERE learner_id = ?1 ORDER BY id DESC LIMIT ?2)
             ORDER BY id ASC",
        )?;
        let limit = limit.map_or(-1, i64::from);
        let rows = stmt.query_map(params![learner_id, limit], row_to_ledger_entry)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    // ── gates ───────────────────────────────────────────────────────────

    pub fn granted_gates(&self, learner_id: LearnerId) -> Result<GrantedGates> {
        let mut stmt = self
            .conn
            .prepare("SELECT gate FROM gate_rewards WHERE learner_id = ?1")?;
        let gates = stmt
            .query_map([learner_id], |row| row.get::<_, u32>(0).map(GateId))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(GrantedGates::from_gates(gates))
    }

    /// Returns `false` if the gate was already recorded.
    pub fn record_gate_reward(&self, learner_id: LearnerId, gate: GateId, at: DateTime<Utc>) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO gate_rewards (learner_id, gate, granted_at) VALUES (?1, ?2, ?3)",
            params![learner_id, gate.ordinal(), at.to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    // ── daily goals and achievements ────────────────────────────────────

    /// Stored goal for the day, or a blank one.
    pub fn daily_goal(&self, learner_id: LearnerId, date: NaiveDate) -> Result<DailyGoal> {
        let goal = self
            .conn
            .query_row(
                "SELECT lesson_completed, quiz_completed FROM daily_goals
                 WHERE learner_id = ?1 AND date = ?2",
                params![learner_id, date.format(DATE_FORMAT).to_string()],
                |row| {
                    Ok(DailyGoal {
                        date,
                        lesson_completed: row.get(0)?,
                        quiz_completed: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(goal.unwrap_or_else(|| DailyGoal::new(date)))
    }

    pub fn save_daily_goal(&self, learner_id: LearnerId, goal: &DailyGoal) -> Result<()> {
        self.conn.execute(
            "INSERT INTO daily_goals (learner_id, date, lesson_completed, quiz_completed)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(learner_id, date) DO UPDATE SET
                lesson_completed = MAX(lesson_completed, excluded.lesson_completed),
                quiz_completed = MAX(quiz_completed, excluded.quiz_completed)",
            params![
                learner_id,
                goal.date.format(DATE_FORMAT).to_string(),
                goal.lesson_completed,
                goal.quiz_completed
            ],
        )?;
        Ok(())
    }

    pub fn achievements(&self, learner_id: LearnerId) -> Result<Vec<Achievement>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, description, earned_on FROM achievements
             WHERE learner_id = ?1 ORDER BY earned_on, name",
        )?;
        let rows = stmt.query_map([learner_id], |row| {
            Ok(Achievement {
                name: row.get(0)?,
                description: row.get(1)?,
                earned_on: date_col(row, 2)?.unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn add_achievement(&self, learner_id: LearnerId, achievement: &Achievement) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO achievements (learner_id, name, description, earned_on)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                learner_id,
                achievement.name,
                achievement.description,
                achievement.earned_on.format(DATE_FORMAT).to_string()
            ],
        )?;
        Ok(inserted == 1)
    }
}
