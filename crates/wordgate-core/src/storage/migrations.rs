//! Database schema migrations for wordgate.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn)?;
    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> SqliteResult<i32> {
    Ok(conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten()
        .unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: learners, catalog, per-learner progress and the reward ledger.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS learners (
            id                    INTEGER PRIMARY KEY AUTOINCREMENT,
            display_name          TEXT NOT NULL,
            grade_level           TEXT NOT NULL DEFAULT 'GRADE1',
            is_admin              INTEGER NOT NULL DEFAULT 0,
            xp                    INTEGER NOT NULL DEFAULT 0 CHECK (xp >= 0),
            currency              INTEGER NOT NULL DEFAULT 0 CHECK (currency >= 0),
            lives                 INTEGER NOT NULL DEFAULT 5 CHECK (lives BETWEEN 0 AND 5),
            streak                INTEGER NOT NULL DEFAULT 0,
            last_active_date      TEXT,
            last_life_refill_date TEXT
        );

        CREATE TABLE IF NOT EXISTS units (
            id          INTEGER PRIMARY KEY,
            title       TEXT NOT NULL DEFAULT '',
            order_index INTEGER NOT NULL,
            group_label TEXT,
            grade_level TEXT NOT NULL DEFAULT 'GRADE1',
            xp_reward   INTEGER NOT NULL DEFAULT 15
        );

        CREATE TABLE IF NOT EXISTS checkpoint_tests (
            id                    INTEGER PRIMARY KEY,
            title                 TEXT NOT NULL DEFAULT '',
            grade_level           TEXT NOT NULL,
            after_units_completed INTEGER NOT NULL,
            passing_score         INTEGER NOT NULL DEFAULT 70,
            lives_lost_on_fail    INTEGER NOT NULL DEFAULT 1,
            xp_reward             INTEGER NOT NULL DEFAULT 20,
            currency_reward       INTEGER NOT NULL DEFAULT 10,
            UNIQUE (grade_level, after_units_completed)
        );

        -- Exactly one of unit_id / test_id is set.
        CREATE TABLE IF NOT EXISTS questions (
            id             INTEGER PRIMARY KEY,
            unit_id        INTEGER REFERENCES units(id) ON DELETE CASCADE,
            test_id        INTEGER REFERENCES checkpoint_tests(id) ON DELETE CASCADE,
            prompt         TEXT NOT NULL DEFAULT '',
            correct_option TEXT NOT NULL,
            CHECK ((unit_id IS NULL) <> (test_id IS NULL))
        );
        CREATE INDEX IF NOT EXISTS idx_questions_unit ON questions(unit_id);
        CREATE INDEX IF NOT EXISTS idx_questions_test ON questions(test_id);

        CREATE TABLE IF NOT EXISTS unit_progress (
            learner_id   INTEGER NOT NULL REFERENCES learners(id) ON DELETE CASCADE,
            unit_id      INTEGER NOT NULL REFERENCES units(id) ON DELETE CASCADE,
            completed    INTEGER NOT NULL DEFAULT 0,
            unlocked     INTEGER NOT NULL DEFAULT 0,
            score        INTEGER NOT NULL DEFAULT 0,
            completed_at TEXT,
            PRIMARY KEY (learner_id, unit_id)
        );

        CREATE TABLE IF NOT EXISTS ledger (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            learner_id     INTEGER NOT NULL REFERENCES learners(id) ON DELETE CASCADE,
            xp_delta       INTEGER NOT NULL,
            currency_delta INTEGER NOT NULL,
            lives_delta    INTEGER NOT NULL,
            reason         TEXT NOT NULL,
            note           TEXT,
            at             TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_learner ON ledger(learner_id, id);

        CREATE TABLE IF NOT EXISTS gate_rewards (
            learner_id INTEGER NOT NULL REFERENCES learners(id) ON DELETE CASCADE,
            gate       INTEGER NOT NULL,
            granted_at TEXT NOT NULL,
            PRIMARY KEY (learner_id, gate)
        );

        CREATE TABLE IF NOT EXISTS daily_goals (
            learner_id       INTEGER NOT NULL REFERENCES learners(id) ON DELETE CASCADE,
            date             TEXT NOT NULL,
            lesson_completed INTEGER NOT NULL DEFAULT 0,
            quiz_completed   INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (learner_id, date)
        );

        CREATE TABLE IF NOT EXISTS achievements (
            learner_id  INTEGER NOT NULL REFERENCES learners(id) ON DELETE CASCADE,
            name        TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            earned_on   TEXT NOT NULL,
            PRIMARY KEY (learner_id, name)
        );",
    )?;

    set_schema_version(conn, 1)
}
