//! # Wordgate Core Library
//!
//! Progress engine for a gamified vocabulary course. It decides which
//! units a learner may open, who may mark a unit mastered, what each
//! action pays or costs, and how the daily clock regenerates lives and
//! tracks streaks. Everything is available through the `wordgate` CLI,
//! which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Engine**: pure transitions over owned values ([`economy`], [`quiz`],
//!   [`path`], [`gate`], [`milestone`], [`mastery`], [`daily`])
//! - **Storage**: SQLite persistence and TOML configuration ([`storage`])
//! - **Service**: one transaction per learner-facing operation ([`service`])
//!
//! ## Key Components
//!
//! - [`ProgressService`]: every operation a learner or admin can trigger
//! - [`LessonPathResolver`]: unlock state along the global unit order
//! - [`RewardLedger`]: the only place balances change
//! - [`EconomyClock`]: daily life refill and streak arithmetic

pub mod daily;
pub mod economy;
pub mod error;
pub mod gate;
pub mod leaderboard;
pub mod mastery;
pub mod milestone;
pub mod path;
pub mod quiz;
pub mod service;
pub mod storage;

pub use daily::{Achievement, DailyGoal};
pub use economy::{
    EconomyClock, Learner, LearnerId, LedgerEntry, LifeShop, Moment, Payment, ReasonCode,
    RewardLedger, Settlement, MAX_LIVES,
};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use gate::{GateRewardEngine, GateRewardResult};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use mastery::{authorize_completion, MasteryProof};
pub use milestone::{CheckpointTest, MilestoneTestGate, TestOutcome, TestResult, TestTable};
pub use path::{
    Catalog, CatalogFile, CompletionResult, GateId, LearningUnit, LessonPathResolver, PathEntry,
    UnitId, UnitProgress, UnitState,
};
pub use quiz::{Answers, ChoiceQuestion, QuizGrader, QuizResult};
pub use service::{
    Dashboard, LessonCompletion, LifePurchase, ProgressService, QuizSubmission, TestSubmission,
};
pub use storage::{Config, Database};
