//! The lesson path: catalog order, per-learner progress and unlocking.

pub mod catalog;
mod progress;
mod resolver;

pub use catalog::{
    parse_gate_ordinal, Catalog, CatalogFile, GateId, LearningUnit, TestSpec, UnitId, UnitSpec,
};
pub use progress::{ProgressBook, UnitProgress, UnitState};
pub use resolver::{Completion, CompletionResult, LessonPathResolver, PathEntry};
