//! Unlock state of the lesson path.
//!
//! A unit is unlocked when it is first in the global order or when its
//! predecessor is completed. Gate bonuses may additionally unlock the
//! first unit of a gate; see [`crate::gate`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::{Catalog, LearningUnit, UnitId};
use super::progress::{ProgressBook, UnitProgress, UnitState};
use crate::error::{CoreError, Result};
use crate::gate::GateRewardResult;

/// One row of a learner's path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub unit: LearningUnit,
    pub progress: UnitProgress,
    pub state: UnitState,
}

/// Outcome of [`LessonPathResolver::mark_completed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub already_completed: bool,
    pub progress: UnitProgress,
    /// Successor unlocked by this completion, if it was locked before.
    pub next_unlocked: Option<UnitId>,
}

/// Completion as reported to callers, with gate side effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub already_completed: bool,
    pub gate_reward: Option<GateRewardResult>,
}

pub struct LessonPathResolver<'c> {
    catalog: &'c Catalog,
}

impl<'c> LessonPathResolver<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// Materialize missing progress rows and return the whole path in order.
    ///
    /// Single pass: a missing row is unlocked iff it is first or its
    /// predecessor is completed. Existing rows are never changed, so the
    /// result is deterministic for identical inputs.
    pub fn resolve_path(&self, book: &mut ProgressBook) -> Vec<PathEntry> {
        let mut path = Vec::with_capacity(self.catalog.len());
        let mut prev_completed = true;

        for unit in self.catalog.units() {
            let row = if prev_completed {
                UnitProgress::unlocked(unit.id)
            } else {
                UnitProgress::locked(unit.id)
            };
            let progress = book.materialize(row).clone();
            prev_completed = progress.completed;
            path.push(PathEntry {
                unit: unit.clone(),
                state: progress.state(),
                progress,
            });
        }
        path
    }

    /// Mark `unit_id` completed with `score` and unlock its successor.
    ///
    /// The caller has already established mastery; this only enforces
    /// reachability. Reachable means the row is unlocked, the unit is first,
    /// or the predecessor row is completed. Completing an already completed
    /// unit is a no-op reported through `already_completed`.
    pub fn mark_completed(
        &self,
        book: &mut ProgressBook,
        unit_id: UnitId,
        score: u8,
        now: DateTime<Utc>,
    ) -> Result<Completion> {
        let unit = self
            .catalog
            .get(unit_id)
            .ok_or_else(|| CoreError::not_found("unit", unit_id))?;

        if let Some(existing) = book.get(unit_id).filter(|p| p.completed) {
            return Ok(Completion {
                already_completed: true,
                progress: existing.clone(),
                next_unlocked: None,
            });
        }

        let reachable = book.is_unlocked(unit_id)
            || match self.catalog.predecessor(unit_id) {
                None => true,
                Some(prev) => book.is_completed(prev.id),
            };
        if !reachable {
            return Err(CoreError::precondition(format!(
                "unit {unit_id} is locked: its predecessor is not completed"
            )));
        }

        book.complete(unit_id, score, now);

        let next_unlocked = self
            .catalog
            .successor(unit.id)
            .map(|next| next.id)
            .filter(|&next| book.unlock(next));

        debug!(unit = unit_id, score, ?next_unlocked, "unit completed");

        let progress = book
            .get(unit_id)
            .cloned()
            .ok_or_else(|| CoreError::InvariantViolation(format!("progress for {unit_id} vanished")))?;
        Ok(Completion {
            already_completed: false,
            progress,
            next_unlocked,
        })
    }
}
