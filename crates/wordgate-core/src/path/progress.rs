//! Per-learner unit progress rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use super::catalog::UnitId;

/// Access state of a unit for one learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Locked,
    Unlocked,
    Completed,
}

/// Progress of one learner on one unit. `completed` implies `unlocked`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitProgress {
    pub unit_id: UnitId,
    pub completed: bool,
    pub unlocked: bool,
    pub score: u8,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UnitProgress {
    pub fn locked(unit_id: UnitId) -> Self {
        Self {
            unit_id,
            completed: false,
            unlocked: false,
            score: 0,
            completed_at: None,
        }
    }

    pub fn unlocked(unit_id: UnitId) -> Self {
        Self {
            unlocked: true,
            ..Self::locked(unit_id)
        }
    }

    pub fn state(&self) -> UnitState {
        if self.completed {
            UnitState::Completed
        } else if self.unlocked {
            UnitState::Unlocked
        } else {
            UnitState::Locked
        }
    }
}

/// All progress rows of one learner, keyed by unit.
///
/// Rows created or modified through the book are tracked as dirty so the
/// caller can write back exactly what changed.
#[derive(Debug, Clone, Default)]
pub struct ProgressBook {
    rows: HashMap<UnitId, UnitProgress>,
    dirty: BTreeSet<UnitId>,
}

impl ProgressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load stored rows, healing `completed && !unlocked`.
    pub fn from_rows(rows: impl IntoIterator<Item = UnitProgress>) -> Self {
        let mut book = Self::new();
        for mut row in rows {
            if row.completed && !row.unlocked {
                warn!(
                    unit = row.unit_id,
                    "progress row completed but locked; forcing unlocked"
                );
                row.unlocked = true;
                book.dirty.insert(row.unit_id);
            }
            book.rows.insert(row.unit_id, row);
        }
        book
    }

    pub fn get(&self, unit_id: UnitId) -> Option<&UnitProgress> {
        self.rows.get(&unit_id)
    }

    pub fn contains(&self, unit_id: UnitId) -> bool {
        self.rows.contains_key(&unit_id)
    }

    pub fn is_completed(&self, unit_id: UnitId) -> bool {
        self.rows.get(&unit_id).is_some_and(|p| p.completed)
    }

    pub fn is_unlocked(&self, unit_id: UnitId) -> bool {
        self.rows.get(&unit_id).is_some_and(|p| p.unlocked)
    }

    pub fn completed_count(&self) -> usize {
        self.rows.values().filter(|p| p.completed).count()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a row that does not exist yet. Existing rows are kept.
    pub fn materialize(&mut self, row: UnitProgress) -> &UnitProgress {
        let unit_id = row.unit_id;
        if !self.rows.contains_key(&unit_id) {
            self.rows.insert(unit_id, row);
            self.dirty.insert(unit_id);
        }
        &self.rows[&unit_id]
    }

    /// Create the row unlocked, or flip an existing locked row.
    /// Returns `true` when something changed.
    pub fn unlock(&mut self, unit_id: UnitId) -> bool {
        match self.rows.get_mut(&unit_id) {
            Some(row) if row.unlocked => false,
            Some(row) => {
                row.unlocked = true;
                self.dirty.insert(unit_id);
                true
            }
            None => {
                self.rows.insert(unit_id, UnitProgress::unlocked(unit_id));
                self.dirty.insert(unit_id);
                true
            }
        }
    }

    /// Mark complete. Returns `false` (and changes nothing) if the row was
    /// already completed.
    pub fn complete(&mut self, unit_id: UnitId, score: u8, at: DateTime<Utc>) -> bool {
        let row = self
            .rows
            .entry(unit_id)
            .or_insert_with(|| UnitProgress::locked(unit_id));
        if row.completed {
            return false;
        }
        row.completed = true;
        row.unlocked = true;
        row.score = score.min(100);
        row.completed_at = Some(at);
        self.dirty.insert(unit_id);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnitProgress> {
        self.rows.values()
    }

    pub fn has_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Drain changed rows in unit-id order.
    pub fn take_dirty(&mut self) -> Vec<UnitProgress> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty
            .into_iter()
            .filter_map(|id| self.rows.get(&id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_flags() {
        let mut p = UnitProgress::locked(1);
        assert_eq!(p.state(), UnitState::Locked);
        p.unlocked = true;
        assert_eq!(p.state(), UnitState::Unlocked);
        p.completed = true;
        assert_eq!(p.state(), UnitState::Completed);
    }

    #[test]
    fn completed_but_locked_rows_are_healed() {
        let mut row = UnitProgress::locked(5);
        row.completed = true;
        let mut book = ProgressBook::from_rows([row]);
        assert!(book.is_unlocked(5));
        let dirty = book.take_dirty();
        assert_eq!(dirty.len(), 1);
        assert!(dirty[0].unlocked);
        assert!(!book.has_changes());
    }

    #[test]
    fn complete_is_idempotent() {
        let mut book = ProgressBook::new();
        let at = Utc::now();
        assert!(book.complete(1, 100, at));
        book.take_dirty();
        assert!(!book.complete(1, 40, at));
        assert_eq!(book.get(1).unwrap().score, 100);
        assert!(!book.has_changes());
    }

    #[test]
    fn unlock_never_relocks() {
        let mut book = ProgressBook::from_rows([UnitProgress::unlocked(2)]);
        assert!(!book.unlock(2));
        assert!(book.unlock(3));
        assert!(book.is_unlocked(3));
    }

    #[test]
    fn materialize_keeps_existing_rows() {
        let mut book = ProgressBook::from_rows([UnitProgress::unlocked(2)]);
        let row = book.materialize(UnitProgress::locked(2));
        assert!(row.unlocked);
        assert!(!book.has_changes());
    }
}
