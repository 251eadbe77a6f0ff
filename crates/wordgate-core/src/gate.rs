//! Gate (chapter) completion bonuses.
//!
//! A gate pays its bonus once per learner: the grant is recorded in
//! [`GrantedGates`], which storage persists next to the ledger, so the
//! check stays safe even if it runs more than once for a gate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

use crate::economy::{Delta, Moment, ReasonCode, Settlement};
use crate::error::{CoreError, Result};
use crate::path::{Catalog, GateId, ProgressBook, UnitId};
use crate::storage::RewardsConfig;

/// Gates whose bonus a learner has already received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantedGates {
    granted: BTreeSet<GateId>,
    added: Vec<GateId>,
}

impl GrantedGates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_gates(gates: impl IntoIterator<Item = GateId>) -> Self {
        Self {
            granted: gates.into_iter().collect(),
            added: Vec::new(),
        }
    }

    pub fn contains(&self, gate: GateId) -> bool {
        self.granted.contains(&gate)
    }

    /// Returns `false` if the gate was already granted.
    fn grant(&mut self, gate: GateId) -> bool {
        if self.granted.insert(gate) {
            self.added.push(gate);
            true
        } else {
            false
        }
    }

    /// Gates granted since load, for the caller to persist.
    pub fn take_added(&mut self) -> Vec<GateId> {
        std::mem::take(&mut self.added)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRewardResult {
    pub gate_completed: bool,
    pub gate_id: Option<GateId>,
    pub currency_reward: u32,
    pub xp_reward: u32,
    pub next_gate_unlocked: bool,
    pub next_gate_id: Option<GateId>,
}

impl GateRewardResult {
    pub fn none() -> Self {
        Self {
            gate_completed: false,
            gate_id: None,
            currency_reward: 0,
            xp_reward: 0,
            next_gate_unlocked: false,
            next_gate_id: None,
        }
    }
}

/// Bonus paid when every unit of a gate is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateBonus {
    pub currency: u32,
    pub xp: u32,
}

impl Default for GateBonus {
    fn default() -> Self {
        Self {
            currency: 50,
            xp: 100,
        }
    }
}

impl From<&RewardsConfig> for GateBonus {
    fn from(config: &RewardsConfig) -> Self {
        Self {
            currency: config.gate_bonus_currency,
            xp: config.gate_bonus_xp,
        }
    }
}

pub struct GateRewardEngine<'c> {
    catalog: &'c Catalog,
    bonus: GateBonus,
}

impl<'c> GateRewardEngine<'c> {
    pub fn new(catalog: &'c Catalog, bonus: GateBonus) -> Self {
        Self { catalog, bonus }
    }

    /// Check the gate of a just-completed unit.
    ///
    /// Must be called once per completion that actually changed state.
    /// Ungated units, incomplete gates and already-granted gates yield
    /// [`GateRewardResult::none`].
    pub fn on_unit_completed(
        &self,
        book: &mut ProgressBook,
        granted: &mut GrantedGates,
        settlement: &mut Settlement,
        unit_id: UnitId,
        at: Moment,
    ) -> Result<GateRewardResult> {
        let unit = self
            .catalog
            .get(unit_id)
            .ok_or_else(|| CoreError::not_found("unit", unit_id))?;
        let Some(gate) = unit.gate else {
            return Ok(GateRewardResult::none());
        };

        let members = self.catalog.gate_units(gate);
        let all_done = !members.is_empty() && members.iter().all(|u| book.is_completed(u.id));
        if !all_done || !granted.grant(gate) {
            return Ok(GateRewardResult::none());
        }

        settlement.post_with_note(
            Delta::xp(i64::from(self.bonus.xp)).with_currency(i64::from(self.bonus.currency)),
            ReasonCode::GateBonus,
            Some(&gate.to_string()),
            at,
        )?;
        info!(
            learner = settlement.learner().id,
            %gate,
            currency = self.bonus.currency,
            xp = self.bonus.xp,
            "gate bonus granted"
        );

        let next_gate_id = self.catalog.next_gate(gate);
        if let Some(first) = next_gate_id.and_then(|g| self.catalog.first_unit_of(g)) {
            book.unlock(first.id);
        }

        Ok(GateRewardResult {
            gate_completed: true,
            gate_id: Some(gate),
            currency_reward: self.bonus.currency,
            xp_reward: self.bonus.xp,
            next_gate_unlocked: next_gate_id.is_some(),
            next_gate_id,
        })
    }
}
