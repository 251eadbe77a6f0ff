//! Buying lives with xp or currency.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::ledger::{Delta, LedgerEntry, ReasonCode, RewardLedger};
use super::{Learner, Moment, MAX_LIVES};
use crate::error::{CoreError, Result};
use crate::storage::ShopConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payment {
    Xp,
    Currency,
}

impl FromStr for Payment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xp" => Ok(Payment::Xp),
            "currency" | "gems" => Ok(Payment::Currency),
            other => Err(CoreError::precondition(format!("unknown payment type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Purchase {
    pub learner: Learner,
    pub entry: LedgerEntry,
    pub cost: u32,
}

#[derive(Debug, Clone)]
pub struct LifeShop {
    config: ShopConfig,
    ledger: RewardLedger,
}

impl LifeShop {
    pub fn new(config: ShopConfig) -> Self {
        Self {
            config,
            ledger: RewardLedger::new(),
        }
    }

    pub fn price(&self, amount: u32, payment: Payment) -> u32 {
        let unit = match payment {
            Payment::Xp => self.config.xp_per_life,
            Payment::Currency => self.config.currency_per_life,
        };
        unit.saturating_mul(amount)
    }

    /// Exchange xp or currency for `amount` lives.
    ///
    /// Rejected when `amount` is zero, when the learner would exceed
    /// [`MAX_LIVES`], or when they cannot afford it. Nothing is charged for
    /// lives the cap would swallow.
    pub fn buy(&self, learner: &Learner, amount: u32, payment: Payment, at: Moment) -> Result<Purchase> {
        if amount == 0 {
            return Err(CoreError::precondition("amount must be greater than zero"));
        }
        if learner.lives.saturating_add(amount) > MAX_LIVES {
            return Err(CoreError::precondition(format!(
                "cannot hold more than {MAX_LIVES} lives (have {}, buying {amount})",
                learner.lives
            )));
        }

        let cost = self.price(amount, payment);
        let (balance, delta, reason) = match payment {
            Payment::Xp => (
                learner.xp,
                Delta::xp(-i64::from(cost)),
                ReasonCode::BuyLivesXp,
            ),
            Payment::Currency => (
                learner.currency,
                Delta::currency(-i64::from(cost)),
                ReasonCode::BuyLivesCurrency,
            ),
        };
        if balance < cost {
            return Err(CoreError::precondition(format!(
                "not enough {payment:?}: need {cost}, have {balance}"
            )));
        }

        let (next, entry) = self.ledger.apply(
            learner,
            delta.with_lives(i64::from(amount)),
            reason,
            at,
        )?;
        Ok(Purchase {
            learner: next,
            entry,
            cost,
        })
    }
}
