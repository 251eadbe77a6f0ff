//! Xp leaderboard, unlocked after a number of completed units.

use serde::{Deserialize, Serialize};

use crate::economy::{Learner, LearnerId};
use crate::storage::LeaderboardConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub learner_id: LearnerId,
    pub display_name: String,
    pub xp: u32,
    pub streak: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Leaderboard {
    Locked {
        completed_units: usize,
        required_units: usize,
    },
    Open {
        entries: Vec<LeaderboardEntry>,
    },
}

impl Leaderboard {
    /// Build the view for a viewer with `completed_units`. `ranked` must
    /// already be sorted by xp, highest first.
    pub fn view(config: &LeaderboardConfig, completed_units: usize, ranked: &[Learner]) -> Self {
        let required_units = config.unlock_after_units as usize;
        if completed_units < required_units {
            return Leaderboard::Locked {
                completed_units,
                required_units,
            };
        }
        let entries = ranked
            .iter()
            .take(config.size as usize)
            .zip(1u32..)
            .map(|(l, rank)| LeaderboardEntry {
                rank,
                learner_id: l.id,
                display_name: l.display_name.clone(),
                xp: l.xp,
                streak: l.streak,
            })
            .collect();
        Leaderboard::Open { entries }
    }
}
