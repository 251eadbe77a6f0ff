//! Daily goals and streak badges.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What the learner did today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGoal {
    pub date: NaiveDate,
    pub lesson_completed: bool,
    pub quiz_completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyActivity {
    Lesson,
    Quiz,
}

impl DailyGoal {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            lesson_completed: false,
            quiz_completed: false,
        }
    }

    /// Returns `true` if the flag flipped.
    pub fn record(&mut self, activity: DailyActivity) -> bool {
        let flag = match activity {
            DailyActivity::Lesson => &mut self.lesson_completed,
            DailyActivity::Quiz => &mut self.quiz_completed,
        };
        !std::mem::replace(flag, true)
    }

    pub fn is_met(&self) -> bool {
        self.lesson_completed && self.quiz_completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
    pub description: String,
    pub earned_on: NaiveDate,
}

/// (threshold, name, description)
const STREAK_BADGES: [(u32, &str, &str); 2] = [
    (7, "7 Day Streak", "Kept a streak for 7 days in a row"),
    (30, "30 Day Streak", "Kept a streak for 30 days in a row"),
];

/// Badges reached by `streak` that are not in `owned`.
pub fn streak_badges_due(streak: u32, owned: &[Achievement], today: NaiveDate) -> Vec<Achievement> {
    STREAK_BADGES
        .iter()
        .filter(|(threshold, name, _)| {
            streak >= *threshold && !owned.iter().any(|a| a.name == *name)
        })
        .map(|(_, name, description)| Achievement {
            name: (*name).to_string(),
            description: (*description).to_string(),
            earned_on: today,
        })
        .collect()
}
