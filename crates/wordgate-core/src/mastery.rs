//! Who may mark a lesson as mastered.
//!
//! A quiz submission completes a unit only when it is perfect
//! ([`MasteryProof::from_quiz`]). The manual "complete" action goes
//! through [`authorize_completion`], which only administrators pass.

use serde::{Deserialize, Serialize};

use crate::economy::Learner;
use crate::error::{CoreError, Result};
use crate::quiz::QuizResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryProof {
    PerfectQuiz,
    AdminOverride,
}

impl MasteryProof {
    /// `Some` only for a perfect score, whoever submitted it.
    pub fn from_quiz(quiz: &QuizResult) -> Option<Self> {
        quiz.perfect.then_some(MasteryProof::PerfectQuiz)
    }

    /// Score stored on the progress row for this completion.
    pub fn score(self) -> u8 {
        100
    }
}

/// Manual completion without a quiz; administrators only.
pub fn authorize_completion(learner: &Learner) -> Result<MasteryProof> {
    if learner.is_admin {
        return Ok(MasteryProof::AdminOverride);
    }
    Err(CoreError::precondition(
        "a perfect quiz score is required to complete this lesson",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::fixtures::learner;

    fn quiz(correct: u32, total: u32) -> QuizResult {
        QuizResult {
            correct,
            total,
            ratio: f64::from(correct) / f64::from(total),
            passed: correct * 10 >= total * 7,
            perfect: correct == total,
        }
    }

    #[test]
    fn perfect_quiz_is_enough() {
        let proof = MasteryProof::from_quiz(&quiz(10, 10)).unwrap();
        assert_eq!(proof, MasteryProof::PerfectQuiz);
        assert_eq!(proof.score(), 100);
    }

    #[test]
    fn passing_but_imperfect_is_not() {
        assert_eq!(MasteryProof::from_quiz(&quiz(7, 10)), None);
        assert_eq!(MasteryProof::from_quiz(&quiz(0, 10)), None);
    }

    #[test]
    fn only_admins_complete_manually() {
        assert!(authorize_completion(&learner()).is_err());
        let mut admin = learner();
        admin.is_admin = true;
        assert_eq!(authorize_completion(&admin).unwrap(), MasteryProof::AdminOverride);
    }
}
