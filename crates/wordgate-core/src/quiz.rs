//! Quiz grading.
//!
//! The grader only needs a correctness oracle per question; where the
//! questions come from is someone else's business.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, Result};

pub type QuestionId = i64;

/// Submitted answers keyed by question.
pub type Answers = HashMap<QuestionId, String>;

/// Correctness oracle for a single question.
pub trait AnswerKey {
    fn question_id(&self) -> QuestionId;
    fn is_correct(&self, answer: &str) -> bool;
}

/// Multiple-choice question with a single correct option letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceQuestion {
    pub id: QuestionId,
    #[serde(default)]
    pub prompt: String,
    pub correct_option: String,
}

impl AnswerKey for ChoiceQuestion {
    fn question_id(&self) -> QuestionId {
        self.id
    }

    fn is_correct(&self, answer: &str) -> bool {
        answer.trim().eq_ignore_ascii_case(self.correct_option.trim())
    }
}

fn count(n: usize) -> Result<u32> {
    u32::try_from(n).map_err(|_| CoreError::precondition(format!("{n} questions is more than a quiz can hold")))
}

/// Count correct answers. Unanswered questions count as incorrect.
pub fn tally<Q: AnswerKey>(questions: &[Q], answers: &Answers) -> Result<(u32, u32)> {
    let total = count(questions.len())?;
    let correct = count(
        questions
            .iter()
            .filter(|q| {
                answers
                    .get(&q.question_id())
                    .is_some_and(|a| q.is_correct(a))
            })
            .count(),
    )?;
    Ok((correct, total))
}

/// Integer percentage, 0 for an empty quiz.
pub fn percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        0
    } else {
        u8::try_from((u64::from(correct) * 100 / u64::from(total)).min(100)).unwrap_or(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub correct: u32,
    pub total: u32,
    pub ratio: f64,
    pub passed: bool,
    pub perfect: bool,
}

impl QuizResult {
    pub fn wrong(&self) -> u32 {
        self.total - self.correct
    }

    pub fn score(&self) -> u8 {
        percent(self.correct, self.total)
    }
}

#[derive(Debug, Clone)]
pub struct QuizGrader {
    pass_percent: u32,
}

impl QuizGrader {
    /// Pass threshold as a whole percentage; 70 means `ratio >= 0.7`.
    pub fn new(pass_percent: u32) -> Self {
        Self { pass_percent }
    }

    pub fn grade<Q: AnswerKey>(&self, questions: &[Q], answers: &Answers) -> Result<QuizResult> {
        let (correct, total) = tally(questions, answers)?;
        let ratio = if total == 0 {
            0.0
        } else {
            f64::from(correct) / f64::from(total)
        };
        Ok(QuizResult {
            correct,
            total,
            ratio,
            // Exact comparison; 7/10 against 0.7 must not depend on rounding.
            passed: total > 0
                && u64::from(correct) * 100 >= u64::from(self.pass_percent) * u64::from(total),
            perfect: total > 0 && correct == total,
        })
    }
}

impl Default for QuizGrader {
    fn default() -> Self {
        Self::new(70)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: i64) -> Vec<ChoiceQuestion> {
        (1..=n)
            .map(|id| ChoiceQuestion {
                id,
                prompt: format!("q{id}"),
                correct_option: "B".into(),
            })
            .collect()
    }

    fn answers(correct: i64, total: i64) -> Answers {
        (1..=total)
            .map(|id| (id, if id <= correct { "b" } else { "C" }.to_string()))
            .collect()
    }

    #[test]
    fn all_correct_is_perfect() {
        let r = QuizGrader::default().grade(&questions(10), &answers(10, 10)).unwrap();
        assert_eq!(r.ratio, 1.0);
        assert!(r.passed);
        assert!(r.perfect);
        assert_eq!(r.score(), 100);
    }

    #[test]
    fn seven_of_ten_passes_but_is_not_perfect() {
        let r = QuizGrader::default().grade(&questions(10), &answers(7, 10)).unwrap();
        assert!(r.passed);
        assert!(!r.perfect);
        assert_eq!(r.wrong(), 3);
        assert_eq!(r.score(), 70);
    }

    #[test]
    fn six_of_ten_fails() {
        let r = QuizGrader::default().grade(&questions(10), &answers(6, 10)).unwrap();
        assert!(!r.passed);
    }

    #[test]
    fn unanswered_counts_as_wrong() {
        let mut a = answers(3, 3);
        a.remove(&2);
        let r = QuizGrader::default().grade(&questions(3), &a).unwrap();
        assert_eq!(r.correct, 2);
        assert_eq!(r.total, 3);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let r = QuizGrader::default().grade::<ChoiceQuestion>(&[], &Answers::new()).unwrap();
        assert_eq!(r.ratio, 0.0);
        assert!(!r.passed);
        assert!(!r.perfect);
        assert_eq!(r.score(), 0);
    }

    #[test]
    fn answers_for_unknown_questions_are_ignored() {
        let mut a = answers(2, 2);
        a.insert(99, "B".into());
        let r = QuizGrader::default().grade(&questions(2), &a).unwrap();
        assert_eq!((r.correct, r.total), (2, 2));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_counts_are_rejected() {
        assert_eq!(count(10).unwrap(), 10);
        let err = count(u32::MAX as usize + 1).unwrap_err();
        assert!(matches!(err, CoreError::PreconditionFailed(_)));
    }

    #[test]
    fn option_comparison_trims_and_ignores_case() {
        let q = ChoiceQuestion {
            id: 1,
            prompt: String::new(),
            correct_option: "D".into(),
        };
        assert!(q.is_correct(" d "));
        assert!(!q.is_correct("A"));
    }
}
