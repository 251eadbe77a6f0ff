//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use wordgate_core::milestone::CheckpointTest;
use wordgate_core::path::{TestSpec, UnitSpec};
use wordgate_core::{Answers, CatalogFile, ChoiceQuestion, Config, Database, Moment, ProgressService};

pub const QUESTIONS_PER_UNIT: i64 = 10;

/// Day `d` of the test calendar, starting at 2024-07-01.
pub fn day(d: u32) -> Moment {
    let first = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
    Moment::on(first + Days::new(u64::from(d.saturating_sub(1))))
}

fn questions(owner: i64) -> Vec<ChoiceQuestion> {
    (0..QUESTIONS_PER_UNIT)
        .map(|i| ChoiceQuestion {
            id: owner * 100 + i,
            prompt: format!("question {i}"),
            correct_option: "A".into(),
        })
        .collect()
}

/// `gates` gates of `per_gate` units each. Unit ids are 1-based in path
/// order; order indexes follow the `GGUU` style of the course labels.
pub fn catalog_file(gates: u32, per_gate: u32) -> CatalogFile {
    let mut units = Vec::new();
    let mut id = 0;
    for gate in 1..=gates {
        for n in 1..=per_gate {
            id += 1;
            units.push(UnitSpec {
                id,
                title: format!("Gate {gate} lesson {n}"),
                order_index: i64::from(gate * 100 + n),
                group: Some(format!("PHẦN 1, CỬA {gate}")),
                grade_level: "GRADE1".into(),
                xp_reward: 15,
                questions: questions(id),
            });
        }
    }
    let mut test = CheckpointTest::new(1, "GRADE1", 3);
    test.title = "Checkpoint".into();
    CatalogFile {
        units,
        tests: vec![TestSpec {
            test,
            questions: questions(1000),
        }],
    }
}

pub fn service_with(config: Config) -> ProgressService {
    let mut svc = ProgressService::new(Database::open_memory().unwrap(), config);
    svc.load_catalog(&catalog_file(5, 3)).unwrap();
    svc
}

pub fn service() -> ProgressService {
    service_with(Config::default())
}

/// Answers for `owner`'s questions with the first `correct` right.
pub fn answers(owner: i64, correct: i64) -> Answers {
    (0..QUESTIONS_PER_UNIT)
        .map(|i| {
            let answer = if i < correct { "A" } else { "C" };
            (owner * 100 + i, answer.to_string())
        })
        .collect()
}
