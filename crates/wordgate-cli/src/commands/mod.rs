pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod leaderboard;
pub mod learner;
pub mod ledger;
pub mod lesson;
pub mod path;
pub mod quiz;
pub mod shop;
pub mod test;

use serde::Serialize;
use wordgate_core::{Answers, ProgressService};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Service over the database and config in the data directory.
pub fn service() -> Result<ProgressService, Box<dyn std::error::Error>> {
    Ok(ProgressService::open()?)
}

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `QUESTION=OPTION`, e.g. `101=B`.
pub fn parse_answer(s: &str) -> Result<(i64, String), String> {
    let (id, option) = s
        .split_once('=')
        .ok_or_else(|| format!("expected QUESTION=OPTION, got '{s}'"))?;
    let id = id
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid question id '{id}': {e}"))?;
    let option = option.trim();
    if option.is_empty() {
        return Err(format!("missing option for question {id}"));
    }
    Ok((id, option.to_string()))
}

pub fn answers(pairs: Vec<(i64, String)>) -> Answers {
    pairs.into_iter().collect()
}
