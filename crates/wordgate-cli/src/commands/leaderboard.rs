use super::{print_json, service, CmdResult};

pub fn run(learner: i64) -> CmdResult {
    let svc = service()?;
    print_json(&svc.leaderboard(learner)?)
}
