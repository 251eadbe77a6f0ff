use super::{print_json, service, CmdResult};

pub fn run(learner: i64, limit: Option<u32>) -> CmdResult {
    let svc = service()?;
    print_json(&svc.ledger(learner, limit)?)
}
