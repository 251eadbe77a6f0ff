use wordgate_core::Moment;

use super::{print_json, service, CmdResult};

pub fn run(learner: i64) -> CmdResult {
    let mut svc = service()?;
    print_json(&svc.resolve_path(learner, Moment::now())?)
}
