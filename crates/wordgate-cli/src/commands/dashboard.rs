use wordgate_core::Moment;

use super::{print_json, service, CmdResult};

pub fn run(learner: i64) -> CmdResult {
    let mut svc = service()?;
    print_json(&svc.load_dashboard(learner, Moment::now())?)
}
