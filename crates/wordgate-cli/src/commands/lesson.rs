use clap::Subcommand;
use wordgate_core::Moment;

use super::{print_json, service, CmdResult};

#[derive(Subcommand)]
pub enum LessonAction {
    /// Mark a lesson completed (administrators only)
    Complete {
        /// Learner id
        learner: i64,
        /// Unit id
        unit: i64,
    },
}

pub fn run(action: LessonAction) -> CmdResult {
    let mut svc = service()?;
    match action {
        LessonAction::Complete { learner, unit } => {
            print_json(&svc.complete_lesson(learner, unit, Moment::now())?)
        }
    }
}
