use clap::Subcommand;
use wordgate_core::Moment;

use super::{print_json, service, CmdResult};

#[derive(Subcommand)]
pub enum LearnerAction {
    /// Register a new learner
    Register {
        /// Display name
        name: String,
        /// Grade level (defaults to GRADE1)
        #[arg(long)]
        grade: Option<String>,
        /// Grant the mastery override
        #[arg(long)]
        admin: bool,
    },
    /// List all learners
    List,
    /// Show a learner after applying today's refill
    Show {
        /// Learner id
        id: i64,
    },
    /// Show earned achievements
    Achievements {
        /// Learner id
        id: i64,
    },
}

pub fn run(action: LearnerAction) -> CmdResult {
    let mut svc = service()?;
    match action {
        LearnerAction::Register { name, grade, admin } => {
            let learner = svc.register_learner(&name, grade.as_deref(), admin, Moment::now())?;
            print_json(&learner)
        }
        LearnerAction::List => print_json(&svc.learners()?),
        LearnerAction::Show { id } => print_json(&svc.reconcile(id, Moment::now())?),
        LearnerAction::Achievements { id } => print_json(&svc.achievements(id)?),
    }
}
