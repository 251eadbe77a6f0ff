use clap::Subcommand;
use wordgate_core::Moment;

use super::{answers, parse_answer, print_json, service, CmdResult};

#[derive(Subcommand)]
pub enum TestAction {
    /// Show the checkpoint test available right now, if any
    Available {
        /// Learner id
        learner: i64,
    },
    /// Submit answers for a checkpoint test
    Submit {
        /// Learner id
        learner: i64,
        /// Test id
        test: i64,
        /// Answer as QUESTION=OPTION; repeat for each question
        #[arg(short, long = "answer", value_parser = parse_answer)]
        answers: Vec<(i64, String)>,
    },
}

pub fn run(action: TestAction) -> CmdResult {
    let mut svc = service()?;
    match action {
        TestAction::Available { learner } => print_json(&svc.available_test(learner, Moment::now())?),
        TestAction::Submit {
            learner,
            test,
            answers: pairs,
        } => print_json(&svc.submit_test(learner, test, &answers(pairs), Moment::now())?),
    }
}
