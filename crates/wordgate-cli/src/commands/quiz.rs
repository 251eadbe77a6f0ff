use clap::Subcommand;
use wordgate_core::Moment;

use super::{answers, parse_answer, print_json, service, CmdResult};

#[derive(Subcommand)]
pub enum QuizAction {
    /// Submit answers for a unit quiz
    Submit {
        /// Learner id
        learner: i64,
        /// Unit id
        unit: i64,
        /// Answer as QUESTION=OPTION; repeat for each question
        #[arg(short, long = "answer", value_parser = parse_answer)]
        answers: Vec<(i64, String)>,
    },
}

pub fn run(action: QuizAction) -> CmdResult {
    let mut svc = service()?;
    match action {
        QuizAction::Submit {
            learner,
            unit,
            answers: pairs,
        } => print_json(&svc.submit_quiz(learner, unit, &answers(pairs), Moment::now())?),
    }
}
