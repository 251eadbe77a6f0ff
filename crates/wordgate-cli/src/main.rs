use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wordgate_core::CoreError;

mod commands;

#[derive(Parser)]
#[command(name = "wordgate", version, about = "Wordgate learning-progress CLI")]
struct Cli {
    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learner accounts
    Learner {
        #[command(subcommand)]
        action: commands::learner::LearnerAction,
    },
    /// Course catalog
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Show a learner's lesson path
    Path {
        /// Learner id
        learner: i64,
    },
    /// Show a learner's dashboard
    Dashboard {
        /// Learner id
        learner: i64,
    },
    /// Unit quizzes
    Quiz {
        #[command(subcommand)]
        action: commands::quiz::QuizAction,
    },
    /// Lesson completion
    Lesson {
        #[command(subcommand)]
        action: commands::lesson::LessonAction,
    },
    /// Checkpoint tests
    Test {
        #[command(subcommand)]
        action: commands::test::TestAction,
    },
    /// Lives shop
    Shop {
        #[command(subcommand)]
        action: commands::shop::ShopAction,
    },
    /// Reward ledger history
    Ledger {
        /// Learner id
        learner: i64,
        /// Only the most recent entries
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Xp leaderboard as seen by a learner
    Leaderboard {
        /// Viewing learner id
        learner: i64,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "wordgate_core=debug" } else { "wordgate_core=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// 1 for rejected requests, 2 when storage or configuration failed.
fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    match err.downcast_ref::<CoreError>() {
        Some(core) if !core.is_caller_error() => 2,
        _ => 1,
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Learner { action } => commands::learner::run(action),
        Commands::Catalog { action } => commands::catalog::run(action),
        Commands::Path { learner } => commands::path::run(learner),
        Commands::Dashboard { learner } => commands::dashboard::run(learner),
        Commands::Quiz { action } => commands::quiz::run(action),
        Commands::Lesson { action } => commands::lesson::run(action),
        Commands::Test { action } => commands::test::run(action),
        Commands::Shop { action } => commands::shop::run(action),
        Commands::Ledger { learner, limit } => commands::ledger::run(learner, limit),
        Commands::Leaderboard { learner } => commands::leaderboard::run(learner),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(exit_code(e.as_ref()));
    }
}
