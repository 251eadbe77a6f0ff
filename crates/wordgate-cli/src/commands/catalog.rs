use clap::Subcommand;
use std::path::PathBuf;
use tracing::debug;
use wordgate_core::CatalogFile;

use super::{print_json, service, CmdResult};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// Import units, quizzes and checkpoint tests from a TOML file
    Load {
        /// Path to the catalog file
        file: PathBuf,
    },
    /// Show the units in path order
    Show,
}

pub fn run(action: CatalogAction) -> CmdResult {
    let mut svc = service()?;
    match action {
        CatalogAction::Load { file } => {
            debug!(file = %file.display(), "reading catalog file");
            let file = CatalogFile::load(&file)?;
            print_json(&svc.load_catalog(&file)?)
        }
        CatalogAction::Show => print_json(&svc.catalog()?.units()),
    }
}
