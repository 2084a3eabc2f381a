use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vcg_query::Answer;
use vcg_types::{CommandKind, Operation};

#[derive(Parser)]
#[command(
    name = "vcg",
    about = "vcgate: version-control status and edit gating for a workspace",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Fixture depot (TOML). Without it the depot starts empty.
    #[arg(long, global = true)]
    pub depot: Option<PathBuf>,

    /// Workspace root.
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Session configuration (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Write the depot fixture back after the command.
    #[arg(long, global = true)]
    pub save: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show status and indicator per file
    Status(StatusArgs),
    /// Show whether an operation is permitted per file
    Eligible(EligibleArgs),
    /// Run a backend command over files
    Run(RunArgs),
    /// Rename a file in the depot
    Rename(RenameArgs),
    /// Ask whether files may be edited
    Edit(EditArgs),
    /// Ask whether files may be saved
    Save(SaveArgs),
}

#[derive(Args)]
pub struct StatusArgs {
    /// Files relative to the root; the whole workspace when empty.
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct EligibleArgs {
    pub operation: Operation,
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct RunArgs {
    pub command: CommandKind,
    #[arg(required = true)]
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct RenameArgs {
    pub old: String,
    pub new: String,
}

#[derive(Args)]
pub struct EditArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
    /// Report blockers without prompting or checking out.
    #[arg(long)]
    pub report_only: bool,
    /// Never prompt.
    #[arg(long)]
    pub silent: bool,
    /// Answer given to every prompt; `checkout` also makes uncontrolled
    /// files writable.
    #[arg(long, default_value = "cancel")]
    pub answer: EditAnswerArg,
}

#[derive(Args)]
pub struct SaveArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
    /// Never prompt.
    #[arg(long)]
    pub silent: bool,
    /// Answer given to every prompt; `checkout` also overwrites uncontrolled
    /// files.
    #[arg(long, default_value = "cancel")]
    pub answer: SaveAnswerArg,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EditAnswerArg {
    Checkout,
    Memory,
    Cancel,
}

impl From<EditAnswerArg> for Answer {
    fn from(arg: EditAnswerArg) -> Self {
        match arg {
            EditAnswerArg::Checkout => Answer::CheckOut,
            EditAnswerArg::Memory => Answer::EditInMemory,
            EditAnswerArg::Cancel => Answer::Cancel,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SaveAnswerArg {
    Checkout,
    SaveAs,
    Skip,
    Cancel,
}

impl From<SaveAnswerArg> for Answer {
    fn from(arg: SaveAnswerArg) -> Self {
        match arg {
            SaveAnswerArg::Checkout => Answer::CheckOut,
            SaveAnswerArg::SaveAs => Answer::SaveAs,
            SaveAnswerArg::Skip => Answer::Skip,
            SaveAnswerArg::Cancel => Answer::Cancel,
        }
    }
}
