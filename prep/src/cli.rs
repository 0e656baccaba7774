// prep/src/cli.rs
//! Defines the command-line argument structure using clap.
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use prep_common::error::Result;
use prep_common::Config;

pub mod dataset;
pub mod setup;

use crate::cli::dataset::DatasetArgs;
use crate::cli::setup::SetupArgs;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "prep", bin_name = "prep")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install requirements and the accelerated library into the active virtualenv
    Setup(SetupArgs),
    /// Download and unpack the training dataset (no-op when already present)
    #[command(alias = "fetch-dataset")]
    Dataset(DatasetArgs),
}

impl Command {
    pub fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Setup(command) => command.run(config),
            Self::Dataset(command) => command.run(config),
        }
    }
}

/// Prints a `==> message` status line.
pub(crate) fn step(message: impl AsRef<str>) {
    println!("{}{}", "==> ".bold().blue(), message.as_ref().bold());
}

pub(crate) fn warn_line(message: impl AsRef<str>) {
    println!("{} {}", "Warning:".yellow().bold(), message.as_ref());
}
