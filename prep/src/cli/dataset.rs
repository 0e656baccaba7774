// prep/src/cli/dataset.rs
use std::io::IsTerminal;

use clap::Args;
use colored::Colorize;
use prep_common::model::AcquisitionTarget;
use prep_common::{Config, Result};
use prep_core::{AcquireOutcome, Acquirer, DriveFetcher};
use tracing::debug;

use crate::cli::{step, warn_line};

#[derive(Args, Debug)]
pub struct DatasetArgs {}

impl DatasetArgs {
    pub fn run(&self, config: &Config) -> Result<()> {
        step("Starting dataset download process");
        let target = AcquisitionTarget::from_config(config);
        debug!("Acquisition target: {:?}", target);

        let fetcher = DriveFetcher::new(std::io::stderr().is_terminal())?;
        let mut acquirer = Acquirer::new(target, fetcher);
        let outcome = acquirer.run();
        debug!(
            "Visited states: {}",
            acquirer
                .states()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        match outcome? {
            AcquireOutcome::AlreadyPresent => {
                step(format!(
                    "Dataset already exists in {}, skipping download.",
                    config.dataset_dir().display()
                ));
            }
            AcquireOutcome::Acquired(summary) => {
                step(format!(
                    "Extracted {} entries from {}",
                    summary.archive_entries,
                    summary
                        .archive_path
                        .file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                ));
                println!(
                    "    {} {} ({} entries)",
                    "Contents:".dimmed(),
                    summary.contents.join(", "),
                    summary.dataset_entries
                );
                if !summary.skipped_entries.is_empty() {
                    warn_line(format!(
                        "{} unsafe archive entries were skipped",
                        summary.skipped_entries.len()
                    ));
                }
                for warning in &summary.warnings {
                    warn_line(warning.to_string());
                }
                step("Dataset download and setup process completed!");
            }
        }
        Ok(())
    }
}
