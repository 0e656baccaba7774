// prep/src/cli/setup.rs
use clap::Args;
use colored::Colorize;
use prep_common::model::{AcceleratorReport, InstalledPackage};
use prep_common::{Config, Result};
use prep_core::{Pip, ProvisionContext, Provisioner};
use prettytable::{format, row, Table};
use tracing::debug;

use crate::cli::{step, warn_line};

#[derive(Args, Debug)]
pub struct SetupArgs {}

impl SetupArgs {
    pub fn run(&self, config: &Config) -> Result<()> {
        step("Starting environment setup");
        let ctx = ProvisionContext::from_config(config);

        let pip = Pip::for_context(&ctx);
        debug!("Using interpreter {}", pip.python().display());
        let report = Provisioner::new(&ctx, pip).run()?;

        step(format!(
            "{} {}",
            ctx.library.module,
            report.library.describe()
        ));
        if let Some(accel) = &report.accelerator {
            print_accelerator(accel);
        }
        if !report.packages.is_empty() {
            print_packages(&report.packages);
        }
        for warning in &report.warnings {
            warn_line(warning);
        }

        step("Environment setup completed successfully!");
        Ok(())
    }
}

fn print_accelerator(accel: &AcceleratorReport) {
    if !accel.available {
        warn_line("CUDA is not available. Training will use CPU.");
        return;
    }
    let runtime = accel
        .runtime_version
        .as_deref()
        .map(|v| format!(" (CUDA {v})"))
        .unwrap_or_default();
    step(format!(
        "CUDA is available{}! Device count: {}",
        runtime,
        accel.device_count()
    ));
    for (i, name) in accel.devices.iter().enumerate() {
        println!("    {} {}", format!("GPU {i}:").green(), name);
    }
}

fn print_packages(packages: &[InstalledPackage]) {
    step(format!("Installed packages ({})", packages.len()));
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(row!["Package", "Version"]);
    for package in packages {
        table.add_row(row![package.name, package.version]);
    }
    table.printstd();
}
