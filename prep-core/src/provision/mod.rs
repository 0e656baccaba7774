//! Environment provisioning: requirements, the accelerated numerical library,
//! an accelerator probe and a final package listing.

pub mod pip;

use std::path::{Path, PathBuf};

use prep_common::config::Config;
use prep_common::error::{PrepError, Result};
use prep_common::model::{AcceleratorReport, InstalledPackage, LibraryInstall};
use tracing::{debug, info, warn};

pub use pip::Pip;

/// The package-manager operations the provisioner needs.
pub trait PackageManager {
    fn install_manifest(&self, manifest: &Path) -> Result<()>;
    fn install(&self, packages: &[String], index_url: Option<&str>) -> Result<()>;
    fn is_importable(&self, module: &str) -> Result<bool>;
    fn probe_accelerator(&self, module: &str) -> Result<AcceleratorReport>;
    fn list_installed(&self) -> Result<Vec<InstalledPackage>>;
}

impl<P: PackageManager + ?Sized> PackageManager for &P {
    fn install_manifest(&self, manifest: &Path) -> Result<()> {
        (**self).install_manifest(manifest)
    }

    fn install(&self, packages: &[String], index_url: Option<&str>) -> Result<()> {
        (**self).install(packages, index_url)
    }

    fn is_importable(&self, module: &str) -> Result<bool> {
        (**self).is_importable(module)
    }

    fn probe_accelerator(&self, module: &str) -> Result<AcceleratorReport> {
        (**self).probe_accelerator(module)
    }

    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        (**self).list_installed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratedLibrary {
    /// Import name used to detect an existing install.
    pub module: String,
    pub packages: Vec<String>,
    pub index_url: String,
}

/// Everything the provisioner is allowed to know about its surroundings,
/// captured once up front.
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    pub virtual_env: Option<PathBuf>,
    pub manifest: PathBuf,
    pub library: AcceleratedLibrary,
    pub python: Option<PathBuf>,
}

impl ProvisionContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            virtual_env: config.virtual_env.clone(),
            manifest: config.manifest_path(),
            library: AcceleratedLibrary {
                module: config.environment.accelerated_module.clone(),
                packages: config.environment.accelerated_packages.clone(),
                index_url: config.environment.accelerated_index.clone(),
            },
            python: config.environment.python.clone(),
        }
    }

    /// Fails unless running inside a virtual environment with a manifest.
    pub fn check(&self) -> Result<()> {
        let Some(venv) = &self.virtual_env else {
            return Err(PrepError::Precondition(
                "not running inside a virtual environment (VIRTUAL_ENV is unset); activate one first"
                    .to_string(),
            ));
        };
        debug!("Running in virtual environment {}", venv.display());
        if !self.manifest.is_file() {
            return Err(PrepError::Precondition(format!(
                "{} not found",
                self.manifest.display()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub library: LibraryInstall,
    /// `None` when the library could not be probed.
    pub accelerator: Option<AcceleratorReport>,
    pub packages: Vec<InstalledPackage>,
    pub warnings: Vec<String>,
}

pub struct Provisioner<'a, P> {
    ctx: &'a ProvisionContext,
    pm: P,
}

impl<'a, P: PackageManager> Provisioner<'a, P> {
    pub fn new(ctx: &'a ProvisionContext, pm: P) -> Self {
        Self { ctx, pm }
    }

    pub fn install_requirements(&self) -> Result<()> {
        info!("Installing {}", self.ctx.manifest.display());
        self.pm.install_manifest(&self.ctx.manifest).map_err(|e| {
            PrepError::Install(self.ctx.manifest.display().to_string(), e.to_string())
        })?;
        info!("Requirements installed successfully");
        Ok(())
    }

    /// Installs the accelerated build unless the module already imports,
    /// falling back once to the default index.
    pub fn ensure_accelerated_library(&self) -> Result<LibraryInstall> {
        let lib = &self.ctx.library;
        let present = self.pm.is_importable(&lib.module).unwrap_or_else(|e| {
            warn!("Could not check whether {} is installed: {}", lib.module, e);
            false
        });
        if present {
            info!("{} already installed", lib.module);
            return Ok(LibraryInstall::AlreadyPresent);
        }

        info!(
            "Installing {} from {}",
            lib.packages.join(" "),
            lib.index_url
        );
        match self.pm.install(&lib.packages, Some(&lib.index_url)) {
            Ok(()) => Ok(LibraryInstall::Accelerated),
            Err(e) => {
                warn!("Accelerated install failed: {}", e);
                warn!("Falling back to CPU-only version");
                self.pm
                    .install(&lib.packages, None)
                    .map(|()| LibraryInstall::CpuFallback)
                    .map_err(|e2| PrepError::Install(lib.packages.join(" "), e2.to_string()))
            }
        }
    }

    pub fn check_accelerator(&self) -> Result<AcceleratorReport> {
        let report = self.pm.probe_accelerator(&self.ctx.library.module)?;
        if report.available {
            info!("Accelerator available, device count: {}", report.device_count());
            for (i, name) in report.devices.iter().enumerate() {
                debug!("  device {}: {}", i, name);
            }
        } else {
            warn!("No accelerator available; training will use the CPU");
        }
        Ok(report)
    }

    pub fn list_packages(&self) -> Result<Vec<InstalledPackage>> {
        self.pm.list_installed()
    }

    /// Runs the full sequence. Preconditions and install failures abort;
    /// probing and listing problems only add warnings.
    pub fn run(&self) -> Result<ProvisionReport> {
        self.ctx.check()?;
        self.install_requirements()?;
        let library = self.ensure_accelerated_library()?;

        let mut warnings = Vec::new();
        let accelerator = match self.check_accelerator() {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Could not probe accelerator: {}", e);
                warnings.push(format!("accelerator probe failed: {e}"));
                None
            }
        };
        let packages = match self.list_packages() {
            Ok(packages) => packages,
            Err(e) => {
                warn!("Failed to list packages: {}", e);
                warnings.push(format!("package listing failed: {e}"));
                Vec::new()
            }
        };

        Ok(ProvisionReport {
            library,
            accelerator,
            packages,
            warnings,
        })
    }
}
