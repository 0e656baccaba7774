use serde::{Deserialize, Serialize};

/// One row of the interpreter's package registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// What the accelerated library reports about the available devices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorReport {
    pub available: bool,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub runtime_version: Option<String>,
}

impl AcceleratorReport {
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

/// How the accelerated numerical library ended up installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryInstall {
    AlreadyPresent,
    Accelerated,
    CpuFallback,
}

impl LibraryInstall {
    pub fn describe(&self) -> &'static str {
        match self {
            LibraryInstall::AlreadyPresent => "already installed",
            LibraryInstall::Accelerated => "installed with accelerator support",
            LibraryInstall::CpuFallback => "installed (CPU-only fallback)",
        }
    }
}
