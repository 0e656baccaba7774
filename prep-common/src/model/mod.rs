// src/model/mod.rs
pub mod environment;
pub mod target;

pub use environment::{AcceleratorReport, InstalledPackage, LibraryInstall};
pub use target::{AcquisitionTarget, CleanupWarning};
