// prep-core/src/lib.rs

pub mod acquire;
pub mod provision;

// Re-export key types for easier use by the CLI crate
pub use acquire::{AcquireOutcome, AcquireState, AcquireSummary, Acquirer, DriveFetcher, Fetcher};
pub use provision::{
    AcceleratedLibrary, PackageManager, Pip, ProvisionContext, ProvisionReport, Provisioner,
};
