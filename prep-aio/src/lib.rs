// prep-aio/src/lib.rs
//! Blocking IO operations for prep (filesystem, zip extraction, processes)

pub mod extract;
pub mod fs;
pub mod process;

pub use extract::{extract_zip, ExtractReport};
pub use process::{run_command_captured, run_command_inherit, CommandSpec};
