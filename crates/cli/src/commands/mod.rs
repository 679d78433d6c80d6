//! Subcommand implementations

pub mod optimize;
pub mod status;
pub mod thresholds;
pub mod validation;
