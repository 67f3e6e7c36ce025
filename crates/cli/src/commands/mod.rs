//! Subcommand implementations

pub mod planning;
pub mod prediction;
pub mod training;
