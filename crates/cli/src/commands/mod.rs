//! CLI command implementations

pub mod health;
pub mod predictions;
pub mod samples;
pub mod summary;
