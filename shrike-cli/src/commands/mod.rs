//! CLI command implementations

pub mod config;
pub mod review;

pub use config::ConfigArgs;
pub use review::ReviewArgs;
