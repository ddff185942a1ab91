//! CLI support modules

pub mod logging;

pub use logging::init_logging;
