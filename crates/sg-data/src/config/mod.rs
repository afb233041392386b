//! Reader configuration

pub mod null_handling;
pub mod reader_config;

pub use null_handling::*;
pub use reader_config::*;
