//! Configuration parsing for swaysensor
//!
//! This crate handles parsing the KDL configuration file that selects which
//! sensors the daemon listens to and how ambient light readings are scaled.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{parse_config, parse_config_str, DEFAULT_CONFIG_PATH};
