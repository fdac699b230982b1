pub mod config;
pub mod duration;
pub mod error;
pub mod types;

pub use config::LinkwatchConfig;
pub use duration::parse_duration;
pub use error::ConfigError;
pub use types::*;
