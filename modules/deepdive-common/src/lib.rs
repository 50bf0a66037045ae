pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentConfig, ApiConfig, Config};
pub use error::DeepdiveError;
pub use types::*;
