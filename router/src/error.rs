use pcb_common::db::parser::BoardParseError;
use pcb_common::rules::ConfigurationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid design rules: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("no path found for net {net}")]
    NoPathFound { net: String },
    #[error("unknown routing strategy `{0}`")]
    UnknownStrategy(String),
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("failed to load board: {0}")]
    Load(#[from] BoardParseError),
    #[error("optimizer broke net {net}: {reason}")]
    OptimizerInvariant { net: String, reason: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
