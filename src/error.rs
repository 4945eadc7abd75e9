use thiserror::Error;

/// Errors raised by the estimation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropError {
    #[error("No game data for {player} ({seasons})")]
    NoData { player: String, seasons: String },

    #[error("Could not resolve prop '{label}'. Available fields: {}", .available.join(", "))]
    UnresolvableProp {
        label: String,
        available: Vec<String>,
    },

    #[error("Insufficient sample: need at least {required} games, found {found}")]
    InsufficientSample { required: usize, found: usize },

    #[error("Invalid decimal odds {0}: odds must be greater than 1.0")]
    InvalidOdds(f64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream data error: {0}")]
    Upstream(String),
}

pub type PropResult<T> = std::result::Result<T, PropError>;
