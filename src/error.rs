//! Error types for the move ranker.
//!
//! `RankError` is the single error a ranking request can fail with. The
//! variants wrap parsing errors from `shakmaty`, failures talking to the
//! UCI engine, and the overall time budget, so the HTTP layer can map
//! each one to a distinct status. `ConfigError` covers startup only.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RankError {
    /// The provided FEN string could not be parsed.
    #[error("Invalid FEN: {0}")]
    InvalidFen(#[from] shakmaty::fen::ParseFenError),

    /// A parsed position is invalid from the perspective of `shakmaty`.
    #[error("Invalid Chess Position: {0}")]
    InvalidPosition(#[from] shakmaty::PositionError<shakmaty::Chess>),

    /// Depth or result count outside the accepted bounds.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The engine process could not be started or its pipes broke.
    #[error("Evaluation engine unavailable: {0}")]
    OracleUnavailable(#[source] std::io::Error),

    /// The engine answered, but not with anything we can use.
    #[error("Evaluation engine protocol error: {0}")]
    OracleProtocol(String),

    #[error("Ranking timed out after {0:?}")]
    Timeout(Duration),

    /// An evaluation task panicked or was cancelled.
    #[error("Evaluation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RankError {
    /// True for failures caused by the caller's input rather than the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFen(_) | Self::InvalidPosition(_) | Self::InvalidRequest(_)
        )
    }

    /// True when the engine could not be reached or misbehaved.
    pub fn is_oracle_error(&self) -> bool {
        matches!(self, Self::OracleUnavailable(_) | Self::OracleProtocol(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
