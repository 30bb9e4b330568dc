//! Rank the legal moves of a chess position with an external UCI engine.
//!
//! Every legal move is played on a copy of the position and the result is
//! scored by an engine session taken from a bounded pool. The evaluations
//! run concurrently, are folded onto one signed axis (centipawns and mate
//! distances together), and sorted best-first for the side to move.
//!
//! The principal type is [`MoveRanker`]. [`server::router`] exposes it as
//! a JSON endpoint, and [`RankerConfig`] wires both from the environment.
//!
//! The library re-exports `shakmaty`, which it uses for FEN parsing, move
//! generation, and SAN rendering.

mod config;
mod error;
mod oracle;
mod pool;
mod ranker;
pub mod server;
mod timing;
mod types;

/// Main entry point.
pub use ranker::MoveRanker;

/// Error types produced by library operations.
pub use error::{ConfigError, RankError};

/// Engine sessions and the pool that bounds them.
pub use oracle::{EvaluationOracle, OracleFactory, UciEngine, UciEngineFactory, UciSession};
pub use pool::{OraclePool, PooledOracle};

/// Output data structures returned by rankings.
pub use types::{Evaluation, MATE_SCORE, RankedMove, render_report};

pub use config::RankerConfig;
pub use timing::Stopwatch;

/// Re-export of `shakmaty` for convenience when building positions.
pub use shakmaty;
