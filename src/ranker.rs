use std::time::Duration;

use shakmaty::{
    CastlingMode, Chess, Color, EnPassantMode, Position, Setup,
    fen::Fen,
    san::SanPlus,
};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{
    error::RankError,
    oracle::OracleFactory,
    pool::OraclePool,
    timing::Stopwatch,
    types::{Evaluation, RankedMove},
};

/// Ranks every legal move of a position by evaluating the resulting
/// positions concurrently on pooled oracle sessions.
pub struct MoveRanker<F: OracleFactory> {
    pool: OraclePool<F>,
    timeout: Duration,
}

/// A legal move and the position it leads to.
struct Candidate {
    san: SanPlus,
    fen: String,
    /// Known without asking the oracle (mate or stalemate on the board),
    /// from the mover's point of view.
    settled: Option<Evaluation>,
}

impl<F: OracleFactory> MoveRanker<F> {
    /// `timeout` bounds a whole [`rank`](Self::rank) call, every evaluation included.
    pub fn new(pool: OraclePool<F>, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &OraclePool<F> {
        &self.pool
    }

    /// Rank the legal moves of `fen`, best first for the side to move.
    ///
    /// Returns at most `top_n` moves and an empty list when the position
    /// has no legal moves. Any evaluation failure fails the whole call.
    pub async fn rank(
        &self,
        fen: &str,
        depth: u32,
        top_n: usize,
    ) -> Result<Vec<RankedMove>, RankError> {
        let _timer = Stopwatch::start("rank");

        if depth == 0 {
            return Err(RankError::InvalidRequest(
                "search depth must be at least 1".to_string(),
            ));
        }

        let fen: Fen = fen.trim().parse()?;
        let setup: Setup = fen.into();
        let position: Chess = setup.position(CastlingMode::Standard)?;
        let turn = position.turn();

        let candidates = expand(&position);
        info!(
            depth,
            top_n,
            legal_moves = candidates.len(),
            white_to_move = turn.is_white(),
            "ranking moves"
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let fan_out = self.evaluate_all(&candidates, depth);
        let evaluations = tokio::time::timeout(self.timeout, fan_out)
            .await
            .map_err(|_| RankError::Timeout(self.timeout))??;

        let mut ranked: Vec<RankedMove> = candidates
            .into_iter()
            .zip(evaluations)
            .map(|(candidate, for_mover)| {
                let for_white = match turn {
                    Color::White => for_mover,
                    Color::Black => for_mover.negate(),
                };
                RankedMove::new(candidate.san, for_white)
            })
            .collect();

        sort_for_side(turn, &mut ranked);
        ranked.truncate(top_n);
        Ok(ranked)
    }

    /// Fan out one task per unsettled candidate and wait for all of them.
    /// Results come back in candidate order, from the mover's point of view.
    async fn evaluate_all(
        &self,
        candidates: &[Candidate],
        depth: u32,
    ) -> Result<Vec<Evaluation>, RankError> {
        let mut results: Vec<Option<Evaluation>> =
            candidates.iter().map(|c| c.settled).collect();

        let mut tasks = JoinSet::new();
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.settled.is_some() {
                continue;
            }
            let pool = self.pool.clone();
            let fen = candidate.fen.clone();
            tasks.spawn(async move {
                let mut oracle = pool.acquire().await?;
                let evaluation = oracle.evaluate(&fen, depth).await?;
                Ok::<_, RankError>((index, evaluation))
            });
        }
        debug!(dispatched = tasks.len(), "waiting for evaluations");

        // Returning early drops the set, which aborts the remaining tasks.
        while let Some(joined) = tasks.join_next().await {
            let (index, evaluation) = joined??;
            if let Some(slot) = results.get_mut(index) {
                *slot = Some(evaluation.for_mover());
            }
        }

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RankError::OracleProtocol("an evaluation went missing".to_string()))
    }
}

/// Play every legal move on a copy of `position`, in generation order.
fn expand(position: &Chess) -> Vec<Candidate> {
    position
        .legal_moves()
        .into_iter()
        .map(|m| {
            let mut child = position.clone();
            let san = SanPlus::from_move_and_play_unchecked(&mut child, m);
            let settled = if child.is_checkmate() {
                Some(Evaluation::Mate(1))
            } else if child.is_stalemate() {
                Some(Evaluation::Centipawns(0))
            } else {
                None
            };
            let fen = Fen::from_position(&child, EnPassantMode::Legal).to_string();
            Candidate { san, fen, settled }
        })
        .collect()
}

/// Best first for `turn`. Stable, so equal scores keep generation order.
fn sort_for_side(turn: Color, ranked: &mut [RankedMove]) {
    match turn {
        Color::White => ranked.sort_by(|a, b| b.score.total_cmp(&a.score)),
        Color::Black => ranked.sort_by(|a, b| a.score.total_cmp(&b.score)),
    }
}
