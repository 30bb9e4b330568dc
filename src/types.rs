use std::fmt;

use shakmaty::san::SanPlus;

/// Magnitude assigned to a mate in one. Longer mates decay as `MATE_SCORE / n`.
pub const MATE_SCORE: f64 = 10_000.0;

/// Engine evaluation of a position.
///
/// As reported by an oracle the score is relative to the side to move in
/// the evaluated position: positive favors that side, `Mate(n)` with
/// `n > 0` means it mates in `n`, `n < 0` means it gets mated in `-n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Centipawns(i32),
    Mate(i32),
}

impl Evaluation {
    /// Flip the perspective.
    pub fn negate(self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(n) => Self::Mate(-n),
        }
    }

    /// Convert the evaluation of the position *after* a move into the
    /// point of view of the player who made it.
    ///
    /// Mate distances are counted from the position before the move, so a
    /// reply of "mated in 2" for the opponent becomes "mate in 3" for the
    /// mover (the move itself plus two more).
    pub fn for_mover(self) -> Self {
        match self {
            Self::Centipawns(cp) => Self::Centipawns(-cp),
            Self::Mate(n) if n < 0 => Self::Mate(-n + 1),
            Self::Mate(n) => Self::Mate(-n),
        }
    }

    /// Project onto a single signed axis so centipawn and mate scores sort together.
    ///
    /// Mate distances are never zero: oracles report a mated side through
    /// terminal detection, not `Mate(0)`.
    pub fn normalized(self) -> f64 {
        match self {
            Self::Centipawns(cp) => f64::from(cp) / 100.0,
            Self::Mate(n) => f64::from(n.signum()) * MATE_SCORE / f64::from(n.unsigned_abs()),
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mate(n) => write!(f, "Mate in {n}"),
            Self::Centipawns(_) => write!(f, "{:.2}", self.normalized()),
        }
    }
}

/// One legal move together with its evaluation, White's point of view.
#[derive(Debug, Clone)]
pub struct RankedMove {
    /// Move in SAN relative to the analysed position, with check suffix.
    pub san: SanPlus,
    /// Positive favors White.
    pub evaluation: Evaluation,
    /// `evaluation.normalized()`, kept for sorting.
    pub score: f64,
}

impl RankedMove {
    pub fn new(san: SanPlus, evaluation: Evaluation) -> Self {
        Self {
            san,
            evaluation,
            score: evaluation.normalized(),
        }
    }
}

impl fmt::Display for RankedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move {} - Evaluation: {}", self.san, self.evaluation)
    }
}

/// Newline-joined report, one line per ranked move.
pub fn render_report(moves: &[RankedMove]) -> String {
    moves
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centipawns_normalize_to_pawns() {
        assert_eq!(Evaluation::Centipawns(350).normalized(), 3.5);
        assert_eq!(Evaluation::Centipawns(350).to_string(), "3.50");
        assert_eq!(Evaluation::Centipawns(-7).to_string(), "-0.07");
    }

    #[test]
    fn mate_scores_decay_with_distance() {
        assert_eq!(Evaluation::Mate(1).normalized(), 10_000.0);
        assert_eq!(Evaluation::Mate(2).normalized(), 5_000.0);
        assert_eq!(Evaluation::Mate(-1).normalized(), -10_000.0);
        assert!(Evaluation::Mate(3).normalized() > Evaluation::Centipawns(2_000).normalized());
    }

    #[test]
    fn mate_labels_keep_sign() {
        assert_eq!(Evaluation::Mate(2).to_string(), "Mate in 2");
        assert_eq!(Evaluation::Mate(-1).to_string(), "Mate in -1");
    }

    #[test]
    fn mover_perspective_counts_the_move_itself() {
        assert_eq!(Evaluation::Mate(-2).for_mover(), Evaluation::Mate(3));
        assert_eq!(Evaluation::Mate(4).for_mover(), Evaluation::Mate(-4));
        assert_eq!(Evaluation::Centipawns(-35).for_mover(), Evaluation::Centipawns(35));
    }

    #[test]
    fn report_lines_use_san() {
        let san: SanPlus = "Nf3".parse().unwrap();
        let moves = vec![
            RankedMove::new(san.clone(), Evaluation::Centipawns(31)),
            RankedMove::new(san, Evaluation::Mate(-1)),
        ];
        assert_eq!(
            render_report(&moves),
            "Move Nf3 - Evaluation: 0.31\nMove Nf3 - Evaluation: Mate in -1"
        );
        assert_eq!(render_report(&[]), "");
    }
}
