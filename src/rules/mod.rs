//! The rules engine (C1): legal move generation, move application,
//! terminal detection, hashing, and algebraic annotation.
//!
//! Everything here is synchronous, pure, and free of any oracle or
//! async dependency — the rest of the crate treats it as ground truth.

mod board;
mod error;
mod movegen;
mod piece;
mod square;

pub use board::{CastlingSide, GameState, Move};
pub use error::RulesError;
pub use movegen::{apply, endgame, is_check, is_square_attacked, legal_moves, Endgame};
pub use piece::{Color, Piece, PieceKind};
pub use square::Square;

/// A deterministic, process-stable hash of a [`GameState`], used as the
/// cache key throughout C4/C5. Not cryptographic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateHash(pub String);

impl std::fmt::Display for StateHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl GameState {
    /// Concatenates side-to-move with a per-cell tag; two states hash
    /// equal iff they are behaviourally identical for legal-move
    /// purposes (including castling rights and en-passant windows).
    pub fn hash(&self) -> StateHash {
        let mut out = String::with_capacity(8 * 8 * 10 + 8);
        out.push_str(match self.side_to_move {
            Color::White => "w:",
            Color::Black => "b:",
        });
        for row in &self.board {
            for cell in row {
                match cell {
                    None => out.push_str("empty"),
                    Some(p) => {
                        out.push_str(match p.color {
                            Color::White => "w",
                            Color::Black => "b",
                        });
                        out.push('_');
                        out.push_str(p.kind.letter_lower());
                        out.push('_');
                        out.push(if p.has_moved { '1' } else { '0' });
                        if p.kind == PieceKind::Pawn && p.just_moved_two {
                            out.push_str("_ep");
                        }
                    }
                }
                out.push(',');
            }
        }
        StateHash(out)
    }
}

/// Looks up `from -> to` (with `promotion`, if any) among the legal
/// moves for the side to move, and applies it. Used at the human-input
/// boundary (REPL/HTTP), where a move arrives as raw coordinates
/// rather than an already-validated [`Move`].
pub fn try_play(
    state: &GameState,
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
) -> Result<GameState, RulesError> {
    let candidates = legal_moves(state, state.side_to_move);
    let mv = candidates
        .into_iter()
        .find(|m| m.from == from && m.to == to && m.promotion == promotion)
        .ok_or_else(|| RulesError::IllegalMove(format!("{from}{to}")))?;
    Ok(apply(state, &mv))
}
