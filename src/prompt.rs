//! The prompt builder: pure, synchronous rendering of a [`GameState`]
//! into the shared context block and the three task prompts. No I/O,
//! no crate dependencies beyond `std::fmt`.

use std::fmt::Write as _;

use crate::rules::{Color, GameState, Move, PieceKind};

/// The shared context block: ASCII board + legend + piece census +
/// per-piece squares + move history + whose-turn sentence.
pub fn render_context(state: &GameState) -> String {
    let mut out = String::new();

    writeln!(out, "Board (White is uppercase, Black is lowercase, . is empty):").ok();
    writeln!(out, "{}", state).ok();
    writeln!(
        out,
        "\nLegend: P/p pawn, R/r rook, N/n knight, B/b bishop, Q/q queen, K/k king."
    )
    .ok();

    writeln!(out, "\nPiece census:").ok();
    writeln!(out, "{{").ok();
    for ((color, kind), count) in state.piece_count() {
        writeln!(out, "  \"{color} {kind}\": {count},").ok();
    }
    writeln!(out, "}}").ok();

    writeln!(out, "\nPiece positions:").ok();
    for color in [Color::White, Color::Black] {
        let squares = piece_squares(state, color);
        writeln!(out, "  {color}: {}", squares.join(", ")).ok();
    }

    writeln!(out, "\nMove history: {}", render_history(&state.history)).ok();

    writeln!(out, "\nIt is {}'s turn to move.", state.side_to_move).ok();

    out
}

fn piece_squares(state: &GameState, color: Color) -> Vec<String> {
    let mut out = Vec::new();
    for row in 0..8 {
        for col in 0..8 {
            let sq = crate::rules::Square::new(row, col);
            if let Some(p) = state.piece_at(sq) {
                if p.color == color {
                    out.push(format!("{}@{}", p.kind.algebraic_letter_or_pawn(), sq));
                }
            }
        }
    }
    out
}

fn render_history(history: &[Move]) -> String {
    if history.is_empty() {
        return "(none)".to_string();
    }
    history
        .iter()
        .map(|m| m.algebraic.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// The "describe the position" prompt.
pub fn describe_prompt(state: &GameState) -> String {
    format!(
        "{}\n\nDescribe the game state: the important pieces, any danger, and any \
         tactics either side should be aware of, and what these imply about how the \
         game might continue. Format your answer as three short sets of bullet points.",
        render_context(state)
    )
}

/// The "who is winning" prompt, consumed with a 1-token ceiling,
/// temperature 0, a logit bias on `white`/`black`, and log-probabilities
/// enabled.
pub fn evaluate_prompt(state: &GameState, description: &str) -> String {
    format!(
        "{}\n\nDescription:\n{}\n\nWho is more likely to win this game? Just answer \
         `black` or `white`, lowercase.",
        render_context(state),
        description
    )
}

/// The "what will you play next" prompt; `legal` is the full legal
/// move set in algebraic form, offered as the set the model must
/// choose from.
pub fn successor_prompt(
    state: &GameState,
    description: &str,
    target_count: usize,
    legal: &[Move],
) -> String {
    let side = state.side_to_move;
    let choices = legal
        .iter()
        .map(|m| m.algebraic.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{}\n\nDescription:\n{}\n\nWhat moves is the {side} player likely to make next? \
         Select around {target_count} of the most plausible moves. Finish with `Moves: ` \
         followed by the algebraic moves separated by commas. Choose from the following \
         moves: {choices}.",
        render_context(state),
        description
    )
}

impl PieceKind {
    fn algebraic_letter_or_pawn(self) -> &'static str {
        match self {
            PieceKind::Pawn => "P",
            other => other.algebraic_letter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_mentions_side_to_move() {
        let s = GameState::initial();
        let ctx = render_context(&s);
        assert!(ctx.contains("white's turn"));
    }

    #[test]
    fn successor_prompt_lists_every_legal_move() {
        let s = GameState::initial();
        let legal = crate::rules::legal_moves(&s, s.side_to_move);
        let prompt = successor_prompt(&s, "desc", 8, &legal);
        assert!(prompt.contains("Moves: "));
        for mv in &legal {
            assert!(prompt.contains(&mv.algebraic));
        }
    }
}
