//! Parsing and salvaging the successor oracle's free-text answer into
//! a set of legal moves.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::rules::Move;

static MOVES_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^Moves:\s*(.*)$").unwrap());

/// Salvage rewrites tried, in order, when a raw token does not match
/// any legal move's algebraic string verbatim.
fn salvage_candidates(token: &str) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(stripped) = token.strip_prefix('P').or_else(|| token.strip_prefix('p')) {
        out.push(stripped.to_string());
    }
    if token == "O-O" {
        out.push("0-0".to_string());
    }
    if token == "O-O-O" {
        out.push("0-0-0".to_string());
    }
    out
}

/// Extracts the last `Moves: (.*)` line, splits on commas, and maps
/// each surviving token onto a legal move (matching verbatim or via
/// the salvage rewrites). Unrecognized tokens are dropped. Duplicate
/// matches are collapsed so the resulting probability distribution
/// stays meaningful.
pub fn parse_successor_moves<'a>(text: &str, legal: &'a [Move]) -> Vec<&'a Move> {
    let Some(captures) = MOVES_LINE.captures_iter(text).last() else {
        return Vec::new();
    };
    let line = captures.get(1).map(|m| m.as_str()).unwrap_or("");

    let mut out: Vec<&Move> = Vec::new();
    for raw in line.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        let found = legal
            .iter()
            .find(|m| m.algebraic == token)
            .or_else(|| {
                salvage_candidates(token)
                    .into_iter()
                    .find_map(|candidate| legal.iter().find(|m| m.algebraic == candidate))
            });
        if let Some(mv) = found {
            if !out.iter().any(|existing| *existing == mv) {
                out.push(mv);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{legal_moves, Color, GameState};

    #[test]
    fn parses_plain_comma_separated_moves() {
        let state = GameState::initial();
        let legal = legal_moves(&state, Color::White);
        let text = "Looks balanced.\nMoves: e4, d4, Nf3";
        let parsed = parse_successor_moves(text, &legal);
        assert_eq!(parsed.len(), 3);
        assert!(parsed.iter().any(|m| m.algebraic == "e4"));
        assert!(parsed.iter().any(|m| m.algebraic == "d4"));
        assert!(parsed.iter().any(|m| m.algebraic == "Nf3"));
    }

    #[test]
    fn salvages_pawn_prefix_and_castle_zeros() {
        let state = GameState::initial();
        let legal = legal_moves(&state, Color::White);
        let text = "Moves: Pe4, pd4";
        let parsed = parse_successor_moves(text, &legal);
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn uses_the_last_moves_line_and_drops_unrecognized_tokens() {
        let state = GameState::initial();
        let legal = legal_moves(&state, Color::White);
        let text = "Moves: garbage\nMoves: e4, not-a-move, d4";
        let parsed = parse_successor_moves(text, &legal);
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn empty_when_no_moves_line_present() {
        let state = GameState::initial();
        let legal = legal_moves(&state, Color::White);
        assert!(parse_successor_moves("no move line here", &legal).is_empty());
    }
}
