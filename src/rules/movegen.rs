use super::board::{CastlingSide, GameState, Move};
use super::piece::{Color, Piece, PieceKind};
use super::square::Square;

const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (-1, 2),
    (-2, 1),
    (1, -2),
    (2, -1),
    (-1, -2),
    (-2, -1),
];
const KING_OFFSETS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

fn queen_dirs() -> impl Iterator<Item = (i8, i8)> {
    ROOK_DIRS.into_iter().chain(BISHOP_DIRS.into_iter())
}

fn offset(sq: Square, d: (i8, i8)) -> Square {
    Square::new(sq.row + d.0, sq.col + d.1)
}

/// Outcome of [`endgame`]. `Checkmate(c)` names the color that has
/// been mated (the loser).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endgame {
    InProgress,
    Checkmate(Color),
    Draw,
}

/// The first piece encountered walking from `from` along `dir`,
/// stopping at the board edge or the first occupied square.
fn first_piece_in_direction(
    state: &GameState,
    from: Square,
    dir: (i8, i8),
) -> Option<(Square, Piece)> {
    let mut cur = offset(from, dir);
    while cur.on_board() {
        if let Some(p) = state.piece_at(cur) {
            return Some((cur, p));
        }
        cur = offset(cur, dir);
    }
    None
}

/// Whether any `by_color` piece attacks `target`, implemented by
/// pretending the target square hosts each attacker shape in turn and
/// looking outward.
pub fn is_square_attacked(state: &GameState, target: Square, by_color: Color) -> bool {
    for dir in ROOK_DIRS {
        if let Some((_, p)) = first_piece_in_direction(state, target, dir) {
            if p.color == by_color && matches!(p.kind, PieceKind::Rook | PieceKind::Queen) {
                return true;
            }
        }
    }
    for dir in BISHOP_DIRS {
        if let Some((_, p)) = first_piece_in_direction(state, target, dir) {
            if p.color == by_color && matches!(p.kind, PieceKind::Bishop | PieceKind::Queen) {
                return true;
            }
        }
    }
    for d in KNIGHT_OFFSETS {
        let sq = offset(target, d);
        if sq.on_board() {
            if let Some(p) = state.piece_at(sq) {
                if p.color == by_color && p.kind == PieceKind::Knight {
                    return true;
                }
            }
        }
    }
    for d in KING_OFFSETS {
        let sq = offset(target, d);
        if sq.on_board() {
            if let Some(p) = state.piece_at(sq) {
                if p.color == by_color && p.kind == PieceKind::King {
                    return true;
                }
            }
        }
    }
    let pawn_dir: i8 = match by_color {
        Color::White => 1,
        Color::Black => -1,
    };
    for dc in [-1i8, 1i8] {
        let sq = Square::new(target.row - pawn_dir, target.col + dc);
        if sq.on_board() {
            if let Some(p) = state.piece_at(sq) {
                if p.color == by_color && p.kind == PieceKind::Pawn {
                    return true;
                }
            }
        }
    }
    false
}

pub fn is_check(state: &GameState, color: Color) -> bool {
    is_square_attacked(state, state.king_square(color), color.opposite())
}

fn algebraic_for(
    state: &GameState,
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    capturing: bool,
    castling: Option<CastlingSide>,
) -> String {
    if let Some(side) = castling {
        return match side {
            CastlingSide::KingSide => "0-0".to_string(),
            CastlingSide::QueenSide => "0-0-0".to_string(),
        };
    }
    let piece = state
        .piece_at(from)
        .expect("rules-engine invariant violated: no piece to move");
    let mut out = String::new();
    out.push_str(piece.kind.algebraic_letter());
    if capturing {
        out.push('x');
    }
    out.push_str(&to.to_algebraic());
    if let Some(promo) = promotion {
        out.push('=');
        out.push_str(promo.algebraic_letter());
    }
    out
}

fn make_move(
    state: &GameState,
    from: Square,
    to: Square,
    promotion: Option<PieceKind>,
    en_passant: bool,
    castling: Option<CastlingSide>,
    is_pawn_double_move: bool,
) -> Move {
    let capturing = en_passant || state.piece_at(to).is_some();
    let algebraic = algebraic_for(state, from, to, promotion, capturing, castling);
    Move {
        from,
        to,
        algebraic,
        en_passant,
        castling,
        is_pawn_double_move,
        promotion,
    }
}

const PROMOTION_KINDS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

/// Pseudo-legal moves for one piece, ignoring whether they leave the
/// mover's own king in check.
fn pseudo_legal_for_piece(state: &GameState, from: Square, piece: Piece) -> Vec<Move> {
    let mut moves = Vec::new();
    match piece.kind {
        PieceKind::Pawn => {
            let dir: i8 = match piece.color {
                Color::White => 1,
                Color::Black => -1,
            };
            let start_rank: i8 = match piece.color {
                Color::White => 1,
                Color::Black => 6,
            };
            let promo_rank: i8 = match piece.color {
                Color::White => 7,
                Color::Black => 0,
            };

            let one = Square::new(from.row + dir, from.col);
            if one.on_board() && state.piece_at(one).is_none() {
                if one.row == promo_rank {
                    for k in PROMOTION_KINDS {
                        moves.push(make_move(state, from, one, Some(k), false, None, false));
                    }
                } else {
                    moves.push(make_move(state, from, one, None, false, None, false));
                }
                if from.row == start_rank {
                    let two = Square::new(from.row + 2 * dir, from.col);
                    if state.piece_at(two).is_none() {
                        moves.push(make_move(state, from, two, None, false, None, true));
                    }
                }
            }

            for dc in [-1i8, 1i8] {
                let cap = Square::new(from.row + dir, from.col + dc);
                if !cap.on_board() {
                    continue;
                }
                if let Some(target) = state.piece_at(cap) {
                    if target.color != piece.color && target.kind != PieceKind::King {
                        if cap.row == promo_rank {
                            for k in PROMOTION_KINDS {
                                moves.push(make_move(state, from, cap, Some(k), false, None, false));
                            }
                        } else {
                            moves.push(make_move(state, from, cap, None, false, None, false));
                        }
                    }
                } else {
                    let ep_pawn_sq = Square::new(from.row, from.col + dc);
                    if let Some(neighbor) = state.piece_at(ep_pawn_sq) {
                        if neighbor.color != piece.color
                            && neighbor.kind == PieceKind::Pawn
                            && neighbor.just_moved_two
                        {
                            moves.push(make_move(state, from, cap, None, true, None, false));
                        }
                    }
                }
            }
        }
        PieceKind::Knight => {
            for d in KNIGHT_OFFSETS {
                let to = offset(from, d);
                if !to.on_board() {
                    continue;
                }
                match state.piece_at(to) {
                    Some(target) if target.color == piece.color || target.kind == PieceKind::King => {}
                    _ => moves.push(make_move(state, from, to, None, false, None, false)),
                }
            }
        }
        PieceKind::King => {
            for d in KING_OFFSETS {
                let to = offset(from, d);
                if !to.on_board() {
                    continue;
                }
                match state.piece_at(to) {
                    Some(target) if target.color == piece.color || target.kind == PieceKind::King => {}
                    _ => moves.push(make_move(state, from, to, None, false, None, false)),
                }
            }
            moves.extend(castling_moves(state, from, piece));
        }
        PieceKind::Rook | PieceKind::Bishop | PieceKind::Queen => {
            let dirs: Vec<(i8, i8)> = match piece.kind {
                PieceKind::Rook => ROOK_DIRS.to_vec(),
                PieceKind::Bishop => BISHOP_DIRS.to_vec(),
                PieceKind::Queen => queen_dirs().collect(),
                _ => unreachable!(),
            };
            for dir in dirs {
                let mut cur = offset(from, dir);
                while cur.on_board() {
                    match state.piece_at(cur) {
                        None => {
                            moves.push(make_move(state, from, cur, None, false, None, false));
                        }
                        Some(target) => {
                            if target.color != piece.color && target.kind != PieceKind::King {
                                moves.push(make_move(state, from, cur, None, false, None, false));
                            }
                            break;
                        }
                    }
                    cur = offset(cur, dir);
                }
            }
        }
    }
    moves
}

fn castling_moves(state: &GameState, king_from: Square, king: Piece) -> Vec<Move> {
    let mut out = Vec::new();
    if king.has_moved {
        return out;
    }
    let home_row = king_from.row;
    let opponent = king.color.opposite();

    // king-side: rook on file h (col 7), king lands on g (col 6)
    if let Some(rook) = state.piece_at(Square::new(home_row, 7)) {
        if rook.kind == PieceKind::Rook && rook.color == king.color && !rook.has_moved {
            let f = Square::new(home_row, 5);
            let g = Square::new(home_row, 6);
            if state.piece_at(f).is_none() && state.piece_at(g).is_none() {
                let transit_safe = [king_from, f, g]
                    .iter()
                    .all(|&sq| !is_square_attacked(state, sq, opponent));
                if transit_safe {
                    out.push(make_move(
                        state,
                        king_from,
                        g,
                        None,
                        false,
                        Some(CastlingSide::KingSide),
                        false,
                    ));
                }
            }
        }
    }
    // queen-side: rook on file a (col 0), king lands on c (col 2)
    if let Some(rook) = state.piece_at(Square::new(home_row, 0)) {
        if rook.kind == PieceKind::Rook && rook.color == king.color && !rook.has_moved {
            let b = Square::new(home_row, 1);
            let c = Square::new(home_row, 2);
            let d = Square::new(home_row, 3);
            if state.piece_at(b).is_none() && state.piece_at(c).is_none() && state.piece_at(d).is_none()
            {
                let transit_safe = [king_from, d, c]
                    .iter()
                    .all(|&sq| !is_square_attacked(state, sq, opponent));
                if transit_safe {
                    out.push(make_move(
                        state,
                        king_from,
                        c,
                        None,
                        false,
                        Some(CastlingSide::QueenSide),
                        false,
                    ));
                }
            }
        }
    }
    out
}

fn pseudo_legal_moves(state: &GameState, color: Color) -> Vec<Move> {
    let mut moves = Vec::new();
    for row in 0..8 {
        for col in 0..8 {
            let sq = Square::new(row, col);
            if let Some(p) = state.piece_at(sq) {
                if p.color == color {
                    moves.extend(pseudo_legal_for_piece(state, sq, p));
                }
            }
        }
    }
    moves
}

/// Applies `mv` to `state`, returning a new state. Pure: `state` is
/// not mutated.
pub fn apply(state: &GameState, mv: &Move) -> GameState {
    let mut next = state.clone();
    let mover = next
        .piece_at(mv.from)
        .expect("rules-engine invariant violated: no piece to move");

    // the en-passant window is only ever open for one ply
    for row in next.board.iter_mut() {
        for cell in row.iter_mut() {
            if let Some(p) = cell {
                p.just_moved_two = false;
            }
        }
    }

    if mv.en_passant {
        let captured_sq = Square::new(mv.from.row, mv.to.col);
        next.set_piece_at(captured_sq, None);
    }

    next.set_piece_at(mv.from, None);
    let mut moved = mover;
    moved.has_moved = true;
    if let Some(promo) = mv.promotion {
        moved.kind = promo;
    }
    if mv.is_pawn_double_move {
        moved.just_moved_two = true;
    }
    next.set_piece_at(mv.to, Some(moved));

    if let Some(side) = mv.castling {
        let home_row = mv.from.row;
        let (rook_from, rook_to) = match side {
            CastlingSide::KingSide => (Square::new(home_row, 7), Square::new(home_row, 5)),
            CastlingSide::QueenSide => (Square::new(home_row, 0), Square::new(home_row, 3)),
        };
        let mut rook = next
            .piece_at(rook_from)
            .expect("rules-engine invariant violated: no rook to castle with");
        rook.has_moved = true;
        next.set_piece_at(rook_from, None);
        next.set_piece_at(rook_to, Some(rook));
    }

    next.side_to_move = state.side_to_move.opposite();
    next.history.push(mv.clone());
    next
}

fn leaves_own_king_in_check(state: &GameState, mv: &Move, color: Color) -> bool {
    let next = apply(state, mv);
    is_check(&next, color)
}

/// All legal moves for `color` in `state`: piece-wise pseudo-legal
/// generation filtered through `doesNotLeaveOwnKingInCheck`.
pub fn legal_moves(state: &GameState, color: Color) -> Vec<Move> {
    pseudo_legal_moves(state, color)
        .into_iter()
        .filter(|mv| !leaves_own_king_in_check(state, mv, color))
        .collect()
}

/// Terminal classification: no legal moves + check = checkmate for
/// the side to move; no legal moves + no check = stalemate (a draw).
/// Threefold repetition and the fifty-move rule are intentionally not
/// implemented.
pub fn endgame(state: &GameState) -> Endgame {
    let color = state.side_to_move;
    if !legal_moves(state, color).is_empty() {
        return Endgame::InProgress;
    }
    if is_check(state, color) {
        Endgame::Checkmate(color)
    } else {
        Endgame::Draw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn initial_position_has_twenty_legal_moves() {
        let s = GameState::initial();
        assert_eq!(legal_moves(&s, Color::White).len(), 20);
    }

    #[test]
    fn apply_flips_side_to_move_and_keeps_one_king_per_side() {
        let s = GameState::initial();
        for mv in legal_moves(&s, Color::White) {
            let next = apply(&s, &mv);
            assert_eq!(next.side_to_move, Color::Black);
            // king_square panics if a king is missing
            next.king_square(Color::White);
            next.king_square(Color::Black);
        }
    }

    #[test]
    fn hash_is_deterministic_across_identical_applies() {
        let s = GameState::initial();
        let mv = legal_moves(&s, Color::White)
            .into_iter()
            .find(|m| m.algebraic == "e4")
            .unwrap();
        let a = apply(&s, &mv).hash();
        let b = apply(&s, &mv).hash();
        assert_eq!(a, b);
    }

    #[test]
    fn algebraic_matches_expected_pattern_for_every_opening_move() {
        let re = Regex::new(r"^[KQRBN]?x?[a-h][1-8](=[QRBN])?$|^0-0(-0)?$").unwrap();
        let s = GameState::initial();
        for mv in legal_moves(&s, Color::White) {
            assert!(
                re.is_match(&mv.algebraic),
                "{} did not match",
                mv.algebraic
            );
        }
    }

    #[test]
    fn legal_moves_exclude_moves_leaving_own_king_in_check() {
        // white king e1, white rook removed, black rook pins along e-file
        let mut s = GameState::initial();
        // clear the board except kings, a white bishop on e2 (pinned), a black rook on e8
        for row in s.board.iter_mut() {
            for cell in row.iter_mut() {
                *cell = None;
            }
        }
        s.set_piece_at(Square::new(0, 4), Some(Piece::new(PieceKind::King, Color::White)));
        s.set_piece_at(Square::new(7, 4), Some(Piece::new(PieceKind::King, Color::Black)));
        s.set_piece_at(Square::new(1, 4), Some(Piece::new(PieceKind::Bishop, Color::White)));
        s.set_piece_at(Square::new(6, 4), Some(Piece::new(PieceKind::Rook, Color::Black)));
        s.side_to_move = Color::White;

        let moves = legal_moves(&s, Color::White);
        // the pinned bishop has no legal moves off the e-file
        assert!(moves.iter().all(|m| m.from != Square::new(1, 4) || m.to.col == 4));
    }

    #[test]
    fn back_rank_mate_is_detected() {
        let mut s = GameState::initial();
        for row in s.board.iter_mut() {
            for cell in row.iter_mut() {
                *cell = None;
            }
        }
        // white king e1, white rooks a1 and b7, black king h8 cornered:
        // Rb7 seals off the seventh rank, Ra1-a8 delivers a ladder mate.
        s.set_piece_at(Square::new(0, 4), Some(Piece::new(PieceKind::King, Color::White)));
        s.set_piece_at(Square::new(0, 0), Some(Piece::new(PieceKind::Rook, Color::White)));
        s.set_piece_at(Square::new(6, 1), Some(Piece::new(PieceKind::Rook, Color::White)));
        s.set_piece_at(Square::new(7, 7), Some(Piece::new(PieceKind::King, Color::Black)));
        s.side_to_move = Color::White;

        let mate_move = legal_moves(&s, Color::White)
            .into_iter()
            .find(|m| {
                let next = apply(&s, m);
                endgame(&next) == Endgame::Checkmate(Color::Black)
            });
        assert!(mate_move.is_some());
    }

    #[test]
    fn stalemate_is_detected() {
        let mut s = GameState::initial();
        for row in s.board.iter_mut() {
            for cell in row.iter_mut() {
                *cell = None;
            }
        }
        // classic stalemate: black king a8, white queen b6, white king c6, black to move
        s.set_piece_at(Square::new(7, 0), Some(Piece::new(PieceKind::King, Color::Black)));
        s.set_piece_at(Square::new(5, 1), Some(Piece::new(PieceKind::Queen, Color::White)));
        s.set_piece_at(Square::new(5, 2), Some(Piece::new(PieceKind::King, Color::White)));
        s.side_to_move = Color::Black;

        assert!(legal_moves(&s, Color::Black).is_empty());
        assert_eq!(endgame(&s), Endgame::Draw);
        assert!(!is_check(&s, Color::Black));
    }

    #[test]
    fn en_passant_window_closes_after_one_ply() {
        let mut s = GameState::initial();
        let e4 = legal_moves(&s, Color::White)
            .into_iter()
            .find(|m| m.algebraic == "e4")
            .unwrap();
        s = apply(&s, &e4);
        // black plays a neutral knight move
        let nf6 = legal_moves(&s, Color::Black)
            .into_iter()
            .find(|m| m.from == Square::new(7, 6))
            .unwrap();
        s = apply(&s, &nf6);
        // no black pawn can still en-passant-capture on the d/f file
        assert!(legal_moves(&s, Color::White).iter().all(|m| !m.en_passant));
    }

    #[test]
    fn castling_kingside_available_when_path_clear_and_unmoved() {
        let mut s = GameState::initial();
        for row in s.board.iter_mut() {
            for cell in row.iter_mut() {
                *cell = None;
            }
        }
        s.set_piece_at(Square::new(0, 4), Some(Piece::new(PieceKind::King, Color::White)));
        s.set_piece_at(Square::new(0, 7), Some(Piece::new(PieceKind::Rook, Color::White)));
        s.set_piece_at(Square::new(7, 4), Some(Piece::new(PieceKind::King, Color::Black)));
        s.side_to_move = Color::White;

        let castle = legal_moves(&s, Color::White)
            .into_iter()
            .find(|m| m.castling.is_some());
        assert!(castle.is_some());
        let castle = castle.unwrap();
        assert_eq!(castle.from, Square::new(0, 4));
        assert_eq!(castle.to, Square::new(0, 6));
        assert_eq!(castle.algebraic, "0-0");
    }

    #[test]
    fn castling_forbidden_through_attacked_square() {
        let mut s = GameState::initial();
        for row in s.board.iter_mut() {
            for cell in row.iter_mut() {
                *cell = None;
            }
        }
        s.set_piece_at(Square::new(0, 4), Some(Piece::new(PieceKind::King, Color::White)));
        s.set_piece_at(Square::new(0, 7), Some(Piece::new(PieceKind::Rook, Color::White)));
        s.set_piece_at(Square::new(7, 4), Some(Piece::new(PieceKind::King, Color::Black)));
        // black rook on f-file attacks f1, the king's transit square
        s.set_piece_at(Square::new(7, 5), Some(Piece::new(PieceKind::Rook, Color::Black)));
        s.side_to_move = Color::White;

        assert!(legal_moves(&s, Color::White)
            .iter()
            .all(|m| m.castling.is_none()));
    }
}
