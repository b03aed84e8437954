/// Rules-engine invariant violations — program-logic errors ("no
/// piece to move", "moving off-turn", "missing king") — not
/// recovered, only surfaced for diagnosis.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RulesError {
    #[error("no piece to move at {0}")]
    NoPieceToMove(String),
    #[error("piece at {0} belongs to the player not on move")]
    MovingOffTurn(String),
    #[error("move {0} is not in the legal move list for this position")]
    IllegalMove(String),
}
