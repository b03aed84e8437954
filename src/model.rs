//! Shared data-model types that cross the boundary between the agent
//! and the search core.

use crate::rules::{GameState, Move};

/// A candidate next state annotated with the move taken and the
/// probability the oracle assigned it. `Σ probability = 1` over the
/// list returned for a given state.
#[derive(Debug, Clone)]
pub struct Successor {
    pub next_state: GameState,
    pub mv: Move,
    pub probability: f64,
}
