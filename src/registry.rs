//! The descriptor → agent binding, exposed as `call_agent`.
//!
//! Rather than a module-level agent singleton, this module holds an
//! explicitly constructed, explicitly owned `AgentRegistry`,
//! constructed once by the caller (a REPL, an HTTP server), holding
//! the two LLM agents and their caches for as long as the registry
//! lives — no process-lifetime globals.

use rand::seq::SliceRandom;

use crate::agent::LlmAgent;
use crate::oracle::OpenAiOracle;
use crate::rules::{legal_moves, GameState, Move};
use crate::search::{CostSetup, ExpansionMode, MinimaxCore, SearchError};
use std::sync::Arc;

/// Which oracle-backed model a `minimax` descriptor binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    Gpt35,
    Gpt4,
}

/// `descriptor ∈ {human, random, minimax(gpt-3.5), minimax(gpt-4)}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descriptor {
    /// Rejected as an error — a human move arrives through a different
    /// channel (the REPL/HTTP input), not through `callAgent`.
    Human,
    /// A uniform pick among the legal moves for the side to move.
    Random,
    Minimax(Model),
}

#[derive(Debug, thiserror::Error)]
pub enum CallAgentError {
    #[error("the `human` descriptor must be handled by the caller's input channel, not callAgent")]
    HumanRequested,
    #[error("no legal moves available for the side to move")]
    NoLegalMoves,
    #[error(transparent)]
    Search(#[from] SearchError),
}

/// One LLM-backed search agent, bundling the evaluator (C4) with the
/// core that searches over it (C5). Composition instead of C4
/// literally subclassing C5 (which Rust has no inheritance to
/// express) — the two are still "one agent" from the caller's point
/// of view, exposed by `choose_move`.
pub struct LlmMinimaxAgent {
    core: MinimaxCore<LlmAgent<OpenAiOracle>>,
}

impl LlmMinimaxAgent {
    fn new(oracle: OpenAiOracle) -> Self {
        let evaluator = Arc::new(LlmAgent::new(oracle));
        let core = MinimaxCore::new(evaluator, CostSetup::llm_default(), ExpansionMode::Parallel);
        LlmMinimaxAgent { core }
    }

    pub async fn choose_move(&self, state: &GameState) -> Result<Move, SearchError> {
        self.core.choose_move(state).await
    }
}

/// Owns the two packaged LLM agents (`gpt3_5`, `gpt4`) and resolves a
/// [`Descriptor`] into a chosen move. Construct one per server/REPL
/// process; its caches live exactly as long as it does.
pub struct AgentRegistry {
    gpt3_5: LlmMinimaxAgent,
    gpt4: LlmMinimaxAgent,
}

impl AgentRegistry {
    pub fn new(api_key: String, organization: Option<String>) -> Self {
        AgentRegistry {
            gpt3_5: LlmMinimaxAgent::new(OpenAiOracle::gpt3_5(api_key.clone(), organization.clone())),
            gpt4: LlmMinimaxAgent::new(OpenAiOracle::gpt4(api_key, organization)),
        }
    }

    pub async fn call_agent(
        &self,
        state: &GameState,
        descriptor: Descriptor,
    ) -> Result<Move, CallAgentError> {
        match descriptor {
            Descriptor::Human => Err(CallAgentError::HumanRequested),
            Descriptor::Random => random_move(state),
            Descriptor::Minimax(Model::Gpt35) => Ok(self.gpt3_5.choose_move(state).await?),
            Descriptor::Minimax(Model::Gpt4) => Ok(self.gpt4.choose_move(state).await?),
        }
    }
}

fn random_move(state: &GameState) -> Result<Move, CallAgentError> {
    let legal = legal_moves(state, state.side_to_move);
    legal
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or(CallAgentError::NoLegalMoves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::GameState;

    #[test]
    fn random_descriptor_always_returns_a_legal_move() {
        let state = GameState::initial();
        let legal = legal_moves(&state, state.side_to_move);
        let mv = random_move(&state).unwrap();
        assert!(legal.contains(&mv));
    }
}
