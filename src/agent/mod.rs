//! The LLM minimax agent (C4): the three oracle-backed tasks
//! (describe, evaluate, propose successors) that the compressed
//! minimax core (C5) needs to do anything at all.
//!
//! A single oracle-backed `evaluate` stands in for a hand-tuned
//! weighted blend of heuristics, since leaf value and successor
//! quality are now delegated to the LLM.

mod error;
mod parsing;

pub use error::AgentError;
pub use parsing::parse_successor_moves;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::model::Successor;
use crate::oracle::{ChatMessage, ChatOptions, Choice, Oracle, OracleError};
use crate::prompt::{describe_prompt, evaluate_prompt, successor_prompt};
use crate::rules::{apply, legal_moves, GameState, StateHash};
use crate::cache::SingleFlightCache;
use crate::search::Evaluator;

/// Oracle calls are retried this many times before the agent gives up
/// and raises oracle exhaustion.
pub const MAX_LLM_TRIES: u32 = 5;

/// `estimateNumberOfSuccessors`'s fixed target for this agent when the
/// successors cache has no entry yet.
const SUCCESSOR_TARGET_COUNT: usize = 8;

/// Implements the three oracle tasks on top of C2 (the [`Oracle`]
/// trait) and C3 (prompt rendering); owns the description, evaluation,
/// and successors caches. All three are single-flighted per state hash
/// so concurrent callers for the same state share one in-flight oracle
/// call instead of issuing one each.
pub struct LlmAgent<O: Oracle> {
    oracle: Arc<O>,
    descriptions: SingleFlightCache<StateHash, Arc<str>, AgentError>,
    evaluations: SingleFlightCache<StateHash, f64, AgentError>,
    successor_proposals: SingleFlightCache<StateHash, Arc<Vec<Successor>>, AgentError>,
}

impl<O: Oracle> LlmAgent<O> {
    pub fn new(oracle: O) -> Self {
        LlmAgent {
            oracle: Arc::new(oracle),
            descriptions: SingleFlightCache::new(),
            evaluations: SingleFlightCache::new(),
            successor_proposals: SingleFlightCache::new(),
        }
    }

    /// Single-flight over the description cache: the first caller for
    /// a given state begins the LLM call and publishes the unresolved
    /// future immediately, so concurrent callers await the same
    /// future instead of issuing a second request.
    pub async fn describe(&self, state: &GameState) -> Result<Arc<str>, AgentError> {
        let hash = state.hash();
        self.descriptions
            .get_or_compute(hash, || self.describe_uncached(state))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn describe_uncached(&self, state: &GameState) -> Result<Arc<str>, AgentError> {
        let messages = [
            ChatMessage::system(
                "You are a chess analysis assistant describing a position for another model.",
            ),
            ChatMessage::user(describe_prompt(state)),
        ];
        let options = ChatOptions {
            max_tokens: 400,
            temperature: 0.7,
            ..Default::default()
        };

        let choice = self.chat_with_retries(&messages, &options, "describe").await?;
        Ok(Arc::from(choice.message.content.as_str()))
    }

    /// Leaf evaluation: `P(white)` in `[0,1]`, computed as a softmax of
    /// the returned top-log-probabilities restricted to the `white`
    /// token, or falling back to a literal `black`/`white` answer
    /// mapped to `-1.0`/`1.0` when log-probabilities are unavailable.
    ///
    /// Single-flighted per state hash, same as [`describe`](Self::describe):
    /// concurrent callers for the same state share one in-flight oracle
    /// call instead of issuing one each.
    pub async fn evaluate(&self, state: &GameState) -> Result<f64, AgentError> {
        let hash = state.hash();
        self.evaluations
            .get_or_compute(hash, || self.evaluate_uncached(state))
            .await
            .map_err(|e| (*e).clone())
    }

    async fn evaluate_uncached(&self, state: &GameState) -> Result<f64, AgentError> {
        let description = self.describe(state).await?;
        let messages = [
            ChatMessage::system("You are a chess analysis assistant."),
            ChatMessage::user(evaluate_prompt(state, &description)),
        ];

        let tokens = self.oracle.token_table();
        let mut logit_bias = HashMap::new();
        logit_bias.insert(tokens.white(), 100.0);
        logit_bias.insert(tokens.black(), 100.0);
        let options = ChatOptions {
            max_tokens: 1,
            temperature: 0.0,
            logit_bias,
            logprobs: true,
            top_logprobs: 12,
            ..Default::default()
        };

        let choice = self.chat_with_retries(&messages, &options, "evaluate").await?;

        if let Some(p) = Self::probability_of_white(&choice) {
            return Ok(p);
        }
        if let Some(v) = Self::literal_color_fallback(&choice.message.content) {
            return Ok(v);
        }
        Err(AgentError::NoLogprobs)
    }

    fn probability_of_white(choice: &Choice) -> Option<f64> {
        let token = choice.logprobs.as_ref()?.first()?;
        if token.top_logprobs.is_empty() {
            return None;
        }
        let lp_white = token
            .top_logprobs
            .iter()
            .find(|t| t.token.trim().eq_ignore_ascii_case("white"))?
            .logprob as f64;
        let denom: f64 = token
            .top_logprobs
            .iter()
            .map(|t| (t.logprob as f64).exp())
            .sum();
        if denom <= 0.0 {
            return None;
        }
        Some(lp_white.exp() / denom)
    }

    fn literal_color_fallback(text: &str) -> Option<f64> {
        match text.trim().to_ascii_lowercase().as_str() {
            "black" => Some(-1.0),
            "white" => Some(1.0),
            _ => None,
        }
    }

    /// Successor proposal: the legal-move list is offered to the
    /// model, its free-text answer is parsed and salvaged into a
    /// subset of legal moves, each assigned uniform probability
    /// `1/k`.
    ///
    /// Single-flighted per state hash, same as [`describe`](Self::describe):
    /// concurrent callers for the same state share one in-flight oracle
    /// call instead of issuing one each.
    pub async fn successors(&self, state: &GameState) -> Result<Vec<Successor>, AgentError> {
        let hash = state.hash();
        let shared = self
            .successor_proposals
            .get_or_compute(hash, || self.successors_uncached(state))
            .await
            .map_err(|e| (*e).clone())?;
        Ok((*shared).clone())
    }

    async fn successors_uncached(&self, state: &GameState) -> Result<Arc<Vec<Successor>>, AgentError> {
        let legal = legal_moves(state, state.side_to_move);
        if legal.is_empty() {
            // endgame() would have classified this state as terminal;
            // reaching here with no legal moves is the core's problem,
            // not the oracle's, so fail immediately without spending a try.
            return Err(AgentError::NoSuccessors { tries: 0 });
        }

        let description = self.describe(state).await?;
        let messages = [
            ChatMessage::system("You are a chess analysis assistant."),
            ChatMessage::user(successor_prompt(state, &description, SUCCESSOR_TARGET_COUNT, &legal)),
        ];
        let options = ChatOptions {
            max_tokens: 300,
            temperature: 1.0,
            ..Default::default()
        };

        let mut last_err: Option<Arc<OracleError>> = None;
        for _ in 0..MAX_LLM_TRIES {
            match self.oracle.chat(&messages, &options).await {
                Ok(choices) => {
                    let Some(choice) = choices.into_iter().next() else {
                        continue;
                    };
                    let chosen = parse_successor_moves(&choice.message.content, &legal);
                    if chosen.is_empty() {
                        continue;
                    }
                    let probability = 1.0 / chosen.len() as f64;
                    return Ok(Arc::new(
                        chosen
                            .into_iter()
                            .map(|mv| Successor {
                                next_state: apply(state, mv),
                                mv: mv.clone(),
                                probability,
                            })
                            .collect(),
                    ));
                }
                Err(e) => last_err = Some(Arc::new(e)),
            }
        }

        match last_err {
            Some(source) => Err(AgentError::OracleExhausted {
                tries: MAX_LLM_TRIES,
                source,
            }),
            None => Err(AgentError::NoSuccessors {
                tries: MAX_LLM_TRIES,
            }),
        }
    }

    async fn chat_with_retries(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        task: &'static str,
    ) -> Result<Choice, AgentError> {
        let mut last_err: Option<Arc<OracleError>> = None;
        for attempt in 0..MAX_LLM_TRIES {
            match self.oracle.chat(messages, options).await {
                Ok(choices) => {
                    if let Some(choice) = choices.into_iter().next() {
                        info!(target: "oracle_calls", task, attempt, "oracle call succeeded");
                        return Ok(choice);
                    }
                    last_err = Some(Arc::new(OracleError::NoChoices));
                }
                Err(e) => {
                    info!(target: "oracle_calls", task, attempt, error = %e, "oracle call failed");
                    last_err = Some(Arc::new(e));
                }
            }
        }
        Err(AgentError::OracleExhausted {
            tries: MAX_LLM_TRIES,
            source: last_err.unwrap_or_else(|| Arc::new(OracleError::NoChoices)),
        })
    }

    /// A disabled alternative successor path using `n` independent
    /// completions scored by their own log-probabilities rather than
    /// a single free-text answer. Tried in practice and found
    /// ineffective; kept here, uncalled, as a documented dead end
    /// rather than deleted outright.
    #[allow(dead_code)]
    async fn successors_via_logprob_sampling(
        &self,
        _state: &GameState,
        _n: u32,
    ) -> Result<Vec<Successor>, AgentError> {
        unimplemented!("disabled: scoring independent completions by logprob did not produce usable move rankings")
    }
}

#[async_trait]
impl<O: Oracle> Evaluator for LlmAgent<O> {
    async fn evaluate(&self, state: &GameState) -> Result<f64, crate::search::SearchError> {
        Ok(LlmAgent::evaluate(self, state).await?)
    }

    async fn successors(
        &self,
        state: &GameState,
    ) -> Result<Vec<Successor>, crate::search::SearchError> {
        Ok(LlmAgent::successors(self, state).await?)
    }

    fn estimated_successor_count(&self) -> usize {
        SUCCESSOR_TARGET_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{ChatOptions as Opts, Choice as StubChoice, StubOracle};
    use crate::rules::{Color, GameState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn text_choice(text: &str) -> Vec<StubChoice> {
        vec![StubChoice {
            message: ChatMessage {
                role: crate::oracle::Role::Assistant,
                content: text.to_string(),
            },
            logprobs: None,
        }]
    }

    #[tokio::test]
    async fn concurrent_evaluate_calls_issue_exactly_one_oracle_call() {
        let oracle = Arc::new(
            StubOracle::new(|_, _: &Opts| Ok(text_choice("white")))
                .with_delay(Duration::from_millis(20)),
        );
        let agent = Arc::new(LlmAgent::new_for_test(oracle.clone()));

        let state = GameState::initial();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let agent = agent.clone();
            let state = state.clone();
            handles.push(tokio::spawn(async move { agent.evaluate(&state).await.unwrap() }));
        }
        for h in handles {
            h.await.unwrap();
        }
        // describe + evaluate are two distinct oracle calls; single-flight
        // collapses each across all eight concurrent callers.
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn successors_parses_moves_line_and_assigns_uniform_probability() {
        let calls = AtomicUsize::new(0);
        let oracle = StubOracle::new(move |_, _: &Opts| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(text_choice("Looks balanced.\nMoves: e4, d4, Nf3"))
        });
        let agent = LlmAgent::new_for_test(Arc::new(oracle));
        let state = GameState::initial();
        let successors = agent.successors(&state).await.unwrap();
        assert_eq!(successors.len(), 3);
        let total: f64 = successors.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn evaluate_falls_back_to_literal_answer_without_logprobs() {
        let oracle = StubOracle::new(|_, _: &Opts| Ok(text_choice("black")));
        let agent = LlmAgent::new_for_test(Arc::new(oracle));
        let state = GameState::initial();
        let value = agent.evaluate(&state).await.unwrap();
        assert_eq!(value, -1.0);
    }

    impl<O: Oracle> LlmAgent<O> {
        /// Test-only constructor taking an already-`Arc`'d oracle so
        /// tests can hold a handle to the stub for call-count assertions.
        fn new_for_test(oracle: Arc<O>) -> Self {
            LlmAgent {
                oracle,
                descriptions: SingleFlightCache::new(),
                evaluations: SingleFlightCache::new(),
                successor_proposals: SingleFlightCache::new(),
            }
        }
    }
}
