//! The compressed minimax core (C5): a budgeted, alpha-beta-ish search
//! whose successor/evaluation calls are delegated to an [`Evaluator`]
//! (C4's `LlmAgent`, or anything else shaped the same way for tests).
//!
//! This runs as an I/O-bound fan-out over `tokio`, since the expensive
//! step here is an LLM call rather than CPU evaluation, and the cache
//! has to carry a single-flight discipline because two branches can
//! race to request the same transposition's value while it is still
//! being computed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::info;

use crate::cache::{await_value, BudgetedCache, Probe, SingleFlightCache};
use crate::model::Successor;
use crate::rules::{endgame, Color, Endgame, GameState, Move, StateHash};

/// What the core asks of its evaluator: a leaf value and a successor
/// proposal. `LlmAgent<O>` is the only production implementor; tests
/// implement it directly against a stub to exercise the core in
/// isolation from prompt rendering and oracle wiring.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, state: &GameState) -> Result<f64, SearchError>;
    async fn successors(&self, state: &GameState) -> Result<Vec<Successor>, SearchError>;

    /// Used only when the successors cache has no entry yet, to decide
    /// whether this node can afford to expand.
    fn estimated_successor_count(&self) -> usize;
}

/// Budget parameters for one search.
#[derive(Debug, Clone, Copy)]
pub struct CostSetup {
    pub max_depth: u32,
    pub total_budget: f64,
    pub state_evaluation_cost: f64,
    pub get_successors_cost: f64,
    pub basic_minimax_cost: f64,
    pub budget_cache_tolerance: f64,
}

impl CostSetup {
    /// The defaults bound to the `minimax(gpt-3.5)`/`minimax(gpt-4)`
    /// descriptors.
    pub fn llm_default() -> Self {
        CostSetup {
            max_depth: 1,
            total_budget: 500.0,
            get_successors_cost: 10.0,
            state_evaluation_cost: 10.0,
            basic_minimax_cost: 1.0,
            budget_cache_tolerance: 0.1,
        }
    }
}

/// How a node's children are explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// No pruning; every child runs concurrently. The default, and the
    /// root always uses this regardless of the configured mode.
    Parallel,
    /// Live alpha-beta, children visited in order, pruned when
    /// `beta <= alpha`. Used to respect oracle rate limits.
    Serial,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Agent(#[from] crate::agent::AgentError),
    #[error("successor proposal for a non-terminal state returned zero candidate moves")]
    EmptySuccessors,
}

/// The budgeted, cache-coordinated search itself. Generic over the
/// evaluator so tests can swap in a deterministic stub.
pub struct MinimaxCore<E: Evaluator> {
    evaluator: Arc<E>,
    cost: CostSetup,
    mode: ExpansionMode,
    minimax_cache: BudgetedCache<StateHash, f64, SearchError>,
    successors_cache: SingleFlightCache<StateHash, Arc<Vec<Successor>>, SearchError>,
}

impl<E: Evaluator> MinimaxCore<E> {
    pub fn new(evaluator: Arc<E>, cost: CostSetup, mode: ExpansionMode) -> Self {
        MinimaxCore {
            evaluator,
            minimax_cache: BudgetedCache::new(cost.budget_cache_tolerance),
            successors_cache: SingleFlightCache::new(),
            cost,
            mode,
        }
    }

    /// Root successors are always expanded in parallel regardless of
    /// `self.mode`.
    pub async fn choose_move(&self, state: &GameState) -> Result<Move, SearchError> {
        let maximizing_root = state.side_to_move == Color::White;
        let successors = self.fetch_successors(state, &state.hash()).await?;
        if successors.is_empty() {
            return Err(SearchError::EmptySuccessors);
        }

        let child_results = join_all(successors.iter().map(|succ| {
            let budget = self.cost.total_budget * succ.probability;
            self.minimax(
                1,
                &succ.next_state,
                budget,
                f64::NEG_INFINITY,
                f64::INFINITY,
                !maximizing_root,
            )
        }))
        .await;

        let mut iter = successors.iter().zip(child_results.into_iter());
        let (first_succ, first_result) = iter.next().expect("successors is non-empty");
        let (mut best_value, _) = first_result?;
        let mut best_mv = &first_succ.mv;

        for (succ, result) in iter {
            let (value, _used) = result?;
            let replace = if maximizing_root {
                value > best_value
            } else {
                !(best_value < value)
            };
            if replace {
                best_value = value;
                best_mv = &succ.mv;
            }
        }

        Ok(best_mv.clone())
    }

    /// One recursive search node. Returns `(value, usedBudget)`;
    /// `usedBudget` is recorded for diagnostics only and never affects
    /// the returned value.
    ///
    /// Returns a boxed future: this function and `resolve_node`/
    /// `expand_parallel`/`expand_serial` form a recursion cycle
    /// (minimax descends into children via expand, which calls back
    /// into minimax), and `async fn`s cannot recurse without one link
    /// in the cycle being heap-indirected.
    fn minimax<'a>(
        &'a self,
        depth: u32,
        state: &'a GameState,
        budget: f64,
        alpha: f64,
        beta: f64,
        maximizing: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(f64, f64), SearchError>> + Send + 'a>> {
        Box::pin(async move {
            let hash = state.hash();

            let tx = match self.minimax_cache.probe_or_reserve(hash.clone(), budget) {
                Probe::UseExisting(rx) => {
                    let value = await_value(rx).await.map_err(|e| (*e).clone())?;
                    return Ok((value, 0.0));
                }
                Probe::Reserved(tx) => tx,
            };

            let mut used = self.cost.basic_minimax_cost;
            let outcome = self
                .resolve_node(depth, state, budget, &mut used, alpha, beta, maximizing, &hash)
                .await;

            match &outcome {
                Ok(value) => {
                    let _ = tx.send(Some(Ok(*value)));
                }
                Err(e) => {
                    let _ = tx.send(Some(Err(Arc::new(e.clone()))));
                }
            }

            outcome.map(|value| (value, used))
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_node(
        &self,
        depth: u32,
        state: &GameState,
        budget: f64,
        used: &mut f64,
        alpha: f64,
        beta: f64,
        maximizing: bool,
        hash: &StateHash,
    ) -> Result<f64, SearchError> {
        match endgame(state) {
            Endgame::Checkmate(Color::White) => return Ok(-1.0),
            Endgame::Checkmate(Color::Black) => return Ok(1.0),
            Endgame::Draw => {
                *used += self.cost.state_evaluation_cost;
                let value = self.evaluator.evaluate(state).await?;
                info!(
                    target: "minimax_iter",
                    event = "stateEvaluation",
                    depth,
                    value,
                    used_budget = *used,
                    terminal = "draw",
                );
                return Ok(value);
            }
            Endgame::InProgress => {}
        }

        let already_cached = self.successors_cache.contains(hash);
        let cached_successors = if already_cached {
            Some(self.fetch_successors(state, hash).await?)
        } else {
            None
        };
        let realized_get_successors_cost = if already_cached {
            0.0
        } else {
            self.cost.get_successors_cost
        };
        let estimate = cached_successors
            .as_ref()
            .map(|s| s.len())
            .unwrap_or_else(|| self.evaluator.estimated_successor_count());

        let become_leaf = depth >= self.cost.max_depth
            || budget
                < *used
                    + realized_get_successors_cost
                    + estimate as f64 * self.cost.state_evaluation_cost;

        if become_leaf {
            *used += self.cost.state_evaluation_cost;
            let value = self.evaluator.evaluate(state).await?;
            info!(
                target: "minimax_iter",
                event = "stateEvaluation",
                depth,
                value,
                used_budget = *used,
                terminal = "none",
            );
            return Ok(value);
        }

        *used += realized_get_successors_cost;
        let successors = match cached_successors {
            Some(s) => s,
            None => self.fetch_successors(state, hash).await?,
        };
        if successors.is_empty() {
            return Err(SearchError::EmptySuccessors);
        }

        let remaining = budget - *used;
        let child_maximizing = !maximizing;
        let value = match self.mode {
            ExpansionMode::Parallel => {
                self.expand_parallel(depth, &successors, remaining, maximizing, child_maximizing, used)
                    .await?
            }
            ExpansionMode::Serial => {
                self.expand_serial(
                    depth,
                    &successors,
                    remaining,
                    alpha,
                    beta,
                    maximizing,
                    child_maximizing,
                    used,
                )
                .await?
            }
        };

        info!(
            target: "minimax_iter",
            event = "minimaxIter",
            depth,
            value,
            used_budget = *used,
        );
        Ok(value)
    }

    async fn expand_parallel(
        &self,
        depth: u32,
        successors: &[Successor],
        remaining: f64,
        maximizing: bool,
        child_maximizing: bool,
        used: &mut f64,
    ) -> Result<f64, SearchError> {
        let results = join_all(successors.iter().map(|succ| {
            let child_budget = remaining * succ.probability;
            self.minimax(
                depth + 1,
                &succ.next_state,
                child_budget,
                f64::NEG_INFINITY,
                f64::INFINITY,
                child_maximizing,
            )
        }))
        .await;

        let mut iter = results.into_iter();
        let (mut best_value, used0) = iter.next().expect("successors is non-empty")?;
        *used += used0;
        for result in iter {
            let (value, child_used) = result?;
            *used += child_used;
            if maximizing {
                if value > best_value {
                    best_value = value;
                }
            } else if value < best_value {
                best_value = value;
            }
        }
        Ok(best_value)
    }

    #[allow(clippy::too_many_arguments)]
    async fn expand_serial(
        &self,
        depth: u32,
        successors: &[Successor],
        remaining: f64,
        mut alpha: f64,
        mut beta: f64,
        maximizing: bool,
        child_maximizing: bool,
        used: &mut f64,
    ) -> Result<f64, SearchError> {
        let mut best_value = if maximizing {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };

        for succ in successors {
            let child_budget = remaining * succ.probability;
            let (value, child_used) = self
                .minimax(depth + 1, &succ.next_state, child_budget, alpha, beta, child_maximizing)
                .await?;
            *used += child_used;

            if maximizing {
                if value > best_value {
                    best_value = value;
                }
                if best_value > alpha {
                    alpha = best_value;
                }
            } else {
                if value < best_value {
                    best_value = value;
                }
                if best_value < beta {
                    beta = best_value;
                }
            }
            if beta <= alpha {
                break;
            }
        }
        Ok(best_value)
    }

    async fn fetch_successors(
        &self,
        state: &GameState,
        hash: &StateHash,
    ) -> Result<Arc<Vec<Successor>>, SearchError> {
        self.successors_cache
            .get_or_compute(hash.clone(), || async {
                let successors = self.evaluator.successors(state).await?;
                Ok(Arc::new(successors))
            })
            .await
            .map_err(|e| (*e).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{legal_moves, GameState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A deterministic evaluator used to exercise the core's budget
    /// and caching behaviour without any oracle at all.
    struct StubEvaluator {
        eval_calls: AtomicUsize,
        successor_calls: AtomicUsize,
        eval_value: f64,
        successor_count: usize,
    }

    impl StubEvaluator {
        fn new(eval_value: f64, successor_count: usize) -> Self {
            StubEvaluator {
                eval_calls: AtomicUsize::new(0),
                successor_calls: AtomicUsize::new(0),
                eval_value,
                successor_count,
            }
        }
    }

    #[async_trait]
    impl Evaluator for StubEvaluator {
        async fn evaluate(&self, _state: &GameState) -> Result<f64, SearchError> {
            self.eval_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.eval_value)
        }

        async fn successors(&self, state: &GameState) -> Result<Vec<Successor>, SearchError> {
            self.successor_calls.fetch_add(1, Ordering::SeqCst);
            let legal = legal_moves(state, state.side_to_move);
            let n = self.successor_count.min(legal.len()).max(1);
            let probability = 1.0 / n as f64;
            Ok(legal
                .into_iter()
                .take(n)
                .map(|mv| {
                    let next_state = crate::rules::apply(state, &mv);
                    Successor {
                        next_state,
                        mv,
                        probability,
                    }
                })
                .collect())
        }

        fn estimated_successor_count(&self) -> usize {
            8
        }
    }

    #[tokio::test]
    async fn probability_normalization_holds_for_stub_successors() {
        let evaluator = Arc::new(StubEvaluator::new(0.6, 4));
        let state = GameState::initial();
        let successors = evaluator.successors(&state).await.unwrap();
        let total: f64 = successors.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn choose_move_picks_mate_in_one_without_consulting_evaluator() {
        let evaluator = Arc::new(StubEvaluator::new(0.5, 8));
        let core = MinimaxCore::new(
            evaluator.clone(),
            CostSetup::llm_default(),
            ExpansionMode::Parallel,
        );

        let mut state = GameState::initial();
        for row in state.board.iter_mut() {
            for cell in row.iter_mut() {
                *cell = None;
            }
        }
        // white king e1, white rooks a1 and b7, black king h8 cornered:
        // Rb7 seals off the seventh rank, Ra1-a8 delivers a ladder mate.
        use crate::rules::{Color as C, Piece, PieceKind, Square};
        state.set_piece_at(Square::new(0, 4), Some(Piece::new(PieceKind::King, C::White)));
        state.set_piece_at(Square::new(0, 0), Some(Piece::new(PieceKind::Rook, C::White)));
        state.set_piece_at(Square::new(6, 1), Some(Piece::new(PieceKind::Rook, C::White)));
        state.set_piece_at(Square::new(7, 7), Some(Piece::new(PieceKind::King, C::Black)));
        state.side_to_move = C::White;

        let mv = core.choose_move(&state).await.unwrap();
        let next = crate::rules::apply(&state, &mv);
        assert_eq!(
            crate::rules::endgame(&next),
            crate::rules::Endgame::Checkmate(C::Black)
        );
    }

    #[tokio::test]
    async fn re_requesting_with_lower_budget_reuses_cached_value_without_new_evaluator_calls() {
        let evaluator = Arc::new(StubEvaluator::new(0.5, 8));
        let mut cost = CostSetup::llm_default();
        cost.max_depth = 1;
        let core = MinimaxCore::new(evaluator.clone(), cost, ExpansionMode::Parallel);

        let state = GameState::initial();
        let first = core
            .minimax(1, &state, 500.0, f64::NEG_INFINITY, f64::INFINITY, true)
            .await
            .unwrap();
        let calls_after_first = evaluator.eval_calls.load(Ordering::SeqCst);

        let second = core
            .minimax(1, &state, 10.0, f64::NEG_INFINITY, f64::INFINITY, true)
            .await
            .unwrap();

        assert_eq!(first.0, second.0);
        assert_eq!(second.1, 0.0, "cached hit must report zero used budget");
        assert_eq!(evaluator.eval_calls.load(Ordering::SeqCst), calls_after_first);
    }
}
