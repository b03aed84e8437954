use std::sync::Arc;

use crate::oracle::OracleError;

/// Errors raised by the LLM minimax agent's oracle-backed tasks.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("oracle exhausted after {tries} attempts: {source}")]
    OracleExhausted { tries: u32, source: Arc<OracleError> },
    #[error("evaluate response had neither log-probabilities nor a literal white/black answer")]
    NoLogprobs,
    #[error("successor proposal yielded no usable legal moves after {tries} attempts")]
    NoSuccessors { tries: u32 },
}
