//! A budgeted, parallel, cache-coordinated minimax chess engine whose
//! leaf evaluations and successor proposals are produced by an LLM
//! oracle.
//!
//! The crate is organized exactly along the five cooperating
//! components the design splits the problem into:
//!
//! - [`rules`] — C1, the legal-move/terminal-detection/hashing engine.
//! - [`oracle`] — C2, the LLM abstraction (`chat`, logit bias, logprobs).
//! - [`prompt`] — C3, pure rendering of a game state into prompts.
//! - [`agent`] — C4, the three oracle-backed tasks built on C2/C3.
//! - [`search`] — C5, the budgeted minimax core that drives C4.
//!
//! [`registry`] binds descriptors (`human`, `random`,
//! `minimax(gpt-3.5)`, `minimax(gpt-4)`) to constructed agents via
//! `call_agent`. [`cache`] holds the single-flight, shared-future
//! caches C4 and C5 both use. [`config`] and
//! [`logging`] are the ambient stack: environment-variable
//! configuration and the two JSON-lines log streams.

pub mod agent;
pub mod cache;
pub mod config;
pub mod logging;
pub mod model;
pub mod oracle;
pub mod prompt;
pub mod registry;
pub mod rules;
pub mod search;

pub use model::Successor;
pub use registry::{AgentRegistry, CallAgentError, Descriptor, Model};
pub use search::{CostSetup, ExpansionMode, SearchError};
