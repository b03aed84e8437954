use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatMessage, ChatOptions, Choice, Oracle, OracleError, TokenTable};

type Responder = dyn Fn(&[ChatMessage], &ChatOptions) -> Result<Vec<Choice>, OracleError> + Send + Sync;

/// A deterministic, in-memory oracle used by the test suite: counts
/// invocations and can be configured to delay before answering. Not
/// used in production.
pub struct StubOracle {
    calls: AtomicUsize,
    responder: Arc<Responder>,
    delay: Option<Duration>,
    tokens: TokenTable,
}

impl StubOracle {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&[ChatMessage], &ChatOptions) -> Result<Vec<Choice>, OracleError> + Send + Sync + 'static,
    {
        StubOracle {
            calls: AtomicUsize::new(0),
            responder: Arc::new(responder),
            delay: None,
            tokens: TokenTable::gpt3_5(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for StubOracle {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<Vec<Choice>, OracleError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.responder)(messages, options)
    }

    fn token_table(&self) -> &TokenTable {
        &self.tokens
    }
}
