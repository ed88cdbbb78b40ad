use crate::error::{FilterError, Result};
use crate::evaluator::{self, EvalRequest};
use std::collections::BTreeMap;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::sync::oneshot;

/// Resource bounds for one compiled filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLimits {
    /// Maximum iterations of any single loop.
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
    /// Wall-clock budget for compilation and for each evaluation.
    pub timeout: Duration,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: 1_000_000,
            recursion_limit: 256,
            timeout: Duration::from_secs(2),
        }
    }
}

/// The arguments passed to the script, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterInput {
    pub key: Option<String>,
    pub content: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub offset: i64,
    pub partition: i32,
}

/// A predicate over consumed records.
#[derive(Debug, Clone)]
pub enum MessageFilter {
    /// No script was given: every record passes.
    AcceptAll,
    Script(CompiledFilter),
}

impl MessageFilter {
    /// Compiles `source`. A missing or blank source accepts everything.
    pub async fn compile(source: Option<&str>, limits: FilterLimits) -> Result<Self> {
        match source.map(str::trim) {
            None | Some("") => Ok(MessageFilter::AcceptAll),
            Some(_) => {
                let script = source.unwrap_or_default().to_string();
                CompiledFilter::compile(script, limits)
                    .await
                    .map(MessageFilter::Script)
            }
        }
    }

    pub async fn evaluate(&self, input: FilterInput) -> Result<bool> {
        match self {
            MessageFilter::AcceptAll => Ok(true),
            MessageFilter::Script(compiled) => compiled.evaluate(input).await,
        }
    }

    pub fn is_accept_all(&self) -> bool {
        matches!(self, MessageFilter::AcceptAll)
    }
}

/// A script loaded into its own evaluator thread.
///
/// Clones share the thread; evaluations are served one at a time. The thread
/// exits once the last clone is dropped.
#[derive(Clone)]
pub struct CompiledFilter {
    script: Arc<str>,
    requests: mpsc::Sender<EvalRequest>,
    timeout: Duration,
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("script", &self.script)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CompiledFilter {
    pub async fn compile(script: String, limits: FilterLimits) -> Result<Self> {
        let compile_error = |reason: String| FilterError::Compile {
            script: script.clone(),
            reason,
        };

        let (requests, receiver) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let timeout = limits.timeout;

        let thread_script = script.clone();
        std::thread::Builder::new()
            .name("message-filter".to_string())
            .spawn(move || evaluator::run(thread_script, limits, ready_tx, receiver))
            .map_err(|e| compile_error(format!("failed to start evaluator thread: {e}")))?;

        match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(reason))) => return Err(compile_error(reason)),
            Ok(Err(_)) => return Err(compile_error("evaluator thread exited".to_string())),
            Err(_) => {
                return Err(compile_error(format!(
                    "compilation did not finish within {timeout:?}"
                )))
            }
        }

        tracing::debug!("Compiled message filter");
        Ok(Self {
            script: Arc::from(script),
            requests,
            timeout,
        })
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub async fn evaluate(&self, input: FilterInput) -> Result<bool> {
        let eval_error = |reason: String| FilterError::Eval {
            script: self.script.to_string(),
            reason,
        };

        let (reply, response) = oneshot::channel();
        self.requests
            .send(EvalRequest { input, reply })
            .map_err(|_| eval_error("evaluator thread is gone".to_string()))?;

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(result)) => result.map_err(eval_error),
            Ok(Err(_)) => Err(eval_error("evaluator thread dropped the request".to_string())),
            Err(_) => Err(eval_error(format!(
                "evaluation did not finish within {:?}",
                self.timeout
            ))),
        }
    }
}
