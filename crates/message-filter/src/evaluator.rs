//! The evaluator thread that owns the JavaScript context.
//!
//! `boa_engine::Context` is `!Send`, so each compiled filter gets a dedicated
//! OS thread. Requests arrive over a std channel and replies go back over
//! tokio oneshots.
//!
//! Every evaluation loads the script into a fresh realm, so globals, script
//! bindings and closures start over for each record. Scripts run under a VM
//! budget: between slices the thread checks the deadline and whether the
//! caller is still waiting, and abandons the run when either says stop.

use crate::filter::{FilterInput, FilterLimits};
use boa_engine::property::Attribute;
use boa_engine::{Context, JsString, JsValue, Script, Source};
use futures::task::noop_waker_ref;
use std::future::Future;
use std::pin::pin;
use std::sync::mpsc;
use std::task::Poll;
use std::time::Instant;
use tokio::sync::oneshot;

/// VM cost units executed between stop checks.
const BUDGET: u32 = 4096;

/// Global that holds the filter when the script evaluates to a function.
const ENTRY_POINT: &str = "__messageFilter";

pub(crate) struct EvalRequest {
    pub input: FilterInput,
    pub reply: oneshot::Sender<Result<bool, String>>,
}

enum Failure {
    Script(String),
    Interrupted,
}

impl From<Failure> for String {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Script(reason) => reason,
            Failure::Interrupted => "evaluation was interrupted".to_string(),
        }
    }
}

/// Thread body: checks the script, reports readiness, then serves requests
/// until every sender is dropped.
pub(crate) fn run(
    script: String,
    limits: FilterLimits,
    ready: oneshot::Sender<Result<(), String>>,
    requests: mpsc::Receiver<EvalRequest>,
) {
    let mut context = new_context(&limits);

    let deadline = Instant::now() + limits.timeout;
    let loaded = load(&mut context, &script, &|| {
        Instant::now() >= deadline || ready.is_closed()
    });
    if let Err(failure) = loaded {
        let _ = ready.send(Err(failure.into()));
        return;
    }
    let _ = ready.send(Ok(()));

    while let Ok(EvalRequest { input, reply }) = requests.recv() {
        let deadline = Instant::now() + limits.timeout;
        let result = evaluate(&mut context, &script, &input, &|| {
            Instant::now() >= deadline || reply.is_closed()
        });

        // An abandoned run leaves frames on the VM stack.
        if matches!(result, Err(Failure::Interrupted)) {
            tracing::debug!("Message filter evaluation interrupted");
            context = new_context(&limits);
        }
        // The caller may have timed out and gone away.
        let _ = reply.send(result.map_err(String::from));
    }

    tracing::trace!("Message filter evaluator stopped");
}

fn new_context(limits: &FilterLimits) -> Context {
    let mut context = Context::default();
    let runtime_limits = context.runtime_limits_mut();
    runtime_limits.set_loop_iteration_limit(limits.loop_iteration_limit);
    runtime_limits.set_recursion_limit(limits.recursion_limit);
    context
}

fn evaluate(
    context: &mut Context,
    script: &str,
    input: &FilterInput,
    stop: &dyn Fn() -> bool,
) -> Result<bool, Failure> {
    let entry = load(context, script, stop)?;
    let result = run_script(context, &call_source(entry, input), stop)?;
    result.as_boolean().ok_or_else(|| {
        Failure::Script(format!(
            "filter returned {} instead of a boolean",
            result.display()
        ))
    })
}

/// Runs the script in a fresh realm and returns the name the filter is
/// reachable under.
fn load(
    context: &mut Context,
    script: &str,
    stop: &dyn Fn() -> bool,
) -> Result<&'static str, Failure> {
    let realm = context.create_realm().map_err(script_error)?;
    context.enter_realm(realm);

    let completion = run_script(context, script, stop)?;
    if let Some(function) = completion.as_callable() {
        context
            .register_global_property(
                JsString::from(ENTRY_POINT),
                function.clone(),
                Attribute::empty(),
            )
            .map_err(script_error)?;
        return Ok(ENTRY_POINT);
    }

    // `filter` may be a function declaration or a script-scope binding.
    let kind = context
        .eval(Source::from_bytes(b"typeof filter"))
        .map_err(script_error)?;
    match kind.as_string() {
        Some(kind) if kind.to_std_string_escaped() == "function" => Ok("filter"),
        _ => Err(Failure::Script(
            "script must define a function named 'filter'".to_string(),
        )),
    }
}

/// Evaluates `source`, polling between budget slices until it completes or
/// `stop` returns true.
fn run_script(
    context: &mut Context,
    source: &str,
    stop: &dyn Fn() -> bool,
) -> Result<JsValue, Failure> {
    let script =
        Script::parse(Source::from_bytes(source.as_bytes()), None, context).map_err(script_error)?;

    let mut evaluation = pin!(script.evaluate_async_with_budget(context, BUDGET));
    let mut cx = std::task::Context::from_waker(noop_waker_ref());
    loop {
        if let Poll::Ready(result) = evaluation.as_mut().poll(&mut cx) {
            return result.map_err(script_error);
        }
        if stop() {
            return Err(Failure::Interrupted);
        }
    }
}

/// The call expression, with arguments written as JSON literals.
fn call_source(entry: &str, input: &FilterInput) -> String {
    let literal = |value: &Option<String>| {
        serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
    };
    let headers = serde_json::to_string(&input.headers).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{entry}({}, {}, {headers}, {}, {});",
        literal(&input.key),
        literal(&input.content),
        input.offset,
        input.partition,
    )
}

fn script_error(error: impl std::fmt::Display) -> Failure {
    Failure::Script(error.to_string())
}
