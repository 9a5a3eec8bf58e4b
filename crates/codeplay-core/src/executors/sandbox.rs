//! Local JavaScript evaluation with captured console output.
//!
//! Every evaluation gets a brand new engine context with its own `console`
//! object, and the context is dropped when the evaluation returns. Nothing the
//! evaluated code does to `console` (or to any other global) survives into
//! the next evaluation, and the host process never sees the calls.
//!
//! The evaluator does not implement capability sandboxing beyond that: the
//! engine simply exposes no I/O, and runaway code is bounded by loop and
//! recursion limits. Evaluation is synchronous; async callers should run it
//! on the blocking pool.

use boa_engine::{js_string, Context, JsError, JsObject, JsString, Source};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ExecutionOutput;
use crate::config::SandboxConfig;
use crate::errors::PlaygroundError;

/// Placeholder for an evaluation that printed nothing and did not throw.
pub const NO_OUTPUT_SUCCESS: &str = "Code executed successfully (no output)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleChannel {
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleChannel {
    pub const ALL: [ConsoleChannel; 4] = [
        ConsoleChannel::Log,
        ConsoleChannel::Info,
        ConsoleChannel::Warn,
        ConsoleChannel::Error,
    ];

    pub fn from_name(name: &str) -> Option<ConsoleChannel> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConsoleChannel::Log => "log",
            ConsoleChannel::Info => "info",
            ConsoleChannel::Warn => "warn",
            ConsoleChannel::Error => "error",
        }
    }

    /// Tag written in front of every captured line.
    pub fn prefix(&self) -> &'static str {
        match self {
            ConsoleChannel::Log => "[log] ",
            ConsoleChannel::Info => "[info] ",
            ConsoleChannel::Warn => "[warn] ",
            ConsoleChannel::Error => "[error] ",
        }
    }

    /// `{"log": "[log] ", ...}` for embedding in generated scripts.
    pub fn prefix_table_json() -> String {
        let map: serde_json::Map<String, Value> = Self::ALL
            .iter()
            .map(|c| (c.name().to_string(), Value::String(c.prefix().to_string())))
            .collect();
        Value::Object(map).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleLine {
    pub channel: ConsoleChannel,
    pub text: String,
}

impl ConsoleLine {
    pub fn render(&self) -> String {
        format!("{}{}", self.channel.prefix(), self.text)
    }
}

// The user source arrives as a JSON string literal and is run through an
// indirect eval, so it executes in global scope while the capture object
// stays private to the wrapper closure. Console calls append to two parallel
// arrays that are read back once pending promise jobs have run.
const HARNESS: &str = r#"
(function (source, stringify) {
    var capture = { channels: [], texts: [], error: null };
    function format(args) {
        var parts = [];
        for (var i = 0; i < args.length; i++) {
            var value = args[i];
            if (typeof value === 'string') {
                parts.push(value);
            } else if (value !== null && typeof value === 'object') {
                try { parts.push(stringify(value)); } catch (e) { parts.push(String(value)); }
            } else {
                parts.push(String(value));
            }
        }
        return parts.join(' ');
    }
    function channel(name) {
        return function () {
            capture.channels.push(name);
            capture.texts.push(format(arguments));
        };
    }
    globalThis.console = {
        log: channel('log'),
        info: channel('info'),
        warn: channel('warn'),
        error: channel('error'),
        debug: channel('log')
    };
    try {
        (0, eval)(source);
    } catch (e) {
        capture.error = (e !== null && typeof e === 'object' && e.message !== undefined)
            ? String(e.message)
            : String(e);
    }
    return capture;
})(__SOURCE__, JSON.stringify);
"#;

fn engine_error(err: JsError) -> PlaygroundError {
    PlaygroundError::EvaluationError(err.to_string())
}

fn corrupt_capture(what: &str) -> PlaygroundError {
    PlaygroundError::EvaluationError(format!("corrupt console capture: {}", what))
}

/// Strings of the array stored under `key`. Lone surrogates are replaced,
/// not rejected.
fn read_strings(
    capture: &JsObject,
    key: JsString,
    context: &mut Context,
) -> Result<Vec<String>, PlaygroundError> {
    let array = capture
        .get(key, context)
        .map_err(engine_error)?
        .as_object()
        .cloned()
        .ok_or_else(|| corrupt_capture("expected an array"))?;
    let len = array
        .get(js_string!("length"), context)
        .and_then(|len| len.to_length(context))
        .map_err(engine_error)?;

    let mut strings = Vec::new();
    for index in 0..len {
        let index = u32::try_from(index).map_err(|_| corrupt_capture("too many lines"))?;
        let item = array.get(index, context).map_err(engine_error)?;
        strings.push(
            item.as_string()
                .map(|s| s.to_std_string_lossy())
                .unwrap_or_default(),
        );
    }
    Ok(strings)
}

#[derive(Debug, Clone, Default)]
pub struct SandboxedEvaluator {
    config: SandboxConfig,
}

impl SandboxedEvaluator {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Run `source` and return its console output. Never fails: a thrown
    /// error becomes `Error: <message>` with `is_error` set.
    pub fn evaluate(&self, source: &str) -> ExecutionOutput {
        match self.capture(source) {
            Ok(lines) if lines.is_empty() => ExecutionOutput::success(NO_OUTPUT_SUCCESS),
            Ok(lines) => ExecutionOutput::success(
                lines
                    .iter()
                    .map(ConsoleLine::render)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(err) => {
                log::debug!("Sandboxed evaluation failed: {}", err);
                ExecutionOutput::failure(&err)
            }
        }
    }

    /// Captured console lines in call order, or the error the code threw.
    pub fn capture(&self, source: &str) -> Result<Vec<ConsoleLine>, PlaygroundError> {
        if source.len() > self.config.max_source_bytes {
            return Err(PlaygroundError::EvaluationError(format!(
                "source is {} bytes, limit is {}",
                source.len(),
                self.config.max_source_bytes
            )));
        }

        let literal = serde_json::to_string(source)
            .map_err(|e| PlaygroundError::EvaluationError(e.to_string()))?;
        let script = HARNESS.replacen("__SOURCE__", &literal, 1);

        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(self.config.loop_iteration_limit);
        context
            .runtime_limits_mut()
            .set_recursion_limit(self.config.recursion_limit);

        let capture = context
            .eval(Source::from_bytes(script.as_bytes()))
            .map_err(engine_error)?
            .as_object()
            .cloned()
            .ok_or_else(|| corrupt_capture("evaluation did not return the capture"))?;

        // Promise reactions and code after an `await` only run here.
        context.run_jobs();

        let error = capture
            .get(js_string!("error"), &mut context)
            .map_err(engine_error)?;
        if let Some(message) = error.as_string() {
            return Err(PlaygroundError::EvaluationError(
                message.to_std_string_lossy(),
            ));
        }

        let channels = read_strings(&capture, js_string!("channels"), &mut context)?;
        let texts = read_strings(&capture, js_string!("texts"), &mut context)?;

        channels
            .iter()
            .zip(texts)
            .map(|(name, text)| {
                let channel = ConsoleChannel::from_name(name)
                    .ok_or_else(|| corrupt_capture("unknown channel"))?;
                Ok(ConsoleLine { channel, text })
            })
            .collect()
    }
}
