//! The execution dispatcher: decides whether, when and how edited code runs.
//!
//! Edits are debounced through a single pending-task slot; scheduling a new
//! run aborts whatever was waiting in that slot. Every scheduled run gets a
//! strictly increasing sequence id, and a finished run only touches the
//! published state if its id is still the newest one issued. Runs that were
//! already dispatched are never aborted; their results are simply dropped on
//! arrival when something newer exists.
//!
//! The dispatcher is the only writer of [`DispatcherState`]. The view layer
//! reads it through [`Dispatcher::subscribe`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::PlaygroundConfig;
use crate::errors::PlaygroundError;
use crate::executors::{CodeExecutor, ExecutionOutput, SandboxedEvaluator};
use crate::language::{Language, LanguageClass, LanguageTable};
use crate::preview::{PreviewBuilder, PreviewDocument};

/// Immutable snapshot of one run the dispatcher decided to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub language: Language,
    pub source: String,
    pub sequence_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub sequence_id: u64,
    pub output_text: String,
    pub is_error: bool,
    pub completed_at: DateTime<Utc>,
}

/// What the view layer renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatcherState {
    pub language: Option<Language>,
    pub output_text: String,
    pub is_error: bool,
    pub is_loading: bool,
    pub preview: Option<PreviewDocument>,
    /// Sequence id of the newest result applied so far.
    pub last_applied: Option<u64>,
    pub completed_at: Option<DateTime<Utc>>,
}

struct Update {
    output: Option<ExecutionOutput>,
    preview: Option<PreviewDocument>,
}

struct Shared {
    debounce: Duration,
    languages: LanguageTable,
    remote: Arc<dyn CodeExecutor>,
    evaluator: SandboxedEvaluator,
    issued: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
    latest: Mutex<Option<(Language, String)>>,
    state: watch::Sender<DispatcherState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new(config: &PlaygroundConfig, remote: Arc<dyn CodeExecutor>) -> Self {
        Self::with_parts(
            Duration::from_millis(config.dispatcher.debounce_ms),
            config.language_table(),
            remote,
            SandboxedEvaluator::new(config.sandbox.clone()),
        )
    }

    pub fn with_parts(
        debounce: Duration,
        languages: LanguageTable,
        remote: Arc<dyn CodeExecutor>,
        evaluator: SandboxedEvaluator,
    ) -> Self {
        let (state, _) = watch::channel(DispatcherState::default());
        Self {
            shared: Arc::new(Shared {
                debounce,
                languages,
                remote,
                evaluator,
                issued: AtomicU64::new(0),
                pending: Mutex::new(None),
                latest: Mutex::new(None),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DispatcherState> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> DispatcherState {
        self.shared.state.borrow().clone()
    }

    /// Called on every edit. Schedules a run after the quiet period and
    /// supersedes everything scheduled or dispatched before it. Must be
    /// called from within a Tokio runtime.
    pub fn on_source_changed(&self, language: Language, source: impl Into<String>) -> u64 {
        let request = self.shared.supersede(language, source.into());
        let sequence_id = request.sequence_id;

        if request.source.trim().is_empty() {
            log::debug!("Empty source for {}, nothing to run (#{})", language, sequence_id);
            self.shared.cancel_pending();
            self.shared.settle_idle();
            return sequence_id;
        }

        let shared = self.shared.clone();
        self.shared.replace_pending(async move {
            tokio::time::sleep(shared.debounce).await;
            // Detached so that a later edit aborting the debounce slot cannot
            // cancel a run that is already under way.
            tokio::spawn(async move { shared.execute(request).await });
        });

        sequence_id
    }

    /// Explicit re-run of the latest source, without waiting for the quiet
    /// period. Returns `None` when nothing has been edited yet.
    pub fn rerun(&self) -> Option<u64> {
        let (language, source) = lock(&self.shared.latest).clone()?;
        let request = self.shared.supersede(language, source);
        let sequence_id = request.sequence_id;

        if request.source.trim().is_empty() {
            self.shared.cancel_pending();
            self.shared.settle_idle();
            return Some(sequence_id);
        }

        let shared = self.shared.clone();
        self.shared.replace_pending(async move {
            tokio::spawn(async move { shared.execute(request).await });
        });
        Some(sequence_id)
    }

    /// Run `source` now and wait for it, bypassing the debounce.
    pub async fn run_immediately(
        &self,
        language: Language,
        source: impl Into<String>,
    ) -> DispatcherState {
        let request = self.shared.supersede(language, source.into());
        self.shared.cancel_pending();

        if request.source.trim().is_empty() {
            self.shared.settle_idle();
        } else {
            self.shared.execute(request).await;
        }
        self.snapshot()
    }

    pub fn clear_output(&self) {
        self.shared.state.send_modify(|state| {
            state.output_text.clear();
            state.is_error = false;
        });
    }

    /// Drop any run still waiting out its quiet period.
    pub fn cancel_pending(&self) {
        self.shared.cancel_pending();
    }
}

impl Shared {
    /// Record the new source and issue the next sequence id.
    fn supersede(&self, language: Language, source: String) -> ExecutionRequest {
        *lock(&self.latest) = Some((language, source.clone()));
        let sequence_id = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        ExecutionRequest {
            language,
            source,
            sequence_id,
        }
    }

    fn is_current(&self, sequence_id: u64) -> bool {
        self.issued.load(Ordering::SeqCst) == sequence_id
    }

    fn cancel_pending(&self) {
        if let Some(handle) = lock(&self.pending).take() {
            if !handle.is_finished() {
                log::debug!("Cancelling pending run");
            }
            handle.abort();
        }
    }

    fn replace_pending<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime.spawn(task),
            Err(e) => {
                log::error!("Cannot schedule run outside of a Tokio runtime: {}", e);
                return;
            }
        };

        let mut pending = lock(&self.pending);
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Nothing newer is going to run, so nothing is loading.
    fn settle_idle(&self) {
        self.state.send_if_modified(|state| {
            let was_loading = state.is_loading;
            state.is_loading = false;
            was_loading
        });
    }

    async fn execute(&self, request: ExecutionRequest) {
        let ExecutionRequest {
            language,
            source,
            sequence_id,
        } = request;

        if !self.is_current(sequence_id) {
            log::debug!("Run #{} superseded before dispatch", sequence_id);
            return;
        }

        let class = match self.languages.class_of(language) {
            Ok(class) => class,
            Err(err) => {
                self.apply_failure(sequence_id, language, err);
                return;
            }
        };

        match class {
            LanguageClass::Markup => match PreviewBuilder::build(language, &source) {
                Ok(document) => {
                    self.apply(
                        sequence_id,
                        language,
                        Update {
                            output: None,
                            preview: Some(document),
                        },
                    );
                }
                Err(err) => self.apply_failure(sequence_id, language, err),
            },
            LanguageClass::ScriptLocal => {
                let evaluator = self.evaluator.clone();
                let script = source.clone();
                let output = match tokio::task::spawn_blocking(move || evaluator.evaluate(&script))
                    .await
                {
                    Ok(output) => output,
                    Err(e) => ExecutionOutput::failure(&PlaygroundError::EvaluationError(format!(
                        "Evaluation task failed: {}",
                        e
                    ))),
                };
                let preview = language
                    .preview_kind()
                    .and_then(|_| PreviewBuilder::build(language, &source).ok());
                self.apply(
                    sequence_id,
                    language,
                    Update {
                        output: Some(output),
                        preview,
                    },
                );
            }
            LanguageClass::CompiledRemote => {
                let version = match self.languages.version_for(language) {
                    Ok(version) => version.to_string(),
                    Err(err) => {
                        self.apply_failure(sequence_id, language, err);
                        return;
                    }
                };

                if !self.begin_loading(sequence_id) {
                    return;
                }

                log::debug!("Dispatching run #{} ({} {})", sequence_id, language, version);
                let output = match self.remote.execute_code(language, &version, &source).await {
                    Ok(output) => output,
                    Err(err) => {
                        log::debug!("Run #{} failed: {}", sequence_id, err);
                        ExecutionOutput::failure(&err)
                    }
                };

                self.apply(
                    sequence_id,
                    language,
                    Update {
                        output: Some(output),
                        preview: None,
                    },
                );
            }
        }
    }

    fn begin_loading(&self, sequence_id: u64) -> bool {
        let mut current = false;
        self.state.send_if_modified(|state| {
            current = self.is_current(sequence_id);
            if current && !state.is_loading {
                state.is_loading = true;
                return true;
            }
            false
        });
        current
    }

    fn apply_failure(&self, sequence_id: u64, language: Language, err: PlaygroundError) {
        if err.is_configuration() {
            log::error!("Language configuration defect: {}", err);
        }
        self.apply(
            sequence_id,
            language,
            Update {
                output: Some(ExecutionOutput::failure(&err)),
                preview: None,
            },
        );
    }

    /// Publish `update` if `sequence_id` is still the newest run issued.
    fn apply(&self, sequence_id: u64, language: Language, update: Update) -> bool {
        let applied = self.state.send_if_modified(|state| {
            let newer_applied = state.last_applied.is_some_and(|last| last >= sequence_id);
            if !self.is_current(sequence_id) || newer_applied {
                return false;
            }

            let result = update.output.map(|output| ExecutionResult {
                sequence_id,
                output_text: output.output_text,
                is_error: output.is_error,
                completed_at: Utc::now(),
            });
            if let Some(result) = result {
                state.output_text = result.output_text;
                state.is_error = result.is_error;
                state.completed_at = Some(result.completed_at);
            }
            state.preview = update.preview;
            state.language = Some(language);
            state.is_loading = false;
            state.last_applied = Some(sequence_id);
            true
        });

        if !applied {
            log::debug!("Dropping stale result for run #{}", sequence_id);
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::sandbox::NO_OUTPUT_SUCCESS;
    use crate::executors::RemoteExecutionClient;
    use crate::test_utils::mock_execution_server::{MockExecutionServer, MockReply};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Remote executor double. Echoes its input after a per-source delay;
    /// sources starting with `fail` are unreachable, `crash` fails remotely.
    #[derive(Default)]
    struct ScriptedExecutor {
        delays: HashMap<String, Duration>,
        calls: Mutex<Vec<(Language, String, String)>>,
    }

    impl ScriptedExecutor {
        fn with_delays(delays: &[(&str, u64)]) -> Self {
            Self {
                delays: delays
                    .iter()
                    .map(|(src, ms)| (src.to_string(), Duration::from_millis(*ms)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn sources(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, _, s)| s.clone()).collect()
        }
    }

    #[async_trait]
    impl CodeExecutor for ScriptedExecutor {
        async fn execute_code(
            &self,
            language: Language,
            version: &str,
            code: &str,
        ) -> Result<ExecutionOutput, PlaygroundError> {
            self.calls
                .lock()
                .unwrap()
                .push((language, version.to_string(), code.to_string()));
            if let Some(delay) = self.delays.get(code) {
                tokio::time::sleep(*delay).await;
            }
            if code.starts_with("fail") {
                return Err(PlaygroundError::NetworkError("connection refused".to_string()));
            }
            if code.starts_with("crash") {
                return Err(PlaygroundError::ServiceError {
                    output: "Traceback: crash".to_string(),
                });
            }
            Ok(ExecutionOutput::success(format!("ran: {}", code)))
        }
    }

    fn dispatcher_with(executor: Arc<ScriptedExecutor>) -> Dispatcher {
        Dispatcher::with_parts(
            Duration::from_millis(1000),
            LanguageTable::default(),
            executor,
            SandboxedEvaluator::default(),
        )
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_runs_once() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        for i in 0..5 {
            dispatcher.on_source_changed(Language::Python, format!("print({})", i));
            advance(200).await;
        }
        advance(2000).await;

        assert_eq!(executor.sources(), vec!["print(4)".to_string()]);
        let state = dispatcher.snapshot();
        assert_eq!(state.output_text, "ran: print(4)");
        assert!(!state.is_loading);
        assert_eq!(state.last_applied, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_runs_before_quiet_period() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Python, "print(1)");
        advance(900).await;
        assert!(executor.sources().is_empty());

        advance(200).await;
        assert_eq!(executor.sources().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_quiet_period_runs_once() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Python, "a");
        dispatcher.on_source_changed(Language::Python, "ab");
        advance(1500).await;
        dispatcher.on_source_changed(Language::Python, "abc");
        advance(1500).await;

        assert_eq!(executor.sources(), vec!["ab".to_string(), "abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_stale_result_is_dropped() {
        let executor = Arc::new(ScriptedExecutor::with_delays(&[("slow", 5000), ("fast", 100)]));
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Python, "slow");
        advance(1100).await;
        assert!(dispatcher.snapshot().is_loading);

        let newer = dispatcher.on_source_changed(Language::Python, "fast");
        advance(1200).await;
        assert_eq!(dispatcher.snapshot().output_text, "ran: fast");

        // The slow run finishes long after and must not overwrite anything.
        advance(5000).await;
        let state = dispatcher.snapshot();
        assert_eq!(executor.sources(), vec!["slow".to_string(), "fast".to_string()]);
        assert_eq!(state.output_text, "ran: fast");
        assert_eq!(state.last_applied, Some(newer));
        assert!(!state.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_completion_keeps_newer_loading_flag() {
        let executor =
            Arc::new(ScriptedExecutor::with_delays(&[("first", 2000), ("second", 3000)]));
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Python, "first");
        advance(1500).await;
        dispatcher.on_source_changed(Language::Python, "second");

        // "first" completes at 3000ms, "second" is in flight until 5500ms.
        advance(2000).await;
        let state = dispatcher.snapshot();
        assert!(state.is_loading);
        assert_eq!(state.output_text, "");

        advance(2500).await;
        let state = dispatcher.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.output_text, "ran: second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_source_leaves_output_unchanged() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Python, "print('kept')");
        advance(1500).await;
        dispatcher.on_source_changed(Language::Python, "   \n\t");
        advance(1500).await;

        assert_eq!(executor.sources().len(), 1);
        let state = dispatcher.snapshot();
        assert_eq!(state.output_text, "ran: print('kept')");
        assert!(!state.is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whitespace_edit_supersedes_in_flight_run() {
        let executor = Arc::new(ScriptedExecutor::with_delays(&[("slow", 3000)]));
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Python, "slow");
        advance(1500).await;
        assert!(dispatcher.snapshot().is_loading);

        dispatcher.on_source_changed(Language::Python, "");
        assert!(!dispatcher.snapshot().is_loading);

        advance(5000).await;
        assert_eq!(dispatcher.snapshot().output_text, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_markup_builds_preview_without_loading_or_output() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());
        let mut updates = dispatcher.subscribe();

        dispatcher.on_source_changed(Language::Css, ".x{color:red}");
        advance(1500).await;

        assert!(executor.sources().is_empty());
        assert!(updates.has_changed().unwrap());
        let state = updates.borrow_and_update().clone();
        assert!(!state.is_loading);
        assert_eq!(state.output_text, "");
        let preview = state.preview.expect("preview document");
        assert_eq!(preview.language, Language::Css);
        assert!(preview.html.contains(".x{color:red}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_language_evaluates_locally() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::JavaScript, "console.log('hi')");
        advance(1500).await;

        assert!(executor.sources().is_empty());
        let state = dispatcher.snapshot();
        assert_eq!(state.output_text, "[log] hi");
        assert!(!state.is_error);
        assert!(state.preview.is_some());

        dispatcher.on_source_changed(Language::JavaScript, "throw new Error('x')");
        advance(1500).await;
        let state = dispatcher.snapshot();
        assert_eq!(state.output_text, "Error: x");
        assert!(state.is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failures_become_error_output() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Java, "fail please");
        advance(1500).await;
        let state = dispatcher.snapshot();
        assert_eq!(state.output_text, "Error: Network error: connection refused");
        assert!(state.is_error);
        assert!(!state.is_loading);

        dispatcher.on_source_changed(Language::Python, "crash now");
        advance(1500).await;
        let state = dispatcher.snapshot();
        assert_eq!(state.output_text, "Error: Traceback: crash");
        assert!(state.is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_language_entry_never_reaches_network() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = Dispatcher::with_parts(
            Duration::from_millis(1000),
            LanguageTable::empty(),
            executor.clone(),
            SandboxedEvaluator::default(),
        );

        dispatcher.on_source_changed(Language::Python, "print(1)");
        advance(1500).await;

        assert!(executor.sources().is_empty());
        let state = dispatcher.snapshot();
        assert!(state.output_text.starts_with("Error: Configuration error"));
        assert!(state.is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_version_from_table_is_sent() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Cpp, "int main() {}");
        advance(1500).await;

        let calls = executor.calls.lock().unwrap().clone();
        assert_eq!(calls[0].0, Language::Cpp);
        assert_eq!(calls[0].1, "10.2.0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_skips_debounce() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());
        assert_eq!(dispatcher.rerun(), None);

        dispatcher.on_source_changed(Language::Python, "print(1)");
        advance(1500).await;
        assert_eq!(executor.sources().len(), 1);

        let sequence_id = dispatcher.rerun().unwrap();
        advance(10).await;
        assert_eq!(executor.sources().len(), 2);
        assert_eq!(dispatcher.snapshot().last_applied, Some(sequence_id));
    }

    #[tokio::test]
    async fn test_local_evaluation_leaves_runtime_responsive() {
        use std::sync::atomic::AtomicBool;

        let dispatcher = dispatcher_with(Arc::new(ScriptedExecutor::default()));
        let ticked = Arc::new(AtomicBool::new(false));
        let flag = ticked.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let state = dispatcher
            .run_immediately(
                Language::JavaScript,
                "let n = 0; for (let i = 0; i < 2000000; i++) { n += i; } console.log('done')",
            )
            .await;

        assert_eq!(state.output_text, "[log] done");
        assert!(ticked.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_immediately_and_clear() {
        let executor = Arc::new(ScriptedExecutor::default());
        let dispatcher = dispatcher_with(executor.clone());

        let state = dispatcher.run_immediately(Language::Php, "echo 1;").await;
        assert_eq!(state.output_text, "ran: echo 1;");
        assert_eq!(state.language, Some(Language::Php));

        dispatcher.clear_output();
        assert_eq!(dispatcher.snapshot().output_text, "");

        let state = dispatcher.run_immediately(Language::JavaScript, "1;").await;
        assert_eq!(state.output_text, NO_OUTPUT_SUCCESS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_to_markup_clears_stale_loading() {
        let executor = Arc::new(ScriptedExecutor::with_delays(&[("slow", 5000)]));
        let dispatcher = dispatcher_with(executor.clone());

        dispatcher.on_source_changed(Language::Python, "slow");
        advance(1500).await;
        assert!(dispatcher.snapshot().is_loading);

        dispatcher.on_source_changed(Language::Html, "<h1>hi</h1>");
        advance(1500).await;
        let state = dispatcher.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.language, Some(Language::Html));

        advance(5000).await;
        assert_eq!(dispatcher.snapshot().output_text, "");
    }

    #[tokio::test]
    async fn test_end_to_end_with_remote_client() {
        let server = MockExecutionServer::start(vec![
            MockReply::output("first\n").delayed(Duration::from_millis(400)),
            MockReply::output("second\n"),
        ])
        .await;
        let client = RemoteExecutionClient::new(&server.address(), Duration::from_secs(5)).unwrap();
        let dispatcher = Dispatcher::with_parts(
            Duration::from_millis(20),
            LanguageTable::default(),
            Arc::new(client),
            SandboxedEvaluator::default(),
        );
        let mut updates = dispatcher.subscribe();

        dispatcher.on_source_changed(Language::Python, "print('first')");
        tokio::time::sleep(Duration::from_millis(150)).await;
        dispatcher.on_source_changed(Language::Python, "print('second')");

        let state = tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|s| s.output_text == "second\n"),
        )
        .await
        .expect("second result in time")
        .unwrap()
        .clone();
        assert!(!state.is_loading);

        // Let the delayed first reply arrive; it must be ignored.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(dispatcher.snapshot().output_text, "second\n");
        assert_eq!(server.get_requests().len(), 2);

        server.shutdown().await;
    }
}
