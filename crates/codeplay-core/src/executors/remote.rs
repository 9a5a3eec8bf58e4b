//! Client for the remote code execution service.
//!
//! Speaks the Piston v2 protocol: `POST /execute` with the language, its
//! version and the source as a single file, answered by the compile and run
//! stages' captured output. `GET /runtimes` lists what the service can run.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CodeExecutor, ExecutionOutput, NO_OUTPUT};
use crate::config::PlaygroundConfig;
use crate::errors::PlaygroundError;
use crate::language::{Language, LanguageTable};

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<SourceFile<'a>>,
}

#[derive(Debug, Serialize)]
struct SourceFile<'a> {
    content: &'a str,
}

/// One stage (compile or run) as reported by the service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageReport {
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub signal: Option<String>,
}

impl StageReport {
    fn failed(&self) -> bool {
        self.code.map(|c| c != 0).unwrap_or(false) || self.signal.is_some()
    }

    /// Captured standard output, else standard error, else a placeholder.
    fn display_text(&self) -> String {
        if !self.output.is_empty() {
            self.output.clone()
        } else if !self.stderr.is_empty() {
            self.stderr.clone()
        } else {
            NO_OUTPUT.to_string()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteResponse {
    #[serde(default)]
    pub run: Option<StageReport>,
    #[serde(default)]
    pub compile: Option<StageReport>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub language: String,
    pub version: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteExecutionClient {
    client: Client,
    base_url: String,
    languages: LanguageTable,
}

impl RemoteExecutionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PlaygroundError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            PlaygroundError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            languages: LanguageTable::default(),
        })
    }

    pub fn from_config(config: &PlaygroundConfig) -> Result<Self, PlaygroundError> {
        Ok(Self::new(
            &config.execution.base_url,
            Duration::from_secs(config.execution.timeout_secs),
        )?
        .with_languages(config.language_table()))
    }

    pub fn with_languages(mut self, languages: LanguageTable) -> Self {
        self.languages = languages;
        self
    }

    /// Execute `source`, looking its version up in the language table first.
    pub async fn run(
        &self,
        language: Language,
        source: &str,
    ) -> Result<ExecutionOutput, PlaygroundError> {
        let version = self.languages.version_for(language)?.to_string();
        self.execute_code(language, &version, source).await
    }

    pub async fn runtimes(&self) -> Result<Vec<RuntimeInfo>, PlaygroundError> {
        let url = format!("{}/runtimes", self.base_url);
        log::debug!("Fetching runtimes from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlaygroundError::NetworkError(format!(
                "Runtime listing failed with status {}: {}",
                status,
                error_message(&body)
            )));
        }

        response.json::<Vec<RuntimeInfo>>().await.map_err(|e| {
            PlaygroundError::ParsingError(format!("Invalid runtimes response: {}", e))
        })
    }

    /// Turn a completed service response into output or a program failure.
    pub fn normalize(response: ExecuteResponse) -> Result<ExecutionOutput, PlaygroundError> {
        if let Some(compile) = response.compile.as_ref().filter(|c| c.failed()) {
            return Err(PlaygroundError::ServiceError {
                output: compile.display_text(),
            });
        }

        match response.run {
            Some(run) if run.failed() => Err(PlaygroundError::ServiceError {
                output: run.display_text(),
            }),
            Some(run) => Ok(ExecutionOutput::success(run.display_text())),
            None => match response.message {
                Some(message) => Err(PlaygroundError::ServiceError { output: message }),
                None => Ok(ExecutionOutput::success(NO_OUTPUT)),
            },
        }
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ExecuteResponse>(body)
        .ok()
        .and_then(|r| r.message)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl CodeExecutor for RemoteExecutionClient {
    async fn execute_code(
        &self,
        language: Language,
        version: &str,
        code: &str,
    ) -> Result<ExecutionOutput, PlaygroundError> {
        let url = format!("{}/execute", self.base_url);
        let payload = ExecuteRequest {
            language: language.id(),
            version,
            files: vec![SourceFile { content: code }],
        };

        log::debug!(
            "Remote execution request to {}: language={} version={} ({} bytes)",
            url,
            language,
            version,
            code.len()
        );

        let response = self.client.post(&url).json(&payload).send().await.map_err(|e| {
            log::warn!("HTTP request to execution service failed: {}", e);
            PlaygroundError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            PlaygroundError::NetworkError(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            let err_msg = format!(
                "Execution service responded with status {}: {}",
                status,
                error_message(&body)
            );
            log::warn!("{}", err_msg);
            return Err(PlaygroundError::NetworkError(err_msg));
        }

        let parsed: ExecuteResponse = serde_json::from_str(&body).map_err(|e| {
            PlaygroundError::NetworkError(format!("Invalid response from execution service: {}", e))
        })?;

        Self::normalize(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::mock_execution_server::{MockExecutionServer, MockReply};
    use serde_json::json;

    fn client_for(server: &MockExecutionServer) -> RemoteExecutionClient {
        RemoteExecutionClient::new(&server.address(), Duration::from_secs(5)).unwrap()
    }

    fn report(output: &str, stderr: &str, code: i64) -> StageReport {
        StageReport {
            output: output.to_string(),
            stderr: stderr.to_string(),
            code: Some(code),
            signal: None,
        }
    }

    #[test]
    fn test_output_precedence() {
        fn ok(run: StageReport) -> Result<ExecutionOutput, PlaygroundError> {
            RemoteExecutionClient::normalize(ExecuteResponse {
                run: Some(run),
                ..Default::default()
            })
        }

        assert_eq!(ok(report("out", "err", 0)).unwrap().output_text, "out");
        assert_eq!(ok(report("", "err", 0)).unwrap().output_text, "err");
        assert_eq!(ok(report("", "", 0)).unwrap().output_text, NO_OUTPUT);
    }

    #[test]
    fn test_failed_stages_are_service_errors() {
        let compile_failure = ExecuteResponse {
            compile: Some(report("", "main.c:1: error", 1)),
            run: None,
            message: None,
        };
        assert_eq!(
            RemoteExecutionClient::normalize(compile_failure).unwrap_err(),
            PlaygroundError::ServiceError {
                output: "main.c:1: error".to_string()
            }
        );

        let killed = ExecuteResponse {
            run: Some(StageReport {
                signal: Some("SIGKILL".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            RemoteExecutionClient::normalize(killed),
            Err(PlaygroundError::ServiceError { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_sends_language_version_and_source() {
        let server = MockExecutionServer::start(vec![MockReply::ok(json!({
            "language": "python",
            "version": "3.10.0",
            "run": { "stdout": "Hello\n", "stderr": "", "output": "Hello\n", "code": 0, "signal": null }
        }))])
        .await;

        let client = client_for(&server);
        let result = client.run(Language::Python, "print('Hello')").await.unwrap();
        assert_eq!(result, ExecutionOutput::success("Hello\n"));

        let requests = server.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["language"], "python");
        assert_eq!(requests[0]["version"], "3.10.0");
        assert_eq!(requests[0]["files"][0]["content"], "print('Hello')");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_network_error() {
        let server = MockExecutionServer::start(vec![MockReply::status(
            400,
            json!({ "message": "python-9.9.9 runtime is unknown" }),
        )])
        .await;

        let err = client_for(&server)
            .execute_code(Language::Python, "9.9.9", "print(1)")
            .await
            .unwrap_err();
        match err {
            PlaygroundError::NetworkError(msg) => assert!(msg.contains("runtime is unknown")),
            other => panic!("unexpected error: {:?}", other),
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_language_fails_before_network() {
        let server = MockExecutionServer::start(vec![]).await;
        let client = client_for(&server).with_languages(LanguageTable::empty());

        let err = client.run(Language::Java, "class A {}").await.unwrap_err();
        assert!(err.is_configuration());
        assert!(server.get_requests().is_empty());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let client =
            RemoteExecutionClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.run(Language::C, "int main(){}").await.unwrap_err();
        assert!(matches!(err, PlaygroundError::NetworkError(_)));
    }

    #[tokio::test]
    async fn test_slow_service_times_out() {
        let server = MockExecutionServer::start(vec![
            MockReply::output("too late").delayed(Duration::from_secs(2)),
        ])
        .await;
        let client =
            RemoteExecutionClient::new(&server.address(), Duration::from_millis(200)).unwrap();

        let err = client.run(Language::Python, "print(1)").await.unwrap_err();
        match err {
            PlaygroundError::NetworkError(msg) => assert!(msg.starts_with("request timed out")),
            other => panic!("unexpected error: {:?}", other),
        }

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_runtimes_listing() {
        let server = MockExecutionServer::start(vec![]).await;
        server.set_runtimes(json!([
            { "language": "python", "version": "3.10.0", "aliases": ["py", "py3"] },
            { "language": "c", "version": "10.2.0", "aliases": ["gcc"] }
        ]));

        let runtimes = client_for(&server).runtimes().await.unwrap();
        assert_eq!(runtimes.len(), 2);
        assert_eq!(runtimes[0].language, "python");
        assert_eq!(runtimes[1].aliases, vec!["gcc".to_string()]);

        server.shutdown().await;
    }
}
