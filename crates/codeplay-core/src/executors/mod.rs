//! Code execution backends.
//!
//! Compiled and non-JavaScript languages go to a remote execution service over
//! HTTP; JavaScript quick output runs in an embedded engine on the local
//! machine. Both produce the same normalized [`ExecutionOutput`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PlaygroundError;
use crate::language::Language;

/// Placeholder shown when a run succeeded but printed nothing.
pub const NO_OUTPUT: &str = "No output";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub output_text: String,
    pub is_error: bool,
}

impl ExecutionOutput {
    pub fn success(output_text: impl Into<String>) -> Self {
        Self {
            output_text: output_text.into(),
            is_error: false,
        }
    }

    pub fn failure(err: &PlaygroundError) -> Self {
        Self {
            output_text: err.to_output_text(),
            is_error: true,
        }
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute_code(
        &self,
        language: Language,
        version: &str,
        code: &str,
    ) -> Result<ExecutionOutput, PlaygroundError>;
}

pub mod remote;
pub mod sandbox;

pub use remote::RemoteExecutionClient;
pub use sandbox::{ConsoleChannel, SandboxedEvaluator};
