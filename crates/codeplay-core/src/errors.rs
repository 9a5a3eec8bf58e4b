//! Error types for the execution and preview engine
//!
//! Every failure that can happen while turning an edit into visible output is
//! one of four kinds: the remote service could not be reached, the remote
//! service ran the program and it failed, the language table is wrong, or the
//! local evaluator threw. The dispatcher converts all of them into ordinary
//! output text, so none of these ever reach the view layer as a failure.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaygroundError {
    /// Remote call timed out, was refused or answered with a non-2xx status.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Remote call completed but the submitted program failed.
    #[error("{output}")]
    ServiceError { output: String },
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// Local sandboxed evaluation threw.
    #[error("{0}")]
    EvaluationError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
}

impl PlaygroundError {
    /// Text shown in the output console for this error.
    pub fn to_output_text(&self) -> String {
        format!("Error: {}", self)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PlaygroundError::ConfigurationError(_))
    }
}

impl From<std::io::Error> for PlaygroundError {
    fn from(err: std::io::Error) -> Self {
        PlaygroundError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for PlaygroundError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlaygroundError::NetworkError(format!("request timed out: {}", err))
        } else {
            PlaygroundError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_yaml::Error> for PlaygroundError {
    fn from(err: serde_yaml::Error) -> Self {
        PlaygroundError::ParsingError(err.to_string())
    }
}
