//! Execution engine for a multi-language code playground.
//!
//! Edits flow into the [`Dispatcher`], which debounces them and routes each
//! surviving run by language class:
//!
//! - **Compiled-remote languages** go to a remote execution service through the
//!   [`RemoteExecutionClient`], with a loading flag raised while in flight
//! - **The script language** is evaluated locally by the [`SandboxedEvaluator`]
//!   with its console output captured per channel
//! - **Markup languages** are turned into self-contained preview documents by
//!   the [`PreviewBuilder`]
//!
//! Every run carries a sequence id and only the newest one may publish its
//! result, so a slow response can never overwrite a newer one. The
//! [`SplitterController`] owns the editor/output split and is independent of
//! execution.

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod executors;
pub mod language;
pub mod layout;
pub mod preview;

pub use config::*;
pub use dispatcher::{Dispatcher, DispatcherState, ExecutionRequest, ExecutionResult};
pub use errors::PlaygroundError;
pub use executors::{CodeExecutor, ExecutionOutput, RemoteExecutionClient, SandboxedEvaluator};
pub use language::{Language, LanguageClass, LanguageTable, PreviewKind};
pub use layout::{ContainerRect, HostDocument, PointerTarget, SplitLayout, SplitterController};
pub use preview::{DevicePreset, PreviewBuilder, PreviewDocument};

#[cfg(test)]
pub mod test_utils;
