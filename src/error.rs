//! Error types for the render engine and blob storage seams.

use std::time::Duration;

/// Errors raised while driving the headless render engine.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No Chromium executable was configured and none could be detected.
    #[error("render engine executable not found: {0}")]
    ExecutableNotFound(String),

    /// The engine process could not be configured or started.
    #[error("failed to launch render engine: {0}")]
    Launch(String),

    /// The page did not reach its settle condition within the timeout.
    #[error("content failed to settle within {0:?}")]
    ContentSettleTimeout(Duration),

    /// The engine rejected the navigation, or its event stream ended
    /// before the page settled.
    #[error("page navigation failed: {0}")]
    Navigation(String),

    /// A CDP command or the engine connection failed.
    #[error("render engine error: {0}")]
    Engine(#[from] chromiumoxide::error::CdpError),

    /// The content-size probe returned something we could not decode.
    #[error("content size probe returned malformed result: {0}")]
    Probe(#[from] serde_json::Error),

    /// A caller-supplied option could not be translated for the engine.
    #[error("invalid render option: {0}")]
    InvalidOption(String),

    /// An engine command could not be assembled.
    #[error("engine command could not be built: {0}")]
    Command(String),
}

/// Errors raised by the blob store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The underlying store rejected or failed the upload.
    #[error("failed to upload object {key}: {message}")]
    Put { key: String, message: String },
}
