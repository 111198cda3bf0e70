//! Render engine boundary.
//!
//! The worker drives a headless browser through these traits: one
//! [`RenderEngine`] launch per render invocation, one [`EngineSession`] per
//! launched process. Keeping the boundary behind traits lets the pipeline's
//! sequencing (launch, load, export, mandatory close) be tested without a
//! browser.

use crate::clip::{CaptureRegion, ContentSize};
use crate::error::RenderError;
use crate::options::{ImageFormat, ResolvedPdfOptions};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// Page settle condition applied after content load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// No in-flight network activity; used for PDF export so fonts and
    /// images referenced by the HTML have fully settled.
    NetworkIdle,
    /// Page load event plus the relaxed idle threshold; used for image
    /// capture, which tolerates a short tail of background requests.
    LoadAndNetworkAlmostIdle,
}

/// Fixed viewport applied at engine launch, before the page loads.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub has_touch: bool,
    pub is_landscape: bool,
    pub is_mobile: bool,
}

/// Per-invocation launch options. GPU disablement is an explicit field
/// here rather than process-global state, so concurrent jobs cannot
/// interfere with each other's engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    pub disable_gpu: bool,
    pub viewport: Option<ViewportConfig>,
}

impl LaunchConfig {
    /// Launch for PDF export: headless, no fixed viewport.
    pub fn headless() -> Self {
        Self {
            disable_gpu: true,
            viewport: None,
        }
    }

    /// Launch for image capture with the viewport fixed up front so the
    /// page lays out exactly once.
    pub fn with_viewport(viewport: ViewportConfig) -> Self {
        Self {
            disable_gpu: true,
            viewport: Some(viewport),
        }
    }
}

/// Screenshot request handed to the engine. `quality` is only populated
/// for lossy formats; `region` carries either a clip or the full-page
/// flag, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureParams {
    pub format: ImageFormat,
    pub quality: Option<u32>,
    pub omit_background: bool,
    pub region: CaptureRegion,
}

/// Launches one headless engine process per call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn launch(&self, config: LaunchConfig) -> Result<Box<dyn EngineSession>, RenderError>;
}

/// One live engine process with a single page.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EngineSession: Send {
    /// Loads the HTML document and waits for the settle condition.
    async fn load_html(&mut self, html: &str, wait: WaitCondition) -> Result<(), RenderError>;

    /// Exports the loaded page as PDF bytes.
    async fn export_pdf(&mut self, options: &ResolvedPdfOptions) -> Result<Vec<u8>, RenderError>;

    /// Probes the rendered document's scrollable dimensions.
    async fn content_size(&mut self) -> Result<ContentSize, RenderError>;

    /// Captures a screenshot of the loaded page.
    async fn capture_screenshot(&mut self, params: &CaptureParams) -> Result<Vec<u8>, RenderError>;

    /// Terminates the engine process. Must be called on every exit path.
    async fn close(&mut self) -> Result<(), RenderError>;
}
