//! Chromium-backed render engine via the DevTools protocol.

use crate::clip::{CaptureRegion, ContentSize};
use crate::engine::{CaptureParams, EngineSession, LaunchConfig, RenderEngine, WaitCondition};
use crate::error::RenderError;
use crate::options::{ImageFormat, ResolvedPdfOptions};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::LoaderId;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventLifecycleEvent, NavigateParams, PrintToPdfParams,
    SetLifecycleEventsEnabledParams, Viewport,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::detection::{default_executable, DetectionOptions};
use chromiumoxide::handler::viewport::Viewport as LaunchViewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::{Stream, StreamExt};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Reads the document's scrollable extent; evaluated in the page context
/// after the settle condition is reached.
const CONTENT_SIZE_PROBE: &str = "({ width: document.documentElement.scrollWidth, \
     height: document.documentElement.scrollHeight })";

/// Process-wide engine settings, read-only after startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit Chromium binary; platform detection is used when unset.
    pub chrome_path: Option<PathBuf>,
    /// Upper bound for content load and settle.
    pub navigation_timeout: Duration,
}

/// Launches one headless Chromium process per render invocation.
pub struct ChromiumEngine {
    config: EngineConfig,
}

impl ChromiumEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn resolve_executable(&self) -> Result<PathBuf, RenderError> {
        match &self.config.chrome_path {
            Some(path) => Ok(path.clone()),
            None => default_executable(DetectionOptions::default())
                .map_err(|err| RenderError::ExecutableNotFound(err.to_string())),
        }
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn launch(&self, launch: LaunchConfig) -> Result<Box<dyn EngineSession>, RenderError> {
        let executable = self.resolve_executable()?;

        let mut builder = BrowserConfig::builder().chrome_executable(executable);
        if launch.disable_gpu {
            builder = builder.arg("--disable-gpu");
        }
        if let Some(vp) = &launch.viewport {
            builder = builder.viewport(LaunchViewport {
                width: vp.width,
                height: vp.height,
                device_scale_factor: Some(vp.device_scale_factor),
                emulating_mobile: vp.is_mobile,
                is_landscape: vp.is_landscape,
                has_touch: vp.has_touch,
            });
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        // On a setup failure past this point the Browser drop kills the
        // child process; only the handler task needs explicit cleanup.
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler_task.abort();
                return Err(err.into());
            }
        };
        if let Err(err) = page
            .execute(SetLifecycleEventsEnabledParams { enabled: true })
            .await
        {
            handler_task.abort();
            return Err(err.into());
        }

        debug!(viewport = ?launch.viewport, "render engine launched");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            timeout: self.config.navigation_timeout,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    timeout: Duration,
}

#[async_trait]
impl EngineSession for ChromiumSession {
    async fn load_html(&mut self, html: &str, wait: WaitCondition) -> Result<(), RenderError> {
        // Listener attaches before navigation so no lifecycle event is lost.
        let mut lifecycle = self.page.event_listener::<EventLifecycleEvent>().await?;

        let url = format!(
            "data:text/html;charset=utf-8;base64,{}",
            BASE64.encode(html)
        );
        let nav = self.page.execute(NavigateParams::new(url)).await?;
        if let Some(reason) = &nav.error_text {
            return Err(RenderError::Navigation(reason.clone()));
        }

        // Keying on the navigation's loader discards stale lifecycle
        // events still arriving from the initial about:blank document.
        let tracker = SettleTracker::new(wait, nav.loader_id.clone());
        tokio::time::timeout(self.timeout, await_settled(&mut lifecycle, tracker))
            .await
            .map_err(|_| RenderError::ContentSettleTimeout(self.timeout))??;
        Ok(())
    }

    async fn export_pdf(&mut self, options: &ResolvedPdfOptions) -> Result<Vec<u8>, RenderError> {
        let (paper_width, paper_height) = paper_size(&options.format);
        let params = PrintToPdfParams {
            landscape: Some(options.landscape),
            print_background: Some(options.print_background),
            paper_width: Some(paper_width),
            paper_height: Some(paper_height),
            margin_top: Some(css_length_to_inches(&options.margin.top)?),
            margin_bottom: Some(css_length_to_inches(&options.margin.bottom)?),
            margin_left: Some(css_length_to_inches(&options.margin.left)?),
            margin_right: Some(css_length_to_inches(&options.margin.right)?),
            prefer_css_page_size: Some(options.prefer_css_page_size),
            generate_tagged_pdf: Some(options.tagged),
            ..Default::default()
        };
        let bytes = self.page.pdf(params).await?;
        Ok(bytes)
    }

    async fn content_size(&mut self) -> Result<ContentSize, RenderError> {
        let params = EvaluateParams::builder()
            .expression(CONTENT_SIZE_PROBE)
            .return_by_value(true)
            .build()
            .map_err(RenderError::Command)?;
        let size: ContentSize = self.page.evaluate(params).await?.into_value()?;
        Ok(size)
    }

    async fn capture_screenshot(&mut self, params: &CaptureParams) -> Result<Vec<u8>, RenderError> {
        let format = match params.format {
            ImageFormat::Png => CaptureScreenshotFormat::Png,
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
            ImageFormat::Webp => CaptureScreenshotFormat::Webp,
        };

        let mut builder = ScreenshotParams::builder()
            .format(format)
            .omit_background(params.omit_background);
        if let Some(quality) = params.quality {
            builder = builder.quality(quality as i64);
        }
        match &params.region {
            CaptureRegion::Clip(clip) => {
                builder = builder.clip(Viewport {
                    x: clip.x,
                    y: clip.y,
                    width: clip.width,
                    height: clip.height,
                    scale: 1.0,
                });
            }
            CaptureRegion::FullPage(full_page) => {
                builder = builder.full_page(*full_page);
            }
        }

        let bytes = self.page.screenshot(builder.build()).await?;
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        let closed = self.browser.close().await;
        if closed.is_ok() {
            if let Err(err) = self.browser.wait().await {
                warn!(error = %err, "failed to reap render engine process");
            }
        }
        self.handler_task.abort();
        closed?;
        Ok(())
    }
}

/// Tracks lifecycle events toward a settle condition. Events from loaders
/// other than the navigated document's are ignored.
struct SettleTracker {
    pending: HashSet<&'static str>,
    loader_id: Option<LoaderId>,
}

impl SettleTracker {
    fn new(wait: WaitCondition, loader_id: Option<LoaderId>) -> Self {
        let pending = match wait {
            WaitCondition::NetworkIdle => HashSet::from(["networkIdle"]),
            WaitCondition::LoadAndNetworkAlmostIdle => {
                HashSet::from(["load", "networkAlmostIdle"])
            }
        };
        Self { pending, loader_id }
    }

    /// Returns true once every required event has been observed.
    fn observe(&mut self, event: &EventLifecycleEvent) -> bool {
        if let Some(loader) = &self.loader_id {
            if event.loader_id != *loader {
                return false;
            }
        }
        self.pending.remove(event.name.as_str());
        self.pending.is_empty()
    }
}

/// Waits until the tracker is satisfied. A stream that ends first means
/// the engine connection died; that is an error, not a settled page.
async fn await_settled(
    events: &mut (impl Stream<Item = Arc<EventLifecycleEvent>> + Unpin),
    mut tracker: SettleTracker,
) -> Result<(), RenderError> {
    while let Some(event) = events.next().await {
        if tracker.observe(&event) {
            return Ok(());
        }
    }
    Err(RenderError::Navigation(
        "lifecycle event stream ended before content settled".to_string(),
    ))
}

/// Paper dimensions in inches for the CDP print call. Unknown formats fall
/// back to A4.
fn paper_size(format: &str) -> (f64, f64) {
    match format.to_ascii_lowercase().as_str() {
        "a0" => (33.11, 46.81),
        "a1" => (23.39, 33.11),
        "a2" => (16.54, 23.39),
        "a3" => (11.7, 16.54),
        "a4" => (8.27, 11.7),
        "a5" => (5.83, 8.27),
        "letter" => (8.5, 11.0),
        "legal" => (8.5, 14.0),
        "tabloid" => (11.0, 17.0),
        "ledger" => (17.0, 11.0),
        other => {
            warn!(format = other, "unknown paper format, using A4");
            (8.27, 11.7)
        }
    }
}

/// Converts a CSS length ("10mm", "1cm", "0.5in", "96px", bare pixels) to
/// inches for the CDP print call.
fn css_length_to_inches(value: &str) -> Result<f64, RenderError> {
    let value = value.trim();
    let (number, divisor) = if let Some(v) = value.strip_suffix("mm") {
        (v, 25.4)
    } else if let Some(v) = value.strip_suffix("cm") {
        (v, 2.54)
    } else if let Some(v) = value.strip_suffix("in") {
        (v, 1.0)
    } else if let Some(v) = value.strip_suffix("px") {
        (v, 96.0)
    } else {
        (value, 96.0)
    };
    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| RenderError::InvalidOption(format!("unsupported margin length: {value}")))?;
    Ok(number / divisor)
}
