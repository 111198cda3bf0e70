//! Render session orchestration.
//!
//! Each render call owns exactly one engine process: launch, load, export,
//! close. The close runs on every exit path, and a close failure never
//! masks an error raised by the render itself.

use crate::clip::{select_capture_region, ContentSize};
use crate::engine::{
    CaptureParams, EngineSession, LaunchConfig, RenderEngine, ViewportConfig, WaitCondition,
};
use crate::error::RenderError;
use crate::options::{
    ImageOptions, PdfOptions, ResolvedImageOptions, ResolvedPdfOptions,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Drives one engine process per render invocation. Engine processes are
/// never pooled or shared across jobs.
pub struct Renderer {
    engine: Arc<dyn RenderEngine>,
}

impl Renderer {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self { engine }
    }

    /// Renders HTML to PDF bytes.
    pub async fn render_pdf(
        &self,
        html: &str,
        options: Option<&PdfOptions>,
    ) -> Result<Vec<u8>, RenderError> {
        let resolved = ResolvedPdfOptions::resolve(options);
        debug!(
            format = %resolved.format,
            landscape = resolved.landscape,
            "rendering PDF"
        );

        let mut session = self.engine.launch(LaunchConfig::headless()).await?;
        let rendered = drive_pdf(session.as_mut(), html, &resolved).await;
        finish(session, rendered).await
    }

    /// Renders HTML to image bytes in the requested format.
    pub async fn render_image(
        &self,
        html: &str,
        options: Option<&ImageOptions>,
    ) -> Result<Vec<u8>, RenderError> {
        let resolved = ResolvedImageOptions::resolve(options);
        debug!(
            format = %resolved.format,
            width = resolved.width,
            height = resolved.height,
            "rendering image"
        );

        let launch = LaunchConfig::with_viewport(ViewportConfig {
            width: resolved.width,
            height: resolved.height,
            device_scale_factor: resolved.device_scale_factor,
            has_touch: resolved.has_touch,
            is_landscape: resolved.is_landscape,
            is_mobile: resolved.is_mobile,
        });
        let mut session = self.engine.launch(launch).await?;
        let rendered = drive_image(session.as_mut(), html, &resolved).await;
        finish(session, rendered).await
    }
}

async fn drive_pdf(
    session: &mut dyn EngineSession,
    html: &str,
    options: &ResolvedPdfOptions,
) -> Result<Vec<u8>, RenderError> {
    session.load_html(html, WaitCondition::NetworkIdle).await?;
    session.export_pdf(options).await
}

async fn drive_image(
    session: &mut dyn EngineSession,
    html: &str,
    options: &ResolvedImageOptions,
) -> Result<Vec<u8>, RenderError> {
    session
        .load_html(html, WaitCondition::LoadAndNetworkAlmostIdle)
        .await?;

    // A failed probe is not fatal; the clip strategy falls back to
    // full-page capture on zero dimensions.
    let probed = match session.content_size().await {
        Ok(size) => size,
        Err(err) => {
            warn!(error = %err, "content size probe failed");
            ContentSize::default()
        }
    };

    let region = select_capture_region(options.clip.clone(), probed, options.full_page);
    let params = CaptureParams {
        format: options.format,
        quality: options.format.is_lossy().then_some(options.quality),
        omit_background: options.omit_background,
        region,
    };
    session.capture_screenshot(&params).await
}

/// Closes the session regardless of the render outcome. On the success
/// path a close failure surfaces; after a render failure it is only
/// logged, and the original error propagates.
async fn finish(
    mut session: Box<dyn EngineSession>,
    rendered: Result<Vec<u8>, RenderError>,
) -> Result<Vec<u8>, RenderError> {
    let closed = session.close().await;
    match rendered {
        Ok(bytes) => {
            closed?;
            Ok(bytes)
        }
        Err(render_err) => {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "engine close failed after render error");
            }
            Err(render_err)
        }
    }
}
