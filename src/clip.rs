//! Capture-region selection for image rendering.

use serde::{Deserialize, Serialize};

/// Rectangular sub-region of the rendered page, CSS pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rendered content dimensions probed from the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ContentSize {
    pub width: f64,
    pub height: f64,
}

/// Region a screenshot capture operates on. Exactly one of clip or
/// full-page is ever sent to the engine, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureRegion {
    Clip(ClipRect),
    FullPage(bool),
}

/// Picks the capture region for a screenshot, first match wins:
///
/// 1. an explicit caller-supplied clip,
/// 2. an auto-fit clip from the probed content size, when both dimensions
///    are positive,
/// 3. the resolved full-page setting.
pub fn select_capture_region(
    explicit: Option<ClipRect>,
    probed: ContentSize,
    full_page: bool,
) -> CaptureRegion {
    if let Some(clip) = explicit {
        return CaptureRegion::Clip(clip);
    }
    if probed.width > 0.0 && probed.height > 0.0 {
        return CaptureRegion::Clip(ClipRect {
            x: 0.0,
            y: 0.0,
            width: probed.width,
            height: probed.height,
        });
    }
    CaptureRegion::FullPage(full_page)
}
