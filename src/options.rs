//! Render option resolution.
//!
//! Producers may supply any subset of the option fields; every field is
//! defaulted independently, so a job that only sets `landscape` still gets
//! the full set of PDF defaults. Resolution is pure and never mutates the
//! caller-supplied options.

use crate::clip::ClipRect;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_PDF_FORMAT: &str = "A4";
const DEFAULT_MARGIN: &str = "10mm";
const DEFAULT_IMAGE_QUALITY: u32 = 80;
const DEFAULT_VIEWPORT_WIDTH: u32 = 320;
const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Caller-supplied PDF options, every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfOptions {
    pub format: Option<String>,
    pub landscape: Option<bool>,
    pub print_background: Option<bool>,
    pub margin: Option<MarginOptions>,
    /// Generate accessibility-tagged PDF output.
    pub tagged: Option<bool>,
    // Producer wire name capitalizes the CSS acronym; camelCase derivation
    // would silently miss it.
    #[serde(rename = "preferCSSPageSize")]
    pub prefer_css_page_size: Option<bool>,
}

/// Caller-supplied page margins, CSS length strings ("10mm", "0.5in").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarginOptions {
    pub top: Option<String>,
    pub right: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
}

/// Fully defaulted PDF options handed to the render engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPdfOptions {
    pub format: String,
    pub landscape: bool,
    pub print_background: bool,
    pub margin: Margin,
    pub tagged: bool,
    pub prefer_css_page_size: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Margin {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl ResolvedPdfOptions {
    pub fn resolve(options: Option<&PdfOptions>) -> Self {
        let opts = options.cloned().unwrap_or_default();
        let margin = opts.margin.unwrap_or_default();
        Self {
            format: opts.format.unwrap_or_else(|| DEFAULT_PDF_FORMAT.to_string()),
            landscape: opts.landscape.unwrap_or(false),
            print_background: opts.print_background.unwrap_or(true),
            margin: Margin {
                top: margin.top.unwrap_or_else(|| DEFAULT_MARGIN.to_string()),
                right: margin.right.unwrap_or_else(|| DEFAULT_MARGIN.to_string()),
                bottom: margin.bottom.unwrap_or_else(|| DEFAULT_MARGIN.to_string()),
                left: margin.left.unwrap_or_else(|| DEFAULT_MARGIN.to_string()),
            },
            tagged: opts.tagged.unwrap_or(true),
            prefer_css_page_size: opts.prefer_css_page_size.unwrap_or(true),
        }
    }
}

/// Screenshot output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// Quality only applies to lossy encodings.
    pub fn is_lossy(self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::Webp)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg => write!(f, "jpeg"),
            ImageFormat::Webp => write!(f, "webp"),
        }
    }
}

/// Caller-supplied image options, every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    #[serde(rename = "type")]
    pub format: Option<ImageFormat>,
    pub quality: Option<u32>,
    pub device_scale_factor: Option<f64>,
    pub has_touch: Option<bool>,
    pub is_landscape: Option<bool>,
    pub is_mobile: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Explicit capture region; absence triggers auto-fit to content size.
    pub clip: Option<ClipRect>,
    pub full_page: Option<bool>,
    pub omit_background: Option<bool>,
}

/// Fully defaulted image options handed to the render engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImageOptions {
    pub format: ImageFormat,
    pub quality: u32,
    pub device_scale_factor: f64,
    pub has_touch: bool,
    pub is_landscape: bool,
    pub is_mobile: bool,
    pub width: u32,
    pub height: u32,
    pub clip: Option<ClipRect>,
    pub full_page: bool,
    pub omit_background: bool,
}

impl ResolvedImageOptions {
    pub fn resolve(options: Option<&ImageOptions>) -> Self {
        let opts = options.cloned().unwrap_or_default();
        Self {
            format: opts.format.unwrap_or(ImageFormat::Png),
            quality: opts.quality.unwrap_or(DEFAULT_IMAGE_QUALITY),
            device_scale_factor: opts.device_scale_factor.unwrap_or(1.0),
            has_touch: opts.has_touch.unwrap_or(false),
            is_landscape: opts.is_landscape.unwrap_or(false),
            is_mobile: opts.is_mobile.unwrap_or(true),
            width: opts.width.unwrap_or(DEFAULT_VIEWPORT_WIDTH),
            height: opts.height.unwrap_or(DEFAULT_VIEWPORT_HEIGHT),
            clip: opts.clip,
            full_page: opts.full_page.unwrap_or(true),
            omit_background: opts.omit_background.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pdf_defaults_when_no_options_supplied() {
        let resolved = ResolvedPdfOptions::resolve(None);
        assert_eq!(resolved.format, "A4");
        assert!(!resolved.landscape);
        assert!(resolved.print_background);
        assert!(resolved.tagged);
        assert!(resolved.prefer_css_page_size);
        assert_eq!(resolved.margin.top, "10mm");
        assert_eq!(resolved.margin.right, "10mm");
        assert_eq!(resolved.margin.bottom, "10mm");
        assert_eq!(resolved.margin.left, "10mm");
    }

    #[test]
    fn pdf_fields_default_independently() {
        let options = PdfOptions {
            landscape: Some(true),
            ..Default::default()
        };
        let resolved = ResolvedPdfOptions::resolve(Some(&options));
        assert!(resolved.landscape);
        // Everything else stays at its documented default.
        assert_eq!(resolved.format, "A4");
        assert!(resolved.print_background);
        assert!(resolved.tagged);
        assert_eq!(resolved.margin.left, "10mm");
        // Caller's options are untouched.
        assert!(options.format.is_none());
    }

    #[test]
    fn pdf_margin_sides_default_independently() {
        let options = PdfOptions {
            margin: Some(MarginOptions {
                top: Some("25mm".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let resolved = ResolvedPdfOptions::resolve(Some(&options));
        assert_eq!(resolved.margin.top, "25mm");
        assert_eq!(resolved.margin.right, "10mm");
        assert_eq!(resolved.margin.bottom, "10mm");
        assert_eq!(resolved.margin.left, "10mm");
    }

    #[test]
    fn pdf_supplied_fields_pass_through() {
        let options = PdfOptions {
            format: Some("Letter".to_string()),
            landscape: Some(true),
            print_background: Some(false),
            tagged: Some(false),
            prefer_css_page_size: Some(false),
            margin: None,
        };
        let resolved = ResolvedPdfOptions::resolve(Some(&options));
        assert_eq!(resolved.format, "Letter");
        assert!(resolved.landscape);
        assert!(!resolved.print_background);
        assert!(!resolved.tagged);
        assert!(!resolved.prefer_css_page_size);
    }

    #[test]
    fn image_defaults_when_no_options_supplied() {
        let resolved = ResolvedImageOptions::resolve(None);
        assert_eq!(resolved.format, ImageFormat::Png);
        assert_eq!(resolved.quality, 80);
        assert_eq!(resolved.device_scale_factor, 1.0);
        assert!(!resolved.has_touch);
        assert!(!resolved.is_landscape);
        assert!(resolved.is_mobile);
        assert_eq!(resolved.width, 320);
        assert_eq!(resolved.height, 1080);
        assert!(resolved.clip.is_none());
        assert!(resolved.full_page);
        assert!(!resolved.omit_background);
    }

    #[test]
    fn image_fields_default_independently() {
        let options = ImageOptions {
            format: Some(ImageFormat::Jpeg),
            width: Some(1280),
            ..Default::default()
        };
        let resolved = ResolvedImageOptions::resolve(Some(&options));
        assert_eq!(resolved.format, ImageFormat::Jpeg);
        assert_eq!(resolved.width, 1280);
        assert_eq!(resolved.height, 1080);
        assert_eq!(resolved.quality, 80);
        assert!(resolved.is_mobile);
    }

    #[test]
    fn lossy_detection() {
        assert!(!ImageFormat::Png.is_lossy());
        assert!(ImageFormat::Jpeg.is_lossy());
        assert!(ImageFormat::Webp.is_lossy());
    }

    #[test]
    fn pdf_options_parse_from_wire_names() {
        let options: PdfOptions = serde_json::from_str(
            r#"{ "preferCSSPageSize": false, "printBackground": false }"#,
        )
        .unwrap();
        assert_eq!(options.prefer_css_page_size, Some(false));
        assert_eq!(options.print_background, Some(false));

        let resolved = ResolvedPdfOptions::resolve(Some(&options));
        assert!(!resolved.prefer_css_page_size);
    }

    #[test]
    fn image_options_parse_from_wire_names() {
        let options: ImageOptions = serde_json::from_str(
            r#"{ "type": "webp", "deviceScaleFactor": 2.0, "fullPage": false }"#,
        )
        .unwrap();
        assert_eq!(options.format, Some(ImageFormat::Webp));
        assert_eq!(options.device_scale_factor, Some(2.0));
        assert_eq!(options.full_page, Some(false));
    }
}
