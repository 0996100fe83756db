//! Font loading and text measurement.
//!
//! Layout never assumes a particular font's metrics: every placement is
//! computed from [`LoadedFont::measure`] on whichever font was actually
//! loaded. The fallback to the bundled font is an explicit caller policy
//! ([`FontFallback`]), not an error swallowed during loading.

use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use tickettock_common::error::{TicketTockError, TicketTockResult};

/// DejaVu Sans, bundled so that generation works without system fonts.
const BUILTIN_FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

const BUILTIN_FONT_NAME: &str = "DejaVu Sans (built-in)";

/// Where overlay text glyphs come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FontSource {
    /// The bundled DejaVu Sans.
    #[default]
    Builtin,
    /// A TrueType/OpenType file on disk.
    File(PathBuf),
}

/// What to do when a [`FontSource::File`] cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontFallback {
    /// Fail the request with [`TicketTockError::AssetMissing`].
    Fail,
    /// Use the bundled font at the same nominal size.
    #[default]
    Builtin,
}

/// Measured size of a rendered line, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

/// A parsed font at a fixed pixel size.
#[derive(Clone)]
pub struct LoadedFont {
    font: FontArc,
    scale: PxScale,
    name: String,
}

impl std::fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFont")
            .field("name", &self.name)
            .field("size_px", &self.scale.y)
            .finish()
    }
}

impl LoadedFont {
    /// The bundled font at `size_px`.
    pub fn builtin(size_px: f32) -> TicketTockResult<Self> {
        let scale = validate_size(size_px)?;
        let font = FontArc::try_from_slice(BUILTIN_FONT_BYTES)
            .map_err(|e| TicketTockError::data(format!("built-in font is corrupt: {e}")))?;
        Ok(Self {
            font,
            scale,
            name: BUILTIN_FONT_NAME.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_px(&self) -> f32 {
        self.scale.y
    }

    /// Rendered width and height of `text`.
    ///
    /// Glyphs are placed exactly as [`LoadedFont::draw`] places them, and the
    /// box grows to the last glyph's ink and the full ascent-to-descent line,
    /// so every pixel `draw` touches right of and below the origin lies
    /// inside it.
    pub fn measure(&self, text: &str) -> TextExtent {
        let scaled = self.font.as_scaled(self.scale);
        let (mut caret, mut right, mut bottom) = (0f32, 0f32, 0f32);
        let mut last = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            let glyph = id.with_scale_and_position(self.scale, point(caret, scaled.ascent()));
            caret += scaled.h_advance(id);
            if let Some(outline) = scaled.outline_glyph(glyph) {
                if let Some(prev) = last {
                    caret += scaled.kern(id, prev);
                }
                last = Some(id);
                let bounds = outline.px_bounds();
                right = right.max(bounds.max.x);
                bottom = bottom.max(bounds.max.y);
            }
        }

        TextExtent {
            width: caret.max(right).ceil() as u32,
            height: scaled.height().max(bottom).ceil() as u32,
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw(&self, canvas: &mut RgbImage, color: [u8; 3], x: i32, y: i32, text: &str) {
        imageproc::drawing::draw_text_mut(canvas, Rgb(color), x, y, self.scale, &self.font, text);
    }
}

fn validate_size(size_px: f32) -> TicketTockResult<PxScale> {
    if !size_px.is_finite() || size_px <= 0.0 {
        return Err(TicketTockError::configuration(format!(
            "font size must be a positive number of pixels, got {size_px}"
        )));
    }
    Ok(PxScale::from(size_px))
}

/// Load a font file at `size_px`.
///
/// A missing or unparseable file is reported as an [`TicketTockError::AssetMissing`]
/// naming the path.
pub fn load_font(path: impl AsRef<Path>, size_px: f32) -> TicketTockResult<LoadedFont> {
    let path = path.as_ref();
    let scale = validate_size(size_px)?;

    let bytes = std::fs::read(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Font file not readable");
        TicketTockError::asset_missing("font", path)
    })?;
    let font = FontArc::try_from_vec(bytes).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Font file not parseable");
        TicketTockError::asset_missing("font (invalid font data)", path)
    })?;

    Ok(LoadedFont {
        font,
        scale,
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    })
}

/// Load the requested font, applying the fallback policy.
pub fn resolve_font(
    source: &FontSource,
    fallback: FontFallback,
    size_px: f32,
) -> TicketTockResult<LoadedFont> {
    match source {
        FontSource::Builtin => LoadedFont::builtin(size_px),
        FontSource::File(path) => match (load_font(path, size_px), fallback) {
            (Ok(font), _) => Ok(font),
            (Err(err @ TicketTockError::AssetMissing { .. }), FontFallback::Builtin) => {
                tracing::warn!(
                    error = %err,
                    fallback = BUILTIN_FONT_NAME,
                    "Configured font unavailable, using built-in font"
                );
                LoadedFont::builtin(size_px)
            }
            (Err(err), _) => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_font_measures_text() {
        let font = LoadedFont::builtin(24.0).unwrap();
        let short = font.measure("1");
        let long = font.measure("11:11:11 AM");
        assert!(long.width > short.width);
        assert!(short.height >= 24 && short.height <= 32);
    }

    #[test]
    fn test_measured_box_contains_all_ink() {
        let font = LoadedFont::builtin(40.0).unwrap();
        for text in ["W", "Wednesday, Sep 27, 2023", "11:11:11 PM", "07:59:59"] {
            let extent = font.measure(text);
            let mut canvas = RgbImage::from_pixel(extent.width + 40, extent.height + 40, Rgb([255; 3]));
            font.draw(&mut canvas, [0, 0, 0], 20, 20, text);

            for (x, y, pixel) in canvas.enumerate_pixels() {
                if pixel != &Rgb([255; 3]) {
                    assert!(x < 20 + extent.width, "'{text}' inks column {x} past {}", extent.width);
                    assert!(y < 20 + extent.height, "'{text}' inks row {y} past {}", extent.height);
                }
            }
        }
    }

    #[test]
    fn test_measurement_scales_with_size() {
        let small = LoadedFont::builtin(12.0).unwrap().measure("Monday");
        let large = LoadedFont::builtin(48.0).unwrap().measure("Monday");
        assert!(large.width > small.width * 3);
    }

    #[test]
    fn test_missing_font_names_the_path() {
        let err = load_font("/definitely/not/here.ttf", 24.0).unwrap_err();
        match err {
            TicketTockError::AssetMissing { path, .. } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.ttf"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fallback_policy_is_explicit() {
        let source = FontSource::File(PathBuf::from("/definitely/not/here.ttf"));
        assert!(resolve_font(&source, FontFallback::Fail, 24.0).is_err());

        let font = resolve_font(&source, FontFallback::Builtin, 24.0).unwrap();
        assert_eq!(font.name(), BUILTIN_FONT_NAME);
        assert_eq!(font.size_px(), 24.0);
    }

    #[test]
    fn test_invalid_font_data_is_asset_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(
            load_font(&path, 24.0),
            Err(TicketTockError::AssetMissing { .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_size() {
        assert!(matches!(
            LoadedFont::builtin(0.0),
            Err(TicketTockError::Configuration { .. })
        ));
    }
}
