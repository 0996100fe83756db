//! The overlay layout: where the clock, countdown, and status bar go.
//!
//! A [`LayoutSpec`] is authored once (or loaded from JSON) and resolved
//! per request against the uploaded image's dimensions. Resolution checks
//! every region against the image bounds and every text anchor against
//! its erase box, so rendering never starts with an impossible layout.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decoration::{DecorationSpec, ResolvedDecoration};
use crate::region::{Coord, PixelRect, Region};
use crate::LayoutError;

/// An 8-bit RGB color.
pub type Rgb8 = [u8; 3];

/// Vertical placement of a text block. Horizontal placement is always
/// centered on the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextAnchor {
    /// Top of the first line.
    pub top: Coord,
}

impl TextAnchor {
    pub const fn new(top: Coord) -> Self {
        Self { top }
    }
}

/// Colors used by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    /// Erase-box fill.
    pub background: Rgb8,
    /// Clock and countdown text.
    pub text: Rgb8,
    /// Status bar fill when visible.
    pub bar: Rgb8,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: [255, 255, 255],
            text: [0, 0, 0],
            bar: [0, 0, 255],
        }
    }
}

/// Full overlay layout, relative to image size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSpec {
    /// Erase box behind the two-line clock.
    pub timestamp_region: Region,
    /// Top of the clock's first line.
    pub timestamp_anchor: TextAnchor,
    /// Extra pixels between the clock's two lines.
    #[serde(default = "default_line_spacing")]
    pub line_spacing: u32,
    /// Erase box behind the countdown.
    pub countdown_region: Region,
    /// Top of the countdown line.
    pub countdown_anchor: TextAnchor,
    /// The blinking status bar.
    pub blink_bar_region: Region,
    /// Whether the bar shows on even frames (odd frames otherwise).
    #[serde(default = "default_true")]
    pub bar_visible_on_even: bool,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub decoration: Option<DecorationSpec>,
}

fn default_line_spacing() -> u32 {
    6
}

fn default_true() -> bool {
    true
}

impl Default for LayoutSpec {
    /// Bottom-anchored layout: clock, countdown, then a full-width bar
    /// 50 px in from each side.
    fn default() -> Self {
        Self {
            timestamp_region: Region::new(
                Coord::start(40),
                Coord::end(-230),
                Coord::end(-40),
                Coord::end(-126),
            ),
            timestamp_anchor: TextAnchor::new(Coord::end(-222)),
            line_spacing: default_line_spacing(),
            countdown_region: Region::new(
                Coord::start(40),
                Coord::end(-122),
                Coord::end(-40),
                Coord::end(-84),
            ),
            countdown_anchor: TextAnchor::new(Coord::end(-118)),
            blink_bar_region: Region::new(
                Coord::start(50),
                Coord::end(-80),
                Coord::end(-50),
                Coord::end(-60),
            ),
            bar_visible_on_even: true,
            palette: Palette::default(),
            decoration: None,
        }
    }
}

impl LayoutSpec {
    /// Load a layout from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| LayoutError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| LayoutError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Serialize as pretty JSON.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Resolve every region for an image of `width` x `height`.
    pub fn resolve(&self, width: u32, height: u32) -> Result<ResolvedLayout, LayoutError> {
        let timestamp_region = self
            .timestamp_region
            .resolve("timestamp_region", width, height)?;
        let countdown_region = self
            .countdown_region
            .resolve("countdown_region", width, height)?;
        let blink_bar = self
            .blink_bar_region
            .resolve("blink_bar_region", width, height)?;

        let timestamp_top =
            resolve_anchor("timestamp_anchor", self.timestamp_anchor, height, &timestamp_region)?;
        let countdown_top =
            resolve_anchor("countdown_anchor", self.countdown_anchor, height, &countdown_region)?;

        let decoration = self
            .decoration
            .as_ref()
            .map(|d| d.resolve(width, height))
            .transpose()?;

        Ok(ResolvedLayout {
            width,
            height,
            timestamp_region,
            timestamp_top,
            line_spacing: self.line_spacing,
            countdown_region,
            countdown_top,
            blink_bar,
            bar_visible_on_even: self.bar_visible_on_even,
            palette: self.palette,
            decoration,
        })
    }
}

fn resolve_anchor(
    name: &str,
    anchor: TextAnchor,
    height: u32,
    region: &PixelRect,
) -> Result<u32, LayoutError> {
    let top = anchor.top.resolve(height);
    if top < 0 || !region.contains_row(top as u32) {
        return Err(LayoutError::AnchorOutsideRegion {
            anchor: name.to_string(),
            top,
        });
    }
    Ok(top as u32)
}

/// A layout resolved to absolute pixels for one image size.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayout {
    pub width: u32,
    pub height: u32,
    pub timestamp_region: PixelRect,
    pub timestamp_top: u32,
    pub line_spacing: u32,
    pub countdown_region: PixelRect,
    pub countdown_top: u32,
    pub blink_bar: PixelRect,
    pub bar_visible_on_even: bool,
    pub palette: Palette,
    pub decoration: Option<ResolvedDecoration>,
}

impl ResolvedLayout {
    /// Whether the status bar is shown on frame `index`.
    pub fn bar_visible(&self, index: u32) -> bool {
        (index % 2 == 0) == self.bar_visible_on_even
    }
}
