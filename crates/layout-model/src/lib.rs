//! TicketTock Layout Model
//!
//! Defines where the overlay is drawn on an uploaded ticket:
//! - **Regions:** Rectangles whose edges are pixel offsets from the
//!   start, center, or end of each axis
//! - **Layout:** Named erase boxes, text anchors, the blink bar, and colors
//! - **Decoration:** Optional patch/glyph/reference substitution
//!
//! Layouts are resolved against the image size per request; resolution
//! rejects any region that leaves the image.

use std::path::PathBuf;

pub mod decoration;
pub mod layout;
pub mod region;

pub use decoration::*;
pub use layout::*;
pub use region::*;

/// Errors raised while loading or resolving a layout.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Region {region} {rect:?} lies outside the {width}x{height} image")]
    OutOfBounds {
        region: String,
        rect: (i64, i64, i64, i64),
        width: u32,
        height: u32,
    },

    #[error("Region {region} is empty")]
    Empty { region: String },

    #[error("Anchor {anchor} (top = {top}) is outside its erase region")]
    AnchorOutsideRegion { anchor: String, top: i64 },

    #[error("Invalid layout: {0}")]
    Invalid(String),

    #[error("Failed to read layout {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse layout {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
