//! Optional decorative substitution.
//!
//! Some tickets carry a glyph that must be replaced: a patch of nearby
//! background is copied over it, a transparent replacement glyph is
//! composited on top, and a crop from a second reference asset can be
//! pasted at a fixed position. Asset paths are recorded here; loading and
//! compositing happen in the render engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::region::{PixelRect, Region};
use crate::LayoutError;

/// Background patch copied from the base image over a target region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSpec {
    /// Where the clean background is taken from.
    pub source: Region,
    /// Region to cover. Must match `source` in size.
    pub target: Region,
    /// Mirror the patch horizontally before pasting.
    #[serde(default)]
    pub mirror: bool,
}

/// A transparent image centered in a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphSpec {
    /// PNG (or other alpha-capable image) to composite.
    pub path: PathBuf,
    /// Region to center in. Defaults to the patch target.
    #[serde(default)]
    pub region: Option<Region>,
}

/// A crop of a reference asset pasted at absolute coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSpec {
    pub path: PathBuf,
    /// Rectangle within the reference asset.
    pub crop: PixelRect,
    /// Top-left destination in the frame.
    pub position: [u32; 2],
}

/// All decoration steps; each is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationSpec {
    #[serde(default)]
    pub patch: Option<PatchSpec>,
    #[serde(default)]
    pub glyph: Option<GlyphSpec>,
    #[serde(default)]
    pub reference: Option<ReferenceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPatch {
    pub source: PixelRect,
    pub target: PixelRect,
    pub mirror: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGlyph {
    pub path: PathBuf,
    pub region: PixelRect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub path: PathBuf,
    pub crop: PixelRect,
    pub dest: PixelRect,
}

/// Decoration resolved to absolute pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDecoration {
    pub patch: Option<ResolvedPatch>,
    pub glyph: Option<ResolvedGlyph>,
    pub reference: Option<ResolvedReference>,
}

impl ResolvedDecoration {
    pub fn is_empty(&self) -> bool {
        self.patch.is_none() && self.glyph.is_none() && self.reference.is_none()
    }
}

impl DecorationSpec {
    pub fn resolve(&self, width: u32, height: u32) -> Result<ResolvedDecoration, LayoutError> {
        let patch = self
            .patch
            .as_ref()
            .map(|p| -> Result<ResolvedPatch, LayoutError> {
                let source = p.source.resolve("decoration.patch.source", width, height)?;
                let target = p.target.resolve("decoration.patch.target", width, height)?;
                if (source.width, source.height) != (target.width, target.height) {
                    return Err(LayoutError::Invalid(format!(
                        "patch source is {}x{} but target is {}x{}",
                        source.width, source.height, target.width, target.height
                    )));
                }
                Ok(ResolvedPatch {
                    source,
                    target,
                    mirror: p.mirror,
                })
            })
            .transpose()?;

        let glyph = self
            .glyph
            .as_ref()
            .map(|g| -> Result<ResolvedGlyph, LayoutError> {
                let region = match (&g.region, &patch) {
                    (Some(region), _) => region.resolve("decoration.glyph.region", width, height)?,
                    (None, Some(patch)) => patch.target,
                    (None, None) => {
                        return Err(LayoutError::Invalid(
                            "glyph needs a region or a patch target to center in".to_string(),
                        ))
                    }
                };
                Ok(ResolvedGlyph {
                    path: g.path.clone(),
                    region,
                })
            })
            .transpose()?;

        let reference = self
            .reference
            .as_ref()
            .map(|r| -> Result<ResolvedReference, LayoutError> {
                if r.crop.width == 0 || r.crop.height == 0 {
                    return Err(LayoutError::Empty {
                        region: "decoration.reference.crop".to_string(),
                    });
                }
                let dest = PixelRect::new(r.position[0], r.position[1], r.crop.width, r.crop.height);
                if !dest.fits_within(width, height) {
                    return Err(LayoutError::OutOfBounds {
                        region: "decoration.reference".to_string(),
                        rect: (
                            i64::from(dest.x),
                            i64::from(dest.y),
                            dest.right() as i64,
                            dest.bottom() as i64,
                        ),
                        width,
                        height,
                    });
                }
                Ok(ResolvedReference {
                    path: r.path.clone(),
                    crop: r.crop,
                    dest,
                })
            })
            .transpose()?;

        Ok(ResolvedDecoration {
            patch,
            glyph,
            reference,
        })
    }

    /// Every asset file this decoration reads, with a label.
    pub fn asset_paths(&self) -> Vec<(&'static str, &PathBuf)> {
        let mut paths = Vec::new();
        if let Some(glyph) = &self.glyph {
            paths.push(("decoration glyph", &glyph.path));
        }
        if let Some(reference) = &self.reference {
            paths.push(("decoration reference", &reference.path));
        }
        paths
    }
}
