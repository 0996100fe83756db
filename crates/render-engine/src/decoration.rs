//! Decorative patch and glyph substitution.
//!
//! Assets are loaded once per request, before the first frame renders, so
//! that a missing file fails the request instead of a frame halfway
//! through the clip.

use std::path::Path;

use image::{imageops, RgbImage, RgbaImage};
use tickettock_common::error::{TicketTockError, TicketTockResult};
use tickettock_layout::{PixelRect, ResolvedDecoration, ResolvedPatch};

use crate::blend::composite_over;

/// Decoration with its image assets loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadedDecoration {
    patch: Option<ResolvedPatch>,
    glyph: Option<PlacedLayer>,
    reference: Option<PlacedLayer>,
}

#[derive(Debug, Clone)]
struct PlacedLayer {
    pixels: RgbaImage,
    x: i64,
    y: i64,
}

impl LoadedDecoration {
    /// Load every asset named by `resolved`.
    pub fn load(resolved: &ResolvedDecoration) -> TicketTockResult<Self> {
        let glyph = resolved
            .glyph
            .as_ref()
            .map(|g| -> TicketTockResult<PlacedLayer> {
                let pixels = load_rgba("decoration glyph", &g.path)?;
                let (x, y) = centered_in(&g.region, pixels.width(), pixels.height());
                Ok(PlacedLayer { pixels, x, y })
            })
            .transpose()?;

        let reference = resolved
            .reference
            .as_ref()
            .map(|r| -> TicketTockResult<PlacedLayer> {
                let asset = load_rgba("decoration reference", &r.path)?;
                if !r.crop.fits_within(asset.width(), asset.height()) {
                    return Err(TicketTockError::configuration(format!(
                        "reference crop {:?} exceeds the {}x{} asset {}",
                        r.crop,
                        asset.width(),
                        asset.height(),
                        r.path.display()
                    )));
                }
                let pixels =
                    imageops::crop_imm(&asset, r.crop.x, r.crop.y, r.crop.width, r.crop.height)
                        .to_image();
                Ok(PlacedLayer {
                    pixels,
                    x: i64::from(r.dest.x),
                    y: i64::from(r.dest.y),
                })
            })
            .transpose()?;

        tracing::debug!(
            patch = resolved.patch.is_some(),
            glyph = glyph.is_some(),
            reference = reference.is_some(),
            "Decoration assets loaded"
        );

        Ok(Self {
            patch: resolved.patch.clone(),
            glyph,
            reference,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patch.is_none() && self.glyph.is_none() && self.reference.is_none()
    }

    /// Apply patch, glyph, then reference onto `canvas`.
    ///
    /// The patch is always copied from the untouched `base`.
    pub fn apply(&self, canvas: &mut RgbImage, base: &RgbImage) {
        if let Some(patch) = &self.patch {
            let src = patch.source;
            let mut pixels = imageops::crop_imm(base, src.x, src.y, src.width, src.height).to_image();
            if patch.mirror {
                imageops::flip_horizontal_in_place(&mut pixels);
            }
            imageops::replace(
                canvas,
                &pixels,
                i64::from(patch.target.x),
                i64::from(patch.target.y),
            );
        }
        for layer in [&self.glyph, &self.reference].into_iter().flatten() {
            composite_over(canvas, &layer.pixels, layer.x, layer.y);
        }
    }
}

fn centered_in(region: &PixelRect, width: u32, height: u32) -> (i64, i64) {
    let (cx, cy) = region.center();
    (
        i64::from(cx) - i64::from(width / 2),
        i64::from(cy) - i64::from(height / 2),
    )
}

fn load_rgba(asset: &str, path: &Path) -> TicketTockResult<RgbaImage> {
    let img = image::open(path).map_err(|e| {
        tracing::debug!(asset, path = %path.display(), error = %e, "Decoration asset not loadable");
        TicketTockError::asset_missing(asset, path)
    })?;
    Ok(img.to_rgba8())
}
