//! Coordinate and region types for overlay placement.
//!
//! Layouts are authored relative to the image size so that one layout
//! works across tickets of different resolutions. A [`Coord`] is a pixel
//! offset from the start, center, or end of an axis; a [`Region`] is four
//! such coordinates. Both resolve to absolute pixels once `(W, H)` is known.

use serde::{Deserialize, Serialize};

use crate::LayoutError;

/// Reference point along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Left or top edge.
    Start,
    /// Midpoint of the axis.
    Center,
    /// Right or bottom edge.
    End,
}

/// A pixel position along one axis, relative to an [`Origin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub from: Origin,
    pub offset: i32,
}

impl Coord {
    /// `offset` pixels from the left/top edge.
    pub const fn start(offset: i32) -> Self {
        Self {
            from: Origin::Start,
            offset,
        }
    }

    /// `offset` pixels from the axis midpoint.
    pub const fn center(offset: i32) -> Self {
        Self {
            from: Origin::Center,
            offset,
        }
    }

    /// `offset` pixels from the right/bottom edge (usually negative).
    pub const fn end(offset: i32) -> Self {
        Self {
            from: Origin::End,
            offset,
        }
    }

    /// Absolute position for an axis of the given extent. May fall outside
    /// `[0, extent]`; callers validate.
    pub fn resolve(&self, extent: u32) -> i64 {
        let base = match self.from {
            Origin::Start => 0,
            Origin::Center => i64::from(extent) / 2,
            Origin::End => i64::from(extent),
        };
        base + i64::from(self.offset)
    }
}

/// A rectangle described by relative edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub left: Coord,
    pub top: Coord,
    pub right: Coord,
    pub bottom: Coord,
}

impl Region {
    pub const fn new(left: Coord, top: Coord, right: Coord, bottom: Coord) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Resolve against an image of `width` x `height`.
    ///
    /// Fails when the region is empty or leaves `[0, W] x [0, H]`.
    pub fn resolve(&self, name: &str, width: u32, height: u32) -> Result<PixelRect, LayoutError> {
        let left = self.left.resolve(width);
        let top = self.top.resolve(height);
        let right = self.right.resolve(width);
        let bottom = self.bottom.resolve(height);

        if left < 0 || top < 0 || right > i64::from(width) || bottom > i64::from(height) {
            return Err(LayoutError::OutOfBounds {
                region: name.to_string(),
                rect: (left, top, right, bottom),
                width,
                height,
            });
        }
        if right <= left || bottom <= top {
            return Err(LayoutError::Empty {
                region: name.to_string(),
            });
        }

        Ok(PixelRect::new(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ))
    }
}

/// An absolute, non-empty pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge. Widened so user-supplied origins cannot wrap.
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }

    /// Center pixel.
    pub fn center(&self) -> (u32, u32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    /// Whether a signed box `(x, y, w, h)` lies fully inside this rectangle.
    pub fn contains_box(&self, x: i64, y: i64, width: u32, height: u32) -> bool {
        x >= i64::from(self.x)
            && y >= i64::from(self.y)
            && x + i64::from(width) <= self.right() as i64
            && y + i64::from(height) <= self.bottom() as i64
    }

    /// Whether a row lies within the vertical span of this rectangle.
    pub fn contains_row(&self, y: u32) -> bool {
        y >= self.y && u64::from(y) < self.bottom()
    }

    /// Whether this rectangle fits inside a `width` x `height` image.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= u64::from(width) && self.bottom() <= u64::from(height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_resolution() {
        assert_eq!(Coord::start(50).resolve(800), 50);
        assert_eq!(Coord::center(-150).resolve(800), 250);
        assert_eq!(Coord::end(-80).resolve(600), 520);
    }

    #[test]
    fn test_region_resolves_relative_to_size() {
        let bar = Region::new(
            Coord::start(50),
            Coord::end(-80),
            Coord::end(-50),
            Coord::end(-60),
        );
        let rect = bar.resolve("bar", 800, 600).unwrap();
        assert_eq!(rect, PixelRect::new(50, 520, 700, 20));
        assert_eq!(rect.center(), (400, 530));
    }

    #[test]
    fn test_region_outside_image_is_rejected() {
        let region = Region::new(
            Coord::start(-1),
            Coord::start(0),
            Coord::end(0),
            Coord::end(0),
        );
        assert!(matches!(
            region.resolve("r", 100, 100),
            Err(LayoutError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_edges_near_u32_max_do_not_wrap() {
        let rect = PixelRect::new(u32::MAX - 2, 0, 10, 10);
        assert_eq!(rect.right(), u64::from(u32::MAX) + 8);
        assert!(!rect.fits_within(800, 600));
        assert!(!rect.contains_box(0, 0, 1, 1));
        assert!(!PixelRect::new(0, u32::MAX, 1, 5).contains_row(4));
    }

    #[test]
    fn test_empty_region_is_rejected() {
        let region = Region::new(
            Coord::start(10),
            Coord::start(10),
            Coord::start(10),
            Coord::start(20),
        );
        assert!(matches!(
            region.resolve("r", 100, 100),
            Err(LayoutError::Empty { .. })
        ));
    }

    #[test]
    fn test_contains_box() {
        let rect = PixelRect::new(10, 10, 100, 50);
        assert!(rect.contains_box(10, 10, 100, 50));
        assert!(!rect.contains_box(9, 10, 10, 10));
        assert!(!rect.contains_box(50, 40, 10, 21));
    }
}
