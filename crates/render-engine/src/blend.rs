//! Source-over alpha compositing of straight-alpha RGBA onto opaque RGB.

use image::{RgbImage, RgbaImage};

/// Blend one straight-alpha source pixel over an opaque destination pixel.
pub fn over(dst: [u8; 3], src: [u8; 4]) -> [u8; 3] {
    let a = u16::from(src[3]);
    match a {
        0 => dst,
        255 => [src[0], src[1], src[2]],
        _ => {
            let inv = 255 - a;
            let mut out = [0u8; 3];
            for i in 0..3 {
                let c = mul_div255(u16::from(src[i]), a) + mul_div255(u16::from(dst[i]), inv);
                out[i] = c.min(255) as u8;
            }
            out
        }
    }
}

/// Composite `layer` onto `canvas` with its top-left corner at `(x, y)`.
///
/// Pixels falling outside the canvas are clipped.
pub fn composite_over(canvas: &mut RgbImage, layer: &RgbaImage, x: i64, y: i64) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for (lx, ly, px) in layer.enumerate_pixels() {
        let (dx, dy) = (x + i64::from(lx), y + i64::from(ly));
        if dx < 0 || dy < 0 || dx >= cw || dy >= ch {
            continue;
        }
        let dst = canvas.get_pixel_mut(dx as u32, dy as u32);
        dst.0 = over(dst.0, px.0);
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

#[cfg(test)]
mod tests {
    use image::{Rgb, Rgba};

    use super::*;

    #[test]
    fn test_transparent_source_is_noop() {
        assert_eq!(over([10, 20, 30], [200, 200, 200, 0]), [10, 20, 30]);
    }

    #[test]
    fn test_opaque_source_replaces() {
        assert_eq!(over([10, 20, 30], [200, 100, 50, 255]), [200, 100, 50]);
    }

    #[test]
    fn test_half_alpha_mixes() {
        let out = over([0, 0, 0], [255, 255, 255, 128]);
        assert_eq!(out, [128, 128, 128]);
    }

    #[test]
    fn test_composite_clips_to_canvas() {
        let mut canvas = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let layer = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));
        composite_over(&mut canvas, &layer, 2, -1);

        assert_eq!(canvas.get_pixel(2, 0), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(3, 1), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(3, 2), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }
}
