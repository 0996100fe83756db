use proptest::prelude::*;

use tickettock_layout::{Coord, LayoutSpec, Region};

proptest! {
    #[test]
    fn resolved_regions_stay_inside_the_image(
        width in 1u32..4000,
        height in 1u32..4000,
        left in 0i32..200,
        right in 0i32..200,
        top in 0i32..200,
        bottom in 0i32..200,
    ) {
        let region = Region::new(
            Coord::start(left),
            Coord::start(top),
            Coord::end(-right),
            Coord::end(-bottom),
        );
        match region.resolve("r", width, height) {
            Ok(rect) => {
                prop_assert!(rect.fits_within(width, height));
                prop_assert!(rect.width > 0 && rect.height > 0);
                prop_assert_eq!(rect.x as i32, left);
                prop_assert_eq!(rect.y as i32, top);
            }
            Err(_) => {
                prop_assert!(
                    i64::from(left) + i64::from(right) >= i64::from(width)
                        || i64::from(top) + i64::from(bottom) >= i64::from(height)
                );
            }
        }
    }

    #[test]
    fn default_layout_regions_fit_whenever_it_resolves(width in 1u32..3000, height in 1u32..3000) {
        if let Ok(layout) = LayoutSpec::default().resolve(width, height) {
            for rect in [layout.timestamp_region, layout.countdown_region, layout.blink_bar] {
                prop_assert!(rect.fits_within(width, height));
            }
            prop_assert!(layout.timestamp_region.contains_row(layout.timestamp_top));
            prop_assert!(layout.countdown_region.contains_row(layout.countdown_top));
        }
    }
}
