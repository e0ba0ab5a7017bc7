//! Side-by-side composition of the two source pages.

use crate::config::StackDirection;
use image::{imageops, RgbaImage};

/// Canvas size for stacking `first` and `second` in `direction`.
pub fn composite_size(
    first: (u32, u32),
    second: (u32, u32),
    direction: StackDirection,
) -> (u32, u32) {
    let ((w1, h1), (w2, h2)) = (first, second);
    match direction {
        StackDirection::Horizontal => (w1 + w2, h1.max(h2)),
        StackDirection::Vertical => (w1.max(w2), h1 + h2),
    }
}

/// Place `first` at the origin and `second` right of it (or below it).
///
/// Pixels are copied, not blended. Canvas area covered by neither page
/// stays transparent black.
pub fn compose(first: &RgbaImage, second: &RgbaImage, direction: StackDirection) -> RgbaImage {
    let (w, h) = composite_size(first.dimensions(), second.dimensions(), direction);
    let mut canvas = RgbaImage::new(w, h);

    imageops::replace(&mut canvas, first, 0, 0);
    let (x, y) = match direction {
        StackDirection::Horizontal => (first.width() as i64, 0),
        StackDirection::Vertical => (0, first.height() as i64),
    };
    imageops::replace(&mut canvas, second, x, y);

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const EMPTY: Rgba<u8> = Rgba([0, 0, 0, 0]);

    #[test]
    fn horizontal_sums_widths() {
        assert_eq!(
            composite_size((100, 50), (30, 80), StackDirection::Horizontal),
            (130, 80)
        );
    }

    #[test]
    fn vertical_sums_heights() {
        assert_eq!(
            composite_size((100, 50), (30, 80), StackDirection::Vertical),
            (100, 130)
        );
    }

    #[test]
    fn horizontal_places_second_after_first() {
        let first = RgbaImage::from_pixel(4, 2, RED);
        let second = RgbaImage::from_pixel(3, 5, GREEN);
        let out = compose(&first, &second, StackDirection::Horizontal);

        assert_eq!(out.dimensions(), (7, 5));
        assert_eq!(*out.get_pixel(3, 1), RED);
        assert_eq!(*out.get_pixel(4, 0), GREEN);
        assert_eq!(*out.get_pixel(6, 4), GREEN);
        // Below the shorter first page nothing was drawn.
        assert_eq!(*out.get_pixel(0, 4), EMPTY);
    }

    #[test]
    fn vertical_places_second_below_first() {
        let first = RgbaImage::from_pixel(4, 2, RED);
        let second = RgbaImage::from_pixel(6, 3, GREEN);
        let out = compose(&first, &second, StackDirection::Vertical);

        assert_eq!(out.dimensions(), (6, 5));
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(0, 2), GREEN);
        assert_eq!(*out.get_pixel(5, 4), GREEN);
        assert_eq!(*out.get_pixel(5, 0), EMPTY);
    }

    #[test]
    fn transparent_pixels_are_copied_not_blended() {
        let first = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0]));
        let second = RgbaImage::from_pixel(2, 2, RED);
        let out = compose(&first, &second, StackDirection::Horizontal);
        assert_eq!(*out.get_pixel(0, 0), Rgba([10, 20, 30, 0]));
    }
}
