//! Pixel-level page comparison.
//!
//! Every pixel of the first page is compared to the pixel at the same
//! coordinate of the second page by exact RGBA equality. Equal pixels are
//! kept as they are, so unchanged content stays readable in the diff image.
//! A changed pixel becomes opaque red when the first page is brighter there
//! and opaque blue otherwise, ties included.
//!
//! The diff is sized to the first page. Where the second page is smaller,
//! its missing pixels read as transparent black, the same value the blank
//! substitute page is made of.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Luma weight of the red channel, in thousandths.
pub const LUMA_RED_WEIGHT: u32 = 299;
/// Luma weight of the green channel, in thousandths.
pub const LUMA_GREEN_WEIGHT: u32 = 587;
/// Luma weight of the blue channel, in thousandths.
pub const LUMA_BLUE_WEIGHT: u32 = 114;
/// Divisor bringing the weighted sum back to the 0–255 range.
pub const LUMA_SCALE: u32 = 1000;

/// Marks pixels where the first page is brighter.
pub const FIRST_BRIGHTER: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Marks pixels where the second page is brighter or equally bright.
pub const SECOND_BRIGHTER: Rgba<u8> = Rgba([0, 0, 255, 255]);

const OUT_OF_BOUNDS: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Integer luma approximation of an 8-bit pixel; alpha is ignored.
pub fn brightness(c: &Rgba<u8>) -> u32 {
    let [r, g, b, _] = c.0;
    (LUMA_RED_WEIGHT * r as u32 + LUMA_GREEN_WEIGHT * g as u32 + LUMA_BLUE_WEIGHT * b as u32)
        / LUMA_SCALE
}

/// Pixel counts of one diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Pixels whose value differs between the two pages.
    pub changed: u64,
    /// Changed pixels marked red.
    pub first_brighter: u64,
    /// Changed pixels marked blue.
    pub second_brighter: u64,
}

impl DiffSummary {
    pub fn is_identical(&self) -> bool {
        self.changed == 0
    }
}

/// Compare one pixel pair.
pub fn diff_pixel(c1: &Rgba<u8>, c2: &Rgba<u8>) -> Rgba<u8> {
    if c1 == c2 {
        *c1
    } else if brightness(c1) > brightness(c2) {
        FIRST_BRIGHTER
    } else {
        SECOND_BRIGHTER
    }
}

/// Build the diff image of `first` against `second`.
pub fn diff_pages(first: &RgbaImage, second: &RgbaImage) -> (RgbaImage, DiffSummary) {
    let (w, h) = first.dimensions();
    let (w2, h2) = second.dimensions();
    let mut summary = DiffSummary::default();

    let out = RgbaImage::from_fn(w, h, |x, y| {
        let c1 = first.get_pixel(x, y);
        let c2 = if x < w2 && y < h2 {
            second.get_pixel(x, y)
        } else {
            &OUT_OF_BOUNDS
        };
        let px = diff_pixel(c1, c2);
        if c1 != c2 {
            summary.changed += 1;
            if px == FIRST_BRIGHTER {
                summary.first_brighter += 1;
            } else {
                summary.second_brighter += 1;
            }
        }
        px
    });

    (out, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(px))
    }

    #[test]
    fn brightness_uses_integer_luma() {
        assert_eq!(brightness(&Rgba([255, 255, 255, 255])), 255);
        assert_eq!(brightness(&Rgba([0, 0, 0, 0])), 0);
        assert_eq!(brightness(&Rgba([200, 200, 200, 255])), 200);
        // (299*10 + 587*20 + 114*30) / 1000 = 18150 / 1000
        assert_eq!(brightness(&Rgba([10, 20, 30, 255])), 18);
    }

    #[test]
    fn brighter_first_pixel_is_red() {
        let c1 = Rgba([200, 200, 200, 255]);
        let c2 = Rgba([50, 50, 50, 255]);
        assert_eq!(diff_pixel(&c1, &c2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn brighter_second_pixel_is_blue() {
        let c1 = Rgba([50, 50, 50, 255]);
        let c2 = Rgba([200, 200, 200, 255]);
        assert_eq!(diff_pixel(&c1, &c2), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn equal_pixels_are_kept() {
        let c = Rgba([10, 20, 30, 255]);
        assert_eq!(diff_pixel(&c, &c), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn equal_brightness_breaks_tie_to_blue() {
        // Same colour, different alpha: pixels differ, brightness is equal.
        let c1 = Rgba([10, 20, 30, 255]);
        let c2 = Rgba([10, 20, 30, 128]);
        assert_eq!(brightness(&c1), brightness(&c2));
        assert_eq!(diff_pixel(&c1, &c2), SECOND_BRIGHTER);

        // Different colours, same integer luma.
        let c1 = Rgba([1, 0, 0, 255]);
        let c2 = Rgba([0, 0, 1, 255]);
        assert_eq!(brightness(&c1), brightness(&c2));
        assert_eq!(diff_pixel(&c1, &c2), SECOND_BRIGHTER);
    }

    #[test]
    fn diff_of_image_with_itself_is_the_image() {
        let img = RgbaImage::from_fn(16, 9, |x, y| Rgba([x as u8 * 10, y as u8 * 20, 7, 255]));
        let (out, summary) = diff_pages(&img, &img);
        assert_eq!(out, img);
        assert!(summary.is_identical());
    }

    #[test]
    fn diff_marks_only_changed_pixels() {
        let first = solid(4, 4, [255, 255, 255, 255]);
        let mut second = first.clone();
        second.put_pixel(1, 2, Rgba([0, 0, 0, 255]));
        second.put_pixel(3, 0, Rgba([255, 255, 255, 0]));

        let (out, summary) = diff_pages(&first, &second);
        assert_eq!(*out.get_pixel(1, 2), FIRST_BRIGHTER);
        assert_eq!(*out.get_pixel(3, 0), SECOND_BRIGHTER);
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(summary.changed, 2);
        assert_eq!(summary.first_brighter, 1);
        assert_eq!(summary.second_brighter, 1);
    }

    #[test]
    fn output_is_sized_to_first_page() {
        let (out, _) = diff_pages(&solid(10, 20, [9, 9, 9, 255]), &solid(30, 5, [9, 9, 9, 255]));
        assert_eq!(out.dimensions(), (10, 20));
    }

    #[test]
    fn smaller_second_page_is_padded_with_transparent_black() {
        let first = solid(4, 4, [255, 255, 255, 255]);
        let second = solid(2, 2, [255, 255, 255, 255]);
        let (out, summary) = diff_pages(&first, &second);

        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*out.get_pixel(3, 3), FIRST_BRIGHTER);
        assert_eq!(summary.changed, 12);

        // A transparent first-page pixel matches the padding exactly.
        let first = solid(3, 3, [0, 0, 0, 0]);
        let (out, summary) = diff_pages(&first, &solid(1, 1, [0, 0, 0, 0]));
        assert!(summary.is_identical());
        assert_eq!(*out.get_pixel(2, 2), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn page_against_blank_substitute() {
        let page = solid(5, 5, [255, 255, 255, 255]);
        let blank = RgbaImage::new(5, 5);
        let (out, summary) = diff_pages(&page, &blank);
        assert!(out.pixels().all(|p| *p == FIRST_BRIGHTER));
        assert_eq!(summary.first_brighter, 25);

        let (out, _) = diff_pages(&blank, &page);
        assert!(out.pixels().all(|p| *p == SECOND_BRIGHTER));
    }
}
