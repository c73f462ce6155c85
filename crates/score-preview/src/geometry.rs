//! Page geometry for crop-to-fill image placement.

/// Page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// ISO A4 portrait.
    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Where an image is drawn, in points from the page's lower-left corner.
///
/// The rectangle always covers the page; anything outside the page box is
/// clipped by the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale an image to cover `page` without letterboxing.
///
/// Images wider than the page match the page height and are centred
/// horizontally; all others match the page width and are centred vertically.
pub fn crop_to_fill(image_width: u32, image_height: u32, page: PageSize) -> Placement {
    if image_width == 0 || image_height == 0 {
        return Placement {
            x: 0.0,
            y: 0.0,
            width: page.width,
            height: page.height,
        };
    }

    let ratio = f64::from(image_width) / f64::from(image_height);

    if ratio > page.aspect_ratio() {
        let width = page.height * ratio;
        Placement {
            x: (page.width - width) / 2.0,
            y: 0.0,
            width,
            height: page.height,
        }
    } else {
        let height = page.width / ratio;
        Placement {
            x: 0.0,
            y: (page.height - height) / 2.0,
            width: page.width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_wide_image_matches_height() {
        let p = crop_to_fill(2000, 1000, PageSize::A4);
        assert!(close(p.height, 842.0));
        assert!(close(p.width, 1684.0));
        assert!(close(p.x, -544.5));
        assert!(close(p.y, 0.0));
    }

    #[test]
    fn test_tall_image_matches_width() {
        let p = crop_to_fill(1000, 2000, PageSize::A4);
        assert!(close(p.width, 595.0));
        assert!(close(p.height, 1190.0));
        assert!(close(p.x, 0.0));
        assert!(close(p.y, -174.0));
    }

    #[test]
    fn test_exact_page_ratio_fills() {
        let p = crop_to_fill(595, 842, PageSize::A4);
        assert!(close(p.width, 595.0));
        assert!(close(p.height, 842.0));
        assert!(close(p.x, 0.0));
        assert!(close(p.y, 0.0));
    }

    #[test]
    fn test_letter_scan_is_wider_than_a4() {
        // 8.5x11 at 150 dpi: ratio 0.773 > 0.707
        let p = crop_to_fill(1275, 1650, PageSize::A4);
        assert!(close(p.height, 842.0));
        let expected_w = 842.0 * (1275.0 / 1650.0);
        assert!(close(p.width, expected_w));
        assert!(close(p.x, (595.0 - expected_w) / 2.0));
        assert!(p.x < 0.0);
    }

    #[test]
    fn test_two_by_three_is_vertically_centred() {
        let p = crop_to_fill(1000, 1500, PageSize::A4);
        assert!(close(p.width, 595.0));
        assert!(close(p.height, 892.5));
        assert!(close(p.y, -25.25));
    }

    #[test]
    fn test_degenerate_image_fills_page() {
        let p = crop_to_fill(0, 10, PageSize::A4);
        assert_eq!(p.width, 595.0);
        assert_eq!(p.height, 842.0);
    }
}
