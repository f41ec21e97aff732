//! Page viewport: pixel dimensions of a page at a scale and rotation,
//! plus the affine transform between page space and pixel space.
//!
//! Page space has its origin at the bottom-left of the unrotated page box,
//! y pointing up, in points. Pixel space has its origin at the top-left of
//! the rendered page, y pointing down, in CSS pixels.

use super::types::{PixelRect, Point, Rotation, Size};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Rendered width in CSS pixels
    pub width: f32,
    /// Rendered height in CSS pixels
    pub height: f32,
    pub scale: f32,
    /// Effective rotation (baked + user)
    pub rotation: Rotation,
    /// Unrotated page box size in points
    pub page_size: Size,
    /// `[a, b, c, d, e, f]`: pixel = (a*x + c*y + e, b*x + d*y + f)
    transform: [f32; 6],
}

impl Viewport {
    #[must_use]
    pub fn new(page_size: Size, scale: f32, rotation: Rotation) -> Self {
        let (a, b, c, d) = match rotation {
            Rotation::R0 => (1.0, 0.0, 0.0, -1.0),
            Rotation::R90 => (0.0, 1.0, 1.0, 0.0),
            Rotation::R180 => (-1.0, 0.0, 0.0, 1.0),
            Rotation::R270 => (0.0, -1.0, -1.0, 0.0),
        };

        let center_x = page_size.width / 2.0;
        let center_y = page_size.height / 2.0;

        let (offset_x, offset_y, width, height) = if rotation.is_quarter_turn() {
            (
                center_y * scale,
                center_x * scale,
                page_size.height * scale,
                page_size.width * scale,
            )
        } else {
            (
                center_x * scale,
                center_y * scale,
                page_size.width * scale,
                page_size.height * scale,
            )
        };

        let transform = [
            a * scale,
            b * scale,
            c * scale,
            d * scale,
            offset_x - a * scale * center_x - c * scale * center_y,
            offset_y - b * scale * center_x - d * scale * center_y,
        ];

        Self {
            width,
            height,
            scale,
            rotation,
            page_size,
            transform,
        }
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Page point (points, y up) to viewport pixel (CSS px, y down)
    #[must_use]
    pub fn to_viewport_point(&self, page: Point) -> Point {
        let [a, b, c, d, e, f] = self.transform;
        Point::new(a * page.x + c * page.y + e, b * page.x + d * page.y + f)
    }

    /// Viewport pixel back to a page point
    #[must_use]
    pub fn to_page_point(&self, pixel: Point) -> Point {
        let [a, b, c, d, e, f] = self.transform;
        let det = a * d - b * c;
        Point::new(
            (pixel.x * d - pixel.y * c + c * f - e * d) / det,
            (-pixel.x * b + pixel.y * a + e * b - f * a) / det,
        )
    }

    /// Pixel rectangle to page-space corners `(min, max)`, sorted per axis
    #[must_use]
    pub fn rect_to_page(&self, rect: &PixelRect) -> (Point, Point) {
        let p1 = self.to_page_point(rect.top_left());
        let p2 = self.to_page_point(rect.bottom_right());
        (
            Point::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            Point::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        )
    }

    /// Page-space corners back to a canonical pixel rectangle
    #[must_use]
    pub fn page_to_rect(&self, min: Point, max: Point) -> PixelRect {
        PixelRect::from_corners(self.to_viewport_point(min), self.to_viewport_point(max))
    }
}
