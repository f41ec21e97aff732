//! Pixel rectangle to extraction region conversion
//!
//! Two schemes are supported and must match what the OCR service expects:
//! absolute page points in the unrotated page box (origin bottom-left), or
//! fractions of the rotated viewport sent together with its rotation.

use serde::{Deserialize, Serialize};

use crate::pdf::{PixelRect, Point, Viewport};

/// Coordinate scheme of a region sent for extraction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionScheme {
    /// `x1,y1,x2,y2` in PDF points, independent of rotation
    #[default]
    Points,
    /// `x,y,w,h` in `[0, 1]` of the rotated viewport
    Fractional,
}

impl RegionScheme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Points => "points",
            Self::Fractional => "fractional",
        }
    }
}

impl std::fmt::Display for RegionScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Region of a page, in one of the two schemes
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Region {
    /// Minimum corner `(x1, y1)` and maximum corner `(x2, y2)` in points
    Points { x1: f32, y1: f32, x2: f32, y2: f32 },
    /// Top-left corner and size as fractions of the viewport
    Fractional { x: f32, y: f32, w: f32, h: f32 },
}

impl Region {
    /// Convert a pixel rectangle drawn over `viewport`.
    ///
    /// The rectangle is clamped to the viewport first, so a selection that
    /// hangs over the page edge never produces coordinates outside the page.
    #[must_use]
    pub fn from_pixels(rect: &PixelRect, viewport: &Viewport, scheme: RegionScheme) -> Self {
        let rect = rect.clamp_to(viewport.size());
        match scheme {
            RegionScheme::Points => {
                let (min, max) = viewport.rect_to_page(&rect);
                Self::Points {
                    x1: min.x,
                    y1: min.y,
                    x2: max.x,
                    y2: max.y,
                }
            }
            RegionScheme::Fractional => {
                if !viewport.size().is_usable() {
                    return Self::Fractional {
                        x: 0.0,
                        y: 0.0,
                        w: 0.0,
                        h: 0.0,
                    };
                }
                Self::Fractional {
                    x: rect.x / viewport.width,
                    y: rect.y / viewport.height,
                    w: rect.w / viewport.width,
                    h: rect.h / viewport.height,
                }
            }
        }
    }

    /// Map the region back onto `viewport` as a canonical pixel rectangle
    #[must_use]
    pub fn to_pixels(&self, viewport: &Viewport) -> PixelRect {
        match *self {
            Self::Points { x1, y1, x2, y2 } => {
                viewport.page_to_rect(Point::new(x1, y1), Point::new(x2, y2))
            }
            Self::Fractional { x, y, w, h } => PixelRect::new(
                x * viewport.width,
                y * viewport.height,
                w * viewport.width,
                h * viewport.height,
            ),
        }
    }

    #[must_use]
    pub fn scheme(&self) -> RegionScheme {
        match self {
            Self::Points { .. } => RegionScheme::Points,
            Self::Fractional { .. } => RegionScheme::Fractional,
        }
    }

    /// Multipart form fields describing the region
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match *self {
            Self::Points { x1, y1, x2, y2 } => vec![
                ("x1", format_coord(x1)),
                ("y1", format_coord(y1)),
                ("x2", format_coord(x2)),
                ("y2", format_coord(y2)),
            ],
            Self::Fractional { x, y, w, h } => vec![
                ("x", format_coord(x)),
                ("y", format_coord(y)),
                ("w", format_coord(w)),
                ("h", format_coord(h)),
            ],
        }
    }
}

fn format_coord(value: f32) -> String {
    let text = format!("{value:.4}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" || text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}
