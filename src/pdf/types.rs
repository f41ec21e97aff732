//! Core geometry and page types for region selection

use serde::{Deserialize, Serialize};

use super::viewport::Viewport;

/// Quarter-turn rotation, always clockwise from the page's upright orientation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Snap arbitrary degrees to the nearest quarter turn, normalized into [0, 360)
    #[must_use]
    pub fn from_degrees(degrees: i32) -> Self {
        let snapped = ((degrees as f32 / 90.0).round() as i32).rem_euclid(4);
        match snapped {
            1 => Self::R90,
            2 => Self::R180,
            3 => Self::R270,
            _ => Self::R0,
        }
    }

    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// Rotate one quarter turn clockwise
    #[must_use]
    pub fn clockwise(self) -> Self {
        self.combine(Self::R90)
    }

    /// Rotate one quarter turn counter-clockwise
    #[must_use]
    pub fn counter_clockwise(self) -> Self {
        self.combine(Self::R270)
    }

    /// Sum of two rotations mod 360
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self::from_degrees(i32::from(self.degrees()) + i32::from(other.degrees()))
    }

    /// True for 90 and 270, where width and height trade places
    #[must_use]
    pub const fn is_quarter_turn(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Width and height in CSS pixels (or points, at scale 1)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Size after applying a rotation (swapped for quarter turns)
    #[must_use]
    pub fn rotated(self, rotation: Rotation) -> Self {
        if rotation.is_quarter_turn() {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }

    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }

    /// Both dimensions finite and strictly positive
    #[must_use]
    pub fn is_usable(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp into `[0, bounds.width] x [0, bounds.height]`
    #[must_use]
    pub fn clamp_to(self, bounds: Size) -> Self {
        Self::new(
            self.x.clamp(0.0, bounds.width.max(0.0)),
            self.y.clamp(0.0, bounds.height.max(0.0)),
        )
    }

    #[must_use]
    pub fn is_within(self, bounds: Size) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x <= bounds.width && self.y <= bounds.height
    }
}

/// Canonical rectangle in overlay pixel space.
///
/// `x`/`y` is always the top-left corner and `w`/`h` are never negative,
/// whatever direction the drag that produced it went.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl PixelRect {
    #[must_use]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Bounding box of two arbitrary corners
    #[must_use]
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            w: (a.x - b.x).abs(),
            h: (a.y - b.y).abs(),
        }
    }

    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    #[must_use]
    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[must_use]
    pub fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    /// Intersect with `[0, bounds]`, keeping the rectangle canonical
    #[must_use]
    pub fn clamp_to(&self, bounds: Size) -> Self {
        Self::from_corners(
            self.top_left().clamp_to(bounds),
            self.bottom_right().clamp_to(bounds),
        )
    }

    /// Multiply every coordinate by `factor` (used when zoom changes)
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(
            self.x * factor,
            self.y * factor,
            self.w * factor,
            self.h * factor,
        )
    }
}

/// Automatic scale tracking mode; `None` in the viewer state means manual zoom
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Whole page visible
    #[default]
    Page,
    /// Page width fills the container
    Width,
}

/// Descriptor of one page of a loaded document
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageInfo {
    /// Page number (1-based)
    pub number: usize,
    /// Unrotated page box size in points
    pub size: Size,
    /// Rotation stored in the document itself, independent of the user's
    pub baked_rotation: Rotation,
}

impl PageInfo {
    /// Baked rotation plus the user's rotation, mod 360
    #[must_use]
    pub fn effective_rotation(&self, user: Rotation) -> Rotation {
        self.baked_rotation.combine(user)
    }

    /// Page size at scale 1 as it appears on screen for the given user rotation
    #[must_use]
    pub fn displayed_size(&self, user: Rotation) -> Size {
        self.size.rotated(self.effective_rotation(user))
    }

    /// Viewport for `scale` and the user's rotation; baked rotation is folded in here
    #[must_use]
    pub fn viewport(&self, scale: f32, user: Rotation) -> Viewport {
        Viewport::new(self.size, scale, self.effective_rotation(user))
    }
}

/// Raw rendered page raster.
///
/// Pixel dimensions are the CSS dimensions multiplied by the device pixel
/// ratio, so `width_px` can exceed `css_size.width` on dense displays.
#[derive(Clone)]
pub struct RasterImage {
    /// Raw RGB pixel data (3 bytes per pixel: R, G, B)
    pub pixels: Vec<u8>,
    /// Buffer width in device pixels
    pub width_px: u32,
    /// Buffer height in device pixels
    pub height_px: u32,
}

impl RasterImage {
    /// Blank white raster of the given size
    #[must_use]
    pub fn blank(width_px: u32, height_px: u32) -> Self {
        Self {
            pixels: vec![0xFF; width_px as usize * height_px as usize * 3],
            width_px,
            height_px,
        }
    }
}

/// Complete rendered page, as delivered to the viewer
#[derive(Clone)]
pub struct RenderedPage {
    pub image: RasterImage,
    /// Page number (1-based)
    pub page: usize,
    /// Viewport the raster was produced for, in CSS pixels
    pub viewport: Viewport,
    /// Device pixel ratio the buffer was sized with
    pub device_pixel_ratio: f32,
}

impl std::fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedPage")
            .field("page", &self.page)
            .field("viewport", &self.viewport)
            .field("device_pixel_ratio", &self.device_pixel_ratio)
            .field("image.width_px", &self.image.width_px)
            .field("image.height_px", &self.image.height_px)
            .finish_non_exhaustive()
    }
}
