//! Manual zoom and scroll state for the page view
//!
//! Manages the zoom factor while the viewer is not tracking a fit mode,
//! and the scroll offset of the page inside its container.

use super::fit::{MAX_SCALE, normalize_scale};

/// Scroll direction for keyboard-style panning
#[derive(Clone, Copy, Debug)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Zoom and scroll state
#[derive(Debug, Clone, PartialEq)]
pub struct Zoom {
    /// Current zoom factor (1.0 = 100%)
    pub factor: f32,

    /// Horizontal scroll offset in CSS pixels
    pub scroll_left: f32,

    /// Vertical scroll offset in CSS pixels
    pub scroll_top: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            factor: 1.0,
            scroll_left: 0.0,
            scroll_top: 0.0,
        }
    }
}

impl Zoom {
    /// Fixed increment per zoom step
    pub const STEP: f32 = 0.1;

    /// Base scroll step in CSS pixels
    pub const SCROLL_STEP: f32 = 40.0;

    /// Returns the current zoom factor
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Zoom in by one step, returning true if the factor changed
    pub fn step_in(&mut self) -> bool {
        self.set(self.factor + Self::STEP)
    }

    /// Zoom out by one step, returning true if the factor changed
    pub fn step_out(&mut self) -> bool {
        self.set(self.factor - Self::STEP)
    }

    /// Set an explicit factor, clamped and rounded
    pub fn set(&mut self, factor: f32) -> bool {
        let next = normalize_scale(factor);
        if (next - self.factor).abs() > f32::EPSILON {
            self.factor = next;
            true
        } else {
            false
        }
    }

    pub fn at_max(&self) -> bool {
        self.factor >= MAX_SCALE
    }

    /// Scroll in the given direction, never past the top-left edge
    pub fn scroll(&mut self, direction: ScrollDirection) {
        match direction {
            ScrollDirection::Up => {
                self.scroll_top = (self.scroll_top - Self::SCROLL_STEP).max(0.0);
            }
            ScrollDirection::Down => {
                self.scroll_top += Self::SCROLL_STEP;
            }
            ScrollDirection::Left => {
                self.scroll_left = (self.scroll_left - Self::SCROLL_STEP).max(0.0);
            }
            ScrollDirection::Right => {
                self.scroll_left += Self::SCROLL_STEP;
            }
        }
    }

    /// Scroll back to the top-left corner
    pub fn reset_scroll(&mut self) {
        self.scroll_left = 0.0;
        self.scroll_top = 0.0;
    }
}
