//! Drag-a-box selection over the rendered page overlay

use log::debug;

use super::types::{PixelRect, Point, Size};

/// Default minimum side length, in CSS pixels, for a drag to count
pub const DEFAULT_MIN_SELECTION: f32 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Drag tracker state
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    /// Button held; `anchor` is the clamped press position
    Dragging { anchor: Point },
}

/// Rectangle selection state.
///
/// Every coordinate fed in is clamped to the overlay bounds, so the pointer
/// may wander outside the overlay mid-drag and the rectangle stays valid.
/// Leaving the overlay does not end the drag; only a (global) release does.
#[derive(Clone, Debug)]
pub struct RegionSelection {
    /// Overlay size in CSS pixels
    bounds: Size,
    state: DragState,
    rect: Option<PixelRect>,
    min_size: f32,
}

impl RegionSelection {
    #[must_use]
    pub fn new(bounds: Size) -> Self {
        Self::with_min_size(bounds, DEFAULT_MIN_SELECTION)
    }

    #[must_use]
    pub fn with_min_size(bounds: Size, min_size: f32) -> Self {
        Self {
            bounds,
            state: DragState::Idle,
            rect: None,
            min_size,
        }
    }

    /// Start a drag. Ignored for non-primary buttons or presses outside the overlay.
    pub fn pointer_down(&mut self, point: Point, button: PointerButton) -> bool {
        if button != PointerButton::Primary || !point.is_within(self.bounds) {
            return false;
        }
        let anchor = point.clamp_to(self.bounds);
        self.state = DragState::Dragging { anchor };
        self.rect = Some(PixelRect::new(anchor.x, anchor.y, 0.0, 0.0));
        true
    }

    /// Update the rectangle while dragging; no-op when idle
    pub fn pointer_move(&mut self, point: Point) {
        if let DragState::Dragging { anchor } = self.state {
            self.rect = Some(PixelRect::from_corners(anchor, point.clamp_to(self.bounds)));
        }
    }

    /// Pointer left the overlay. The drag keeps going with clamped coordinates.
    pub fn pointer_leave(&mut self) {}

    /// Finish the drag. `point` is the release position if known; releases
    /// outside the overlay are clamped like moves.
    pub fn pointer_up(&mut self, point: Option<Point>) {
        if let Some(point) = point {
            self.pointer_move(point);
        }
        if !self.is_dragging() {
            return;
        }
        self.state = DragState::Idle;

        if let Some(rect) = self.rect {
            if rect.w < self.min_size && rect.h < self.min_size {
                debug!("Discarding stray click selection {rect:?}");
                self.rect = None;
            }
        }
    }

    /// Drop any selection and return to idle
    pub fn clear(&mut self) {
        self.state = DragState::Idle;
        self.rect = None;
    }

    /// Overlay was resized; existing coordinates are clamped into the new bounds
    pub fn set_bounds(&mut self, bounds: Size) {
        self.bounds = bounds;
        if let DragState::Dragging { anchor } = self.state {
            self.state = DragState::Dragging {
                anchor: anchor.clamp_to(bounds),
            };
        }
        self.rect = self.rect.map(|r| r.clamp_to(bounds));
    }

    /// Scale the selection along with the page (manual zoom) and adopt the new bounds
    pub fn rescale(&mut self, factor: f32, bounds: Size) {
        if !factor.is_finite() || factor <= 0.0 {
            self.clear();
            return;
        }
        if let DragState::Dragging { anchor } = self.state {
            self.state = DragState::Dragging {
                anchor: Point::new(anchor.x * factor, anchor.y * factor),
            };
        }
        self.rect = self.rect.map(|r| r.scaled(factor));
        self.set_bounds(bounds);
    }

    #[must_use]
    pub fn state(&self) -> DragState {
        self.state
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Current rectangle, including one still being dragged
    #[must_use]
    pub fn rect(&self) -> Option<PixelRect> {
        self.rect
    }

    #[must_use]
    pub fn bounds(&self) -> Size {
        self.bounds
    }

    /// A committed rectangle larger than the threshold on both axes
    #[must_use]
    pub fn can_extract(&self) -> bool {
        !self.is_dragging()
            && self
                .rect
                .is_some_and(|r| r.w > self.min_size && r.h > self.min_size)
    }
}
