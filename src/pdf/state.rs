//! Viewer state management
//!
//! Page number, scale, rotation and fit mode live here. Every mutation goes
//! through [`ViewerState::apply`], which returns the side effects the
//! orchestrator must carry out (render, clear selection, ...).

use log::debug;
use serde::{Deserialize, Serialize};

use super::fit::{compute_fit_scale, exceeds_epsilon};
use super::request::RenderParams;
use super::types::{FitMode, PageInfo, Rotation, Size};
use super::viewport::Viewport;
use super::zoom::{ScrollDirection, Zoom};

/// How the host decides light/dark appearance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    /// Follow the system color scheme
    #[default]
    Auto,
    Light,
    Dark,
}

/// Construction-time options for the viewer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerOptions {
    /// Fit mode applied when a document is opened
    pub default_fit_mode: FitMode,
    pub theme_mode: ThemeMode,
    pub device_pixel_ratio: f32,
    /// Minimum drag size, in CSS pixels, for a selection to count
    pub min_selection_px: f32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            default_fit_mode: FitMode::Page,
            theme_mode: ThemeMode::Auto,
            device_pixel_ratio: 1.0,
            min_selection_px: super::selection::DEFAULT_MIN_SELECTION,
        }
    }
}

/// Current viewer state for a document
#[derive(Clone, Debug)]
pub struct ViewerState {
    /// One slot per page, `None` where the descriptor could not be read.
    /// Empty when no document is open.
    pub pages: Vec<Option<PageInfo>>,

    /// Current page (1-based, 0 when no document is open)
    pub current_page: usize,

    /// Scale factor and scroll position
    pub zoom: Zoom,

    /// User rotation (the page's baked rotation is added at render time)
    pub rotation: Rotation,

    /// `None` means manual zoom
    pub fit_mode: Option<FitMode>,

    /// Last applied container box
    pub container: Option<Size>,

    /// Whether a render has been requested and not yet finished
    pub render_in_flight: bool,

    /// The page has been fitted and rendered at least once since opening
    pub visible: bool,

    pub device_pixel_ratio: f32,

    pub theme_mode: ThemeMode,

    /// Resize notifications coalesced until the next frame
    pending_container: Option<Size>,

    /// A refit was skipped because a render was in flight
    refit_deferred: bool,

    first_fit_done: bool,

    default_fit_mode: FitMode,
}

impl ViewerState {
    #[must_use]
    pub fn new(options: &ViewerOptions) -> Self {
        Self {
            pages: Vec::new(),
            current_page: 0,
            zoom: Zoom::default(),
            rotation: Rotation::R0,
            fit_mode: Some(options.default_fit_mode),
            container: None,
            render_in_flight: false,
            visible: false,
            device_pixel_ratio: options.device_pixel_ratio,
            theme_mode: options.theme_mode,
            pending_container: None,
            refit_deferred: false,
            first_fit_done: false,
            default_fit_mode: options.default_fit_mode,
        }
    }

    /// Current scale factor
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.zoom.factor()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Descriptor of the current page
    #[must_use]
    pub fn page(&self) -> Option<&PageInfo> {
        self.current_page
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx))
            .and_then(Option::as_ref)
    }

    /// Viewport of the current page at the current scale and rotation
    #[must_use]
    pub fn viewport(&self) -> Option<Viewport> {
        self.page().map(|p| p.viewport(self.scale(), self.rotation))
    }

    /// Whether the opening fit has happened
    #[must_use]
    pub fn first_fit_done(&self) -> bool {
        self.first_fit_done
    }

    /// Get render parameters from current state.
    ///
    /// Pages without a descriptor still get parameters, so the render
    /// engine reports their failure.
    #[must_use]
    pub fn render_params(&self) -> Option<RenderParams> {
        if self.current_page == 0 || self.current_page > self.pages.len() {
            return None;
        }
        Some(RenderParams {
            page: self.current_page,
            scale: self.scale(),
            rotation: self.rotation,
            device_pixel_ratio: self.device_pixel_ratio,
        })
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::DocumentLoaded(pages) => self.load(pages),

            Command::DocumentClosed => {
                let was_open = !self.pages.is_empty();
                self.reset(Vec::new());
                if was_open {
                    vec![
                        Effect::CancelRender,
                        Effect::ClearSelection,
                        Effect::InvalidateCache,
                    ]
                } else {
                    vec![]
                }
            }

            Command::GoToPage(page) => self.go_to_page(page),

            Command::NextPage => self.go_to_page(self.current_page.saturating_add(1)),

            Command::PrevPage => self.go_to_page(self.current_page.saturating_sub(1).max(1)),

            Command::ZoomIn => {
                let target = self.scale() + Zoom::STEP;
                self.manual_zoom(target)
            }

            Command::ZoomOut => {
                let target = self.scale() - Zoom::STEP;
                self.manual_zoom(target)
            }

            Command::SetScale(scale) => self.manual_zoom(scale),

            Command::SetFitMode(mode) => {
                self.fit_mode = Some(mode);
                if !self.first_fit_done {
                    return vec![];
                }
                let mut effects = vec![];
                self.refit(&mut effects, true);
                effects
            }

            Command::RotateClockwise => self.rotate(self.rotation.clockwise()),

            Command::RotateCounterClockwise => self.rotate(self.rotation.counter_clockwise()),

            Command::ContainerResized(size) => {
                if size.is_usable() {
                    self.pending_container = Some(size);
                }
                vec![]
            }

            Command::AnimationFrame => self.on_frame(),

            Command::RenderFinished { success } => {
                self.render_in_flight = false;
                let mut effects = vec![];
                if success && self.first_fit_done && !self.visible {
                    self.visible = true;
                    effects.push(Effect::Reveal);
                }
                if self.refit_deferred {
                    self.refit_deferred = false;
                    debug!("Running refit deferred during render");
                    self.refit(&mut effects, false);
                }
                effects
            }

            Command::ColorSchemeChanged => {
                if self.theme_mode != ThemeMode::Auto || !self.first_fit_done {
                    return vec![];
                }
                self.refit_unless_rendering()
            }

            Command::SetDevicePixelRatio(ratio) => {
                if !ratio.is_finite()
                    || ratio <= 0.0
                    || (ratio - self.device_pixel_ratio).abs() <= f32::EPSILON
                {
                    return vec![];
                }
                self.device_pixel_ratio = ratio;
                let mut effects = vec![Effect::InvalidateCache];
                self.request_render(&mut effects);
                effects
            }

            Command::Scroll(direction) => {
                self.zoom.scroll(direction);
                vec![]
            }
        }
    }

    fn reset(&mut self, pages: Vec<Option<PageInfo>>) {
        self.current_page = usize::from(!pages.is_empty());
        self.pages = pages;
        self.zoom = Zoom::default();
        self.rotation = Rotation::R0;
        self.fit_mode = Some(self.default_fit_mode);
        self.render_in_flight = false;
        self.visible = false;
        self.refit_deferred = false;
        self.first_fit_done = false;
    }

    fn load(&mut self, pages: Vec<Option<PageInfo>>) -> Vec<Effect> {
        if pages.is_empty() {
            return self.apply(Command::DocumentClosed);
        }

        self.reset(pages);
        let mut effects = vec![
            Effect::CancelRender,
            Effect::InvalidateCache,
            Effect::ClearSelection,
        ];

        if let Some(size) = self.pending_container.take() {
            self.container = Some(size);
        }
        if self.container.is_some() {
            self.first_fit(&mut effects);
        }
        effects
    }

    /// The one fit performed before the viewer becomes visible
    fn first_fit(&mut self, effects: &mut Vec<Effect>) {
        if let Some(scale) = self.fit_scale() {
            self.zoom.set(scale);
        }
        self.first_fit_done = true;
        debug!("First fit at scale {}", self.scale());
        self.request_render(effects);
    }

    fn on_frame(&mut self) -> Vec<Effect> {
        let Some(size) = self.pending_container.take() else {
            return vec![];
        };
        self.container = Some(size);

        if self.pages.is_empty() {
            return vec![];
        }

        if !self.first_fit_done {
            let mut effects = vec![];
            self.first_fit(&mut effects);
            return effects;
        }

        self.refit_unless_rendering()
    }

    fn refit_unless_rendering(&mut self) -> Vec<Effect> {
        if self.fit_mode.is_none() {
            return vec![];
        }
        if self.render_in_flight {
            debug!("Render in flight, deferring refit");
            self.refit_deferred = true;
            return vec![];
        }
        let mut effects = vec![];
        self.refit(&mut effects, false);
        effects
    }

    fn fit_scale(&self) -> Option<f32> {
        let mode = self.fit_mode?;
        let page = self.page()?;
        let container = self.container?;
        Some(compute_fit_scale(
            mode,
            page.displayed_size(self.rotation),
            container,
        ))
    }

    /// Recompute the fit scale; `force` bypasses the jitter epsilon
    fn refit(&mut self, effects: &mut Vec<Effect>, force: bool) -> bool {
        let Some(candidate) = self.fit_scale() else {
            return false;
        };
        let old = self.scale();
        if !force && !exceeds_epsilon(old, candidate) {
            return false;
        }
        if !self.zoom.set(candidate) {
            return false;
        }
        debug!("Fit scale {old} -> {}", self.scale());
        effects.push(Effect::RescaleSelection(self.scale() / old));
        self.request_render(effects);
        true
    }

    fn request_render(&mut self, effects: &mut Vec<Effect>) {
        if self.first_fit_done && !self.pages.is_empty() {
            self.render_in_flight = true;
            effects.push(Effect::RenderCurrentPage);
        }
    }

    fn go_to_page(&mut self, page: usize) -> Vec<Effect> {
        if self.pages.is_empty() {
            return vec![];
        }
        let clamped = page.clamp(1, self.pages.len());
        if clamped == self.current_page {
            return vec![];
        }
        self.current_page = clamped;
        self.zoom.reset_scroll();

        let mut effects = vec![Effect::ClearSelection];
        if self.first_fit_done {
            // Pages may differ in size, so fit tracking needs a new scale
            if !self.refit(&mut effects, true) {
                self.request_render(&mut effects);
            }
            effects.retain(|e| !matches!(e, Effect::RescaleSelection(_)));
        }
        effects
    }

    fn manual_zoom(&mut self, target: f32) -> Vec<Effect> {
        if self.pages.is_empty() {
            return vec![];
        }
        self.fit_mode = None;
        let old = self.scale();
        if !self.zoom.set(target) {
            return vec![];
        }
        let mut effects = vec![Effect::RescaleSelection(self.scale() / old)];
        self.request_render(&mut effects);
        effects
    }

    fn rotate(&mut self, rotation: Rotation) -> Vec<Effect> {
        if self.pages.is_empty() {
            return vec![];
        }
        self.rotation = rotation;
        self.zoom.reset_scroll();

        let mut effects = vec![Effect::ClearSelection];
        if self.first_fit_done {
            if self.fit_mode.is_some() {
                self.refit(&mut effects, true);
                effects.retain(|e| !matches!(e, Effect::RescaleSelection(_)));
            }
            if !effects.contains(&Effect::RenderCurrentPage) {
                self.request_render(&mut effects);
            }
        }
        effects
    }
}

/// Commands that modify viewer state
#[derive(Clone, Debug)]
pub enum Command {
    /// A document finished loading; `None` marks an unreadable page
    DocumentLoaded(Vec<Option<PageInfo>>),
    /// The viewer was closed or the source file changed
    DocumentClosed,
    /// Go to a specific page (1-based, clamped)
    GoToPage(usize),
    NextPage,
    PrevPage,
    ZoomIn,
    ZoomOut,
    /// Set an explicit manual scale
    SetScale(f32),
    /// Start tracking a fit mode
    SetFitMode(FitMode),
    RotateClockwise,
    RotateCounterClockwise,
    /// The container's available box changed (coalesced until the next frame)
    ContainerResized(Size),
    /// Animation frame tick: applies the latest coalesced resize
    AnimationFrame,
    /// The outstanding render completed, failed, or was dropped
    RenderFinished { success: bool },
    /// The host's preferred color scheme changed
    ColorSchemeChanged,
    SetDevicePixelRatio(f32),
    Scroll(ScrollDirection),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Render the current page with the current parameters
    RenderCurrentPage,
    /// Cancel any render in flight
    CancelRender,
    /// Drop the selection rectangle
    ClearSelection,
    /// Scale the selection rectangle by this factor
    RescaleSelection(f32),
    /// Invalidate every cached raster
    InvalidateCache,
    /// First fitted render is on screen; the viewer may be shown
    Reveal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(number: usize) -> Option<PageInfo> {
        Some(PageInfo {
            number,
            size: Size::new(600.0, 800.0),
            baked_rotation: Rotation::R0,
        })
    }

    fn loaded_state() -> ViewerState {
        let mut state = ViewerState::new(&ViewerOptions::default());
        let _ = state.apply(Command::ContainerResized(Size::new(1200.0, 800.0)));
        let effects = state.apply(Command::DocumentLoaded(vec![letter(1), letter(2)]));
        assert!(effects.contains(&Effect::RenderCurrentPage));
        let _ = state.apply(Command::RenderFinished { success: true });
        state
    }

    #[test]
    fn first_fit_waits_for_container() {
        let mut state = ViewerState::new(&ViewerOptions::default());
        let effects = state.apply(Command::DocumentLoaded(vec![letter(1)]));
        assert!(!effects.contains(&Effect::RenderCurrentPage));
        assert!(!state.first_fit_done());

        let _ = state.apply(Command::ContainerResized(Size::new(300.0, 400.0)));
        let effects = state.apply(Command::AnimationFrame);
        assert_eq!(effects, vec![Effect::RenderCurrentPage]);
        assert_eq!(state.scale(), 0.5);
        assert!(!state.visible);

        let effects = state.apply(Command::RenderFinished { success: true });
        assert_eq!(effects, vec![Effect::Reveal]);
        assert!(state.visible);
    }

    #[test]
    fn load_fits_page_and_starts_on_page_one() {
        let state = loaded_state();
        assert_eq!(state.current_page, 1);
        assert_eq!(state.scale(), 1.0);
        assert_eq!(state.fit_mode, Some(FitMode::Page));
        assert!(state.visible);
    }

    #[test]
    fn go_to_page_clamps() {
        let mut state = loaded_state();
        let effects = state.apply(Command::GoToPage(99));
        assert_eq!(state.current_page, 2);
        assert_eq!(
            effects,
            vec![Effect::ClearSelection, Effect::RenderCurrentPage]
        );

        let _ = state.apply(Command::RenderFinished { success: true });
        let _ = state.apply(Command::GoToPage(0));
        assert_eq!(state.current_page, 1);
        assert!(state.apply(Command::PrevPage).is_empty());
    }

    #[test]
    fn manual_zoom_leaves_fit_mode_and_rescales_selection() {
        let mut state = loaded_state();
        let effects = state.apply(Command::ZoomIn);
        assert_eq!(state.fit_mode, None);
        assert_eq!(state.scale(), 1.1);
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[0], Effect::RescaleSelection(f) if (f - 1.1).abs() < 1e-4));
        assert_eq!(effects[1], Effect::RenderCurrentPage);
    }

    #[test]
    fn manual_zoom_at_bound_is_a_no_op() {
        let mut state = loaded_state();
        let _ = state.apply(Command::SetScale(4.0));
        let _ = state.apply(Command::RenderFinished { success: true });
        assert!(state.apply(Command::ZoomIn).is_empty());
        assert_eq!(state.scale(), 4.0);
    }

    #[test]
    fn rotation_in_fit_mode_recomputes_with_swapped_size() {
        let mut state = loaded_state();
        let effects = state.apply(Command::RotateClockwise);
        assert_eq!(state.rotation, Rotation::R90);
        // 800x600 displayed page in a 1200x800 box
        assert_eq!(state.scale(), 1.33);
        assert_eq!(
            effects,
            vec![Effect::ClearSelection, Effect::RenderCurrentPage]
        );
    }

    #[test]
    fn rotation_in_manual_mode_keeps_scale() {
        let mut state = loaded_state();
        let _ = state.apply(Command::SetScale(2.0));
        let _ = state.apply(Command::RenderFinished { success: true });
        let effects = state.apply(Command::RotateCounterClockwise);
        assert_eq!(state.rotation, Rotation::R270);
        assert_eq!(state.scale(), 2.0);
        assert_eq!(
            effects,
            vec![Effect::ClearSelection, Effect::RenderCurrentPage]
        );
    }

    #[test]
    fn resizes_are_coalesced_per_frame() {
        let mut state = loaded_state();
        assert!(state.apply(Command::ContainerResized(Size::new(900.0, 600.0))).is_empty());
        assert!(state.apply(Command::ContainerResized(Size::new(600.0, 400.0))).is_empty());

        let effects = state.apply(Command::AnimationFrame);
        assert_eq!(state.scale(), 0.5);
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[1], Effect::RenderCurrentPage);

        assert!(state.apply(Command::AnimationFrame).is_empty());
    }

    #[test]
    fn tiny_resize_within_epsilon_is_ignored() {
        let mut state = loaded_state();
        let _ = state.apply(Command::ContainerResized(Size::new(1200.0, 808.0)));
        assert!(state.apply(Command::AnimationFrame).is_empty());
        assert_eq!(state.scale(), 1.0);
    }

    #[test]
    fn resize_during_render_is_deferred_until_it_finishes() {
        let mut state = loaded_state();
        let _ = state.apply(Command::RotateClockwise);
        assert!(state.render_in_flight);

        let _ = state.apply(Command::ContainerResized(Size::new(400.0, 300.0)));
        assert!(state.apply(Command::AnimationFrame).is_empty());
        assert_eq!(state.scale(), 1.33);

        let effects = state.apply(Command::RenderFinished { success: true });
        assert_eq!(state.scale(), 0.5);
        assert!(effects.contains(&Effect::RenderCurrentPage));
    }

    #[test]
    fn resize_in_manual_mode_does_nothing() {
        let mut state = loaded_state();
        let _ = state.apply(Command::SetScale(1.5));
        let _ = state.apply(Command::RenderFinished { success: true });
        let _ = state.apply(Command::ContainerResized(Size::new(300.0, 300.0)));
        assert!(state.apply(Command::AnimationFrame).is_empty());
        assert_eq!(state.scale(), 1.5);
    }

    #[test]
    fn color_scheme_change_only_matters_in_auto_theme() {
        let mut state = loaded_state();
        state.container = Some(Size::new(600.0, 400.0));
        let effects = state.apply(Command::ColorSchemeChanged);
        assert!(effects.contains(&Effect::RenderCurrentPage));

        let mut options = ViewerOptions::default();
        options.theme_mode = ThemeMode::Dark;
        let mut fixed = ViewerState::new(&options);
        let _ = fixed.apply(Command::ContainerResized(Size::new(1200.0, 800.0)));
        let _ = fixed.apply(Command::DocumentLoaded(vec![letter(1)]));
        let _ = fixed.apply(Command::RenderFinished { success: true });
        fixed.container = Some(Size::new(600.0, 400.0));
        assert!(fixed.apply(Command::ColorSchemeChanged).is_empty());
    }

    #[test]
    fn close_resets_everything() {
        let mut state = loaded_state();
        let effects = state.apply(Command::DocumentClosed);
        assert_eq!(
            effects,
            vec![
                Effect::CancelRender,
                Effect::ClearSelection,
                Effect::InvalidateCache
            ]
        );
        assert_eq!(state.current_page, 0);
        assert!(!state.visible);
        assert!(state.render_params().is_none());
    }

    #[test]
    fn unreadable_page_is_still_rendered_and_skips_fit() {
        let mut state = loaded_state();
        state.pages[1] = None;

        let effects = state.apply(Command::GoToPage(2));
        assert_eq!(
            effects,
            vec![Effect::ClearSelection, Effect::RenderCurrentPage]
        );
        assert_eq!(state.page(), None);
        assert_eq!(state.viewport(), None);
        assert_eq!(state.render_params().map(|p| p.page), Some(2));
        assert_eq!(state.scale(), 1.0);
    }

    #[test]
    fn dpr_change_invalidates_and_rerenders() {
        let mut state = loaded_state();
        let effects = state.apply(Command::SetDevicePixelRatio(2.0));
        assert_eq!(
            effects,
            vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
        );
        assert!(state.apply(Command::SetDevicePixelRatio(2.0)).is_empty());
        assert!(state.apply(Command::SetDevicePixelRatio(0.0)).is_empty());
    }
}
