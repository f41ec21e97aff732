//! Fit-to-container scale calculation

use super::types::{FitMode, Size};

/// Smallest scale the viewer will render at
pub const MIN_SCALE: f32 = 0.25;
/// Largest scale the viewer will render at
pub const MAX_SCALE: f32 = 4.0;
/// Scale changes below this are ignored to avoid render thrashing
pub const FIT_EPSILON: f32 = 0.02;

/// Clamp into `[MIN_SCALE, MAX_SCALE]` and round to 1/100, handling NaN/Inf
#[must_use]
pub fn normalize_scale(scale: f32) -> f32 {
    if !scale.is_finite() {
        return 1.0;
    }
    let rounded = (scale * 100.0).round() / 100.0;
    rounded.clamp(MIN_SCALE, MAX_SCALE)
}

/// Scale that fits a page into `available`.
///
/// `page_size` is the page's size at scale 1 *after* the effective rotation
/// is applied (see [`super::PageInfo::displayed_size`]). Degenerate inputs
/// fall back to scale 1.
#[must_use]
pub fn compute_fit_scale(mode: FitMode, page_size: Size, available: Size) -> f32 {
    if !page_size.is_usable() || !available.is_usable() {
        return normalize_scale(1.0);
    }

    let width_ratio = available.width / page_size.width;
    let raw = match mode {
        FitMode::Width => width_ratio,
        FitMode::Page => width_ratio.min(available.height / page_size.height),
    };

    normalize_scale(raw)
}

/// Whether a freshly computed scale differs enough to be worth a re-render.
///
/// Compared in whole hundredths, the unit scales are rounded to.
#[must_use]
pub fn exceeds_epsilon(current: f32, candidate: f32) -> bool {
    ((candidate - current).abs() * 100.0).round() >= (FIT_EPSILON * 100.0).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_mode_ignores_height() {
        let scale = compute_fit_scale(
            FitMode::Width,
            Size::new(600.0, 800.0),
            Size::new(900.0, 100.0),
        );
        assert_eq!(scale, 1.5);
    }

    #[test]
    fn page_mode_takes_the_tighter_axis() {
        let scale = compute_fit_scale(
            FitMode::Page,
            Size::new(600.0, 800.0),
            Size::new(900.0, 400.0),
        );
        assert_eq!(scale, 0.5);
    }

    #[test]
    fn rotated_page_size_changes_the_result() {
        let upright = compute_fit_scale(FitMode::Width, Size::new(600.0, 800.0), Size::new(1200.0, 900.0));
        let turned = compute_fit_scale(FitMode::Width, Size::new(800.0, 600.0), Size::new(1200.0, 900.0));
        assert_eq!(upright, 2.0);
        assert_eq!(turned, 1.5);
    }

    #[test]
    fn result_is_rounded_to_hundredths() {
        let scale = compute_fit_scale(FitMode::Width, Size::new(612.0, 792.0), Size::new(1000.0, 1000.0));
        assert_eq!(scale, 1.63);
    }

    #[test]
    fn scale_stays_in_bounds_for_extreme_boxes() {
        let pages = [Size::new(1.0, 1.0), Size::new(612.0, 792.0), Size::new(14_400.0, 14_400.0)];
        let boxes = [Size::new(1.0, 1.0), Size::new(800.0, 600.0), Size::new(100_000.0, 50.0)];
        for page in pages {
            for available in boxes {
                for mode in [FitMode::Page, FitMode::Width] {
                    let scale = compute_fit_scale(mode, page, available);
                    assert!(
                        (MIN_SCALE..=MAX_SCALE).contains(&scale),
                        "{mode:?} {page:?} in {available:?} -> {scale}"
                    );
                }
            }
        }
    }

    #[test]
    fn degenerate_inputs_fall_back_to_one() {
        assert_eq!(compute_fit_scale(FitMode::Page, Size::new(0.0, 10.0), Size::new(10.0, 10.0)), 1.0);
        assert_eq!(compute_fit_scale(FitMode::Page, Size::new(10.0, 10.0), Size::new(f32::NAN, 10.0)), 1.0);
    }

    #[test]
    fn epsilon_threshold() {
        assert!(!exceeds_epsilon(1.0, 1.01));
        assert!(exceeds_epsilon(1.0, 1.03));
        assert!(exceeds_epsilon(1.0, 0.97));
    }

    #[test]
    fn change_of_exactly_epsilon_counts() {
        assert!(exceeds_epsilon(1.0, 1.02));
        assert!(exceeds_epsilon(0.5, 0.52));
        assert!(exceeds_epsilon(1.02, 1.0));
        assert!(!exceeds_epsilon(0.5, 0.51));
    }
}
