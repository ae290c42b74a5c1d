//! Control Visibility Policy - the "watch next" prompt
//!
//! Pure function of position, duration and settings. The prompt is offered
//! during the last 10% of an episode, except when the position sits exactly
//! on the end of the stream.

use std::time::Duration;

use tokio::time::Instant;

use crate::models::{MediaDuration, VisibilityDecision};

/// Share of the duration, counted from the end, in which the prompt shows
pub const WATCH_NEXT_WINDOW: f64 = 0.10;

/// Delay before an auto-hidden prompt disappears
pub const AUTO_HIDE_DELAY: Duration = Duration::from_secs(5);

/// Inputs for one policy evaluation
#[derive(Debug, Clone, Copy)]
pub struct VisibilityInput {
    pub position: f64,
    pub duration: MediaDuration,
    /// Session-level "show watch next" flag
    pub show_watch_next: bool,
    /// User setting: hide the prompt again after [`AUTO_HIDE_DELAY`]
    pub auto_hide: bool,
    /// Visibility published on the previous evaluation
    pub was_visible: bool,
    pub now: Instant,
}

/// Whether `position` lies inside the watch-next window.
///
/// Exact equality with the duration is excluded: a player parked on the
/// final frame reports `position == duration` and must not show the prompt.
#[allow(clippy::float_cmp)]
pub fn in_watch_next_window(position: f64, duration: MediaDuration) -> bool {
    match duration.positive() {
        Some(duration) => {
            (duration - position) <= duration * WATCH_NEXT_WINDOW && position != duration
        }
        None => false,
    }
}

/// Evaluate the watch-next decision.
///
/// A deadline is only attached on a hidden → visible transition with
/// auto-hide enabled; a prompt that is already showing keeps the deadline
/// it was given when it appeared.
pub fn evaluate(input: VisibilityInput) -> VisibilityDecision {
    if !input.show_watch_next || !in_watch_next_window(input.position, input.duration) {
        return VisibilityDecision::HIDDEN;
    }

    let auto_hide_at = (input.auto_hide && !input.was_visible).then(|| input.now + AUTO_HIDE_DELAY);

    VisibilityDecision {
        visible: true,
        auto_hide_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(position: f64, duration: f64) -> VisibilityInput {
        VisibilityInput {
            position,
            duration: MediaDuration::from_seconds(duration),
            show_watch_next: true,
            auto_hide: false,
            was_visible: false,
            now: Instant::now(),
        }
    }

    #[test]
    fn test_window_boundaries() {
        assert!(!evaluate(input(89.0, 100.0)).visible);
        assert!(evaluate(input(90.0, 100.0)).visible);
        assert!(evaluate(input(99.0, 100.0)).visible);
    }

    #[test]
    fn test_exact_end_suppresses_prompt() {
        assert!(!evaluate(input(100.0, 100.0)).visible);
        // Anything short of the exact end still shows
        assert!(evaluate(input(100.0 - 1e-9, 100.0)).visible);
        assert!(evaluate(input(f64::from_bits(100.0f64.to_bits() - 1), 100.0)).visible);
    }

    #[test]
    fn test_requires_positive_known_duration() {
        assert!(!evaluate(input(0.0, 0.0)).visible);
        assert!(!evaluate(input(95.0, f64::INFINITY)).visible);
        assert!(!evaluate(input(95.0, f64::NAN)).visible);
    }

    #[test]
    fn test_session_flag_disables_prompt() {
        let mut i = input(95.0, 100.0);
        i.show_watch_next = false;
        assert_eq!(evaluate(i), VisibilityDecision::HIDDEN);
    }

    #[test]
    fn test_auto_hide_deadline_on_transition() {
        let mut i = input(95.0, 100.0);
        i.auto_hide = true;
        let decision = evaluate(i);
        assert!(decision.visible);
        assert_eq!(decision.auto_hide_at, Some(i.now + AUTO_HIDE_DELAY));
    }

    #[test]
    fn test_no_new_deadline_while_already_visible() {
        let mut i = input(95.0, 100.0);
        i.auto_hide = true;
        i.was_visible = true;
        let decision = evaluate(i);
        assert!(decision.visible);
        assert!(decision.auto_hide_at.is_none());
    }

    #[test]
    fn test_no_deadline_without_auto_hide() {
        let decision = evaluate(input(95.0, 100.0));
        assert!(decision.visible);
        assert!(decision.auto_hide_at.is_none());
    }
}
