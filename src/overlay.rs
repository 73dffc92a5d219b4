//! Collapsible POI panel: a two-state toggle driving an animated top offset.

use std::time::{Duration, Instant};

/// Top margin of the panel while collapsed, in logical pixels.
pub const COLLAPSED_OFFSET: f32 = 750.0;
pub const EXPANDED_OFFSET: f32 = 300.0;
pub const TOGGLE_DURATION: Duration = Duration::from_millis(500);

/// Linear tween between two offsets. Pure in `now`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetAnimation {
    from: f32,
    to: f32,
    started: Instant,
    duration: Duration,
}

impl OffsetAnimation {
    pub fn settled(value: f32, now: Instant) -> Self {
        Self {
            from: value,
            to: value,
            started: now,
            duration: Duration::ZERO,
        }
    }

    pub fn new(from: f32, to: f32, started: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started,
            duration,
        }
    }

    pub fn value_at(&self, now: Instant) -> f32 {
        let progress = self.progress_at(now);
        self.from + (self.to - self.from) * progress
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    pub fn is_finished(&self, now: Instant) -> bool {
        self.progress_at(now) >= 1.0
    }

    fn progress_at(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetailsPanel {
    visible: bool,
    animation: OffsetAnimation,
}

impl DetailsPanel {
    pub fn new(now: Instant) -> Self {
        Self {
            visible: false,
            animation: OffsetAnimation::settled(COLLAPSED_OFFSET, now),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Flip state and tween from wherever the panel is right now, so a tap
    /// mid-animation reverses smoothly.
    pub fn toggle(&mut self, now: Instant) {
        self.visible = !self.visible;
        let current = self.animation.value_at(now);
        let target = if self.visible {
            EXPANDED_OFFSET
        } else {
            COLLAPSED_OFFSET
        };
        self.animation = OffsetAnimation::new(current, target, now, TOGGLE_DURATION);
    }

    pub fn offset_at(&self, now: Instant) -> f32 {
        self.animation.value_at(now)
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        !self.animation.is_finished(now)
    }
}
