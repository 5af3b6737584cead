//! Runtime configuration for a `WindowSystem`.

use std::time::Duration;

use ratatui::layout::Rect;

use crate::constants::{
    COALESCE_DELAY, DISPATCH_QUEUE_CAPACITY, FLASH_PULSE, FLASH_REPEATS, FLASH_TICK,
    NOTICE_LIFETIME,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSystemConfig {
    pub coalesce_delay: Duration,
    pub flash_tick: Duration,
    pub flash_pulse: Duration,
    pub flash_repeats: u32,
    pub dispatch_capacity: usize,
    pub notice_lifetime: Duration,
    /// Area a maximized window fills.
    pub screen: Rect,
}

impl Default for WindowSystemConfig {
    fn default() -> Self {
        Self {
            coalesce_delay: COALESCE_DELAY,
            flash_tick: FLASH_TICK,
            flash_pulse: FLASH_PULSE,
            flash_repeats: FLASH_REPEATS,
            dispatch_capacity: DISPATCH_QUEUE_CAPACITY,
            notice_lifetime: NOTICE_LIFETIME,
            screen: Rect::new(0, 0, 80, 24),
        }
    }
}

impl WindowSystemConfig {
    pub fn with_coalesce_delay(mut self, delay: Duration) -> Self {
        self.coalesce_delay = delay;
        self
    }

    pub fn with_flash(mut self, tick: Duration, pulse: Duration, repeats: u32) -> Self {
        self.flash_tick = tick;
        self.flash_pulse = pulse;
        self.flash_repeats = repeats;
        self
    }

    pub fn with_dispatch_capacity(mut self, capacity: usize) -> Self {
        self.dispatch_capacity = capacity.max(1);
        self
    }

    pub fn with_notice_lifetime(mut self, lifetime: Duration) -> Self {
        self.notice_lifetime = lifetime;
        self
    }

    pub fn with_screen(mut self, screen: Rect) -> Self {
        self.screen = screen;
        self
    }

    /// Total time an attention flash stays on screen.
    pub fn flash_duration(&self) -> Duration {
        self.flash_pulse.saturating_mul(self.flash_repeats)
    }
}
