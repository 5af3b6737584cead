//! Shared crate-wide constants.

use std::time::Duration;

/// How long the invalidation pipeline waits before draining its queue.
///
/// Bursts of property setters fired from a single input tick land inside
/// this window and are propagated to their parents in one pass.
pub const COALESCE_DELAY: Duration = Duration::from_millis(5);

/// Interval between attention-flash frames (roughly 60 Hz).
pub const FLASH_TICK: Duration = Duration::from_millis(16);

/// Length of one flash pulse; the envelope rises and falls once per pulse.
pub const FLASH_PULSE: Duration = Duration::from_millis(180);

/// Number of pulses in a single attention flash.
pub const FLASH_REPEATS: u32 = 3;

/// Capacity of the listener dispatch queue. Events past this are dropped
/// with a warning instead of stalling the caller.
pub const DISPATCH_QUEUE_CAPACITY: usize = 256;

/// Default lifetime of a transient notice before it dismisses itself.
pub const NOTICE_LIFETIME: Duration = Duration::from_secs(3);

/// Minimum floating window size reachable through an edge resize.
pub const MIN_WINDOW_WIDTH: u16 = 6;
pub const MIN_WINDOW_HEIGHT: u16 = 3;
