//! Attention flash: a short colour pulse on a window's frame, shown when
//! the user clicks a window that a modal is blocking.
//!
//! Each flash owns a ticker thread that marks the window dirty every tick
//! so the renderer repaints it; the renderer calls [`FlashController::paint`]
//! after drawing the window. The ticker holds only a `Weak` reference to the
//! controller plus its own cancel flag and exits on completion, cancellation
//! or when the controller goes away.

use std::collections::HashMap;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ratatui::buffer::Buffer;
use ratatui::prelude::Rect;

use crate::dirty::{DirtyScope, DirtyTracker};
use crate::error::{CoreError, CoreResult};
use crate::ids::WindowId;
use crate::theme;

#[derive(Debug)]
struct ActiveFlash {
    started: Instant,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug)]
struct FlashInner {
    active: Mutex<HashMap<WindowId, ActiveFlash>>,
    dirty: Arc<DirtyTracker>,
    tick: Duration,
    pulse: Duration,
    repeats: u32,
    disposed: AtomicBool,
}

impl FlashInner {
    fn total(&self) -> Duration {
        self.pulse.saturating_mul(self.repeats)
    }

    /// Remove the entry for `window` if it still belongs to `cancel`.
    fn finish(&self, window: WindowId, cancel: &Arc<AtomicBool>) {
        let mut active = self.active.lock();
        if active
            .get(&window)
            .is_some_and(|flash| Arc::ptr_eq(&flash.cancel, cancel))
        {
            active.remove(&window);
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlashController {
    inner: Arc<FlashInner>,
}

impl FlashController {
    pub fn new(dirty: Arc<DirtyTracker>, tick: Duration, pulse: Duration, repeats: u32) -> Self {
        Self {
            inner: Arc::new(FlashInner {
                active: Mutex::new(HashMap::new()),
                dirty,
                tick: tick.max(Duration::from_millis(1)),
                pulse: pulse.max(Duration::from_millis(1)),
                repeats: repeats.max(1),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("flash controller"));
        }
        Ok(())
    }

    /// Start flashing `window`. Returns `false` when a flash is already
    /// running for it.
    pub fn start(&self, window: WindowId) -> CoreResult<bool> {
        self.ensure_live()?;
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut active = self.inner.active.lock();
            if active.contains_key(&window) {
                tracing::trace!(window_id = ?window, "flash already running");
                return Ok(false);
            }
            active.insert(
                window,
                ActiveFlash {
                    started: Instant::now(),
                    cancel: Arc::clone(&cancel),
                },
            );
        }

        let weak: Weak<FlashInner> = Arc::downgrade(&self.inner);
        let tick = self.inner.tick;
        let ticker_cancel = Arc::clone(&cancel);
        let spawned = thread::Builder::new()
            .name("term-wm-flash".to_string())
            .spawn(move || run_ticker(weak, window, tick, ticker_cancel));
        if let Err(err) = spawned {
            tracing::warn!(window_id = ?window, error = %err, "could not start flash ticker");
            self.inner.finish(window, &cancel);
            return Ok(false);
        }
        tracing::debug!(window_id = ?window, "flash started");
        Ok(true)
    }

    /// Stop a running flash. Returns whether one was running.
    pub fn cancel(&self, window: WindowId) -> CoreResult<bool> {
        self.ensure_live()?;
        let removed = self.inner.active.lock().remove(&window);
        Ok(match removed {
            Some(flash) => {
                flash.cancel.store(true, Ordering::Release);
                self.inner.dirty.mark(DirtyScope::Window(window));
                true
            }
            None => false,
        })
    }

    pub fn is_flashing(&self, window: WindowId) -> CoreResult<bool> {
        self.ensure_live()?;
        Ok(self.inner.active.lock().contains_key(&window))
    }

    /// Stop every ticker. Later calls fail with `Disposed`; the paint hook
    /// keeps working and finds nothing to paint.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        let drained: Vec<_> = self.inner.active.lock().drain().collect();
        for (_, flash) in drained {
            flash.cancel.store(true, Ordering::Release);
        }
    }

    /// Current pulse strength in 0..=1, or `None` when not flashing.
    pub fn intensity(&self, window: WindowId) -> Option<f32> {
        let started = self.inner.active.lock().get(&window)?.started;
        envelope(started.elapsed(), self.inner.pulse, self.inner.total())
    }

    /// Post-paint hook: tint the frame of `area` for a flashing window.
    pub fn paint(&self, window: WindowId, area: Rect, buf: &mut Buffer) {
        let Some(intensity) = self.intensity(window) else {
            return;
        };
        let area = area.intersection(buf.area);
        if area.is_empty() {
            return;
        }
        let right = area.right() - 1;
        let bottom = area.bottom() - 1;
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                let on_frame = x == area.left() || x == right || y == area.top() || y == bottom;
                if !on_frame {
                    continue;
                }
                if let Some(cell) = buf.cell_mut((x, y)) {
                    let tinted = theme::flash_over(cell.fg, intensity);
                    cell.set_fg(tinted);
                }
            }
        }
    }
}

fn run_ticker(weak: Weak<FlashInner>, window: WindowId, tick: Duration, cancel: Arc<AtomicBool>) {
    loop {
        thread::sleep(tick);
        if cancel.load(Ordering::Acquire) {
            return;
        }
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let started = match inner.active.lock().get(&window) {
            Some(flash) if Arc::ptr_eq(&flash.cancel, &cancel) => flash.started,
            _ => return,
        };
        inner.dirty.mark(DirtyScope::Window(window));
        if started.elapsed() >= inner.total() {
            inner.finish(window, &cancel);
            tracing::debug!(window_id = ?window, "flash finished");
            return;
        }
    }
}

/// Sine envelope repeated `total / pulse` times.
fn envelope(elapsed: Duration, pulse: Duration, total: Duration) -> Option<f32> {
    if elapsed >= total {
        return None;
    }
    let phase = (elapsed.as_secs_f32() % pulse.as_secs_f32()) / pulse.as_secs_f32();
    Some((phase * PI).sin().clamp(0.0, 1.0))
}
