//! Keyboard focus ownership.
//!
//! Exactly one `FocusState` snapshot is authoritative at any instant. The
//! snapshot and the per-control focus flags are updated together under the
//! coordinator's lock, so nobody can observe a snapshot naming one control
//! while a different control still reports itself focused.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::control::Focusable;
use crate::error::{CoreError, CoreResult};
use crate::events::{CoreEvent, EventDispatcher};
use crate::ids::{ControlId, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChangeReason {
    Programmatic,
    Activation,
    Pointer,
    Keyboard,
    /// Restored from the focus stack.
    Restore,
    Cleared,
    /// The owning window or control went away.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusState {
    pub window: Option<WindowId>,
    pub control: Option<ControlId>,
    pub reason: FocusChangeReason,
}

impl FocusState {
    pub const fn empty(reason: FocusChangeReason) -> Self {
        Self {
            window: None,
            control: None,
            reason,
        }
    }

    fn same_target(&self, other: &FocusState) -> bool {
        self.window == other.window && self.control == other.control
    }
}

impl Default for FocusState {
    fn default() -> Self {
        Self::empty(FocusChangeReason::Programmatic)
    }
}

struct RegisteredControl {
    window: WindowId,
    flag: Arc<dyn Focusable>,
}

#[derive(Default)]
struct FocusTable {
    current: FocusState,
    controls: HashMap<ControlId, RegisteredControl>,
    /// Last focused control per window, restored on activation.
    remembered: HashMap<WindowId, ControlId>,
    stack: Vec<FocusState>,
}

impl FocusTable {
    fn set_flag(&self, control: Option<ControlId>, focused: bool) {
        if let Some(control) = control
            && let Some(entry) = self.controls.get(&control)
        {
            entry.flag.set_focused(focused);
        }
    }

    /// Swap in `next`, flipping flags and collecting notifications in
    /// blur-then-focus order.
    fn replace(&mut self, next: FocusState) -> Vec<CoreEvent> {
        let previous = self.current;
        let mut events = Vec::new();
        if previous.control != next.control {
            self.set_flag(previous.control, false);
            self.set_flag(next.control, true);
            if let (Some(window), Some(control)) = (previous.window, previous.control) {
                events.push(CoreEvent::ControlBlurred { window, control });
            }
            if let (Some(window), Some(control)) = (next.window, next.control) {
                events.push(CoreEvent::ControlFocused { window, control });
            }
        }
        if let (Some(window), Some(control)) = (next.window, next.control) {
            self.remembered.insert(window, control);
        }
        self.current = next;
        events.push(CoreEvent::FocusChanged(next));
        events
    }

    fn validate(&self, window: WindowId, control: Option<ControlId>) -> CoreResult<()> {
        let Some(control) = control else {
            return Ok(());
        };
        let entry = self
            .controls
            .get(&control)
            .ok_or(CoreError::UnknownControl(control))?;
        if entry.window != window {
            return Err(CoreError::InvalidArgument(
                "control belongs to a different window",
            ));
        }
        Ok(())
    }
}

pub struct FocusCoordinator {
    table: Mutex<FocusTable>,
    events: Arc<EventDispatcher>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for FocusCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusCoordinator")
            .field("current", &self.table.lock().current)
            .finish()
    }
}

impl FocusCoordinator {
    pub fn new(events: Arc<EventDispatcher>) -> Self {
        Self {
            table: Mutex::new(FocusTable::default()),
            events,
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("focus coordinator"));
        }
        Ok(())
    }

    fn publish(&self, events: Vec<CoreEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    pub fn register_control(
        &self,
        window: WindowId,
        control: ControlId,
        flag: Arc<dyn Focusable>,
    ) -> CoreResult<()> {
        self.ensure_live()?;
        flag.set_focused(false);
        self.table
            .lock()
            .controls
            .insert(control, RegisteredControl { window, flag });
        Ok(())
    }

    /// Forget a control. If it held focus, its window keeps focus with no
    /// control inside it.
    pub fn unregister_control(&self, control: ControlId) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        let mut events = Vec::new();
        if table.current.control == Some(control) {
            let next = FocusState {
                window: table.current.window,
                control: None,
                reason: FocusChangeReason::Detached,
            };
            events = table.replace(next);
        }
        table.remembered.retain(|_, remembered| *remembered != control);
        for saved in table.stack.iter_mut() {
            if saved.control == Some(control) {
                saved.control = None;
            }
        }
        table.controls.remove(&control);
        // Published under the lock so concurrent focus changes cannot
        // reorder blur/focus pairs in the queue. `emit` never blocks.
        self.publish(events);
        Ok(())
    }

    pub fn current(&self) -> CoreResult<FocusState> {
        self.ensure_live()?;
        Ok(self.table.lock().current)
    }

    pub fn focused_control(&self) -> CoreResult<Option<ControlId>> {
        Ok(self.current()?.control)
    }

    pub fn set_focus(
        &self,
        window: WindowId,
        control: Option<ControlId>,
        reason: FocusChangeReason,
    ) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        table.validate(window, control)?;
        let next = FocusState {
            window: Some(window),
            control,
            reason,
        };
        if table.current.same_target(&next) {
            return Ok(());
        }
        let events = table.replace(next);
        tracing::debug!(window = %window, control = ?control, ?reason, "focus changed");
        self.publish(events);
        Ok(())
    }

    /// Give focus to `window`, restoring whichever of its controls held
    /// focus last time.
    pub fn focus_window(&self, window: WindowId) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        let control = table
            .remembered
            .get(&window)
            .copied()
            .filter(|control| table.controls.contains_key(control));
        let next = FocusState {
            window: Some(window),
            control,
            reason: FocusChangeReason::Activation,
        };
        if table.current.same_target(&next) {
            return Ok(());
        }
        let events = table.replace(next);
        self.publish(events);
        Ok(())
    }

    /// Clear focus, but only when `window` is the current owner. Background
    /// windows cannot clear a foreground window's focus.
    pub fn clear_focus(&self, window: WindowId) -> CoreResult<bool> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        if table.current.window != Some(window) {
            return Ok(false);
        }
        let events = table.replace(FocusState::empty(FocusChangeReason::Cleared));
        self.publish(events);
        Ok(true)
    }

    /// Save the current owner so a transient capture can hand it back.
    pub fn push_focus(&self) -> CoreResult<usize> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        let current = table.current;
        table.stack.push(current);
        Ok(table.stack.len())
    }

    /// Restore the most recently pushed owner. Returns the restored state,
    /// or `None` when the stack was empty.
    pub fn pop_focus(&self) -> CoreResult<Option<FocusState>> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        let Some(saved) = table.stack.pop() else {
            return Ok(None);
        };
        let control = saved
            .control
            .filter(|control| table.controls.contains_key(control));
        let next = FocusState {
            window: saved.window,
            control,
            reason: FocusChangeReason::Restore,
        };
        let events = if table.current.same_target(&next) {
            Vec::new()
        } else {
            table.replace(next)
        };
        self.publish(events);
        Ok(Some(next))
    }

    pub fn stack_depth(&self) -> CoreResult<usize> {
        self.ensure_live()?;
        Ok(self.table.lock().stack.len())
    }

    /// Remove every trace of a closing window: its controls, its remembered
    /// focus, saved stack entries, and current focus if it owned it.
    pub fn detach_window(&self, window: WindowId) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        let mut events = Vec::new();
        if table.current.window == Some(window) {
            events = table.replace(FocusState::empty(FocusChangeReason::Detached));
        }
        table.controls.retain(|_, entry| entry.window != window);
        table.remembered.remove(&window);
        table.stack.retain(|saved| saved.window != Some(window));
        self.publish(events);
        Ok(())
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let mut table = self.table.lock();
        let current = table.current.control;
        table.set_flag(current, false);
        *table = FocusTable::default();
    }
}
