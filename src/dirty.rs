//! Dirty signals handed to the external renderer.
//!
//! The core never paints. Its only obligation toward the renderer is to say
//! precisely what became stale: a whole window, a screen rectangle that must
//! be cleared (a window that just closed), or a single control.

use std::collections::BTreeSet;

use parking_lot::Mutex;
use ratatui::layout::Rect;

use crate::ids::{ControlId, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirtyScope {
    Window(WindowId),
    Region(Rect),
    Control(ControlId),
}

/// Accumulated dirty state since the renderer last drained it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    pub windows: BTreeSet<WindowId>,
    pub controls: BTreeSet<ControlId>,
    pub regions: Vec<Rect>,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.controls.is_empty() && self.regions.is_empty()
    }

    pub fn contains_window(&self, id: WindowId) -> bool {
        self.windows.contains(&id)
    }
}

#[derive(Debug, Default)]
pub struct DirtyTracker {
    pending: Mutex<DirtySet>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, scope: DirtyScope) {
        let mut pending = self.pending.lock();
        match scope {
            DirtyScope::Window(id) => {
                pending.windows.insert(id);
            }
            DirtyScope::Control(id) => {
                pending.controls.insert(id);
            }
            DirtyScope::Region(rect) => {
                if rect.width == 0 || rect.height == 0 {
                    return;
                }
                if !pending.regions.contains(&rect) {
                    pending.regions.push(rect);
                }
            }
        }
    }

    pub fn mark_all<I: IntoIterator<Item = DirtyScope>>(&self, scopes: I) {
        for scope in scopes {
            self.mark(scope);
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Peek without draining.
    pub fn snapshot(&self) -> DirtySet {
        self.pending.lock().clone()
    }

    /// Drain everything accumulated so far.
    pub fn take(&self) -> DirtySet {
        std::mem::take(&mut *self.pending.lock())
    }
}
