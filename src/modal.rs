//! Modal stack and activation redirection.
//!
//! Resolution happens in two tiers:
//!
//! 1. A parentless ("orphan") modal blocks every window that is not the
//!    orphan itself or one of its descendants. When several orphans are
//!    open the most recently pushed one wins.
//! 2. Starting from whichever window survived tier one, descend to the
//!    deepest modal descendant. At every level the direct modal child that
//!    was pushed last is chosen, so clicking a parent always surfaces the
//!    dialog the user is actually expected to answer.
//!
//! Sibling modals under the same parent therefore tie-break on stack
//! position: last pushed wins.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::ids::WindowId;

#[derive(Debug, Default)]
struct ModalTable {
    /// Bottom to top.
    stack: Vec<WindowId>,
    /// Modal -> parent. Missing entry means the modal is an orphan.
    parents: HashMap<WindowId, WindowId>,
    /// Ordinary (non-modal) window -> parent, for descendant checks.
    owners: HashMap<WindowId, WindowId>,
}

impl ModalTable {
    fn parent_of(&self, id: WindowId) -> Option<WindowId> {
        self.parents
            .get(&id)
            .or_else(|| self.owners.get(&id))
            .copied()
    }

    fn is_descendant(&self, id: WindowId, ancestor: WindowId) -> bool {
        let mut seen = HashSet::new();
        let mut cursor = self.parent_of(id);
        while let Some(parent) = cursor {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent) {
                return false;
            }
            cursor = self.parent_of(parent);
        }
        false
    }

    fn top_orphan(&self) -> Option<WindowId> {
        self.stack
            .iter()
            .rev()
            .find(|id| !self.parents.contains_key(*id))
            .copied()
    }

    /// Direct modal child of `parent` that sits highest on the stack.
    fn latest_modal_child(&self, parent: WindowId) -> Option<WindowId> {
        self.stack
            .iter()
            .rev()
            .find(|id| self.parents.get(*id) == Some(&parent))
            .copied()
    }

    fn deepest_modal_descendant(&self, start: WindowId) -> WindowId {
        let mut current = start;
        // Each step moves strictly down the tree; the bound only guards
        // against a corrupted (cyclic) parent table.
        for _ in 0..=self.stack.len() {
            match self.latest_modal_child(current) {
                Some(child) if child != start => current = child,
                _ => break,
            }
        }
        current
    }

    fn resolve(&self, id: WindowId) -> WindowId {
        let start = match self.top_orphan() {
            Some(orphan) if orphan != id && !self.is_descendant(id, orphan) => orphan,
            _ => id,
        };
        self.deepest_modal_descendant(start)
    }
}

#[derive(Debug, Default)]
pub struct ModalCoordinator {
    table: Mutex<ModalTable>,
    disposed: AtomicBool,
}

impl ModalCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("modal coordinator"));
        }
        Ok(())
    }

    /// Push `modal` on top of the stack. `parent = None` makes it an
    /// orphan that blocks the whole system. Re-pushing an open modal moves
    /// it to the top.
    pub fn push_modal(&self, modal: WindowId, parent: Option<WindowId>) -> CoreResult<()> {
        self.ensure_live()?;
        if parent == Some(modal) {
            return Err(CoreError::InvalidArgument("a modal cannot be its own parent"));
        }
        let mut table = self.table.lock();
        if let Some(parent) = parent
            && table.is_descendant(parent, modal)
        {
            return Err(CoreError::InvalidArgument(
                "modal parent would create a cycle",
            ));
        }
        table.stack.retain(|id| *id != modal);
        table.stack.push(modal);
        table.owners.remove(&modal);
        match parent {
            Some(parent) => {
                table.parents.insert(modal, parent);
            }
            None => {
                table.parents.remove(&modal);
            }
        }
        tracing::debug!(modal = %modal, parent = ?parent, depth = table.stack.len(), "pushed modal");
        Ok(())
    }

    /// Remove `modal` from the stack. Returns whether it was open.
    pub fn pop_modal(&self, modal: WindowId) -> CoreResult<bool> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        let before = table.stack.len();
        table.stack.retain(|id| *id != modal);
        let removed = table.stack.len() != before;
        if removed {
            table.parents.remove(&modal);
            tracing::debug!(modal = %modal, depth = table.stack.len(), "popped modal");
        }
        Ok(removed)
    }

    /// Record a non-modal parent link so descendant checks can walk through
    /// ordinary child windows.
    pub fn set_owner(&self, window: WindowId, parent: Option<WindowId>) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        match parent {
            Some(parent) if parent != window => {
                table.owners.insert(window, parent);
            }
            Some(_) => {
                return Err(CoreError::InvalidArgument("a window cannot own itself"));
            }
            None => {
                table.owners.remove(&window);
            }
        }
        Ok(())
    }

    /// Drop every trace of a closed window. Modals still parented to it
    /// become orphans so nothing on the stack names a dead window.
    pub fn forget(&self, window: WindowId) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        table.stack.retain(|id| *id != window);
        table.parents.remove(&window);
        table.owners.remove(&window);
        let stranded: Vec<WindowId> = table
            .parents
            .iter()
            .filter(|(_, parent)| **parent == window)
            .map(|(modal, _)| *modal)
            .collect();
        for modal in stranded {
            table.parents.remove(&modal);
            tracing::warn!(modal = %modal, parent = %window, "modal outlived its parent");
        }
        table.owners.retain(|_, owner| *owner != window);
        Ok(())
    }

    /// Open modals whose direct parent is `window`, bottom to top.
    pub fn modal_children(&self, window: WindowId) -> CoreResult<Vec<WindowId>> {
        self.ensure_live()?;
        let table = self.table.lock();
        Ok(table
            .stack
            .iter()
            .filter(|id| table.parents.get(*id) == Some(&window))
            .copied()
            .collect())
    }

    pub fn is_modal(&self, window: WindowId) -> CoreResult<bool> {
        self.ensure_live()?;
        Ok(self.table.lock().stack.contains(&window))
    }

    pub fn modal_stack(&self) -> CoreResult<Vec<WindowId>> {
        self.ensure_live()?;
        Ok(self.table.lock().stack.clone())
    }

    pub fn effective_activation_target(&self, window: WindowId) -> CoreResult<WindowId> {
        self.ensure_live()?;
        Ok(self.table.lock().resolve(window))
    }

    pub fn is_activation_blocked(&self, window: WindowId) -> CoreResult<bool> {
        Ok(self.effective_activation_target(window)? != window)
    }

    /// The modal that receives activation instead of `window`, if any.
    pub fn blocking_modal(&self, window: WindowId) -> CoreResult<Option<WindowId>> {
        let target = self.effective_activation_target(window)?;
        Ok((target != window).then_some(target))
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        let mut table = self.table.lock();
        *table = ModalTable::default();
    }
}
