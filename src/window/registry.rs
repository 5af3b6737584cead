//! The window collection and every lifecycle transition on it.
//!
//! The registry owns z-order, the active window, the interaction slot and
//! per-window closing guards. It asks the modal coordinator where an
//! activation should really land and tells the focus, invalidation and
//! layout coordinators when windows come and go. Its own lock is always
//! released before any of those calls are made.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use ratatui::prelude::Rect;

use super::flash::FlashController;
use super::interaction::{GestureKind, InteractionState, ResizeEdge};
use super::{Bounds, Window, WindowSpec, WindowState};
use crate::dirty::{DirtyScope, DirtyTracker};
use crate::error::{CoreError, CoreResult};
use crate::events::{CoreEvent, EventDispatcher};
use crate::focus::FocusCoordinator;
use crate::ids::{ControlId, IdAllocator, WindowId};
use crate::invalidation::InvalidationCoordinator;
use crate::layout::LayoutCoordinator;
use crate::modal::ModalCoordinator;

/// Consulted before a non-forced close. Returning `false` vetoes it.
pub type ClosingGuard = Arc<dyn Fn(&Window) -> bool + Send + Sync>;

/// Shared services the registry coordinates with.
#[derive(Clone)]
pub(crate) struct Collaborators {
    pub ids: Arc<IdAllocator>,
    pub modal: Arc<ModalCoordinator>,
    pub focus: Arc<FocusCoordinator>,
    pub invalidation: Arc<InvalidationCoordinator>,
    pub layout: Arc<LayoutCoordinator>,
    pub dirty: Arc<DirtyTracker>,
    pub events: Arc<EventDispatcher>,
    pub flash: FlashController,
}

#[derive(Default)]
struct RegistryTable {
    windows: HashMap<WindowId, Window>,
    active: Option<WindowId>,
    interaction: Option<InteractionState>,
    guards: HashMap<WindowId, Vec<ClosingGuard>>,
    screen: Rect,
}

impl RegistryTable {
    fn get(&self, id: WindowId) -> CoreResult<&Window> {
        self.windows.get(&id).ok_or(CoreError::UnknownWindow(id))
    }

    fn get_mut(&mut self, id: WindowId) -> CoreResult<&mut Window> {
        self.windows.get_mut(&id).ok_or(CoreError::UnknownWindow(id))
    }

    fn max_z(&self) -> i64 {
        self.windows.values().map(|w| w.z).max().unwrap_or(0)
    }

    fn bring_to_front(&mut self, id: WindowId) {
        let top = self
            .windows
            .values()
            .filter(|w| w.id != id)
            .map(|w| w.z)
            .max()
            .unwrap_or(0);
        if let Some(window) = self.windows.get_mut(&id)
            && window.z <= top
        {
            window.z = top + 1;
        }
    }

    /// Lift every always-on-top window above the highest normal window,
    /// keeping their relative order.
    fn enforce_always_on_top(&mut self) {
        let max_normal = self
            .windows
            .values()
            .filter(|w| !w.is_always_on_top)
            .map(|w| w.z)
            .max()
            .unwrap_or(0);
        let mut pinned: Vec<(i64, WindowId)> = self
            .windows
            .values()
            .filter(|w| w.is_always_on_top)
            .map(|w| (w.z, w.id))
            .collect();
        pinned.sort();
        let mut next = max_normal + 1;
        for (z, id) in pinned {
            let z = z.max(next);
            if let Some(window) = self.windows.get_mut(&id) {
                window.z = z;
            }
            next = z + 1;
        }
    }

    fn visible_rect(&self, bounds: Bounds) -> Option<Rect> {
        bounds.visible_in(self.screen)
    }

    /// Non-minimized windows other than `except` whose bounds overlap `bounds`.
    fn overlapping(&self, bounds: Bounds, except: WindowId) -> Vec<WindowId> {
        self.windows
            .values()
            .filter(|w| w.id != except && !w.is_minimized() && w.bounds.intersects(&bounds))
            .map(|w| w.id)
            .collect()
    }

    fn topmost_restorable(&self, except: WindowId) -> Option<WindowId> {
        self.windows
            .values()
            .filter(|w| w.id != except && !w.is_minimized())
            .max_by_key(|w| w.z)
            .map(|w| w.id)
    }

    fn set_active(&mut self, next: Option<WindowId>) -> Option<WindowId> {
        let previous = self.active;
        if let Some(prev) = previous
            && let Some(window) = self.windows.get_mut(&prev)
        {
            window.is_active = false;
        }
        if let Some(id) = next
            && let Some(window) = self.windows.get_mut(&id)
        {
            window.is_active = true;
        }
        self.active = next;
        previous
    }

    fn clear_interaction_for(&mut self, id: WindowId) {
        if self.interaction.is_some_and(|gesture| gesture.window == id) {
            self.interaction = None;
        }
    }
}

pub struct WindowRegistry {
    table: Mutex<RegistryTable>,
    services: Collaborators,
    disposed: AtomicBool,
}

impl std::fmt::Debug for WindowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("WindowRegistry")
            .field("windows", &table.windows.len())
            .field("active", &table.active)
            .finish()
    }
}

impl WindowRegistry {
    pub(crate) fn new(services: Collaborators, screen: Rect) -> Self {
        Self {
            table: Mutex::new(RegistryTable {
                screen,
                ..RegistryTable::default()
            }),
            services,
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("window registry"));
        }
        Ok(())
    }

    fn emit(&self, event: CoreEvent) {
        self.services.events.emit(event);
    }

    /// Add a window on top of the z-order. It becomes active when
    /// `activate` is set or when no window is active yet.
    pub fn register_window(&self, spec: WindowSpec, activate: bool) -> CoreResult<WindowId> {
        self.ensure_live()?;
        let id = self.services.ids.next_window();
        let is_modal = spec.is_modal;
        let parent = spec.parent;
        let should_activate = {
            let mut table = self.table.lock();
            if let Some(parent) = parent {
                table.get(parent)?;
            }
            let z = table.max_z() + 1;
            table.windows.insert(id, Window::from_spec(id, spec, z));
            table.enforce_always_on_top();
            activate || table.active.is_none()
        };

        if is_modal {
            self.services.modal.push_modal(id, parent)?;
        } else if parent.is_some() {
            self.services.modal.set_owner(id, parent)?;
        }
        self.services.dirty.mark(DirtyScope::Window(id));
        tracing::debug!(window_id = ?id, modal = is_modal, parent = ?parent, "registered window");
        self.emit(CoreEvent::WindowRegistered(id));

        if should_activate {
            self.activate_inner(id, false)?;
        }
        Ok(id)
    }

    /// Activate `id`, or the modal blocking it. A blocked request flashes
    /// the blocking window. Returns the window that is active afterwards.
    pub fn activate_window(&self, id: WindowId) -> CoreResult<WindowId> {
        self.activate_inner(id, true)
    }

    fn activate_inner(&self, id: WindowId, flash_when_blocked: bool) -> CoreResult<WindowId> {
        self.ensure_live()?;
        self.table.lock().get(id)?;
        let target = self.services.modal.effective_activation_target(id)?;
        if target != id {
            tracing::debug!(requested = ?id, blocking = ?target, "activation redirected");
            self.emit(CoreEvent::ActivationBlocked {
                requested: id,
                blocking: target,
            });
            if flash_when_blocked {
                self.services.flash.start(target)?;
            }
        }

        let (previous, restored, scopes) = {
            let mut table = self.table.lock();
            let window = table.get_mut(target)?;
            if window.is_active {
                return Ok(target);
            }
            let restored = window.is_minimized();
            if restored {
                window.state = if window.restore_bounds.is_some() {
                    WindowState::Maximized
                } else {
                    WindowState::Normal
                };
            }
            let previous = table.set_active(Some(target));
            table.bring_to_front(target);
            table.enforce_always_on_top();

            let bounds = table.get(target)?.bounds;
            let mut scopes = vec![DirtyScope::Window(target)];
            scopes.extend(previous.map(DirtyScope::Window));
            scopes.extend(
                table
                    .overlapping(bounds, target)
                    .into_iter()
                    .map(DirtyScope::Window),
            );
            let restored = restored.then(|| table.windows.get(&target).map(|w| w.state));
            (previous, restored.flatten(), scopes)
        };

        self.services.dirty.mark_all(scopes);
        self.services.focus.focus_window(target)?;
        tracing::debug!(window_id = ?target, previous = ?previous, "activated window");
        if let Some(state) = restored {
            self.emit(CoreEvent::WindowStateChanged {
                window: target,
                state,
            });
        }
        if let Some(prev) = previous {
            self.emit(CoreEvent::WindowDeactivated(prev));
        }
        self.emit(CoreEvent::WindowActivated {
            previous,
            current: target,
        });
        Ok(target)
    }

    /// Attach a closing guard to `window`.
    pub fn add_closing_guard<F>(&self, window: WindowId, guard: F) -> CoreResult<()>
    where
        F: Fn(&Window) -> bool + Send + Sync + 'static,
    {
        self.ensure_live()?;
        let mut table = self.table.lock();
        table.get(window)?;
        table
            .guards
            .entry(window)
            .or_default()
            .push(Arc::new(guard));
        Ok(())
    }

    /// Two-phase close. Without `force`, a non-closable window or a vetoing
    /// guard leaves everything untouched and `Ok(false)` is returned.
    ///
    /// Modals still open over the window are force-closed first, newest
    /// first, so none of them outlives the window it was blocking.
    pub fn close(&self, id: WindowId, force: bool) -> CoreResult<bool> {
        self.ensure_live()?;
        if !force && !self.may_close(id)? {
            tracing::debug!(window_id = ?id, "close vetoed");
            return Ok(false);
        }

        for child in self.services.modal.modal_children(id)?.into_iter().rev() {
            if self.table.lock().windows.contains_key(&child) {
                tracing::debug!(window_id = ?child, parent = ?id, "closing modal with its parent");
                self.close(child, true)?;
            }
        }

        let (removed, was_active, successor, scopes) = {
            let mut table = self.table.lock();
            let removed = table
                .windows
                .remove(&id)
                .ok_or(CoreError::UnknownWindow(id))?;
            table.guards.remove(&id);
            table.clear_interaction_for(id);
            let was_active = table.active == Some(id);
            if was_active {
                table.active = None;
            }
            let successor = if was_active {
                removed
                    .parent
                    .filter(|parent| table.windows.get(parent).is_some_and(|w| !w.is_minimized()))
                    .or_else(|| table.topmost_restorable(id))
            } else {
                None
            };
            let mut scopes: Vec<DirtyScope> = table
                .visible_rect(removed.bounds)
                .map(DirtyScope::Region)
                .into_iter()
                .collect();
            scopes.extend(
                table
                    .overlapping(removed.bounds, id)
                    .into_iter()
                    .map(DirtyScope::Window),
            );
            (removed, was_active, successor, scopes)
        };

        self.services.modal.forget(id)?;
        self.services.focus.detach_window(id)?;
        for control in &removed.controls {
            self.services.invalidation.unregister_control(*control)?;
            self.services.layout.unregister_control(*control)?;
        }
        self.services.flash.cancel(id)?;
        self.services.dirty.mark_all(scopes);
        tracing::debug!(window_id = ?id, was_active, "closed window");
        self.emit(CoreEvent::WindowClosed(id));

        if let Some(next) = successor {
            self.activate_inner(next, false)?;
        } else if was_active {
            self.emit(CoreEvent::WindowDeactivated(id));
        }
        Ok(true)
    }

    fn may_close(&self, id: WindowId) -> CoreResult<bool> {
        let (snapshot, guards) = {
            let table = self.table.lock();
            let window = table.get(id)?.clone();
            let guards = table.guards.get(&id).cloned().unwrap_or_default();
            (window, guards)
        };
        if !snapshot.closable {
            return Ok(false);
        }
        for guard in guards {
            match catch_unwind(AssertUnwindSafe(|| guard(&snapshot))) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(_) => {
                    tracing::warn!(window_id = ?id, "closing guard panicked; ignoring it");
                }
            }
        }
        Ok(true)
    }

    /// Minimize `id`. An open modal cannot be minimized: activation of the
    /// windows it blocks would land straight back on it.
    pub fn minimize(&self, id: WindowId) -> CoreResult<()> {
        self.ensure_live()?;
        if self.services.modal.is_modal(id)? {
            return Err(CoreError::InvalidArgument("an open modal cannot be minimized"));
        }
        let (was_active, next, scopes) = {
            let mut table = self.table.lock();
            let window = table.get_mut(id)?;
            if window.is_minimized() {
                return Ok(());
            }
            window.state = WindowState::Minimized;
            let bounds = window.bounds;
            table.clear_interaction_for(id);
            let was_active = table.active == Some(id);
            let next = if was_active {
                table.set_active(None);
                table.topmost_restorable(id)
            } else {
                None
            };
            let mut scopes: Vec<DirtyScope> = table
                .visible_rect(bounds)
                .map(DirtyScope::Region)
                .into_iter()
                .collect();
            scopes.extend(table.overlapping(bounds, id).into_iter().map(DirtyScope::Window));
            (was_active, next, scopes)
        };

        self.services.dirty.mark_all(scopes);
        tracing::debug!(window_id = ?id, "minimized window");
        self.emit(CoreEvent::WindowStateChanged {
            window: id,
            state: WindowState::Minimized,
        });
        if was_active {
            self.emit(CoreEvent::WindowDeactivated(id));
            match next {
                Some(next) => {
                    self.activate_inner(next, false)?;
                }
                None => {
                    self.services.focus.clear_focus(id)?;
                }
            }
        }
        Ok(())
    }

    /// Fill the screen area, remembering the bounds to restore later.
    pub fn maximize(&self, id: WindowId) -> CoreResult<()> {
        self.ensure_live()?;
        let old_region = {
            let mut table = self.table.lock();
            let screen = table.screen;
            let window = table.get_mut(id)?;
            if window.state == WindowState::Maximized {
                return Ok(());
            }
            if window.restore_bounds.is_none() {
                window.restore_bounds = Some(window.bounds);
            }
            let old = window.bounds;
            window.bounds = Bounds::from_rect(screen);
            window.state = WindowState::Maximized;
            table.visible_rect(old)
        };
        self.services.dirty.mark_all(
            old_region
                .map(DirtyScope::Region)
                .into_iter()
                .chain([DirtyScope::Window(id)]),
        );
        tracing::debug!(window_id = ?id, "maximized window");
        self.emit(CoreEvent::WindowStateChanged {
            window: id,
            state: WindowState::Maximized,
        });
        Ok(())
    }

    /// Undo a minimize or a maximize. A window minimized while maximized
    /// comes back maximized; restoring it once more returns its old bounds.
    pub fn restore(&self, id: WindowId) -> CoreResult<()> {
        self.ensure_live()?;
        let state = {
            let mut table = self.table.lock();
            let current = table.get(id)?.state;
            match current {
                WindowState::Normal => return Ok(()),
                // activation un-minimizes and brings it forward
                WindowState::Minimized => None,
                WindowState::Maximized => {
                    let window = table.get_mut(id)?;
                    let old = window.bounds;
                    if let Some(bounds) = window.restore_bounds.take() {
                        window.bounds = bounds;
                    }
                    window.state = WindowState::Normal;
                    let region = table.visible_rect(old);
                    Some(region)
                }
            }
        };
        match state {
            None => {
                self.activate_inner(id, true)?;
            }
            Some(region) => {
                self.services
                    .dirty
                    .mark_all(region.map(DirtyScope::Region).into_iter().chain([DirtyScope::Window(id)]));
                tracing::debug!(window_id = ?id, "restored window");
                self.emit(CoreEvent::WindowStateChanged {
                    window: id,
                    state: WindowState::Normal,
                });
            }
        }
        Ok(())
    }

    /// Replace a window's bounds, e.g. with the result of a gesture.
    /// A maximized window drops back to normal.
    pub fn set_bounds(&self, id: WindowId, bounds: Bounds) -> CoreResult<()> {
        self.ensure_live()?;
        let bounds = bounds.with_minimum_size();
        let (scopes, unmaximized) = {
            let mut table = self.table.lock();
            let window = table.get_mut(id)?;
            let old = window.bounds;
            if old == bounds {
                return Ok(());
            }
            window.bounds = bounds;
            let unmaximized = window.state == WindowState::Maximized;
            if unmaximized {
                window.state = WindowState::Normal;
                window.restore_bounds = None;
            }
            let mut scopes: Vec<DirtyScope> = table
                .visible_rect(old)
                .map(DirtyScope::Region)
                .into_iter()
                .collect();
            scopes.push(DirtyScope::Window(id));
            scopes.extend(table.overlapping(old, id).into_iter().map(DirtyScope::Window));
            (scopes, unmaximized)
        };
        self.services.dirty.mark_all(scopes);
        if unmaximized {
            self.emit(CoreEvent::WindowStateChanged {
                window: id,
                state: WindowState::Normal,
            });
        }
        Ok(())
    }

    pub fn set_title(&self, id: WindowId, title: impl Into<String>) -> CoreResult<()> {
        self.ensure_live()?;
        self.table.lock().get_mut(id)?.title = title.into();
        self.services.dirty.mark(DirtyScope::Window(id));
        Ok(())
    }

    /// New screen size. Maximized windows follow it.
    pub fn set_screen_area(&self, screen: Rect) -> CoreResult<()> {
        self.ensure_live()?;
        let ids: Vec<WindowId> = {
            let mut table = self.table.lock();
            table.screen = screen;
            for window in table.windows.values_mut() {
                if window.state == WindowState::Maximized {
                    window.bounds = Bounds::from_rect(screen);
                }
            }
            table.windows.keys().copied().collect()
        };
        self.services
            .dirty
            .mark_all(ids.into_iter().map(DirtyScope::Window));
        Ok(())
    }

    pub fn screen_area(&self) -> CoreResult<Rect> {
        self.ensure_live()?;
        Ok(self.table.lock().screen)
    }

    fn start_gesture(&self, id: WindowId, kind: GestureKind, column: u16, row: u16) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        if let Some(current) = table.interaction {
            return Err(CoreError::InteractionInProgress(current.window));
        }
        let window = table.get(id)?;
        if window.is_minimized() {
            return Err(CoreError::InvalidArgument("cannot move a minimized window"));
        }
        table.interaction = Some(InteractionState {
            window: id,
            kind,
            start_column: column,
            start_row: row,
            start_bounds: window.bounds,
        });
        tracing::trace!(window_id = ?id, ?kind, "gesture started");
        Ok(())
    }

    pub fn start_drag(&self, id: WindowId, column: u16, row: u16) -> CoreResult<()> {
        self.start_gesture(id, GestureKind::Drag, column, row)
    }

    pub fn start_resize(&self, id: WindowId, edge: ResizeEdge, column: u16, row: u16) -> CoreResult<()> {
        self.start_gesture(id, GestureKind::Resize(edge), column, row)
    }

    /// Apply the running gesture for the pointer at (`column`, `row`).
    /// Returns the new bounds, or `None` when no gesture is running.
    pub fn update_interaction(&self, column: u16, row: u16) -> CoreResult<Option<Bounds>> {
        self.ensure_live()?;
        let Some(gesture) = self.table.lock().interaction else {
            return Ok(None);
        };
        let bounds = gesture.apply(column, row);
        self.set_bounds(gesture.window, bounds)?;
        Ok(Some(bounds.with_minimum_size()))
    }

    pub fn interaction(&self) -> CoreResult<Option<InteractionState>> {
        self.ensure_live()?;
        Ok(self.table.lock().interaction)
    }

    pub fn end_drag(&self) -> CoreResult<bool> {
        self.end_gesture(|kind| kind == GestureKind::Drag)
    }

    pub fn end_resize(&self) -> CoreResult<bool> {
        self.end_gesture(|kind| matches!(kind, GestureKind::Resize(_)))
    }

    fn end_gesture(&self, matches: impl Fn(GestureKind) -> bool) -> CoreResult<bool> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        Ok(match table.interaction {
            Some(gesture) if matches(gesture.kind) => {
                table.interaction = None;
                true
            }
            _ => false,
        })
    }

    pub(crate) fn attach_control(&self, window: WindowId, control: ControlId) -> CoreResult<()> {
        self.ensure_live()?;
        let mut table = self.table.lock();
        let window = table.get_mut(window)?;
        if !window.controls.contains(&control) {
            window.controls.push(control);
        }
        Ok(())
    }

    pub(crate) fn detach_control(&self, window: WindowId, control: ControlId) -> CoreResult<()> {
        self.ensure_live()?;
        self.table
            .lock()
            .get_mut(window)?
            .controls
            .retain(|c| *c != control);
        Ok(())
    }

    pub fn window(&self, id: WindowId) -> CoreResult<Window> {
        self.ensure_live()?;
        Ok(self.table.lock().get(id)?.clone())
    }

    pub fn contains(&self, id: WindowId) -> CoreResult<bool> {
        self.ensure_live()?;
        Ok(self.table.lock().windows.contains_key(&id))
    }

    /// Bottom to top.
    pub fn windows_by_z(&self) -> CoreResult<Vec<Window>> {
        self.ensure_live()?;
        let mut windows: Vec<Window> = self.table.lock().windows.values().cloned().collect();
        windows.sort_by_key(|w| (w.z, w.id));
        Ok(windows)
    }

    pub fn active_window(&self) -> CoreResult<Option<WindowId>> {
        self.ensure_live()?;
        Ok(self.table.lock().active)
    }

    pub fn window_count(&self) -> CoreResult<usize> {
        self.ensure_live()?;
        Ok(self.table.lock().windows.len())
    }

    /// Top-most non-minimized window whose visible area contains the point.
    pub fn window_at(&self, column: u16, row: u16) -> CoreResult<Option<WindowId>> {
        self.ensure_live()?;
        let table = self.table.lock();
        Ok(table
            .windows
            .values()
            .filter(|w| !w.is_minimized())
            .filter(|w| {
                table
                    .visible_rect(w.bounds)
                    .is_some_and(|rect| rect.contains((column, row).into()))
            })
            .max_by_key(|w| w.z)
            .map(|w| w.id))
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.services.flash.dispose();
        let mut table = self.table.lock();
        let screen = table.screen;
        *table = RegistryTable {
            screen,
            ..RegistryTable::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Harness {
        registry: WindowRegistry,
        services: Collaborators,
    }

    fn harness() -> Harness {
        let dirty = Arc::new(DirtyTracker::new());
        let events = Arc::new(EventDispatcher::new(64));
        let services = Collaborators {
            ids: Arc::new(IdAllocator::new()),
            modal: Arc::new(ModalCoordinator::new()),
            focus: Arc::new(FocusCoordinator::new(Arc::clone(&events))),
            invalidation: Arc::new(InvalidationCoordinator::new(
                Arc::clone(&dirty),
                Duration::from_millis(5),
            )),
            layout: Arc::new(LayoutCoordinator::new()),
            flash: FlashController::new(
                Arc::clone(&dirty),
                Duration::from_millis(2),
                Duration::from_millis(50),
                1,
            ),
            dirty,
            events,
        };
        let registry = WindowRegistry::new(services.clone(), Rect::new(0, 0, 80, 24));
        Harness { registry, services }
    }

    fn spec(title: &str, x: i32, y: i32) -> WindowSpec {
        WindowSpec::new(title).with_bounds(Bounds::new(x, y, 20, 8))
    }

    #[test]
    fn first_window_is_active_with_z_one() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), false).unwrap();
        let window = h.registry.window(a).unwrap();
        assert_eq!(window.z, 1);
        assert!(window.is_active);
        assert_eq!(h.registry.active_window().unwrap(), Some(a));
    }

    #[test]
    fn inactive_registration_keeps_current_active() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let b = h.registry.register_window(spec("b", 5, 5), false).unwrap();
        assert_eq!(h.registry.active_window().unwrap(), Some(a));
        assert!(h.registry.window(b).unwrap().z > h.registry.window(a).unwrap().z);
        assert!(!h.registry.window(b).unwrap().is_active);
    }

    #[test]
    fn activation_is_idempotent() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let _b = h.registry.register_window(spec("b", 5, 5), false).unwrap();
        h.registry.activate_window(a).unwrap();
        let z = h.registry.window(a).unwrap().z;
        h.services.dirty.take();
        h.registry.activate_window(a).unwrap();
        assert_eq!(h.registry.window(a).unwrap().z, z);
        assert!(!h.services.dirty.is_dirty());
    }

    #[test]
    fn activation_marks_old_new_and_overlapping_dirty() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let b = h.registry.register_window(spec("b", 40, 0), false).unwrap();
        let c = h.registry.register_window(spec("c", 45, 4), false).unwrap();
        let far = h.registry.register_window(spec("far", 0, 15), false).unwrap();
        h.services.dirty.take();
        h.registry.activate_window(b).unwrap();
        let set = h.services.dirty.take();
        assert!(set.contains_window(a));
        assert!(set.contains_window(b));
        assert!(set.contains_window(c));
        assert!(!set.contains_window(far));
    }

    #[test]
    fn modal_child_redirects_parent_activation() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let m = h
            .registry
            .register_window(spec("m", 2, 2).modal(Some(a)), true)
            .unwrap();
        let other = h.registry.register_window(spec("o", 40, 0), true).unwrap();
        assert_eq!(h.registry.active_window().unwrap(), Some(other));
        assert_eq!(h.registry.activate_window(a).unwrap(), m);
        assert_eq!(h.registry.active_window().unwrap(), Some(m));
        assert!(h.services.flash.is_flashing(m).unwrap());
        h.services.flash.cancel(m).unwrap();
    }

    #[test]
    fn orphan_modal_blocks_unrelated_windows() {
        let h = harness();
        let b = h.registry.register_window(spec("b", 0, 0), true).unwrap();
        let o = h
            .registry
            .register_window(spec("o", 10, 5).modal(None), true)
            .unwrap();
        assert_eq!(h.registry.activate_window(b).unwrap(), o);
        let child = h
            .registry
            .register_window(spec("child", 12, 6).child_of(o), false)
            .unwrap();
        assert_eq!(h.registry.activate_window(child).unwrap(), child);
        h.services.flash.dispose();
    }

    #[test]
    fn minimizing_active_activates_highest_remaining() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let b = h.registry.register_window(spec("b", 5, 5), true).unwrap();
        let c = h.registry.register_window(spec("c", 10, 10), true).unwrap();
        h.registry.minimize(b).unwrap();
        assert_eq!(h.registry.active_window().unwrap(), Some(c));
        h.registry.minimize(c).unwrap();
        assert_eq!(h.registry.active_window().unwrap(), Some(a));
        assert_eq!(h.registry.window(c).unwrap().state, WindowState::Minimized);
    }

    #[test]
    fn always_on_top_stays_above_normal_windows() {
        let h = harness();
        let pinned = h
            .registry
            .register_window(spec("pin", 0, 0).always_on_top(), true)
            .unwrap();
        let a = h.registry.register_window(spec("a", 1, 1), true).unwrap();
        let b = h.registry.register_window(spec("b", 2, 2), true).unwrap();
        h.registry.activate_window(a).unwrap();
        h.registry.close(b, true).unwrap();
        let pin_z = h.registry.window(pinned).unwrap().z;
        for window in h.registry.windows_by_z().unwrap() {
            if !window.is_always_on_top {
                assert!(window.z < pin_z);
            }
        }
        assert_eq!(h.registry.windows_by_z().unwrap().last().unwrap().id, pinned);
    }

    #[test]
    fn close_round_trip_detaches_everything() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let m = h
            .registry
            .register_window(spec("m", 2, 2).modal(Some(a)), true)
            .unwrap();
        assert!(h.registry.close(m, false).unwrap());
        assert!(!h.registry.contains(m).unwrap());
        assert!(h.services.modal.modal_stack().unwrap().is_empty());
        assert_eq!(h.registry.active_window().unwrap(), Some(a));
        let set = h.services.dirty.take();
        assert!(set.regions.contains(&Rect::new(2, 2, 20, 8)));
        assert_eq!(h.registry.close(m, true), Err(CoreError::UnknownWindow(m)));
    }

    #[test]
    fn guard_veto_and_closable_flag() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let locked = h
            .registry
            .register_window(spec("locked", 5, 5).closable(false), false)
            .unwrap();
        h.registry.add_closing_guard(a, |_| false).unwrap();
        assert!(!h.registry.close(a, false).unwrap());
        assert!(!h.registry.close(locked, false).unwrap());
        assert!(h.registry.contains(a).unwrap());
        assert!(h.registry.close(locked, true).unwrap());
        assert!(h.registry.close(a, true).unwrap());
        assert_eq!(h.registry.window_count().unwrap(), 0);
        assert_eq!(h.registry.active_window().unwrap(), None);
    }

    #[test]
    fn panicking_guard_does_not_veto() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        h.registry
            .add_closing_guard(a, |_| panic!("guard exploded"))
            .unwrap();
        assert!(h.registry.close(a, false).unwrap());
    }

    #[test]
    fn single_interaction_slot() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let b = h.registry.register_window(spec("b", 30, 0), false).unwrap();
        h.registry.start_drag(a, 3, 0).unwrap();
        assert_eq!(
            h.registry.start_resize(b, ResizeEdge::Right, 49, 4),
            Err(CoreError::InteractionInProgress(a))
        );
        assert_eq!(
            h.registry.update_interaction(8, 2).unwrap(),
            Some(Bounds::new(5, 2, 20, 8))
        );
        assert!(!h.registry.end_resize().unwrap());
        assert!(h.registry.end_drag().unwrap());
        assert_eq!(h.registry.update_interaction(9, 9).unwrap(), None);
    }

    #[test]
    fn maximize_and_restore_round_trip() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 3, 3), true).unwrap();
        h.registry.maximize(a).unwrap();
        let window = h.registry.window(a).unwrap();
        assert_eq!(window.bounds, Bounds::new(0, 0, 80, 24));
        assert_eq!(window.restore_bounds, Some(Bounds::new(3, 3, 20, 8)));
        h.registry.minimize(a).unwrap();
        h.registry.restore(a).unwrap();
        assert_eq!(h.registry.window(a).unwrap().state, WindowState::Maximized);
        h.registry.restore(a).unwrap();
        let window = h.registry.window(a).unwrap();
        assert_eq!(window.state, WindowState::Normal);
        assert_eq!(window.bounds, Bounds::new(3, 3, 20, 8));
    }

    #[test]
    fn window_at_skips_minimized_and_prefers_top() {
        let h = harness();
        let a = h.registry.register_window(spec("a", 0, 0), true).unwrap();
        let b = h.registry.register_window(spec("b", 5, 2), true).unwrap();
        assert_eq!(h.registry.window_at(6, 3).unwrap(), Some(b));
        assert_eq!(h.registry.window_at(1, 1).unwrap(), Some(a));
        h.registry.minimize(b).unwrap();
        assert_eq!(h.registry.window_at(6, 3).unwrap(), Some(a));
        assert_eq!(h.registry.window_at(70, 20).unwrap(), None);
    }
}
