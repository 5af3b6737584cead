//! The root object that owns one of every coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ratatui::prelude::Rect;

use crate::config::WindowSystemConfig;
use crate::control::Focusable;
use crate::dirty::DirtyTracker;
use crate::error::{CoreError, CoreResult};
use crate::events::{CoreEvent, EventDispatcher, ListenerId, ListenerResult};
use crate::focus::FocusCoordinator;
use crate::ids::{ControlId, IdAllocator, Owner, WindowId};
use crate::input::PointerRouter;
use crate::invalidation::InvalidationCoordinator;
use crate::layout::{LayoutCoordinator, LayoutRequirements};
use crate::modal::ModalCoordinator;
use crate::notice::NoticeBoard;
use crate::window::registry::Collaborators;
use crate::window::{FlashController, WindowRegistry, WindowSpec};

/// Independent instances do not share any state, so tests can build as
/// many as they like.
#[derive(Debug)]
pub struct WindowSystem {
    config: WindowSystemConfig,
    ids: Arc<IdAllocator>,
    events: Arc<EventDispatcher>,
    dirty: Arc<DirtyTracker>,
    modal: Arc<ModalCoordinator>,
    focus: Arc<FocusCoordinator>,
    invalidation: Arc<InvalidationCoordinator>,
    layout: Arc<LayoutCoordinator>,
    flash: FlashController,
    registry: Arc<WindowRegistry>,
    notices: NoticeBoard,
    pointer: PointerRouter,
    disposed: AtomicBool,
}

impl Default for WindowSystem {
    fn default() -> Self {
        Self::new(WindowSystemConfig::default())
    }
}

impl WindowSystem {
    pub fn new(config: WindowSystemConfig) -> Self {
        let ids = Arc::new(IdAllocator::new());
        let events = Arc::new(EventDispatcher::new(config.dispatch_capacity));
        let dirty = Arc::new(DirtyTracker::new());
        let modal = Arc::new(ModalCoordinator::new());
        let focus = Arc::new(FocusCoordinator::new(Arc::clone(&events)));
        let invalidation = Arc::new(InvalidationCoordinator::new(
            Arc::clone(&dirty),
            config.coalesce_delay,
        ));
        let layout = Arc::new(LayoutCoordinator::new());
        let flash = FlashController::new(
            Arc::clone(&dirty),
            config.flash_tick,
            config.flash_pulse,
            config.flash_repeats,
        );
        let registry = Arc::new(WindowRegistry::new(
            Collaborators {
                ids: Arc::clone(&ids),
                modal: Arc::clone(&modal),
                focus: Arc::clone(&focus),
                invalidation: Arc::clone(&invalidation),
                layout: Arc::clone(&layout),
                dirty: Arc::clone(&dirty),
                events: Arc::clone(&events),
                flash: flash.clone(),
            },
            config.screen,
        ));
        let notices = NoticeBoard::new(
            Arc::clone(&dirty),
            Arc::clone(&events),
            config.notice_lifetime,
            config.screen,
        );
        let pointer = PointerRouter::new(Arc::clone(&registry));
        tracing::debug!(?config, "window system created");
        Self {
            config,
            ids,
            events,
            dirty,
            modal,
            focus,
            invalidation,
            layout,
            flash,
            registry,
            notices,
            pointer,
            disposed: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("window system"));
        }
        Ok(())
    }

    pub fn config(&self) -> &WindowSystemConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WindowRegistry> {
        &self.registry
    }

    pub fn modal(&self) -> &ModalCoordinator {
        &self.modal
    }

    pub fn focus(&self) -> &FocusCoordinator {
        &self.focus
    }

    pub fn invalidation(&self) -> &InvalidationCoordinator {
        &self.invalidation
    }

    pub fn layout(&self) -> &LayoutCoordinator {
        &self.layout
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn flash(&self) -> &FlashController {
        &self.flash
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn pointer(&self) -> &PointerRouter {
        &self.pointer
    }

    pub fn open_window(&self, spec: WindowSpec, activate: bool) -> CoreResult<WindowId> {
        self.ensure_live()?;
        self.registry.register_window(spec, activate)
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CoreEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Register a control inside `window`, optionally nested in the
    /// container `parent`, with every coordinator that tracks controls.
    pub fn create_control(
        &self,
        window: WindowId,
        parent: Option<ControlId>,
        flag: Arc<dyn Focusable>,
        requirements: LayoutRequirements,
    ) -> CoreResult<ControlId> {
        self.ensure_live()?;
        if !self.registry.contains(window)? {
            return Err(CoreError::UnknownWindow(window));
        }
        let owner = match parent {
            Some(container) => {
                self.invalidation.cache_state(container)?;
                Owner::Control(container)
            }
            None => Owner::Window(window),
        };
        let control = self.ids.next_control();
        self.invalidation.register_control(control, owner)?;
        self.layout.register_control(control, requirements)?;
        self.focus.register_control(window, control, flag)?;
        self.registry.attach_control(window, control)?;
        tracing::trace!(window_id = ?window, control = %control, parent = ?parent, "control created");
        Ok(control)
    }

    pub fn remove_control(&self, window: WindowId, control: ControlId) -> CoreResult<()> {
        self.ensure_live()?;
        self.focus.unregister_control(control)?;
        self.invalidation.unregister_control(control)?;
        self.layout.unregister_control(control)?;
        self.registry.detach_control(window, control)
    }

    pub fn set_screen_area(&self, screen: Rect) -> CoreResult<()> {
        self.ensure_live()?;
        self.registry.set_screen_area(screen)?;
        self.notices.set_screen(screen);
        Ok(())
    }

    /// Tear everything down. Every later call on any coordinator returns
    /// `CoreError::Disposed`.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registry.dispose();
        self.notices.dispose();
        self.focus.dispose();
        self.modal.dispose();
        self.invalidation.dispose();
        self.layout.dispose();
        self.events.shutdown();
        tracing::debug!("window system disposed");
    }
}
