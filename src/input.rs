//! Turns crossterm mouse events into registry operations: click to
//! activate, drag the title row to move, drag the frame to resize,
//! double-click the title row to toggle maximize.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{Event, MouseButton, MouseEvent, MouseEventKind};
use parking_lot::Mutex;

use crate::error::CoreResult;
use crate::ids::WindowId;
use crate::window::interaction::resize_edge_at;
use crate::window::{Bounds, WindowRegistry, WindowState};

const DOUBLE_CLICK: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    /// Not a mouse event this router cares about, or nothing under it.
    Ignored,
    Activated(WindowId),
    /// The click landed on `requested` but a modal took activation.
    Blocked {
        requested: WindowId,
        blocking: WindowId,
    },
    DragStarted(WindowId),
    ResizeStarted(WindowId),
    Moved(Bounds),
    GestureEnded,
    MaximizeToggled(WindowId),
}

#[derive(Debug)]
pub struct PointerRouter {
    registry: Arc<WindowRegistry>,
    last_title_click: Mutex<Option<(WindowId, Instant)>>,
}

impl PointerRouter {
    pub fn new(registry: Arc<WindowRegistry>) -> Self {
        Self {
            registry,
            last_title_click: Mutex::new(None),
        }
    }

    pub fn handle_event(&self, event: &Event) -> CoreResult<PointerOutcome> {
        let Event::Mouse(mouse) = event else {
            return Ok(PointerOutcome::Ignored);
        };
        self.handle_mouse(mouse)
    }

    pub fn handle_mouse(&self, mouse: &MouseEvent) -> CoreResult<PointerOutcome> {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.press(mouse.column, mouse.row),
            MouseEventKind::Drag(MouseButton::Left) => Ok(self
                .registry
                .update_interaction(mouse.column, mouse.row)?
                .map_or(PointerOutcome::Ignored, PointerOutcome::Moved)),
            MouseEventKind::Up(MouseButton::Left) => {
                let ended = self.registry.end_drag()? || self.registry.end_resize()?;
                Ok(if ended {
                    PointerOutcome::GestureEnded
                } else {
                    PointerOutcome::Ignored
                })
            }
            _ => Ok(PointerOutcome::Ignored),
        }
    }

    fn press(&self, column: u16, row: u16) -> CoreResult<PointerOutcome> {
        let Some(hit) = self.registry.window_at(column, row)? else {
            return Ok(PointerOutcome::Ignored);
        };
        let active = self.registry.activate_window(hit)?;
        if active != hit {
            return Ok(PointerOutcome::Blocked {
                requested: hit,
                blocking: active,
            });
        }

        let window = self.registry.window(hit)?;
        if window.state != WindowState::Maximized
            && let Some(edge) = resize_edge_at(window.bounds, column, row)
        {
            self.registry.start_resize(hit, edge, column, row)?;
            return Ok(PointerOutcome::ResizeStarted(hit));
        }

        if row as i32 == window.bounds.y {
            if self.is_double_click(hit) {
                if window.state == WindowState::Maximized {
                    self.registry.restore(hit)?;
                } else {
                    self.registry.maximize(hit)?;
                }
                return Ok(PointerOutcome::MaximizeToggled(hit));
            }
            self.registry.start_drag(hit, column, row)?;
            return Ok(PointerOutcome::DragStarted(hit));
        }
        Ok(PointerOutcome::Activated(hit))
    }

    fn is_double_click(&self, id: WindowId) -> bool {
        let now = Instant::now();
        let mut last = self.last_title_click.lock();
        let double = last.is_some_and(|(prev, at)| prev == id && now.duration_since(at) <= DOUBLE_CLICK);
        *last = if double { None } else { Some((id, now)) };
        double
    }
}
