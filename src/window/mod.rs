pub mod flash;
pub mod interaction;
pub mod registry;

pub use flash::FlashController;
pub use interaction::{GestureKind, InteractionState, ResizeEdge};
pub use registry::{ClosingGuard, WindowRegistry};

use ratatui::prelude::Rect;

use crate::constants::{MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};
use crate::ids::{ControlId, WindowId};

/// Signed window origin with unsigned size. Windows may be dragged partly
/// off-screen, so the origin can go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl Bounds {
    pub const fn new(x: i32, y: i32, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.x as i32, rect.y as i32, rect.width, rect.height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, column: u16, row: u16) -> bool {
        let (column, row) = (column as i32, row as i32);
        column >= self.x && column < self.right() && row >= self.y && row < self.bottom()
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The on-screen part of these bounds, or `None` when fully clipped.
    pub fn visible_in(&self, screen: Rect) -> Option<Rect> {
        let left = self.x.max(screen.x as i32);
        let top = self.y.max(screen.y as i32);
        let right = self.right().min(screen.right() as i32);
        let bottom = self.bottom().min(screen.bottom() as i32);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect {
            x: left as u16,
            y: top as u16,
            width: (right - left) as u16,
            height: (bottom - top) as u16,
        })
    }

    /// Enforce the minimum window size without moving the origin.
    pub fn with_minimum_size(self) -> Self {
        Self {
            width: self.width.max(MIN_WINDOW_WIDTH),
            height: self.height.max(MIN_WINDOW_HEIGHT),
            ..self
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(0, 0, 20, 8)
    }
}

impl From<Rect> for Bounds {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// Everything a caller decides about a window before registering it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSpec {
    pub title: String,
    pub bounds: Bounds,
    pub is_modal: bool,
    pub parent: Option<WindowId>,
    pub is_always_on_top: bool,
    pub closable: bool,
}

impl WindowSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            closable: true,
            ..Self::default()
        }
    }

    pub fn with_bounds(mut self, bounds: impl Into<Bounds>) -> Self {
        self.bounds = bounds.into();
        self
    }

    /// Modal over `parent`; `None` blocks every window in the system.
    pub fn modal(mut self, parent: Option<WindowId>) -> Self {
        self.is_modal = true;
        self.parent = parent;
        self
    }

    pub fn child_of(mut self, parent: WindowId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn always_on_top(mut self) -> Self {
        self.is_always_on_top = true;
        self
    }

    pub fn closable(mut self, closable: bool) -> Self {
        self.closable = closable;
        self
    }
}

/// Registry-owned window record. Callers receive clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: WindowId,
    pub title: String,
    pub bounds: Bounds,
    pub z: i64,
    pub state: WindowState,
    pub is_modal: bool,
    pub is_always_on_top: bool,
    pub is_active: bool,
    pub closable: bool,
    pub parent: Option<WindowId>,
    pub controls: Vec<ControlId>,
    pub restore_bounds: Option<Bounds>,
}

impl Window {
    pub(crate) fn from_spec(id: WindowId, spec: WindowSpec, z: i64) -> Self {
        Self {
            id,
            title: spec.title,
            bounds: spec.bounds.with_minimum_size(),
            z,
            state: WindowState::Normal,
            is_modal: spec.is_modal,
            is_always_on_top: spec.is_always_on_top,
            is_active: false,
            closable: spec.closable,
            parent: spec.parent,
            controls: Vec::new(),
            restore_bounds: None,
        }
    }

    pub fn is_minimized(&self) -> bool {
        self.state == WindowState::Minimized
    }

    pub fn title_or_default(&self) -> String {
        if self.title.is_empty() {
            format!("Window {}", self.id.raw())
        } else {
            self.title.clone()
        }
    }
}
