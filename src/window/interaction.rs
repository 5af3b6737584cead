//! Drag and resize gesture state plus the bounds math applied to it.
//!
//! Both gestures are anchored: the new bounds are always computed from the
//! bounds and mouse position captured when the gesture started, never
//! accumulated from intermediate events.

use ratatui::prelude::Rect;

use super::Bounds;
use crate::constants::{MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH};
use crate::ids::WindowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeEdge {
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeEdge {
    fn moves_left(self) -> bool {
        matches!(self, Self::Left | Self::TopLeft | Self::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, Self::Right | Self::TopRight | Self::BottomRight)
    }

    fn moves_top(self) -> bool {
        matches!(self, Self::Top | Self::TopLeft | Self::TopRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, Self::Bottom | Self::BottomLeft | Self::BottomRight)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Drag,
    Resize(ResizeEdge),
}

/// The one gesture the system tracks at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionState {
    pub window: WindowId,
    pub kind: GestureKind,
    pub start_column: u16,
    pub start_row: u16,
    pub start_bounds: Bounds,
}

impl InteractionState {
    /// Bounds for the pointer now at (`column`, `row`).
    pub fn apply(&self, column: u16, row: u16) -> Bounds {
        let dx = column as i32 - self.start_column as i32;
        let dy = row as i32 - self.start_row as i32;
        match self.kind {
            GestureKind::Drag => apply_move(self.start_bounds, dx, dy),
            GestureKind::Resize(edge) => apply_resize(self.start_bounds, edge, dx, dy),
        }
    }
}

pub fn apply_move(start: Bounds, dx: i32, dy: i32) -> Bounds {
    Bounds {
        x: start.x.saturating_add(dx),
        y: start.y.saturating_add(dy),
        ..start
    }
}

/// Resize `start` by dragging `edge` by (`dx`, `dy`).
///
/// Shrinking past the minimum size pins the opposite edge: a left or top
/// edge stops moving once the window is as small as it may get.
pub fn apply_resize(start: Bounds, edge: ResizeEdge, dx: i32, dy: i32) -> Bounds {
    let mut x = start.x;
    let mut y = start.y;
    let mut width = start.width as i32;
    let mut height = start.height as i32;

    if edge.moves_left() {
        x += dx;
        width -= dx;
    } else if edge.moves_right() {
        width += dx;
    }
    if edge.moves_top() {
        y += dy;
        height -= dy;
    } else if edge.moves_bottom() {
        height += dy;
    }

    let min_w = MIN_WINDOW_WIDTH as i32;
    let min_h = MIN_WINDOW_HEIGHT as i32;
    if width < min_w {
        if edge.moves_left() {
            x -= min_w - width;
        }
        width = min_w;
    }
    if height < min_h {
        if edge.moves_top() {
            y -= min_h - height;
        }
        height = min_h;
    }

    Bounds {
        x,
        y,
        width: width.min(u16::MAX as i32) as u16,
        height: height.min(u16::MAX as i32) as u16,
    }
}

/// Which resize edge, if any, sits under (`column`, `row`) on the frame of
/// `bounds`. Corners take precedence over edges.
pub fn resize_edge_at(bounds: Bounds, column: u16, row: u16) -> Option<ResizeEdge> {
    if bounds.is_empty() || !bounds.contains(column, row) {
        return None;
    }
    let (column, row) = (column as i32, row as i32);
    let left = column == bounds.x;
    let right = column == bounds.right() - 1;
    let top = row == bounds.y;
    let bottom = row == bounds.bottom() - 1;
    match (left, right, top, bottom) {
        (true, _, true, _) => Some(ResizeEdge::TopLeft),
        (_, true, true, _) => Some(ResizeEdge::TopRight),
        (true, _, _, true) => Some(ResizeEdge::BottomLeft),
        (_, true, _, true) => Some(ResizeEdge::BottomRight),
        (true, _, _, _) => Some(ResizeEdge::Left),
        (_, true, _, _) => Some(ResizeEdge::Right),
        (_, _, _, true) => Some(ResizeEdge::Bottom),
        // the top row doubles as the title bar; only its corners resize
        _ => None,
    }
}

/// The draggable title row of a window frame, clipped to `screen`.
pub fn title_bar(bounds: Bounds, screen: Rect) -> Option<Rect> {
    if bounds.width < 3 || bounds.height < 2 {
        return None;
    }
    let bar = Bounds::new(bounds.x + 1, bounds.y, bounds.width - 2, 1);
    bar.visible_in(screen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_top_drag_down() {
        let start = Bounds::new(0, 50, 20, 20);
        assert_eq!(
            apply_resize(start, ResizeEdge::Top, 0, 5),
            Bounds::new(0, 55, 20, 15)
        );
    }

    #[test]
    fn resize_left_keeps_negative_origin() {
        let start = Bounds::new(-8, 10, 30, 12);
        let res = apply_resize(start, ResizeEdge::Left, 4, 0);
        assert_eq!(res, Bounds::new(-4, 10, 26, 12));
    }

    #[test]
    fn shrinking_past_minimum_pins_far_edge() {
        let start = Bounds::new(10, 10, 10, 10);
        let res = apply_resize(start, ResizeEdge::TopLeft, 9, 9);
        assert_eq!(
            res,
            Bounds::new(
                20 - MIN_WINDOW_WIDTH as i32,
                20 - MIN_WINDOW_HEIGHT as i32,
                MIN_WINDOW_WIDTH,
                MIN_WINDOW_HEIGHT
            )
        );
    }

    #[test]
    fn drag_is_anchored_to_gesture_start() {
        let state = InteractionState {
            window: WindowId::from_raw(1),
            kind: GestureKind::Drag,
            start_column: 5,
            start_row: 5,
            start_bounds: Bounds::new(2, 2, 10, 5),
        };
        assert_eq!(state.apply(8, 4), Bounds::new(5, 1, 10, 5));
        assert_eq!(state.apply(0, 0), Bounds::new(-3, -3, 10, 5));
    }

    #[test]
    fn edge_hit_testing() {
        let bounds = Bounds::new(0, 0, 10, 5);
        assert_eq!(resize_edge_at(bounds, 0, 0), Some(ResizeEdge::TopLeft));
        assert_eq!(resize_edge_at(bounds, 9, 4), Some(ResizeEdge::BottomRight));
        assert_eq!(resize_edge_at(bounds, 0, 2), Some(ResizeEdge::Left));
        assert_eq!(resize_edge_at(bounds, 4, 4), Some(ResizeEdge::Bottom));
        assert_eq!(resize_edge_at(bounds, 4, 0), None);
        assert_eq!(resize_edge_at(bounds, 4, 2), None);
    }
}
