use crossterm::event::{Event, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use term_wm_core::input::PointerOutcome;
use term_wm_core::window::{Bounds, WindowSpec, WindowState};
use term_wm_core::{WindowId, WindowSystem};

fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
    Event::Mouse(MouseEvent {
        kind,
        column,
        row,
        modifiers: KeyModifiers::NONE,
    })
}

fn press(system: &WindowSystem, column: u16, row: u16) -> PointerOutcome {
    system
        .pointer()
        .handle_event(&mouse(MouseEventKind::Down(MouseButton::Left), column, row))
        .unwrap()
}

fn drag(system: &WindowSystem, column: u16, row: u16) -> PointerOutcome {
    system
        .pointer()
        .handle_event(&mouse(MouseEventKind::Drag(MouseButton::Left), column, row))
        .unwrap()
}

fn release(system: &WindowSystem, column: u16, row: u16) -> PointerOutcome {
    system
        .pointer()
        .handle_event(&mouse(MouseEventKind::Up(MouseButton::Left), column, row))
        .unwrap()
}

fn open_at(system: &WindowSystem, title: &str, bounds: Bounds) -> WindowId {
    system
        .open_window(WindowSpec::new(title).with_bounds(bounds), true)
        .unwrap()
}

#[test]
fn click_activates_the_window_under_the_pointer() {
    let system = WindowSystem::default();
    let a = open_at(&system, "A", Bounds::new(2, 2, 20, 8));
    let b = open_at(&system, "B", Bounds::new(10, 4, 20, 8));
    assert_eq!(system.registry().active_window().unwrap(), Some(b));

    assert_eq!(press(&system, 4, 5), PointerOutcome::Activated(a));
    assert_eq!(system.registry().active_window().unwrap(), Some(a));
    assert_eq!(release(&system, 4, 5), PointerOutcome::Ignored);

    // the overlap now belongs to A, which is on top
    assert_eq!(system.registry().window_at(12, 6).unwrap(), Some(a));
    assert_eq!(press(&system, 70, 20), PointerOutcome::Ignored);
    assert_eq!(
        press(&system, 4, 5),
        PointerOutcome::Activated(a),
        "clicking the active window again is harmless"
    );
}

#[test]
fn dragging_the_title_row_moves_the_window() {
    let system = WindowSystem::default();
    let a = open_at(&system, "A", Bounds::new(2, 2, 20, 8));

    assert_eq!(press(&system, 6, 2), PointerOutcome::DragStarted(a));
    assert_eq!(
        drag(&system, 9, 4),
        PointerOutcome::Moved(Bounds::new(5, 4, 20, 8))
    );
    assert_eq!(release(&system, 9, 4), PointerOutcome::GestureEnded);
    assert!(system.registry().interaction().unwrap().is_none());
    assert_eq!(
        system.registry().window(a).unwrap().bounds,
        Bounds::new(5, 4, 20, 8)
    );
    assert_eq!(drag(&system, 30, 10), PointerOutcome::Ignored);
}

#[test]
fn dragging_a_frame_corner_resizes_down_to_the_minimum() {
    let system = WindowSystem::default();
    let a = open_at(&system, "A", Bounds::new(2, 2, 20, 8));

    assert_eq!(press(&system, 21, 9), PointerOutcome::ResizeStarted(a));
    assert_eq!(
        drag(&system, 25, 12),
        PointerOutcome::Moved(Bounds::new(2, 2, 24, 11))
    );
    assert_eq!(
        drag(&system, 3, 3),
        PointerOutcome::Moved(Bounds::new(2, 2, 6, 3))
    );
    assert_eq!(release(&system, 3, 3), PointerOutcome::GestureEnded);
    assert_eq!(
        system.registry().window(a).unwrap().bounds,
        Bounds::new(2, 2, 6, 3)
    );
}

#[test]
fn click_on_blocked_parent_surfaces_and_flashes_the_modal() {
    let system = WindowSystem::default();
    let a = open_at(&system, "A", Bounds::new(2, 2, 20, 8));
    let m = system
        .open_window(
            WindowSpec::new("M")
                .with_bounds(Bounds::new(40, 10, 20, 8))
                .modal(Some(a)),
            true,
        )
        .unwrap();

    assert_eq!(
        press(&system, 4, 5),
        PointerOutcome::Blocked {
            requested: a,
            blocking: m
        }
    );
    assert_eq!(system.registry().active_window().unwrap(), Some(m));
    assert!(system.flash().is_flashing(m).unwrap());
    assert!(system.registry().interaction().unwrap().is_none());
}

#[test]
fn double_click_on_title_toggles_maximize() {
    let system = WindowSystem::default();
    let a = open_at(&system, "A", Bounds::new(2, 2, 20, 8));

    assert_eq!(press(&system, 6, 2), PointerOutcome::DragStarted(a));
    assert_eq!(release(&system, 6, 2), PointerOutcome::GestureEnded);
    assert_eq!(press(&system, 6, 2), PointerOutcome::MaximizeToggled(a));

    let window = system.registry().window(a).unwrap();
    assert_eq!(window.state, WindowState::Maximized);
    assert_eq!(window.restore_bounds, Some(Bounds::new(2, 2, 20, 8)));
    assert!(system.registry().interaction().unwrap().is_none());
}

#[test]
fn non_mouse_and_other_buttons_are_ignored() {
    let system = WindowSystem::default();
    open_at(&system, "A", Bounds::new(2, 2, 20, 8));

    assert_eq!(
        system
            .pointer()
            .handle_event(&Event::FocusGained)
            .unwrap(),
        PointerOutcome::Ignored
    );
    assert_eq!(
        system
            .pointer()
            .handle_event(&mouse(MouseEventKind::Down(MouseButton::Right), 4, 5))
            .unwrap(),
        PointerOutcome::Ignored
    );
}
