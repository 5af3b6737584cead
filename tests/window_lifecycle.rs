use std::collections::HashSet;

use ratatui::layout::Rect;
use term_wm_core::window::{Bounds, WindowSpec, WindowState};
use term_wm_core::{CoreError, WindowId, WindowSystem};

fn open(system: &WindowSystem, title: &str, activate: bool) -> WindowId {
    system
        .open_window(WindowSpec::new(title), activate)
        .expect("open window")
}

/// Every always-on-top window must sit above every normal window.
fn assert_always_on_top_invariant(system: &WindowSystem) {
    let windows = system.registry().windows_by_z().unwrap();
    let max_normal = windows
        .iter()
        .filter(|w| !w.is_always_on_top)
        .map(|w| w.z)
        .max();
    let min_pinned = windows
        .iter()
        .filter(|w| w.is_always_on_top)
        .map(|w| w.z)
        .min();
    if let (Some(normal), Some(pinned)) = (max_normal, min_pinned) {
        assert!(
            pinned > normal,
            "pinned z {pinned} must be above normal z {normal}"
        );
    }
    let zs: HashSet<i64> = windows.iter().map(|w| w.z).collect();
    assert_eq!(zs.len(), windows.len(), "z values must be unique");
}

#[test]
fn first_window_becomes_active_at_z_one() {
    let system = WindowSystem::default();
    let a = open(&system, "A", false);

    let window = system.registry().window(a).unwrap();
    assert_eq!(system.registry().active_window().unwrap(), Some(a));
    assert!(window.is_active);
    assert_eq!(window.z, 1);
}

#[test]
fn inactive_registration_keeps_current_active() {
    let system = WindowSystem::default();
    let a = open(&system, "A", true);
    let b = open(&system, "B", false);

    let registry = system.registry();
    assert_eq!(registry.active_window().unwrap(), Some(a));
    assert!(!registry.window(b).unwrap().is_active);
    assert_eq!(registry.window(b).unwrap().z, registry.window(a).unwrap().z + 1);
}

#[test]
fn modal_child_redirects_parent_activation() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    let m = system
        .open_window(WindowSpec::new("M").modal(Some(a)), true)
        .unwrap();
    assert_eq!(registry.active_window().unwrap(), Some(m));

    assert_eq!(registry.activate_window(a).unwrap(), m);
    assert_eq!(registry.active_window().unwrap(), Some(m));
    assert!(system.flash().is_flashing(m).unwrap());
    assert!(!registry.window(a).unwrap().is_active);
}

#[test]
fn orphan_modal_blocks_unrelated_windows_but_not_descendants() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let b = open(&system, "B", true);
    let o = system
        .open_window(WindowSpec::new("O").modal(None), true)
        .unwrap();
    let helper = system
        .open_window(WindowSpec::new("helper").child_of(o), false)
        .unwrap();

    assert_eq!(registry.activate_window(b).unwrap(), o);
    assert_eq!(registry.activate_window(helper).unwrap(), helper);

    // a modal under the helper becomes the deeper target for the helper
    let confirm = system
        .open_window(WindowSpec::new("confirm").modal(Some(helper)), false)
        .unwrap();
    assert_eq!(registry.activate_window(helper).unwrap(), confirm);
    assert_eq!(registry.activate_window(b).unwrap(), o);
}

#[test]
fn sibling_modals_resolve_to_last_pushed() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    let first = system
        .open_window(WindowSpec::new("first").modal(Some(a)), false)
        .unwrap();
    let second = system
        .open_window(WindowSpec::new("second").modal(Some(a)), false)
        .unwrap();

    assert_eq!(system.modal().effective_activation_target(a).unwrap(), second);
    registry.close(second, true).unwrap();
    assert_eq!(system.modal().effective_activation_target(a).unwrap(), first);
}

#[test]
fn minimizing_active_window_activates_highest_remaining() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    let b = open(&system, "B", true);
    let c = open(&system, "C", true);
    registry.minimize(b).unwrap();
    assert_eq!(registry.active_window().unwrap(), Some(c));

    registry.minimize(c).unwrap();
    assert_eq!(registry.active_window().unwrap(), Some(a));
    assert_eq!(registry.window(c).unwrap().state, WindowState::Minimized);

    registry.minimize(a).unwrap();
    assert_eq!(registry.active_window().unwrap(), None);
    assert_eq!(system.focus().current().unwrap().window, None);
}

#[test]
fn open_modals_refuse_to_minimize() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    let m = system
        .open_window(WindowSpec::new("M").modal(Some(a)), true)
        .unwrap();
    let o = system
        .open_window(WindowSpec::new("O").modal(None), false)
        .unwrap();
    system.dirty().take();

    for modal in [m, o] {
        assert!(matches!(
            registry.minimize(modal),
            Err(CoreError::InvalidArgument(_))
        ));
        assert_eq!(registry.window(modal).unwrap().state, WindowState::Normal);
    }
    assert_eq!(registry.active_window().unwrap(), Some(m));
    assert!(system.dirty().take().is_empty());

    // once closed, the former parent minimizes normally
    registry.close(o, true).unwrap();
    registry.close(m, true).unwrap();
    registry.minimize(a).unwrap();
    assert_eq!(registry.window(a).unwrap().state, WindowState::Minimized);
}

#[test]
fn closing_a_parent_closes_its_open_modals() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let other = open(&system, "other", true);
    let a = open(&system, "A", true);
    let m = system
        .open_window(WindowSpec::new("M").modal(Some(a)), true)
        .unwrap();
    let nested = system
        .open_window(WindowSpec::new("nested").modal(Some(m)), true)
        .unwrap();
    let sibling = system
        .open_window(WindowSpec::new("sibling").modal(Some(a)), false)
        .unwrap();

    assert!(registry.close(a, true).unwrap());
    for gone in [a, m, nested, sibling] {
        assert!(!registry.contains(gone).unwrap());
    }
    assert!(system.modal().modal_stack().unwrap().is_empty());
    assert_eq!(registry.window_count().unwrap(), 1);
    assert_eq!(registry.active_window().unwrap(), Some(other));
    assert_eq!(registry.activate_window(other).unwrap(), other);
}

#[test]
fn always_on_top_survives_mixed_sequences() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let pinned = system
        .open_window(WindowSpec::new("pinned").always_on_top(), true)
        .unwrap();
    assert_always_on_top_invariant(&system);

    let mut normals = Vec::new();
    for i in 0..4 {
        normals.push(open(&system, &format!("n{i}"), i % 2 == 0));
        assert_always_on_top_invariant(&system);
    }
    for id in &normals {
        registry.activate_window(*id).unwrap();
        assert_always_on_top_invariant(&system);
    }
    let second_pin = system
        .open_window(WindowSpec::new("pinned 2").always_on_top(), false)
        .unwrap();
    registry.activate_window(pinned).unwrap();
    assert_always_on_top_invariant(&system);
    assert!(registry.window(pinned).unwrap().z > registry.window(second_pin).unwrap().z);

    registry.close(normals[1], false).unwrap();
    registry.activate_window(normals[3]).unwrap();
    assert_always_on_top_invariant(&system);
}

#[test]
fn activation_is_idempotent() {
    let system = WindowSystem::default();
    let registry = system.registry();
    open(&system, "A", true);
    let b = open(&system, "B", true);
    let before = registry.window(b).unwrap().z;
    system.dirty().take();

    assert_eq!(registry.activate_window(b).unwrap(), b);
    assert_eq!(registry.window(b).unwrap().z, before);
    assert!(system.dirty().take().is_empty());
}

#[test]
fn register_then_close_leaves_nothing_behind() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    let b = open(&system, "B", true);
    let flag = std::sync::Arc::new(term_wm_core::control::FocusFlag::new());
    let control = system
        .create_control(
            b,
            None,
            flag.clone(),
            term_wm_core::layout::LayoutRequirements::stretch(),
        )
        .unwrap();

    assert!(registry.close(b, false).unwrap());
    assert!(!registry.contains(b).unwrap());
    assert_eq!(registry.window_count().unwrap(), 1);
    assert_eq!(registry.active_window().unwrap(), Some(a));
    assert!(matches!(
        system.invalidation().cache_state(control),
        Err(CoreError::UnknownControl(_))
    ));
    assert!(system.layout().state(control).is_err());
    assert!(!system.modal().is_modal(b).unwrap());
    assert!(matches!(
        registry.window(b),
        Err(CoreError::UnknownWindow(id)) if id == b
    ));
}

#[test]
fn closing_a_modal_returns_activation_to_its_parent() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    open(&system, "other", true);
    let m = system
        .open_window(WindowSpec::new("M").modal(Some(a)), true)
        .unwrap();

    registry.close(m, false).unwrap();
    assert_eq!(registry.active_window().unwrap(), Some(a));
    assert!(system.modal().modal_stack().unwrap().is_empty());
}

#[test]
fn vetoed_close_changes_nothing() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    registry.add_closing_guard(a, |_| false).unwrap();
    let locked = system
        .open_window(WindowSpec::new("locked").closable(false), false)
        .unwrap();

    assert!(!registry.close(a, false).unwrap());
    assert!(!registry.close(locked, false).unwrap());
    assert_eq!(registry.window_count().unwrap(), 2);
    assert_eq!(registry.active_window().unwrap(), Some(a));

    assert!(registry.close(a, true).unwrap());
    assert!(!registry.contains(a).unwrap());
}

#[test]
fn maximize_follows_screen_and_restore_returns_bounds() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = system
        .open_window(
            WindowSpec::new("A").with_bounds(Bounds::new(3, 2, 20, 6)),
            true,
        )
        .unwrap();

    registry.maximize(a).unwrap();
    system.set_screen_area(Rect::new(0, 0, 100, 40)).unwrap();
    assert_eq!(registry.window(a).unwrap().bounds, Bounds::new(0, 0, 100, 40));

    registry.restore(a).unwrap();
    let window = registry.window(a).unwrap();
    assert_eq!(window.state, WindowState::Normal);
    assert_eq!(window.bounds, Bounds::new(3, 2, 20, 6));
}

#[test]
fn second_gesture_is_rejected_while_one_runs() {
    let system = WindowSystem::default();
    let registry = system.registry();
    let a = open(&system, "A", true);
    let b = open(&system, "B", false);

    registry.start_drag(a, 1, 0).unwrap();
    assert!(matches!(
        registry.start_drag(b, 5, 5),
        Err(CoreError::InteractionInProgress(id)) if id == a
    ));
    assert!(!registry.end_resize().unwrap());
    assert!(registry.end_drag().unwrap());
    registry.start_drag(b, 5, 5).unwrap();
}

#[test]
fn dispose_turns_every_call_into_an_error() {
    let system = WindowSystem::default();
    let a = open(&system, "A", true);
    system.dispose();
    system.dispose();

    assert!(matches!(
        system.open_window(WindowSpec::new("late"), true),
        Err(CoreError::Disposed(_))
    ));
    assert!(matches!(
        system.registry().activate_window(a),
        Err(CoreError::Disposed(_))
    ));
    assert!(matches!(system.focus().current(), Err(CoreError::Disposed(_))));
    assert!(matches!(
        system.modal().modal_stack(),
        Err(CoreError::Disposed(_))
    ));
    assert!(matches!(
        system.notices().show("late"),
        Err(CoreError::Disposed(_))
    ));

    let registry = system.registry();
    assert!(matches!(registry.active_window(), Err(CoreError::Disposed(_))));
    assert!(matches!(registry.windows_by_z(), Err(CoreError::Disposed(_))));
    assert!(matches!(registry.window_count(), Err(CoreError::Disposed(_))));
    assert!(matches!(registry.window_at(1, 1), Err(CoreError::Disposed(_))));
    assert!(matches!(registry.contains(a), Err(CoreError::Disposed(_))));
    assert!(matches!(registry.end_drag(), Err(CoreError::Disposed(_))));
    assert!(matches!(system.invalidation().stats(), Err(CoreError::Disposed(_))));
    assert!(matches!(
        system.invalidation().pending_len(),
        Err(CoreError::Disposed(_))
    ));
    assert!(matches!(system.flash().start(a), Err(CoreError::Disposed(_))));
}
