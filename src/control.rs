//! Capability contracts a control exposes to the core.
//!
//! The core never looks at a control's concrete type. It only needs a
//! focus flag it can flip, which is why `Focusable` takes `&self` and is
//! expected to use interior mutability: the focus coordinator flips flags
//! while holding its own lock, from whichever thread changed focus.

use std::sync::atomic::{AtomicBool, Ordering};

pub trait Focusable: Send + Sync {
    fn set_focused(&self, focused: bool);
    fn is_focused(&self) -> bool;
}

/// Plain atomic focus flag for controls with no extra focus behaviour.
#[derive(Debug, Default)]
pub struct FocusFlag(AtomicBool);

impl FocusFlag {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Focusable for FocusFlag {
    fn set_focused(&self, focused: bool) {
        self.0.store(focused, Ordering::SeqCst);
    }

    fn is_focused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
