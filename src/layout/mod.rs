pub mod stack;

pub use stack::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{CoreError, CoreResult};
use crate::ids::ControlId;

/// Minimum used for an axis that does not declare one.
pub const DEFAULT_MIN_EXTENT: u16 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Alignment {
    #[default]
    Start,
    Center,
    End,
    /// Consume all available space on the axis.
    Stretch,
}

/// What a control asks for, independent of what it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRequirements {
    pub width: Option<u16>,
    pub min_width: Option<u16>,
    pub max_width: Option<u16>,
    pub height: Option<u16>,
    pub min_height: Option<u16>,
    pub max_height: Option<u16>,
    pub horizontal_alignment: Alignment,
    pub vertical_alignment: Alignment,
    pub flex_factor: u16,
}

impl Default for LayoutRequirements {
    fn default() -> Self {
        Self {
            width: None,
            min_width: None,
            max_width: None,
            height: None,
            min_height: None,
            max_height: None,
            horizontal_alignment: Alignment::Start,
            vertical_alignment: Alignment::Start,
            flex_factor: 1,
        }
    }
}

impl LayoutRequirements {
    pub fn fixed(width: u16, height: u16) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn stretch() -> Self {
        Self {
            horizontal_alignment: Alignment::Stretch,
            vertical_alignment: Alignment::Stretch,
            ..Self::default()
        }
    }

    pub fn with_min(mut self, width: u16, height: u16) -> Self {
        self.min_width = Some(width);
        self.min_height = Some(height);
        self
    }

    pub fn with_max(mut self, width: u16, height: u16) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    pub fn with_flex(mut self, flex_factor: u16) -> Self {
        self.flex_factor = flex_factor;
        self
    }

    pub fn min_extent(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Horizontal => self.min_width,
            Axis::Vertical => self.min_height,
        }
        .unwrap_or(DEFAULT_MIN_EXTENT)
    }

    pub fn max_extent(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Horizontal => self.max_width,
            Axis::Vertical => self.max_height,
        }
        .unwrap_or(u16::MAX)
    }

    pub fn fixed_extent(&self, axis: Axis) -> Option<u16> {
        match axis {
            Axis::Horizontal => self.width,
            Axis::Vertical => self.height,
        }
    }

    fn alignment(&self, axis: Axis) -> Alignment {
        match axis {
            Axis::Horizontal => self.horizontal_alignment,
            Axis::Vertical => self.vertical_alignment,
        }
    }

    /// Size on one axis given `available` cells, and whether that space
    /// falls short of the declared minimum.
    pub fn resolve_axis(&self, axis: Axis, available: u16) -> (u16, bool) {
        let min = self.min_extent(axis);
        let below = available < min;
        if let Some(fixed) = self.fixed_extent(axis) {
            return (fixed, below);
        }
        if self.alignment(axis) == Alignment::Stretch {
            return (available, below);
        }
        let max = self.max_extent(axis).max(min);
        (available.clamp(min, max), below)
    }

    pub fn allocate(&self, width: u16, height: u16) -> LayoutAllocation {
        let (allocated_width, below_w) = self.resolve_axis(Axis::Horizontal, width);
        let (allocated_height, below_h) = self.resolve_axis(Axis::Vertical, height);
        LayoutAllocation {
            allocated_width,
            allocated_height,
            is_below_minimum: below_w || below_h,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutAllocation {
    pub allocated_width: u16,
    pub allocated_height: u16,
    pub is_below_minimum: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutState {
    pub requirements: LayoutRequirements,
    pub allocation: LayoutAllocation,
    pub available: Option<(u16, u16)>,
    pub rendered: Option<(u16, u16)>,
    space_changed: bool,
    requirements_changed: bool,
}

impl LayoutState {
    fn reallocate(&mut self) {
        if let Some((width, height)) = self.available {
            self.allocation = self.requirements.allocate(width, height);
        }
    }

    fn fixed_size_is_stale(&self) -> bool {
        let Some((rendered_w, rendered_h)) = self.rendered else {
            return false;
        };
        self.requirements.width.is_some_and(|w| w != rendered_w)
            || self.requirements.height.is_some_and(|h| h != rendered_h)
    }

    pub fn needs_rerender(&self) -> bool {
        self.space_changed || self.requirements_changed || self.fixed_size_is_stale()
    }
}

#[derive(Debug, Default)]
pub struct LayoutCoordinator {
    states: Mutex<HashMap<ControlId, LayoutState>>,
    disposed: AtomicBool,
}

impl LayoutCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("layout coordinator"));
        }
        Ok(())
    }

    fn with_state<R>(
        &self,
        control: ControlId,
        f: impl FnOnce(&mut LayoutState) -> R,
    ) -> CoreResult<R> {
        self.ensure_live()?;
        let mut states = self.states.lock();
        let state = states
            .get_mut(&control)
            .ok_or(CoreError::UnknownControl(control))?;
        Ok(f(state))
    }

    pub fn register_control(&self, control: ControlId, requirements: LayoutRequirements) -> CoreResult<()> {
        self.ensure_live()?;
        self.states.lock().insert(
            control,
            LayoutState {
                requirements,
                requirements_changed: true,
                ..LayoutState::default()
            },
        );
        Ok(())
    }

    pub fn unregister_control(&self, control: ControlId) -> CoreResult<()> {
        self.ensure_live()?;
        self.states.lock().remove(&control);
        Ok(())
    }

    pub fn set_requirements(&self, control: ControlId, requirements: LayoutRequirements) -> CoreResult<()> {
        self.with_state(control, |state| {
            if state.requirements != requirements {
                state.requirements = requirements;
                state.requirements_changed = true;
                state.reallocate();
            }
        })
    }

    pub fn requirements(&self, control: ControlId) -> CoreResult<LayoutRequirements> {
        self.with_state(control, |state| state.requirements)
    }

    /// Offer `width` x `height` cells. Returns `true` when this differs from
    /// the last offer and the control therefore has to re-render.
    pub fn update_available_space(&self, control: ControlId, width: u16, height: u16) -> CoreResult<bool> {
        self.with_state(control, |state| {
            if state.available == Some((width, height)) {
                return false;
            }
            state.available = Some((width, height));
            state.space_changed = true;
            state.reallocate();
            tracing::trace!(control = %control, width, height, "available space changed");
            true
        })
    }

    pub fn allocation(&self, control: ControlId) -> CoreResult<LayoutAllocation> {
        self.with_state(control, |state| state.allocation)
    }

    pub fn effective_size(&self, control: ControlId) -> CoreResult<(u16, u16)> {
        let allocation = self.allocation(control)?;
        Ok((allocation.allocated_width, allocation.allocated_height))
    }

    pub fn state(&self, control: ControlId) -> CoreResult<LayoutState> {
        self.with_state(control, |state| *state)
    }

    /// The renderer reports what it actually drew. Clears pending change
    /// flags.
    pub fn record_rendered(&self, control: ControlId, width: u16, height: u16) -> CoreResult<()> {
        self.with_state(control, |state| {
            state.rendered = Some((width, height));
            state.space_changed = false;
            state.requirements_changed = false;
        })
    }

    pub fn needs_rerender(&self, control: ControlId) -> CoreResult<bool> {
        self.with_state(control, |state| state.needs_rerender())
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.states.lock().clear();
    }
}
