//! Coordination core for overlapping terminal windows.
//!
//! A [`WindowSystem`] owns one instance of each coordinator: the window
//! registry (z-order, lifecycle, gestures, attention flash), the modal
//! coordinator, the focus coordinator, the invalidation coordinator and the
//! layout coordinator. The core never paints; renderers drain
//! [`dirty::DirtyTracker`] and draw whatever it reports.

pub mod color;
pub mod config;
pub mod constants;
pub mod control;
pub mod dirty;
pub mod error;
pub mod events;
pub mod focus;
pub mod ids;
pub mod input;
pub mod invalidation;
pub mod layout;
pub mod log_buffer;
pub mod modal;
pub mod notice;
pub mod system;
pub mod theme;
pub mod tracing_sub;
pub mod window;

pub use config::WindowSystemConfig;
pub use error::{CoreError, CoreResult};
pub use ids::{ControlId, Owner, WindowId};
pub use system::WindowSystem;
