//! i3 and Sway backend.
//!
//! This module provides the concrete
//! [`WindowManager`](crate::traits::WindowManager) for both window managers,
//! powered by the i3 IPC socket they share.
//!
//! Nothing outside this module should reference i3 or Sway directly.

pub mod ipc;
pub mod wm;

pub use ipc::I3Error;
pub use wm::I3Wm;
