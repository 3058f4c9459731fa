//! AeroSpace backend (macOS).
//!
//! Provides the concrete [`WindowManager`](crate::traits::WindowManager)
//! for AeroSpace, driven through its command-line client.
//!
//! Nothing outside this module should reference AeroSpace directly.

pub mod wm;

pub use wm::{AerospaceError, AerospaceWm};
