//! **unilayout**: declarative window layouts for tiling window managers.
//!
//! A layout is a tree: groups arrange their children horizontally or
//! vertically, leaves name an app, and any node may carry a fractional size
//! such as `"1/3"`.  Applying a layout clears its workspace, brings every
//! app's window onto it (launching apps as needed), rebuilds the split
//! hierarchy and resizes each pane against the selected display.
//!
//! # Architecture
//!
//! The crate is organised around one core trait:
//!
//! * [`traits::WindowManager`]: lists windows and displays and executes
//!   abstract [`command::WmCommand`]s, so the layout logic in [`engine`] is
//!   not coupled to any specific window manager.
//!
//! Concrete implementations live in [`i3`] (i3 and Sway IPC) and
//! [`aerospace`] (the AeroSpace CLI).  [`detect`] picks one at runtime.

pub mod acquire;
pub mod aerospace;
pub mod command;
pub mod config;
pub mod detect;
pub mod engine;
pub mod i3;
pub mod layout;
pub mod resolve;
pub mod traits;
