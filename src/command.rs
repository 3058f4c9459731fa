//! Commands and types shared between the engine and the backends.
//!
//! [`WmCommand`] is the complete vocabulary of side effects the engine can
//! request; every backend translates it into its own primitives.
//! [`WindowInfo`] and [`DisplayInfo`] describe what a backend reports back.

use crate::layout::{Dimension, Gaps, LayoutKind, Orientation, WorkspaceId};
use std::fmt;

/// The concrete window managers a config can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Aerospace,
    I3,
    Sway,
    Komorebi,
    GlazeWm,
    FancyWm,
}

impl BackendKind {
    /// Whether this crate ships an adapter for the backend.
    pub fn is_supported(self) -> bool {
        matches!(self, BackendKind::Aerospace | BackendKind::I3 | BackendKind::Sway)
    }

    /// Which app-mapping field identifies apps on this backend, in lookup
    /// order.
    pub fn identifier_fields(self) -> &'static [IdentifierField] {
        match self {
            BackendKind::Aerospace => &[IdentifierField::MacOs],
            BackendKind::I3 => &[IdentifierField::LinuxX11],
            BackendKind::Sway => &[IdentifierField::LinuxWayland, IdentifierField::LinuxX11],
            BackendKind::Komorebi | BackendKind::GlazeWm | BackendKind::FancyWm => {
                &[IdentifierField::Windows]
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Aerospace => write!(f, "aerospace"),
            BackendKind::I3 => write!(f, "i3"),
            BackendKind::Sway => write!(f, "sway"),
            BackendKind::Komorebi => write!(f, "komorebi"),
            BackendKind::GlazeWm => write!(f, "glazewm"),
            BackendKind::FancyWm => write!(f, "fancywm"),
        }
    }
}

/// A platform-specific field of an app mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierField {
    /// Bundle id, e.g. `com.google.Chrome`.
    MacOs,
    /// X11 `WM_CLASS` class.
    LinuxX11,
    /// Wayland `app_id`.
    LinuxWayland,
    /// Process name, e.g. `chrome.exe`.
    Windows,
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierField::MacOs => write!(f, "macOS"),
            IdentifierField::LinuxX11 => write!(f, "linux_x11"),
            IdentifierField::LinuxWayland => write!(f, "linux_wayland"),
            IdentifierField::Windows => write!(f, "windows"),
        }
    }
}

/// Opaque backend window id.  Only meaningful within a single run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub String);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A mapped window as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    /// The identifier app mappings are matched against (bundle id, X11
    /// class or Wayland app id, depending on the backend).
    pub app_id: String,
    pub title: String,
    /// Workspace the window currently lives on.
    pub workspace: String,
}

/// A physical display.  Queried fresh for every layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
    pub is_internal: bool,
}

impl DisplayInfo {
    /// Size of the display along `dimension`.
    pub fn extent(&self, dimension: Dimension) -> u32 {
        match dimension {
            Dimension::Width => self.width,
            Dimension::Height => self.height,
        }
    }
}

impl fmt::Display for DisplayInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{}) ({}, {})",
            self.name,
            self.width,
            self.height,
            if self.is_primary { "main" } else { "secondary" },
            if self.is_internal { "internal" } else { "external" },
        )
    }
}

/// A capability a backend may or may not offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Move,
    Topology,
    Resize,
    Gaps,
    Launch,
}

/// Every side effect the engine can ask a backend to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WmCommand {
    /// Make `workspace` the visible, focused workspace.
    FocusWorkspace { workspace: WorkspaceId },

    /// Move `window` onto `workspace`.
    MoveToWorkspace {
        window: WindowHandle,
        workspace: WorkspaceId,
    },

    /// Flatten whatever containers are left on `workspace` and set its root
    /// container to `kind` arranged along `orientation`.
    ResetTopology {
        workspace: WorkspaceId,
        kind: LayoutKind,
        orientation: Orientation,
    },

    /// Open a container along `orientation`, anchored at the group's first
    /// window.
    StartSplit {
        anchor: WindowHandle,
        orientation: Orientation,
    },

    /// Attach `window` (or the group it anchors) to the container opened
    /// for its parent, along the parent's `orientation`.  `depth` is 0 for
    /// root-level siblings.
    AttachNext {
        window: WindowHandle,
        orientation: Orientation,
        depth: usize,
    },

    /// Resize `window` so that `dimension` is `pixels` wide/tall.
    SetDimension {
        window: WindowHandle,
        dimension: Dimension,
        pixels: u32,
    },

    /// Apply gap sizes to `workspace`.
    SetGaps { workspace: WorkspaceId, gaps: Gaps },

    /// Start the app identified by `identifier` without waiting for it.
    Launch { identifier: String },
}

impl WmCommand {
    /// The capability a backend needs to execute this command.
    pub fn capability(&self) -> Capability {
        match self {
            WmCommand::FocusWorkspace { .. } | WmCommand::MoveToWorkspace { .. } => {
                Capability::Move
            }
            WmCommand::ResetTopology { .. }
            | WmCommand::StartSplit { .. }
            | WmCommand::AttachNext { .. } => Capability::Topology,
            WmCommand::SetDimension { .. } => Capability::Resize,
            WmCommand::SetGaps { .. } => Capability::Gaps,
            WmCommand::Launch { .. } => Capability::Launch,
        }
    }
}

impl fmt::Display for WmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WmCommand::FocusWorkspace { workspace } => write!(f, "focus workspace {}", workspace),
            WmCommand::MoveToWorkspace { window, workspace } => {
                write!(f, "move {} to workspace {}", window, workspace)
            }
            WmCommand::ResetTopology {
                workspace,
                kind,
                orientation,
            } => write!(f, "reset {} to {:?} {}", workspace, kind, orientation),
            WmCommand::StartSplit {
                anchor,
                orientation,
            } => write!(f, "start {} split at {}", orientation, anchor),
            WmCommand::AttachNext {
                window,
                orientation,
                depth,
            } => write!(f, "attach {} {} (depth {})", window, orientation, depth),
            WmCommand::SetDimension {
                window,
                dimension,
                pixels,
            } => write!(f, "resize {} {} {}px", window, dimension, pixels),
            WmCommand::SetGaps { workspace, gaps } => write!(
                f,
                "gaps on {}: inner {:?} outer {:?}",
                workspace, gaps.inner, gaps.outer
            ),
            WmCommand::Launch { identifier } => write!(f, "launch {}", identifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_fields_per_backend() {
        assert_eq!(BackendKind::Aerospace.identifier_fields(), &[IdentifierField::MacOs]);
        assert_eq!(BackendKind::I3.identifier_fields(), &[IdentifierField::LinuxX11]);
        assert_eq!(
            BackendKind::Sway.identifier_fields(),
            &[IdentifierField::LinuxWayland, IdentifierField::LinuxX11]
        );
        assert_eq!(BackendKind::GlazeWm.identifier_fields(), &[IdentifierField::Windows]);
    }

    #[test]
    fn supported_backends() {
        assert!(BackendKind::I3.is_supported());
        assert!(BackendKind::Sway.is_supported());
        assert!(BackendKind::Aerospace.is_supported());
        assert!(!BackendKind::Komorebi.is_supported());
    }

    #[test]
    fn command_capabilities() {
        let w = WindowHandle("1".into());
        assert_eq!(
            WmCommand::MoveToWorkspace {
                window: w.clone(),
                workspace: WorkspaceId::new("2"),
            }
            .capability(),
            Capability::Move
        );
        assert_eq!(
            WmCommand::AttachNext {
                window: w.clone(),
                orientation: Orientation::Vertical,
                depth: 1,
            }
            .capability(),
            Capability::Topology
        );
        assert_eq!(
            WmCommand::SetDimension {
                window: w,
                dimension: Dimension::Width,
                pixels: 10,
            }
            .capability(),
            Capability::Resize
        );
        assert_eq!(
            WmCommand::Launch {
                identifier: "kitty".into()
            }
            .capability(),
            Capability::Launch
        );
    }

    #[test]
    fn display_extent() {
        let d = DisplayInfo {
            id: 1,
            name: "DP-1".into(),
            width: 2560,
            height: 1440,
            is_primary: true,
            is_internal: false,
        };
        assert_eq!(d.extent(Dimension::Width), 2560);
        assert_eq!(d.extent(Dimension::Height), 1440);
        assert_eq!(d.to_string(), "DP-1 (2560x1440) (main, external)");
    }
}
