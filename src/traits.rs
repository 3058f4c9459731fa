//! Core traits that decouple unilayout from any specific window manager and
//! from wall-clock time.
//!
//! Every concrete backend (i3/Sway IPC, the AeroSpace CLI, a test harness,
//! …) implements [`WindowManager`].  The
//! [`LayoutEngine`](crate::engine::LayoutEngine) only depends on these
//! abstractions.

use crate::command::{BackendKind, Capability, DisplayInfo, WindowInfo, WmCommand};
use crate::layout::WorkspaceId;
use log::{debug, warn};
use std::time::Duration;

/// Every capability, for backends that implement the full command set.
pub const ALL_CAPABILITIES: &[Capability] = &[
    Capability::Move,
    Capability::Topology,
    Capability::Resize,
    Capability::Gaps,
    Capability::Launch,
];

/// Abstraction over a window manager that can report windows and displays
/// and execute [`WmCommand`]s.
///
/// An implementation might talk to i3 over its IPC socket, shell out to a
/// CLI, or be a recording stub used in tests.
pub trait WindowManager {
    /// The error type produced by this window manager.
    type Error: std::error::Error + Send + 'static;

    /// Which backend this is.  Selects the app-mapping field used to match
    /// windows.
    fn kind(&self) -> BackendKind;

    /// Commands this backend knows how to execute.
    fn capabilities(&self) -> &'static [Capability] {
        ALL_CAPABILITIES
    }

    /// Return the displays currently attached.
    fn displays(&self) -> Result<Vec<DisplayInfo>, Self::Error>;

    /// Return every mapped window, on any workspace.
    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error>;

    /// Return the windows currently on `workspace`.
    fn workspace_windows(&self, workspace: &WorkspaceId) -> Result<Vec<WindowInfo>, Self::Error> {
        Ok(self
            .windows()?
            .into_iter()
            .filter(|w| w.workspace == workspace.as_str())
            .collect())
    }

    /// Execute a single command.
    fn execute(&self, cmd: &WmCommand) -> Result<(), Self::Error>;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Best-effort execution: commands outside the backend's capability set
    /// are skipped, failures are logged and swallowed.
    ///
    /// Returns whether the command was executed successfully.
    fn dispatch(&self, cmd: &WmCommand) -> bool {
        if !self.supports(cmd.capability()) {
            debug!("{} does not support {:?}, skipping: {}", self.kind(), cmd.capability(), cmd);
            return false;
        }
        debug!("{}: {}", self.kind(), cmd);
        match self.execute(cmd) {
            Ok(()) => true,
            Err(e) => {
                warn!("{} failed: {}", cmd, e);
                false
            }
        }
    }
}

/// Source of delays for polling loops.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::WindowHandle;
    use crate::layout::{Gaps, Orientation};
    use std::cell::RefCell;

    //  Mock WindowManager

    /// A test double that records every command and can be told to fail.
    #[derive(Debug, Default)]
    struct MockWm {
        executed: RefCell<Vec<WmCommand>>,
        fail: bool,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    impl WindowManager for MockWm {
        type Error = MockError;

        fn kind(&self) -> BackendKind {
            BackendKind::Aerospace
        }

        fn capabilities(&self) -> &'static [Capability] {
            &[Capability::Move, Capability::Topology]
        }

        fn displays(&self) -> Result<Vec<DisplayInfo>, MockError> {
            Ok(Vec::new())
        }

        fn windows(&self) -> Result<Vec<WindowInfo>, MockError> {
            Ok(vec![
                WindowInfo {
                    handle: WindowHandle("1".into()),
                    app_id: "a".into(),
                    title: "one".into(),
                    workspace: "1".into(),
                },
                WindowInfo {
                    handle: WindowHandle("2".into()),
                    app_id: "b".into(),
                    title: "two".into(),
                    workspace: "2".into(),
                },
            ])
        }

        fn execute(&self, cmd: &WmCommand) -> Result<(), MockError> {
            self.executed.borrow_mut().push(cmd.clone());
            if self.fail {
                Err(MockError)
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn workspace_windows_filters_by_workspace() {
        let wm = MockWm::default();
        let ws = wm.workspace_windows(&WorkspaceId::new("2")).unwrap();
        assert_eq!(ws.len(), 1);
        assert_eq!(ws[0].handle, WindowHandle("2".into()));
    }

    #[test]
    fn dispatch_skips_unsupported_commands() {
        let wm = MockWm::default();
        let ran = wm.dispatch(&WmCommand::SetGaps {
            workspace: WorkspaceId::new("1"),
            gaps: Gaps::default(),
        });
        assert!(!ran);
        assert!(wm.executed.borrow().is_empty());
    }

    #[test]
    fn dispatch_swallows_failures() {
        let wm = MockWm {
            fail: true,
            ..MockWm::default()
        };
        let ran = wm.dispatch(&WmCommand::StartSplit {
            anchor: WindowHandle("1".into()),
            orientation: Orientation::Vertical,
        });
        assert!(!ran);
        assert_eq!(wm.executed.borrow().len(), 1);
    }

    #[test]
    fn dispatch_reports_success() {
        let wm = MockWm::default();
        assert!(wm.dispatch(&WmCommand::FocusWorkspace {
            workspace: WorkspaceId::new("3"),
        }));
    }
}
