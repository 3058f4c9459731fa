//! Window acquisition: find the window for a layout leaf, launching its app
//! first if asked to.
//!
//! Launches are fire-and-forget, so a freshly started app is picked up by
//! polling.  Polling is a small state machine driven by an injectable
//! [`Clock`], which keeps tests free of real timers.

use crate::command::{WindowHandle, WindowInfo, WmCommand};
use crate::config::AppMappings;
use crate::layout::WindowSpec;
use crate::resolve::resolve_identifier;
use crate::traits::{Clock, WindowManager};
use log::{debug, info, warn};
use regex::Regex;
use std::time::Duration;

/// How often, and how far apart, to look for a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub spacing: Duration,
}

impl RetryPolicy {
    /// Waiting for an app that was just launched.
    pub const AFTER_LAUNCH: RetryPolicy = RetryPolicy {
        attempts: 20,
        spacing: Duration::from_millis(100),
    };

    /// Looking for a window that should already exist.
    pub const EXISTING: RetryPolicy = RetryPolicy {
        attempts: 5,
        spacing: Duration::from_millis(50),
    };

    pub fn for_launch(should_launch: bool) -> Self {
        if should_launch {
            Self::AFTER_LAUNCH
        } else {
            Self::EXISTING
        }
    }
}

/// States of a single [`Acquirer::ensure_window`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireState {
    Idle,
    Launching,
    Polling { attempts_left: u32 },
    Found(WindowHandle),
    TimedOut,
}

/// Pick the window for `spec` among `windows`: same app identifier, title
/// matching the optional pattern, then the `instance_index`-th survivor.
pub fn select_window<'w>(
    windows: &'w [WindowInfo],
    identifier: &str,
    spec: &WindowSpec,
) -> Option<&'w WindowInfo> {
    let title = spec.title.as_deref().and_then(|pattern| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("ignoring invalid title pattern {:?} for {}: {}", pattern, spec.app, e);
            None
        }
    });
    windows
        .iter()
        .filter(|w| w.app_id == identifier)
        .filter(|w| title.as_ref().map_or(true, |re| re.is_match(&w.title)))
        .nth(spec.instance_index.unwrap_or(0))
}

/// Finds and, if needed, launches windows for layout leaves.
pub struct Acquirer<'a, W: WindowManager, C: Clock> {
    wm: &'a W,
    clock: &'a C,
    mappings: &'a AppMappings,
}

impl<'a, W: WindowManager, C: Clock> Acquirer<'a, W, C> {
    pub fn new(wm: &'a W, clock: &'a C, mappings: &'a AppMappings) -> Self {
        Self {
            wm,
            clock,
            mappings,
        }
    }

    fn identifier(&self, spec: &WindowSpec) -> Option<&'a str> {
        match resolve_identifier(&spec.app, self.mappings, self.wm.kind()) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    fn lookup(&self, identifier: &str, spec: &WindowSpec) -> Option<WindowHandle> {
        let windows = match self.wm.windows() {
            Ok(w) => w,
            Err(e) => {
                warn!("failed to list windows: {}", e);
                return None;
            }
        };
        let found = select_window(&windows, identifier, spec).map(|w| w.handle.clone());
        if found.is_none() {
            debug!("no window found for {} ({})", spec.app, identifier);
        }
        found
    }

    /// Look the window up once, without retrying.
    ///
    /// Handles are re-resolved on every call; nothing is cached between
    /// phases.
    pub fn find_window(&self, spec: &WindowSpec) -> Option<WindowHandle> {
        let identifier = self.identifier(spec)?;
        self.lookup(identifier, spec)
    }

    /// Make sure a window for `spec` exists and return its handle.
    ///
    /// With `should_launch`, an app with no matching window is launched and
    /// polled for up to 20 × 100 ms; otherwise existing windows are polled
    /// for up to 5 × 50 ms.  Returns `None` when the app key is unmapped or
    /// polling runs out.
    pub fn ensure_window(&self, spec: &WindowSpec, should_launch: bool) -> Option<WindowHandle> {
        let identifier = self.identifier(spec)?;
        let policy = RetryPolicy::for_launch(should_launch);

        let mut state = AcquireState::Idle;
        loop {
            state = match state {
                AcquireState::Idle if should_launch => match self.lookup(identifier, spec) {
                    Some(handle) => AcquireState::Found(handle),
                    None => AcquireState::Launching,
                },
                AcquireState::Idle => AcquireState::Polling {
                    attempts_left: policy.attempts,
                },
                AcquireState::Launching => {
                    info!("launching {} ({})", spec.app, identifier);
                    self.wm.dispatch(&WmCommand::Launch {
                        identifier: identifier.to_string(),
                    });
                    AcquireState::Polling {
                        attempts_left: policy.attempts,
                    }
                }
                AcquireState::Polling { attempts_left: 0 } => AcquireState::TimedOut,
                AcquireState::Polling { attempts_left } => match self.lookup(identifier, spec) {
                    Some(handle) => AcquireState::Found(handle),
                    None => {
                        if attempts_left > 1 {
                            self.clock.sleep(policy.spacing);
                        }
                        AcquireState::Polling {
                            attempts_left: attempts_left - 1,
                        }
                    }
                },
                AcquireState::Found(handle) => return Some(handle),
                AcquireState::TimedOut => {
                    warn!(
                        "no window for {} ({}) after {} attempts",
                        spec.app, identifier, policy.attempts
                    );
                    return None;
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BackendKind, DisplayInfo};
    use crate::config::AppMapping;
    use std::cell::{Cell, RefCell};

    /// Window manager whose window list appears after a number of queries.
    #[derive(Default)]
    struct PollingWm {
        queries: Cell<u32>,
        /// The window shows up on this query (1-based); never if `None`.
        appears_on: Option<u32>,
        /// The window exists from the start.
        preexisting: bool,
        launched: RefCell<Vec<String>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("polling wm error")]
    struct PollingErr;

    impl WindowManager for PollingWm {
        type Error = PollingErr;

        fn kind(&self) -> BackendKind {
            BackendKind::I3
        }

        fn displays(&self) -> Result<Vec<DisplayInfo>, PollingErr> {
            Ok(Vec::new())
        }

        fn windows(&self) -> Result<Vec<WindowInfo>, PollingErr> {
            let n = self.queries.get() + 1;
            self.queries.set(n);
            let visible = self.preexisting || self.appears_on.map_or(false, |on| n >= on);
            Ok(if visible {
                vec![WindowInfo {
                    handle: WindowHandle("42".into()),
                    app_id: "kitty".into(),
                    title: "shell".into(),
                    workspace: "1".into(),
                }]
            } else {
                Vec::new()
            })
        }

        fn execute(&self, cmd: &WmCommand) -> Result<(), PollingErr> {
            if let WmCommand::Launch { identifier } = cmd {
                self.launched.borrow_mut().push(identifier.clone());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeClock {
        sleeps: RefCell<Vec<Duration>>,
    }

    impl Clock for FakeClock {
        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
        }
    }

    fn mappings() -> AppMappings {
        let mut m = AppMappings::new();
        m.insert(
            "term".into(),
            AppMapping {
                linux_x11: Some("kitty".into()),
                ..AppMapping::default()
            },
        );
        m
    }

    #[test]
    fn no_launch_gives_up_after_five_attempts() {
        let wm = PollingWm::default();
        let clock = FakeClock::default();
        let m = mappings();
        let acq = Acquirer::new(&wm, &clock, &m);

        assert_eq!(acq.ensure_window(&WindowSpec::new("term"), false), None);
        assert_eq!(wm.queries.get(), 5);
        assert!(wm.launched.borrow().is_empty());
        assert_eq!(*clock.sleeps.borrow(), vec![Duration::from_millis(50); 4]);
    }

    #[test]
    fn launch_then_poll_until_found() {
        let wm = PollingWm {
            appears_on: Some(4),
            ..PollingWm::default()
        };
        let clock = FakeClock::default();
        let m = mappings();
        let acq = Acquirer::new(&wm, &clock, &m);

        let handle = acq.ensure_window(&WindowSpec::new("term"), true);
        assert_eq!(handle, Some(WindowHandle("42".into())));
        assert_eq!(*wm.launched.borrow(), vec!["kitty".to_string()]);
        // one pre-check, then polls 2, 3 and 4
        assert_eq!(wm.queries.get(), 4);
        assert_eq!(clock.sleeps.borrow().len(), 2);
    }

    #[test]
    fn launch_exhausts_twenty_attempts() {
        let wm = PollingWm::default();
        let clock = FakeClock::default();
        let m = mappings();
        let acq = Acquirer::new(&wm, &clock, &m);

        assert_eq!(acq.ensure_window(&WindowSpec::new("term"), true), None);
        assert_eq!(wm.queries.get(), 21);
        assert_eq!(*clock.sleeps.borrow(), vec![Duration::from_millis(100); 19]);
    }

    #[test]
    fn running_app_is_not_relaunched() {
        let wm = PollingWm {
            preexisting: true,
            ..PollingWm::default()
        };
        let clock = FakeClock::default();
        let m = mappings();
        let acq = Acquirer::new(&wm, &clock, &m);

        assert!(acq.ensure_window(&WindowSpec::new("term"), true).is_some());
        assert!(wm.launched.borrow().is_empty());
        assert_eq!(wm.queries.get(), 1);
        assert!(clock.sleeps.borrow().is_empty());
    }

    #[test]
    fn unmapped_app_skips_polling() {
        let wm = PollingWm::default();
        let clock = FakeClock::default();
        let m = mappings();
        let acq = Acquirer::new(&wm, &clock, &m);

        assert_eq!(acq.ensure_window(&WindowSpec::new("ghost"), true), None);
        assert_eq!(wm.queries.get(), 0);
        assert!(wm.launched.borrow().is_empty());
    }

    fn window(handle: &str, app: &str, title: &str) -> WindowInfo {
        WindowInfo {
            handle: WindowHandle(handle.into()),
            app_id: app.into(),
            title: title.into(),
            workspace: "1".into(),
        }
    }

    #[test]
    fn select_by_title_and_instance() {
        let windows = vec![
            window("1", "kitty", "vim main.rs"),
            window("2", "firefox", "docs"),
            window("3", "kitty", "htop"),
            window("4", "kitty", "vim lib.rs"),
        ];
        let mut spec = WindowSpec::new("term");
        assert_eq!(select_window(&windows, "kitty", &spec).map(|w| w.handle.0.as_str()), Some("1"));

        spec.instance_index = Some(1);
        assert_eq!(select_window(&windows, "kitty", &spec).map(|w| w.handle.0.as_str()), Some("3"));

        spec.title = Some("^vim".into());
        assert_eq!(select_window(&windows, "kitty", &spec).map(|w| w.handle.0.as_str()), Some("4"));

        spec.instance_index = Some(2);
        assert!(select_window(&windows, "kitty", &spec).is_none());
    }

    #[test]
    fn invalid_title_pattern_is_ignored() {
        let windows = vec![window("1", "kitty", "x")];
        let spec = WindowSpec {
            app: "term".into(),
            title: Some("([".into()),
            instance_index: None,
        };
        assert!(select_window(&windows, "kitty", &spec).is_some());
    }
}
