//! Platform and window-manager detection.
//!
//! Detection only looks at the environment and the process table; it never
//! talks to a window manager.  Both are reached through [`Environment`] so
//! tests can describe a machine without being on one.

use crate::command::BackendKind;
use log::debug;
use std::fmt;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::MacOs => "macOS",
            Platform::Linux => "linux",
            Platform::Windows => "windows",
        })
    }
}

/// What detection needs to know about the machine.
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    /// Whether a process with exactly this image name is running.
    fn process_running(&self, name: &str) -> bool;
}

/// The real environment: process variables, `pgrep` and `tasklist`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn process_running(&self, name: &str) -> bool {
        if cfg!(target_os = "windows") {
            // tasklist exits 0 even when nothing matches
            let filter = format!("IMAGENAME eq {}", name);
            Command::new("tasklist")
                .args(["/FI", filter.as_str()])
                .output()
                .map(|o| String::from_utf8_lossy(&o.stdout).contains(name))
                .unwrap_or(false)
        } else {
            Command::new("pgrep")
                .args(["-x", name])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectError {
    #[error("no supported window manager detected on {0}")]
    Unknown(Platform),
    #[error("{0} is not supported yet")]
    Unsupported(BackendKind),
}

/// Find out which window manager is running on `platform`.
///
/// Recognised managers that have no backend yet are reported as found; use
/// [`require_supported`] before driving one.
pub fn detect_backend(platform: Platform, env: &impl Environment) -> Result<BackendKind, DetectError> {
    let found = match platform {
        Platform::MacOs => env
            .process_running("AeroSpace")
            .then_some(BackendKind::Aerospace),
        Platform::Linux => {
            let wayland = env.var("XDG_SESSION_TYPE").as_deref() == Some("wayland");
            if wayland {
                env.var("SWAYSOCK").map(|_| BackendKind::Sway)
            } else {
                env.var("I3SOCK").map(|_| BackendKind::I3)
            }
        }
        Platform::Windows => [
            ("komorebi.exe", BackendKind::Komorebi),
            ("glazewm.exe", BackendKind::GlazeWm),
            ("fancywm.exe", BackendKind::FancyWm),
        ]
        .into_iter()
        .find(|(image, _)| env.process_running(image))
        .map(|(_, kind)| kind),
    };
    debug!("detected {:?} on {}", found, platform);
    found.ok_or(DetectError::Unknown(platform))
}

/// Reject window managers unilayout has no backend for.
pub fn require_supported(kind: BackendKind) -> Result<BackendKind, DetectError> {
    if kind.is_supported() {
        Ok(kind)
    } else {
        Err(DetectError::Unsupported(kind))
    }
}
