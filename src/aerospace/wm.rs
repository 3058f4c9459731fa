//! [`WindowManager`] implementation backed by the `aerospace` CLI.
//!
//! AeroSpace has no socket protocol of its own that is stable to speak, so
//! every query and command runs the CLI with an explicit argument vector.
//! Nothing is passed through a shell.  Displays come from
//! `system_profiler SPDisplaysDataType -json`, and apps are launched with
//! `open -b <bundle id>`.

use crate::command::{BackendKind, Capability, DisplayInfo, WindowHandle, WindowInfo, WmCommand};
use crate::layout::{Dimension, LayoutKind, Orientation, WorkspaceId};
use crate::traits::WindowManager;
use log::debug;
use regex::Regex;
use serde::Deserialize;
use std::process::Command;

/// Everything except gaps, which AeroSpace only reads from its own config.
const CAPABILITIES: &[Capability] = &[
    Capability::Move,
    Capability::Topology,
    Capability::Resize,
    Capability::Launch,
];

const WINDOW_FORMAT: &str = "%{window-id} %{app-bundle-id} %{window-title} %{workspace}";

/// AeroSpace-backed window manager.
pub struct AerospaceWm {
    binary: String,
}

/// Errors that can occur when talking to AeroSpace.
#[derive(Debug, thiserror::Error)]
#[error("aerospace error: {0}")]
pub struct AerospaceError(String);

impl Default for AerospaceWm {
    fn default() -> Self {
        Self::new()
    }
}

impl AerospaceWm {
    pub fn new() -> Self {
        Self {
            binary: "aerospace".into(),
        }
    }

    /// Use a different `aerospace` executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn run(&self, invocation: &Invocation) -> Result<String, AerospaceError> {
        let program = match invocation.program {
            Program::Aerospace => self.binary.as_str(),
            Program::Open => "open",
            Program::SystemProfiler => "system_profiler",
        };
        debug!("running {} {:?}", program, invocation.args);
        let output = Command::new(program)
            .args(&invocation.args)
            .output()
            .map_err(|e| AerospaceError(format!("spawn {}: {}", program, e)))?;
        if !output.status.success() {
            return Err(AerospaceError(format!(
                "{} {} failed: {}",
                program,
                invocation.args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout).map_err(|e| AerospaceError(format!("utf-8: {}", e)))
    }

    fn list_windows(&self, args: &[&str]) -> Result<Vec<WindowInfo>, AerospaceError> {
        let mut argv = vec!["list-windows"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["--json", "--format", WINDOW_FORMAT]);
        let json = self.run(&Invocation::aerospace(&argv))?;
        parse_windows(&json)
    }
}

//  Invocations

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Aerospace,
    Open,
    SystemProfiler,
}

/// One process to run: a program and its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: Program,
    pub args: Vec<String>,
}

impl Invocation {
    fn aerospace(args: &[&str]) -> Self {
        Self {
            program: Program::Aerospace,
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// The AeroSpace layout name for a layout kind.  Kinds AeroSpace has no name
/// for are expressed through tiles along the root orientation.
pub fn layout_name(kind: LayoutKind, orientation: Orientation) -> &'static str {
    let (tiles, accordion) = match orientation {
        Orientation::Horizontal => ("h_tiles", "h_accordion"),
        Orientation::Vertical => ("v_tiles", "v_accordion"),
    };
    match kind {
        LayoutKind::Tiles | LayoutKind::Bsp => tiles,
        LayoutKind::Accordion => accordion,
        LayoutKind::HTiles | LayoutKind::Columns => "h_tiles",
        LayoutKind::VTiles | LayoutKind::Rows => "v_tiles",
        LayoutKind::HAccordion => "h_accordion",
        LayoutKind::VAccordion => "v_accordion",
        LayoutKind::Horizontal => "horizontal",
        LayoutKind::Vertical => "vertical",
        LayoutKind::Tiling => "tiling",
        LayoutKind::Floating => "floating",
    }
}

/// Direction `join-with` takes to attach a window to the container before
/// it.
fn join_direction(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Horizontal => "left",
        Orientation::Vertical => "up",
    }
}

/// Translate a command into the processes that implement it.
///
/// [`WmCommand::ResetTopology`] is not covered: it needs a window query
/// between its steps and is handled in [`AerospaceWm::execute`].
pub fn translate(cmd: &WmCommand) -> Result<Vec<Invocation>, AerospaceError> {
    Ok(match cmd {
        WmCommand::FocusWorkspace { workspace } => {
            vec![Invocation::aerospace(&["workspace", workspace.as_str()])]
        }
        WmCommand::MoveToWorkspace { window, workspace } => vec![Invocation::aerospace(&[
            "move-node-to-workspace",
            "--window-id",
            &window.0,
            workspace.as_str(),
        ])],
        WmCommand::StartSplit { anchor, .. } => {
            vec![Invocation::aerospace(&["focus", "--window-id", &anchor.0])]
        }
        WmCommand::AttachNext {
            window,
            orientation,
            depth,
        } => {
            let mut out = vec![Invocation::aerospace(&["focus", "--window-id", &window.0])];
            if *depth > 0 {
                out.push(Invocation::aerospace(&[
                    "join-with",
                    "--window-id",
                    &window.0,
                    join_direction(*orientation),
                ]));
            }
            out
        }
        WmCommand::SetDimension {
            window,
            dimension,
            pixels,
        } => {
            let which = match dimension {
                Dimension::Width => "width",
                Dimension::Height => "height",
            };
            vec![Invocation::aerospace(&[
                "resize",
                "--window-id",
                &window.0,
                which,
                &pixels.to_string(),
            ])]
        }
        WmCommand::Launch { identifier } => vec![Invocation {
            program: Program::Open,
            args: vec!["-b".into(), identifier.clone()],
        }],
        WmCommand::ResetTopology { .. } | WmCommand::SetGaps { .. } => {
            return Err(AerospaceError(format!("cannot translate: {}", cmd)))
        }
    })
}

//  Minimal serde structs for the JSON we care about

#[derive(Debug, Deserialize)]
struct WindowJson {
    #[serde(rename = "window-id")]
    window_id: u64,
    #[serde(rename = "app-bundle-id", default)]
    app_bundle_id: String,
    #[serde(rename = "window-title", default)]
    window_title: String,
    #[serde(default)]
    workspace: String,
}

pub fn parse_windows(json: &str) -> Result<Vec<WindowInfo>, AerospaceError> {
    let windows: Vec<WindowJson> =
        serde_json::from_str(json).map_err(|e| AerospaceError(format!("parse: {}", e)))?;
    Ok(windows
        .into_iter()
        .map(|w| WindowInfo {
            handle: WindowHandle(w.window_id.to_string()),
            app_id: w.app_bundle_id,
            title: w.window_title,
            workspace: w.workspace,
        })
        .collect())
}

/// `system_profiler SPDisplaysDataType -json` output: GPUs, each with the
/// displays attached to it.
#[derive(Debug, Deserialize)]
struct ProfilerJson {
    #[serde(rename = "SPDisplaysDataType", default)]
    gpus: Vec<GpuJson>,
}

#[derive(Debug, Deserialize)]
struct GpuJson {
    #[serde(default)]
    spdisplays_ndrvs: Vec<ProfiledDisplay>,
}

#[derive(Debug, Deserialize)]
struct ProfiledDisplay {
    #[serde(rename = "_name")]
    name: String,
    #[serde(rename = "_spdisplays_displayID", default)]
    display_id: Option<String>,
    #[serde(rename = "_spdisplays_resolution", default)]
    resolution: Option<String>,
    #[serde(rename = "spdisplays_resolution", default)]
    fallback_resolution: Option<String>,
    #[serde(default)]
    spdisplays_main: Option<String>,
    #[serde(default)]
    spdisplays_connection_type: Option<String>,
}

/// Parse strings like `"3024 x 1964 Retina"` or `"2560 x 1440 @ 60.00Hz"`.
fn parse_resolution(s: &str) -> Option<(u32, u32)> {
    let re = Regex::new(r"(\d+)\s*x\s*(\d+)").ok()?;
    let caps = re.captures(s)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Convert profiler output to displays.  Displays without a numeric id are
/// numbered by position.
pub fn parse_displays(json: &str) -> Result<Vec<DisplayInfo>, AerospaceError> {
    let profile: ProfilerJson =
        serde_json::from_str(json).map_err(|e| AerospaceError(format!("parse: {}", e)))?;
    Ok(profile
        .gpus
        .into_iter()
        .flat_map(|gpu| gpu.spdisplays_ndrvs)
        .enumerate()
        .map(|(i, d)| {
            let (width, height) = d
                .resolution
                .as_deref()
                .or(d.fallback_resolution.as_deref())
                .and_then(parse_resolution)
                .unwrap_or((0, 0));
            DisplayInfo {
                id: d
                    .display_id
                    .as_deref()
                    .and_then(|id| id.trim().parse().ok())
                    .unwrap_or(i as u32),
                name: d.name,
                width,
                height,
                is_primary: d.spdisplays_main.as_deref() == Some("spdisplays_yes"),
                is_internal: d.spdisplays_connection_type.as_deref() == Some("spdisplays_internal"),
            }
        })
        .collect())
}

//  WindowManager implementation

impl WindowManager for AerospaceWm {
    type Error = AerospaceError;

    fn kind(&self) -> BackendKind {
        BackendKind::Aerospace
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn displays(&self) -> Result<Vec<DisplayInfo>, Self::Error> {
        let json = self.run(&Invocation {
            program: Program::SystemProfiler,
            args: vec!["SPDisplaysDataType".into(), "-json".into()],
        })?;
        parse_displays(&json)
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error> {
        self.list_windows(&["--all"])
    }

    fn workspace_windows(&self, workspace: &WorkspaceId) -> Result<Vec<WindowInfo>, Self::Error> {
        self.list_windows(&["--workspace", workspace.as_str()])
    }

    fn execute(&self, cmd: &WmCommand) -> Result<(), Self::Error> {
        if let WmCommand::ResetTopology {
            workspace,
            kind,
            orientation,
        } = cmd
        {
            self.run(&Invocation::aerospace(&[
                "flatten-workspace-tree",
                "--workspace",
                workspace.as_str(),
            ]))?;
            // the layout command applies to the container of a window
            if let Some(first) = self.workspace_windows(workspace)?.into_iter().next() {
                self.run(&Invocation::aerospace(&[
                    "layout",
                    layout_name(*kind, *orientation),
                    "--window-id",
                    &first.handle.0,
                ]))?;
            }
            return Ok(());
        }
        for invocation in translate(cmd)? {
            self.run(&invocation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(id: &str) -> WindowHandle {
        WindowHandle(id.into())
    }

    fn args(invocations: &[Invocation]) -> Vec<Vec<&str>> {
        invocations
            .iter()
            .map(|i| i.args.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn parse_windows_json() {
        let json = r#"[
            { "window-id": 4711, "app-bundle-id": "com.google.Chrome",
              "window-title": "Inbox", "workspace": "2" },
            { "window-id": 12, "app-bundle-id": "net.kovidgoyal.kitty",
              "window-title": "zsh", "workspace": "S" }
        ]"#;
        let windows = parse_windows(json).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].handle, h("4711"));
        assert_eq!(windows[0].app_id, "com.google.Chrome");
        assert_eq!(windows[0].title, "Inbox");
        assert_eq!(windows[1].workspace, "S");
    }

    #[test]
    fn parse_windows_rejects_garbage() {
        assert!(parse_windows("aerospace: not running").is_err());
    }

    const PROFILER: &str = r#"{
        "SPDisplaysDataType": [
            { "_name": "Apple M2 Pro",
              "spdisplays_ndrvs": [
                { "_name": "Color LCD", "_spdisplays_displayID": "1",
                  "_spdisplays_resolution": "3024 x 1964 Retina",
                  "spdisplays_main": "spdisplays_yes",
                  "spdisplays_connection_type": "spdisplays_internal" },
                { "_name": "DELL U2720Q", "_spdisplays_displayID": "4",
                  "spdisplays_resolution": "3840 x 2160 @ 60.00Hz",
                  "spdisplays_main": "spdisplays_no" }
              ] },
            { "_name": "eGPU" }
        ]
    }"#;

    #[test]
    fn parse_profiler_displays() {
        let displays = parse_displays(PROFILER).unwrap();
        assert_eq!(displays.len(), 2);

        assert_eq!(displays[0].id, 1);
        assert_eq!(displays[0].name, "Color LCD");
        assert_eq!((displays[0].width, displays[0].height), (3024, 1964));
        assert!(displays[0].is_primary);
        assert!(displays[0].is_internal);

        assert_eq!(displays[1].id, 4);
        assert_eq!((displays[1].width, displays[1].height), (3840, 2160));
        assert!(!displays[1].is_primary);
        assert!(!displays[1].is_internal);
    }

    #[test]
    fn missing_display_id_uses_position() {
        let json = r#"{ "SPDisplaysDataType": [ { "spdisplays_ndrvs": [
            { "_name": "A", "_spdisplays_resolution": "1920 x 1080" },
            { "_name": "B", "_spdisplays_displayID": "not a number" }
        ] } ] }"#;
        let displays = parse_displays(json).unwrap();
        assert_eq!(displays[0].id, 0);
        assert_eq!(displays[1].id, 1);
        assert_eq!((displays[1].width, displays[1].height), (0, 0));
    }

    #[test]
    fn translate_moves() {
        let out = translate(&WmCommand::MoveToWorkspace {
            window: h("42"),
            workspace: WorkspaceId::new("S"),
        })
        .unwrap();
        assert_eq!(out[0].program, Program::Aerospace);
        assert_eq!(
            args(&out),
            vec![vec!["move-node-to-workspace", "--window-id", "42", "S"]]
        );
    }

    #[test]
    fn translate_attach_uses_join_with_inside_groups() {
        let root = translate(&WmCommand::AttachNext {
            window: h("7"),
            orientation: Orientation::Horizontal,
            depth: 0,
        })
        .unwrap();
        assert_eq!(args(&root), vec![vec!["focus", "--window-id", "7"]]);

        let nested = translate(&WmCommand::AttachNext {
            window: h("7"),
            orientation: Orientation::Vertical,
            depth: 1,
        })
        .unwrap();
        assert_eq!(
            args(&nested),
            vec![
                vec!["focus", "--window-id", "7"],
                vec!["join-with", "--window-id", "7", "up"],
            ]
        );
    }

    #[test]
    fn translate_resize_and_launch() {
        let out = translate(&WmCommand::SetDimension {
            window: h("9"),
            dimension: Dimension::Width,
            pixels: 1280,
        })
        .unwrap();
        assert_eq!(args(&out), vec![vec!["resize", "--window-id", "9", "width", "1280"]]);

        let out = translate(&WmCommand::Launch {
            identifier: "com.apple.Safari".into(),
        })
        .unwrap();
        assert_eq!(out[0].program, Program::Open);
        assert_eq!(args(&out), vec![vec!["-b", "com.apple.Safari"]]);
    }

    #[test]
    fn layout_names() {
        assert_eq!(layout_name(LayoutKind::Tiles, Orientation::Vertical), "v_tiles");
        assert_eq!(layout_name(LayoutKind::Accordion, Orientation::Horizontal), "h_accordion");
        assert_eq!(layout_name(LayoutKind::Columns, Orientation::Vertical), "h_tiles");
        assert_eq!(layout_name(LayoutKind::Floating, Orientation::Vertical), "floating");
    }

    #[test]
    fn gaps_are_not_advertised() {
        let wm = AerospaceWm::new();
        assert!(!wm.supports(Capability::Gaps));
        assert!(wm.supports(Capability::Topology));
        assert!(translate(&WmCommand::SetGaps {
            workspace: WorkspaceId::new("1"),
            gaps: Default::default(),
        })
        .is_err());
    }
}
