//! [`WindowManager`] implementation for i3 and Sway.
//!
//! Both speak the same IPC protocol over a Unix socket (see
//! [`ipc`](super::ipc)), so one backend serves both; the only differences
//! are the socket variable and which app-mapping field windows are matched
//! by.  No child processes are spawned except to locate the socket.

use super::ipc::{self, I3Error, MessageType};
use crate::command::{BackendKind, DisplayInfo, WindowHandle, WindowInfo, WmCommand};
use crate::layout::{Dimension, LayoutKind, Orientation, WorkspaceId};
use crate::traits::WindowManager;
use serde::Deserialize;
use std::path::PathBuf;

/// i3- or Sway-backed window manager.
///
/// Each query or command opens a short-lived connection to the IPC socket.
pub struct I3Wm {
    kind: BackendKind,
    socket: PathBuf,
}

impl I3Wm {
    /// Locate the IPC socket for `kind` (either [`BackendKind::I3`] or
    /// [`BackendKind::Sway`]).
    pub fn connect(kind: BackendKind) -> Result<Self, I3Error> {
        let socket = ipc::socket_path(kind)?;
        Ok(Self::with_socket(kind, socket))
    }

    pub fn with_socket(kind: BackendKind, socket: PathBuf) -> Self {
        Self { kind, socket }
    }

    fn query<T: for<'de> Deserialize<'de>>(&self, kind: MessageType) -> Result<T, I3Error> {
        let json = ipc::request(&self.socket, kind, "")?;
        serde_json::from_str(&json).map_err(|e| I3Error(format!("parse: {}", e)))
    }

    /// Run a command string and check every reply entry for success.
    fn run(&self, command: &str) -> Result<(), I3Error> {
        let json = ipc::request(&self.socket, MessageType::RunCommand, command)?;
        check_command_reply(&json)
    }
}

//  Minimal serde structs for the JSON we care about

/// One node of the `GET_TREE` reply.
#[derive(Debug, Deserialize)]
pub struct Node {
    id: i64,
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default)]
    name: Option<String>,
    /// Wayland app id (Sway only).
    #[serde(default)]
    app_id: Option<String>,
    /// X11 window id; set for X11 and XWayland windows.
    #[serde(default)]
    window: Option<i64>,
    #[serde(default)]
    window_properties: Option<WindowProperties>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    floating_nodes: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct WindowProperties {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    instance: Option<String>,
}

impl Node {
    fn is_window(&self) -> bool {
        matches!(self.node_type.as_str(), "con" | "floating_con")
            && (self.app_id.is_some() || self.window.is_some())
    }

    /// The identifier a window is matched by: its Wayland app id, else its
    /// X11 class, else its X11 instance.
    fn identifier(&self) -> Option<&str> {
        let props = self.window_properties.as_ref();
        self.app_id
            .as_deref()
            .or_else(|| props.and_then(|p| p.class.as_deref()))
            .or_else(|| props.and_then(|p| p.instance.as_deref()))
    }
}

/// Walk the tree and collect every window with the workspace it is on.
pub fn collect_windows(root: &Node) -> Vec<WindowInfo> {
    fn walk(node: &Node, workspace: Option<&str>, out: &mut Vec<WindowInfo>) {
        let workspace = if node.node_type == "workspace" {
            node.name.as_deref()
        } else {
            workspace
        };
        if node.is_window() {
            if let (Some(app_id), Some(ws)) = (node.identifier(), workspace) {
                out.push(WindowInfo {
                    handle: WindowHandle(node.id.to_string()),
                    app_id: app_id.to_string(),
                    title: node.name.clone().unwrap_or_default(),
                    workspace: ws.to_string(),
                });
            }
        }
        for child in node.nodes.iter().chain(node.floating_nodes.iter()) {
            walk(child, workspace, out);
        }
    }
    let mut out = Vec::new();
    walk(root, None, &mut out);
    out
}

/// One entry of the `GET_OUTPUTS` reply.
#[derive(Debug, Deserialize)]
pub struct Output {
    name: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    primary: bool,
    rect: Rect,
}

#[derive(Debug, Deserialize)]
struct Rect {
    width: u32,
    height: u32,
}

/// Laptop panels show up under these connector names.
const INTERNAL_CONNECTORS: &[&str] = &["eDP", "LVDS", "DSI"];

/// Convert active outputs to displays.  Ids are positions in the active
/// output list.
pub fn outputs_to_displays(outputs: Vec<Output>) -> Vec<DisplayInfo> {
    outputs
        .into_iter()
        .filter(|o| o.active)
        .enumerate()
        .map(|(i, o)| DisplayInfo {
            id: i as u32,
            is_internal: INTERNAL_CONNECTORS.iter().any(|c| o.name.starts_with(c)),
            is_primary: o.primary,
            width: o.rect.width,
            height: o.rect.height,
            name: o.name,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct CommandOutcome {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

fn check_command_reply(json: &str) -> Result<(), I3Error> {
    let outcomes: Vec<CommandOutcome> =
        serde_json::from_str(json).map_err(|e| I3Error(format!("parse: {}", e)))?;
    match outcomes.into_iter().find(|o| !o.success) {
        Some(failed) => Err(I3Error(
            failed.error.unwrap_or_else(|| "command failed".into()),
        )),
        None => Ok(()),
    }
}

//  Command translation

/// Quote a workspace name for use in a command.
fn quote(workspace: &WorkspaceId) -> String {
    format!(
        "\"{}\"",
        workspace.as_str().replace('\\', "\\\\").replace('"', "\\\"")
    )
}

fn criteria(window: &WindowHandle) -> Result<String, I3Error> {
    if window.0.is_empty() || !window.0.bytes().all(|b| b.is_ascii_digit()) {
        return Err(I3Error(format!("invalid container id: {:?}", window.0)));
    }
    Ok(format!("[con_id={}]", window.0))
}

fn split_arg(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Horizontal => "h",
        Orientation::Vertical => "v",
    }
}

/// The i3 container layout for a layout kind.  Kinds that only describe
/// tiling follow the root orientation.
pub fn container_layout(kind: LayoutKind, orientation: Orientation) -> Option<&'static str> {
    let split = match orientation {
        Orientation::Horizontal => "splith",
        Orientation::Vertical => "splitv",
    };
    match kind {
        LayoutKind::Tiles | LayoutKind::Tiling | LayoutKind::Bsp => Some(split),
        LayoutKind::HTiles | LayoutKind::Horizontal | LayoutKind::Columns => Some("splith"),
        LayoutKind::VTiles | LayoutKind::Vertical | LayoutKind::Rows => Some("splitv"),
        LayoutKind::Accordion | LayoutKind::HAccordion => Some("tabbed"),
        LayoutKind::VAccordion => Some("stacking"),
        LayoutKind::Floating => None,
    }
}

/// Translate a command into the i3 command strings that implement it, in
/// order.
pub fn translate(cmd: &WmCommand) -> Result<Vec<String>, I3Error> {
    Ok(match cmd {
        WmCommand::FocusWorkspace { workspace } => vec![format!("workspace {}", quote(workspace))],
        WmCommand::MoveToWorkspace { window, workspace } => vec![format!(
            "{} move container to workspace {}",
            criteria(window)?,
            quote(workspace)
        )],
        WmCommand::ResetTopology {
            workspace,
            kind,
            orientation,
        } => {
            let layout = container_layout(*kind, *orientation)
                .ok_or_else(|| I3Error(format!("layout kind {:?} has no i3 equivalent", kind)))?;
            vec![
                format!("workspace {}", quote(workspace)),
                format!("layout {}", layout),
            ]
        }
        WmCommand::StartSplit {
            anchor,
            orientation,
        } => vec![
            format!("{} focus", criteria(anchor)?),
            format!("split {}", split_arg(*orientation)),
        ],
        WmCommand::AttachNext {
            window,
            orientation,
            depth,
        } => {
            let mut cmds = vec![format!("{} focus", criteria(window)?)];
            if *depth > 0 {
                cmds.push(format!("split {}", split_arg(*orientation)));
            }
            cmds
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
            vec![format!(
                "{} resize set {} {} px",
                criteria(window)?,
                which,
                pixels
            )]
        }
        WmCommand::SetGaps { workspace, gaps } => {
            let mut cmds = vec![format!("workspace {}", quote(workspace))];
            if let Some(inner) = gaps.inner {
                cmds.push(format!("gaps inner current set {}", inner));
            }
            if let Some(outer) = gaps.outer {
                cmds.push(format!("gaps outer current set {}", outer));
            }
            cmds
        }
        WmCommand::Launch { identifier } => {
            if identifier.is_empty()
                || identifier
                    .chars()
                    .any(|c| matches!(c, ';' | ',' | '"' | '\'' | '\n' | '\r'))
            {
                return Err(I3Error(format!("refusing to exec {:?}", identifier)));
            }
            vec![format!("exec --no-startup-id {}", identifier)]
        }
    })
}

//  WindowManager implementation

impl WindowManager for I3Wm {
    type Error = I3Error;

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn displays(&self) -> Result<Vec<DisplayInfo>, Self::Error> {
        let outputs: Vec<Output> = self.query(MessageType::GetOutputs)?;
        Ok(outputs_to_displays(outputs))
    }

    fn windows(&self) -> Result<Vec<WindowInfo>, Self::Error> {
        let tree: Node = self.query(MessageType::GetTree)?;
        Ok(collect_windows(&tree))
    }

    fn execute(&self, cmd: &WmCommand) -> Result<(), Self::Error> {
        for command in translate(cmd)? {
            self.run(&command)?;
        }
        Ok(())
    }
}
