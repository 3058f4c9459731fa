//! The layout engine: turns a declarative [`Layout`] into backend commands.
//!
//! No backend can set a whole container tree in one call, so a layout is
//! applied in strictly ordered passes, each relying on the effects of the
//! previous one:
//!
//! 1. **Display**: pick the display that sizes are measured against.
//! 2. **Clear**: park everything on the target workspace in the stash
//!    workspace, so every run starts from an empty workspace.
//! 3. **Placement**: acquire each window leaf (launching if allowed) and
//!    move it onto the target workspace, in depth-first pre-order.
//! 4. **Topology**: rebuild the container hierarchy with abstract
//!    split/attach commands, in the same pre-order as placement.
//! 5. **Sizing**: resize every node that carries a fractional size.
//!
//! Per-node failures (unmapped app, window never appeared, malformed size)
//! are logged and skipped; they never abort siblings.

use crate::acquire::Acquirer;
use crate::command::{DisplayInfo, WindowHandle, WmCommand};
use crate::config::LayoutConfig;
use crate::layout::{Layout, LayoutItem, Orientation, WorkspaceId};
use crate::resolve::{resolve_display, DisplayError};
use crate::traits::{Clock, SystemClock, WindowManager};
use log::{debug, info, warn};

/// Errors that stop a run before (or between) layouts.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The window manager returned an error for a query the run cannot do
    /// without.
    #[error("window manager error: {0}")]
    WindowManager(String),
    #[error("no displays found")]
    NoDisplays,
    #[error("layout {0:?} not found")]
    UnknownLayout(String),
}

/// Options for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Launch apps that have no window yet.
    pub should_launch: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            should_launch: true,
        }
    }
}

/// What a run did.
///
/// A run reports success even when every node was skipped; callers that care
/// can inspect [`RunSummary::nothing_placed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub layouts_applied: usize,
    pub layouts_skipped: usize,
    pub windows_placed: usize,
    pub windows_skipped: usize,
    pub resizes_applied: usize,
    pub resizes_skipped: usize,
}

impl RunSummary {
    fn merge(&mut self, other: RunSummary) {
        self.layouts_applied += other.layouts_applied;
        self.layouts_skipped += other.layouts_skipped;
        self.windows_placed += other.windows_placed;
        self.windows_skipped += other.windows_skipped;
        self.resizes_applied += other.resizes_applied;
        self.resizes_skipped += other.resizes_skipped;
    }

    pub fn nothing_placed(&self) -> bool {
        self.windows_placed == 0
    }
}

/// Applies layouts from a [`LayoutConfig`] through a [`WindowManager`].
///
/// The engine keeps no state between runs; every window handle is looked up
/// again when a pass needs it.
///
/// # Typical usage
///
/// ```ignore
/// let wm = I3Wm::connect(BackendKind::Sway)?;
/// let engine = LayoutEngine::new(wm, &config, ApplyOptions::default());
/// let summary = engine.apply_named("code")?;
/// ```
pub struct LayoutEngine<'a, W: WindowManager, C: Clock = SystemClock> {
    wm: W,
    clock: C,
    config: &'a LayoutConfig,
    options: ApplyOptions,
}

impl<'a, W: WindowManager> LayoutEngine<'a, W, SystemClock> {
    /// Create an engine that waits on the real clock.
    pub fn new(wm: W, config: &'a LayoutConfig, options: ApplyOptions) -> Self {
        Self::with_clock(wm, SystemClock, config, options)
    }
}

impl<'a, W: WindowManager, C: Clock> LayoutEngine<'a, W, C> {
    pub fn with_clock(wm: W, clock: C, config: &'a LayoutConfig, options: ApplyOptions) -> Self {
        Self {
            wm,
            clock,
            config,
            options,
        }
    }

    /// The underlying window manager.
    pub fn wm(&self) -> &W {
        &self.wm
    }

    /// Apply the layout called `name`.
    pub fn apply_named(&self, name: &str) -> Result<RunSummary, EngineError> {
        let layout = self
            .config
            .layout(name)
            .ok_or_else(|| EngineError::UnknownLayout(name.to_string()))?;
        self.apply(name, layout)
    }

    /// Apply every layout in config order.  Each layout finishes all of its
    /// passes before the next one starts.
    pub fn apply_all(&self) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::default();
        for (name, layout) in self.config.layouts.iter() {
            info!("=== applying layout: {} ===", name);
            summary.merge(self.apply(name, layout)?);
        }
        Ok(summary)
    }

    /// Apply a single layout.
    pub fn apply(&self, name: &str, layout: &Layout) -> Result<RunSummary, EngineError> {
        let mut summary = RunSummary::default();
        info!("applying layout {} to workspace {}", name, layout.workspace);

        let display = match self.select_display(layout)? {
            Some(display) => display,
            None => {
                summary.layouts_skipped += 1;
                return Ok(summary);
            }
        };
        info!("using display: {}", display);

        self.clear(&layout.workspace);

        let acquirer = Acquirer::new(&self.wm, &self.clock, &self.config.app_mappings);
        self.place(&acquirer, &layout.children, &layout.workspace, &mut summary);

        self.wm.dispatch(&WmCommand::FocusWorkspace {
            workspace: layout.workspace.clone(),
        });
        self.build_topology(&acquirer, layout);

        if let Some(gaps) = layout.gaps {
            self.wm.dispatch(&WmCommand::SetGaps {
                workspace: layout.workspace.clone(),
                gaps,
            });
        }

        self.resize(
            &acquirer,
            &layout.children,
            layout.orientation,
            &display,
            &mut summary,
        );

        summary.layouts_applied += 1;
        info!("layout {} applied to workspace {}", name, layout.workspace);
        Ok(summary)
    }

    //  Display

    /// `Ok(None)` means the layout should be skipped.
    fn select_display(&self, layout: &Layout) -> Result<Option<DisplayInfo>, EngineError> {
        let displays = self
            .wm
            .displays()
            .map_err(|e| EngineError::WindowManager(e.to_string()))?;
        match resolve_display(layout.display.as_ref(), &displays) {
            Ok(display) => Ok(Some(display.clone())),
            Err(DisplayError::NoDisplays) => Err(EngineError::NoDisplays),
            Err(e @ DisplayError::Ambiguous { .. }) => {
                warn!("skipping layout for workspace {}: {}", layout.workspace, e);
                Ok(None)
            }
        }
    }

    //  Clear

    fn clear(&self, workspace: &WorkspaceId) {
        let stash = &self.config.stash_workspace;
        if workspace == stash {
            warn!("workspace {} is the stash workspace, not clearing it", workspace);
            return;
        }
        let windows = match self.wm.workspace_windows(workspace) {
            Ok(w) => w,
            Err(e) => {
                warn!("failed to list windows on workspace {}: {}", workspace, e);
                return;
            }
        };
        debug!("clearing {} window(s) from workspace {}", windows.len(), workspace);
        for window in windows {
            self.wm.dispatch(&WmCommand::MoveToWorkspace {
                window: window.handle,
                workspace: stash.clone(),
            });
        }
    }

    //  Placement

    fn place(
        &self,
        acquirer: &Acquirer<'_, W, C>,
        items: &[LayoutItem],
        workspace: &WorkspaceId,
        summary: &mut RunSummary,
    ) {
        for item in items {
            match item {
                LayoutItem::Window(window) | LayoutItem::WindowSized { window, .. } => {
                    match acquirer.ensure_window(window, self.options.should_launch) {
                        Some(handle) => {
                            self.wm.dispatch(&WmCommand::MoveToWorkspace {
                                window: handle,
                                workspace: workspace.clone(),
                            });
                            summary.windows_placed += 1;
                        }
                        None => {
                            warn!("skipping {}: no window", window.app);
                            summary.windows_skipped += 1;
                        }
                    }
                }
                LayoutItem::Group(group) | LayoutItem::GroupSized { group, .. } => {
                    self.place(acquirer, &group.children, workspace, summary);
                }
            }
        }
    }

    //  Topology

    fn build_topology(&self, acquirer: &Acquirer<'_, W, C>, layout: &Layout) {
        self.wm.dispatch(&WmCommand::ResetTopology {
            workspace: layout.workspace.clone(),
            kind: layout.kind,
            orientation: layout.orientation,
        });
        self.topology(acquirer, &layout.children, layout.orientation, 0);
    }

    /// Siblings are visited in placement order.  The first sibling that has a
    /// window anchors the container; every later one is attached along
    /// `parent` right before its own subtree is built.
    fn topology(
        &self,
        acquirer: &Acquirer<'_, W, C>,
        items: &[LayoutItem],
        parent: Orientation,
        depth: usize,
    ) {
        let mut anchored = false;
        for item in items {
            let Some(handle) = self.anchor(acquirer, item) else {
                debug!("no window for node at depth {}, not attaching it", depth);
                if let Some(group) = item.group() {
                    self.topology(acquirer, &group.children, group.orientation, depth + 1);
                }
                continue;
            };

            if anchored {
                self.wm.dispatch(&WmCommand::AttachNext {
                    window: handle.clone(),
                    orientation: parent,
                    depth,
                });
            }
            anchored = true;

            if let Some(group) = item.group() {
                self.wm.dispatch(&WmCommand::StartSplit {
                    anchor: handle,
                    orientation: group.orientation,
                });
                self.topology(acquirer, &group.children, group.orientation, depth + 1);
            }
        }
    }

    /// The window that stands in for `item`: the leaf itself, or the first
    /// window of a group that currently exists.
    fn anchor(&self, acquirer: &Acquirer<'_, W, C>, item: &LayoutItem) -> Option<WindowHandle> {
        match item {
            LayoutItem::Window(window) | LayoutItem::WindowSized { window, .. } => {
                acquirer.find_window(window)
            }
            LayoutItem::Group(group) | LayoutItem::GroupSized { group, .. } => group
                .children
                .iter()
                .find_map(|child| self.anchor(acquirer, child)),
        }
    }

    //  Sizing

    /// Sized nodes are resized along the dimension their parent arranges
    /// them on.  A sized group is resized through its anchor window.
    fn resize(
        &self,
        acquirer: &Acquirer<'_, W, C>,
        items: &[LayoutItem],
        parent: Orientation,
        display: &DisplayInfo,
        summary: &mut RunSummary,
    ) {
        for item in items {
            if let Some(size) = item.size() {
                let dimension = parent.dimension();
                match size.fraction() {
                    Ok(fraction) => {
                        let pixels = fraction.of(display.extent(dimension));
                        match self.anchor(acquirer, item) {
                            Some(window) => {
                                let done = self.wm.dispatch(&WmCommand::SetDimension {
                                    window,
                                    dimension,
                                    pixels,
                                });
                                if done {
                                    summary.resizes_applied += 1;
                                } else {
                                    summary.resizes_skipped += 1;
                                }
                            }
                            None => {
                                debug!("skipping resize to {}: no window", size);
                                summary.resizes_skipped += 1;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("skipping resize: {}", e);
                        summary.resizes_skipped += 1;
                    }
                }
            }
            if let Some(group) = item.group() {
                self.resize(acquirer, &group.children, group.orientation, display, summary);
            }
        }
    }
}
