//! Layout configuration.
//!
//! The configuration is loaded from a JSON file, by default
//! `$XDG_CONFIG_HOME/universal-wm/layouts.json` (overridable with
//! `--config-file <path>`).  It is read once per invocation and never
//! written back.
//!
//! # Example
//!
//! ```json
//! {
//!   "version": "1",
//!   "stashWorkspace": "S",
//!   "appMappings": {
//!     "browser": { "macOS": "com.google.Chrome", "linux_x11": "Google-chrome" },
//!     "terminal": { "macOS": "net.kovidgoyal.kitty", "linux_x11": "kitty" }
//!   },
//!   "layouts": {
//!     "code": {
//!       "workspace": 1,
//!       "layout": "tiles",
//!       "orientation": "horizontal",
//!       "windows": [
//!         { "app": "terminal", "size": "1/3" },
//!         { "app": "browser" }
//!       ]
//!     }
//!   }
//! }
//! ```

use crate::command::IdentifierField;
use crate::layout::{Layout, WorkspaceId};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stash workspace used when the config does not name one.
pub const DEFAULT_STASH_WORKSPACE: &str = "S";

/// Platform-specific identifiers for one universal app key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppMapping {
    /// Bundle id (e.g. `com.google.Chrome`).
    #[serde(rename = "macOS", alias = "macos", default)]
    pub mac_os: Option<String>,
    /// X11 window class (e.g. `Google-chrome`).
    #[serde(rename = "linux_x11", alias = "linuxX11", default)]
    pub linux_x11: Option<String>,
    /// Wayland app id (e.g. `org.mozilla.firefox`).
    #[serde(rename = "linux_wayland", alias = "linuxWayland", default)]
    pub linux_wayland: Option<String>,
    /// Process name (e.g. `chrome.exe`).
    #[serde(default)]
    pub windows: Option<String>,
}

impl AppMapping {
    /// The identifier stored in `field`.  Blank entries count as absent.
    pub fn field(&self, field: IdentifierField) -> Option<&str> {
        let value = match field {
            IdentifierField::MacOs => &self.mac_os,
            IdentifierField::LinuxX11 => &self.linux_x11,
            IdentifierField::LinuxWayland => &self.linux_wayland,
            IdentifierField::Windows => &self.windows,
        };
        value.as_deref().filter(|s| !s.trim().is_empty())
    }

    fn is_empty(&self) -> bool {
        [
            IdentifierField::MacOs,
            IdentifierField::LinuxX11,
            IdentifierField::LinuxWayland,
            IdentifierField::Windows,
        ]
        .iter()
        .all(|f| self.field(*f).is_none())
    }
}

/// Universal app key → platform identifiers.
pub type AppMappings = BTreeMap<String, AppMapping>;

/// Named layouts in the order they appear in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedLayouts(Vec<(String, Layout)>);

impl NamedLayouts {
    pub fn get(&self, name: &str) -> Option<&Layout> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, l)| l)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Layout)> {
        self.0.iter().map(|(n, l)| (n.as_str(), l))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for NamedLayouts {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = NamedLayouts;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "map of layout name to layout")
            }
            fn visit_map<A>(self, mut map: A) -> Result<NamedLayouts, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut layouts: Vec<(String, Layout)> = Vec::new();
                while let Some(name) = map.next_key::<String>()? {
                    if layouts.iter().any(|(n, _)| *n == name) {
                        return Err(DeError::custom(format!("duplicate layout name: {:?}", name)));
                    }
                    let layout: Layout = map.next_value()?;
                    layouts.push((name, layout));
                }
                Ok(NamedLayouts(layouts))
            }
        }
        deserializer.deserialize_map(V)
    }
}

fn default_stash_workspace() -> WorkspaceId {
    WorkspaceId::new(DEFAULT_STASH_WORKSPACE)
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    #[serde(default)]
    pub version: Option<String>,

    /// Workspace that windows are parked on while a target workspace is
    /// cleared.
    #[serde(default = "default_stash_workspace")]
    pub stash_workspace: WorkspaceId,

    #[serde(default)]
    pub app_mappings: AppMappings,

    pub layouts: NamedLayouts,
}

impl LayoutConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn layout(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }

    /// Check the parsed config for problems that are not fatal at apply
    /// time: unmapped app keys, malformed sizes, bad title patterns.
    pub fn validate(&self) -> ValidationReport {
        let mut warnings = Vec::new();

        for (key, mapping) in &self.app_mappings {
            if mapping.is_empty() {
                warnings.push(format!("app mapping {:?} has no platform identifiers", key));
            }
        }

        for (name, layout) in self.layouts.iter() {
            if layout.children.is_empty() {
                warnings.push(format!("layout {:?} has no windows", name));
            }
            for window in layout.windows() {
                if !self.app_mappings.contains_key(&window.app) {
                    warnings.push(format!(
                        "layout {:?}: app {:?} has no entry in appMappings",
                        name, window.app
                    ));
                }
                if let Some(pattern) = &window.title {
                    if let Err(e) = regex::Regex::new(pattern) {
                        warnings.push(format!(
                            "layout {:?}: invalid title pattern {:?}: {}",
                            name, pattern, e
                        ));
                    }
                }
            }
            for size in layout.sizes() {
                if let Err(e) = size.fraction() {
                    warnings.push(format!("layout {:?}: {}", name, e));
                }
            }
            if layout.workspace == self.stash_workspace {
                warnings.push(format!(
                    "layout {:?} targets the stash workspace {}",
                    name, self.stash_workspace
                ));
            }
        }

        ValidationReport {
            layouts: self.layouts.len(),
            app_mappings: self.app_mappings.len(),
            stash_workspace: self.stash_workspace.clone(),
            warnings,
        }
    }
}

/// Outcome of [`LayoutConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub layouts: usize,
    pub app_mappings: usize,
    pub stash_workspace: WorkspaceId,
    pub warnings: Vec<String>,
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

/// Resolve the config directory (`$XDG_CONFIG_HOME/universal-wm`).
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("universal-wm")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("layouts.json")
}

/// Expand a leading `~` against `home`.
pub fn expand_tilde(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            PathBuf::from(format!("{}{}", home, rest))
        }
        _ => PathBuf::from(path),
    }
}
