//! The declarative layout model.
//!
//! A [`Layout`] describes one workspace: the root orientation, the ordered
//! tree of [`LayoutItem`]s and, optionally, which display sizes are measured
//! against.  Items are classified into one of four explicit variants while
//! parsing, so nothing downstream has to sniff for field presence.
//!
//! # Example
//!
//! ```json
//! {
//!   "workspace": 2,
//!   "layout": "tiles",
//!   "orientation": "horizontal",
//!   "display": "main",
//!   "windows": [
//!     { "app": "browser", "size": "2/3" },
//!     {
//!       "orientation": "vertical",
//!       "windows": [
//!         { "app": "terminal" },
//!         { "app": "notes", "title": "Scratch", "instanceIndex": 1 }
//!       ]
//!     }
//!   ]
//! }
//! ```

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::NonZeroU32;

//  Workspaces

/// Identifier of a workspace.
///
/// Configs may spell workspaces as numbers (`2`) or strings (`"web"`); both
/// are normalised to the string the window manager expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for WorkspaceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for WorkspaceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = WorkspaceId;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "workspace name or number")
            }
            fn visit_u64<E>(self, n: u64) -> Result<WorkspaceId, E> {
                Ok(WorkspaceId(n.to_string()))
            }
            fn visit_i64<E>(self, n: i64) -> Result<WorkspaceId, E> {
                Ok(WorkspaceId(n.to_string()))
            }
            fn visit_str<E>(self, s: &str) -> Result<WorkspaceId, E>
            where
                E: DeError,
            {
                if s.trim().is_empty() {
                    return Err(DeError::custom("workspace must not be empty"));
                }
                Ok(WorkspaceId(s.to_string()))
            }
        }
        deserializer.deserialize_any(V)
    }
}

//  Orientation & dimensions

/// Axis along which siblings are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// The pane dimension that siblings along this axis share.
    pub fn dimension(self) -> Dimension {
        match self {
            Orientation::Horizontal => Dimension::Width,
            Orientation::Vertical => Dimension::Height,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Horizontal => write!(f, "horizontal"),
            Orientation::Vertical => write!(f, "vertical"),
        }
    }
}

/// A pane dimension that can be resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Width,
    Height,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Width => write!(f, "width"),
            Dimension::Height => write!(f, "height"),
        }
    }
}

/// Workspace layout mode requested by a [`Layout`].
///
/// Each backend maps these onto its own vocabulary; kinds without an
/// inherent axis take the layout's [`Orientation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    #[default]
    Tiles,
    HTiles,
    VTiles,
    Accordion,
    HAccordion,
    VAccordion,
    Horizontal,
    Vertical,
    Tiling,
    Floating,
    Bsp,
    Columns,
    Rows,
}

//  Fractional sizes

/// Error from parsing a `"numerator/denominator"` size string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    #[error("invalid size format {0:?}: expected \"numerator/denominator\"")]
    Format(String),
    #[error("invalid size {0:?}: numerator must be positive")]
    ZeroNumerator(String),
    #[error("invalid size {0:?}: denominator must not be zero")]
    ZeroDenominator(String),
}

/// A positive rational share of a reference dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fraction {
    numerator: u32,
    denominator: NonZeroU32,
}

impl Fraction {
    /// Build a fraction, returning `None` for a zero denominator.
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        NonZeroU32::new(denominator).map(|denominator| Self {
            numerator,
            denominator,
        })
    }

    /// Parse `"n/d"`.  Both parts must be positive integers.
    pub fn parse(s: &str) -> Result<Self, SizeError> {
        let (num, den) = s
            .split_once('/')
            .ok_or_else(|| SizeError::Format(s.to_string()))?;
        let numerator: u32 = num
            .trim()
            .parse()
            .map_err(|_| SizeError::Format(s.to_string()))?;
        let denominator: u32 = den
            .trim()
            .parse()
            .map_err(|_| SizeError::Format(s.to_string()))?;
        if numerator == 0 {
            return Err(SizeError::ZeroNumerator(s.to_string()));
        }
        Self::new(numerator, denominator).ok_or_else(|| SizeError::ZeroDenominator(s.to_string()))
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator.get()
    }

    /// `floor(total × numerator / denominator)`, saturating at `u32::MAX`.
    pub fn of(&self, total: u32) -> u32 {
        let scaled = u64::from(total) * u64::from(self.numerator) / u64::from(self.denominator.get());
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Convert a fractional size string into pixels of `total`.
pub fn size_to_pixels(size: &str, total: u32) -> Result<u32, SizeError> {
    Fraction::parse(size).map(|fraction| fraction.of(total))
}

/// A size exactly as written in the config.
///
/// Parsing is deferred to [`SizeSpec::fraction`] so that one malformed size
/// only fails the node carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SizeSpec(String);

impl SizeSpec {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fraction(&self) -> Result<Fraction, SizeError> {
        Fraction::parse(&self.0)
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//  Display targets

/// Symbolic display names understood by the display resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayAlias {
    Main,
    Secondary,
    Internal,
    External,
}

impl DisplayAlias {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "main" => Some(DisplayAlias::Main),
            "secondary" => Some(DisplayAlias::Secondary),
            "internal" => Some(DisplayAlias::Internal),
            "external" => Some(DisplayAlias::External),
            _ => None,
        }
    }
}

impl fmt::Display for DisplayAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayAlias::Main => write!(f, "main"),
            DisplayAlias::Secondary => write!(f, "secondary"),
            DisplayAlias::Internal => write!(f, "internal"),
            DisplayAlias::External => write!(f, "external"),
        }
    }
}

/// Which display a layout is sized against.
///
/// Accepts an alias (`"main"`), a numeric id (`2` or `"2"`), or a name
/// pattern (`"DELL"`, `"^eDP"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTarget {
    Alias(DisplayAlias),
    Id(u32),
    Name(String),
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayTarget::Alias(alias) => write!(f, "{}", alias),
            DisplayTarget::Id(id) => write!(f, "{}", id),
            DisplayTarget::Name(name) => write!(f, "{}", name),
        }
    }
}

impl<'de> Deserialize<'de> for DisplayTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = DisplayTarget;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "display alias, name or numeric id")
            }
            fn visit_u64<E>(self, n: u64) -> Result<DisplayTarget, E>
            where
                E: DeError,
            {
                u32::try_from(n)
                    .map(DisplayTarget::Id)
                    .map_err(|_| DeError::custom(format!("display id out of range: {}", n)))
            }
            fn visit_str<E>(self, s: &str) -> Result<DisplayTarget, E>
            where
                E: DeError,
            {
                let s = s.trim();
                if s.is_empty() {
                    return Err(DeError::custom("display target must not be empty"));
                }
                if let Some(alias) = DisplayAlias::parse(s) {
                    return Ok(DisplayTarget::Alias(alias));
                }
                if let Ok(id) = s.parse::<u32>() {
                    return Ok(DisplayTarget::Id(id));
                }
                Ok(DisplayTarget::Name(s.to_string()))
            }
        }
        deserializer.deserialize_any(V)
    }
}

/// Gap sizes in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Gaps {
    pub inner: Option<u32>,
    pub outer: Option<u32>,
}

//  Layout tree

/// A window leaf: which app, and optionally which of its windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    /// Universal app key, looked up in the config's app mappings.
    pub app: String,
    /// Regex the window title must match.
    pub title: Option<String>,
    /// Pick the Nth matching window (0-based).
    pub instance_index: Option<usize>,
}

impl WindowSpec {
    pub fn new(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            title: None,
            instance_index: None,
        }
    }
}

/// A nested container whose children are arranged along `orientation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub orientation: Orientation,
    pub children: Vec<LayoutItem>,
}

/// One node of a layout tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutItem {
    Window(WindowSpec),
    WindowSized { window: WindowSpec, size: SizeSpec },
    Group(Group),
    GroupSized { group: Group, size: SizeSpec },
}

impl LayoutItem {
    /// The fractional size attached to this node, if any.
    pub fn size(&self) -> Option<&SizeSpec> {
        match self {
            LayoutItem::WindowSized { size, .. } | LayoutItem::GroupSized { size, .. } => Some(size),
            LayoutItem::Window(_) | LayoutItem::Group(_) => None,
        }
    }

    pub fn window(&self) -> Option<&WindowSpec> {
        match self {
            LayoutItem::Window(window) | LayoutItem::WindowSized { window, .. } => Some(window),
            LayoutItem::Group(_) | LayoutItem::GroupSized { .. } => None,
        }
    }

    pub fn group(&self) -> Option<&Group> {
        match self {
            LayoutItem::Group(group) | LayoutItem::GroupSized { group, .. } => Some(group),
            LayoutItem::Window(_) | LayoutItem::WindowSized { .. } => None,
        }
    }

    /// The first window leaf reached depth-first from this node.
    pub fn first_window(&self) -> Option<&WindowSpec> {
        match self {
            LayoutItem::Window(window) | LayoutItem::WindowSized { window, .. } => Some(window),
            LayoutItem::Group(group) | LayoutItem::GroupSized { group, .. } => {
                group.children.iter().find_map(LayoutItem::first_window)
            }
        }
    }
}

/// Field bag every item shape is parsed into before classification.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    app: Option<String>,
    title: Option<String>,
    instance_index: Option<usize>,
    size: Option<SizeSpec>,
    orientation: Option<Orientation>,
    windows: Option<Vec<LayoutItem>>,
}

impl<'de> Deserialize<'de> for LayoutItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawItem::deserialize(deserializer)?;
        match (raw.app, raw.orientation, raw.windows) {
            (Some(app), None, None) => {
                let window = WindowSpec {
                    app,
                    title: raw.title,
                    instance_index: raw.instance_index,
                };
                Ok(match raw.size {
                    Some(size) => LayoutItem::WindowSized { window, size },
                    None => LayoutItem::Window(window),
                })
            }
            (None, Some(orientation), Some(children)) => {
                if raw.title.is_some() || raw.instance_index.is_some() {
                    return Err(DeError::custom(
                        "group items cannot carry `title` or `instanceIndex`",
                    ));
                }
                let group = Group {
                    orientation,
                    children,
                };
                Ok(match raw.size {
                    Some(size) => LayoutItem::GroupSized { group, size },
                    None => LayoutItem::Group(group),
                })
            }
            (Some(app), _, _) => Err(DeError::custom(format!(
                "item for app {:?} cannot also have `orientation` or `windows`",
                app
            ))),
            (None, Some(_), None) => Err(DeError::custom("group item is missing `windows`")),
            (None, None, Some(_)) => Err(DeError::custom("group item is missing `orientation`")),
            (None, None, None) => Err(DeError::custom(
                "layout item needs either `app` or `orientation` + `windows`",
            )),
        }
    }
}

/// One workspace arrangement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Layout {
    pub workspace: WorkspaceId,
    #[serde(rename = "layout", default)]
    pub kind: LayoutKind,
    pub orientation: Orientation,
    #[serde(rename = "windows", default)]
    pub children: Vec<LayoutItem>,
    #[serde(default)]
    pub display: Option<DisplayTarget>,
    #[serde(default)]
    pub gaps: Option<Gaps>,
}

impl Layout {
    /// Every window leaf in depth-first pre-order.
    pub fn windows(&self) -> Vec<&WindowSpec> {
        fn walk<'a>(items: &'a [LayoutItem], out: &mut Vec<&'a WindowSpec>) {
            for item in items {
                match item {
                    LayoutItem::Window(window) | LayoutItem::WindowSized { window, .. } => {
                        out.push(window)
                    }
                    LayoutItem::Group(group) | LayoutItem::GroupSized { group, .. } => {
                        walk(&group.children, out)
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }

    /// Every size string in the tree, in pre-order.
    pub fn sizes(&self) -> Vec<&SizeSpec> {
        fn walk<'a>(items: &'a [LayoutItem], out: &mut Vec<&'a SizeSpec>) {
            for item in items {
                if let Some(size) = item.size() {
                    out.push(size);
                }
                if let Some(group) = item.group() {
                    walk(&group.children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }
}
