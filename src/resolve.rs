//! Identifier and display resolution.
//!
//! - [`resolve_identifier`] maps a universal app key to the identifier the
//!   active backend matches windows by.
//! - [`resolve_display`] picks the display a layout is sized against from
//!   an alias (`main`, `secondary`, `internal`, `external`), a name pattern
//!   or a numeric id.

use crate::command::{BackendKind, DisplayInfo};
use crate::config::AppMappings;
use crate::layout::{DisplayAlias, DisplayTarget};
use log::{info, warn};
use regex::RegexBuilder;

/// Why an app key could not be turned into an identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no app mapping found for {0:?}")]
    UnknownApp(String),
    #[error("app mapping {app:?} has no identifier for {backend}")]
    NoIdentifier { app: String, backend: BackendKind },
}

/// Look up `app` in `mappings` and return the identifier for `backend`.
///
/// Sway falls back to the X11 class when no Wayland app id is mapped, since
/// XWayland clients are matched by class.
pub fn resolve_identifier<'a>(
    app: &str,
    mappings: &'a AppMappings,
    backend: BackendKind,
) -> Result<&'a str, ResolveError> {
    let mapping = mappings
        .get(app)
        .ok_or_else(|| ResolveError::UnknownApp(app.to_string()))?;
    backend
        .identifier_fields()
        .iter()
        .find_map(|field| mapping.field(*field))
        .ok_or_else(|| ResolveError::NoIdentifier {
            app: app.to_string(),
            backend,
        })
}

/// Why no display could be selected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    #[error("no displays found")]
    NoDisplays,
    #[error("display alias {alias:?} is ambiguous: {reason}")]
    Ambiguous { alias: DisplayAlias, reason: String },
}

/// The primary display, or the first one if none is flagged primary.
pub fn primary_display(displays: &[DisplayInfo]) -> Option<&DisplayInfo> {
    displays
        .iter()
        .find(|d| d.is_primary)
        .or_else(|| displays.first())
}

/// Resolve an alias.  `Ok(None)` means the alias matched nothing and the
/// caller should fall back.
fn display_by_alias(
    alias: DisplayAlias,
    displays: &[DisplayInfo],
) -> Result<Option<&DisplayInfo>, DisplayError> {
    match alias {
        DisplayAlias::Main => Ok(primary_display(displays)),
        DisplayAlias::Secondary => {
            if displays.len() < 2 {
                warn!("alias 'secondary' is used, but only one display found; using the main display");
                return Ok(primary_display(displays));
            }
            if displays.len() > 2 {
                return Err(DisplayError::Ambiguous {
                    alias,
                    reason: format!(
                        "{} displays found; name the display explicitly",
                        displays.len()
                    ),
                });
            }
            let primary = primary_display(displays);
            Ok(displays.iter().find(|d| Some(*d) != primary))
        }
        DisplayAlias::External => {
            let external: Vec<&DisplayInfo> = displays.iter().filter(|d| !d.is_internal).collect();
            match external.as_slice() {
                [] => {
                    warn!("alias 'external' is used, but no external display found; using the main display");
                    Ok(primary_display(displays))
                }
                [only] => Ok(Some(*only)),
                many => Err(DisplayError::Ambiguous {
                    alias,
                    reason: format!(
                        "{} external displays found; name the display explicitly",
                        many.len()
                    ),
                }),
            }
        }
        DisplayAlias::Internal => Ok(displays.iter().find(|d| d.is_internal)),
    }
}

/// Match `pattern` against display names, case-insensitively.  Patterns that
/// are not valid regexes are matched as plain substrings.
fn display_by_name<'a>(pattern: &str, displays: &'a [DisplayInfo]) -> Option<&'a DisplayInfo> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => displays.iter().find(|d| re.is_match(&d.name)),
        Err(_) => {
            let needle = pattern.to_lowercase();
            displays
                .iter()
                .find(|d| d.name.to_lowercase().contains(&needle))
        }
    }
}

/// Select the display for `target`.
///
/// No target means the primary display.  A target that matches nothing falls
/// back to the primary display with a notice; the only hard failures are an
/// empty display list and an ambiguous alias.
pub fn resolve_display<'a>(
    target: Option<&DisplayTarget>,
    displays: &'a [DisplayInfo],
) -> Result<&'a DisplayInfo, DisplayError> {
    let primary = primary_display(displays).ok_or(DisplayError::NoDisplays)?;

    let found = match target {
        None => return Ok(primary),
        Some(DisplayTarget::Alias(alias)) => display_by_alias(*alias, displays)?,
        Some(DisplayTarget::Name(pattern)) => display_by_name(pattern, displays),
        Some(DisplayTarget::Id(id)) => displays.iter().find(|d| d.id == *id),
    };

    match (found, target) {
        (Some(display), _) => Ok(display),
        (None, Some(target)) => {
            info!("display not found: {}; using the main display", target);
            Ok(primary)
        }
        (None, None) => Ok(primary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppMapping;

    fn display(id: u32, name: &str, primary: bool, internal: bool) -> DisplayInfo {
        DisplayInfo {
            id,
            name: name.into(),
            width: 1920,
            height: 1080,
            is_primary: primary,
            is_internal: internal,
        }
    }

    fn mappings() -> AppMappings {
        let mut m = AppMappings::new();
        m.insert(
            "term".into(),
            AppMapping {
                mac_os: Some("net.kovidgoyal.kitty".into()),
                linux_x11: Some("kitty".into()),
                linux_wayland: Some("kitty-wl".into()),
                windows: None,
            },
        );
        m.insert(
            "chat".into(),
            AppMapping {
                linux_x11: Some("Slack".into()),
                ..AppMapping::default()
            },
        );
        m
    }

    //  resolve_identifier

    #[test]
    fn identifier_per_backend() {
        let m = mappings();
        assert_eq!(resolve_identifier("term", &m, BackendKind::Aerospace), Ok("net.kovidgoyal.kitty"));
        assert_eq!(resolve_identifier("term", &m, BackendKind::I3), Ok("kitty"));
        assert_eq!(resolve_identifier("term", &m, BackendKind::Sway), Ok("kitty-wl"));
    }

    #[test]
    fn wayland_falls_back_to_x11_class() {
        let m = mappings();
        assert_eq!(resolve_identifier("chat", &m, BackendKind::Sway), Ok("Slack"));
    }

    #[test]
    fn missing_identifiers() {
        let m = mappings();
        assert_eq!(
            resolve_identifier("nope", &m, BackendKind::I3),
            Err(ResolveError::UnknownApp("nope".into()))
        );
        assert_eq!(
            resolve_identifier("chat", &m, BackendKind::Aerospace),
            Err(ResolveError::NoIdentifier {
                app: "chat".into(),
                backend: BackendKind::Aerospace,
            })
        );
    }

    //  resolve_display

    #[test]
    fn no_target_picks_primary() {
        let ds = vec![display(1, "A", false, true), display(2, "B", true, false)];
        assert_eq!(resolve_display(None, &ds).unwrap().id, 2);
    }

    #[test]
    fn no_primary_flag_picks_first() {
        let ds = vec![display(1, "A", false, true), display(2, "B", false, false)];
        assert_eq!(resolve_display(None, &ds).unwrap().id, 1);
    }

    #[test]
    fn empty_display_list_fails() {
        assert_eq!(resolve_display(None, &[]), Err(DisplayError::NoDisplays));
        let t = DisplayTarget::Alias(DisplayAlias::Main);
        assert_eq!(resolve_display(Some(&t), &[]), Err(DisplayError::NoDisplays));
    }

    #[test]
    fn secondary_with_two_displays() {
        let ds = vec![display(1, "Main", true, true), display(2, "Other", false, false)];
        let t = DisplayTarget::Alias(DisplayAlias::Secondary);
        assert_eq!(resolve_display(Some(&t), &ds).unwrap().id, 2);
    }

    #[test]
    fn secondary_with_one_display_falls_back() {
        let ds = vec![display(1, "Main", true, true)];
        let t = DisplayTarget::Alias(DisplayAlias::Secondary);
        assert_eq!(resolve_display(Some(&t), &ds).unwrap().id, 1);
    }

    #[test]
    fn secondary_with_three_displays_is_ambiguous() {
        let ds = vec![
            display(1, "Main", true, true),
            display(2, "Left", false, false),
            display(3, "Right", false, false),
        ];
        let t = DisplayTarget::Alias(DisplayAlias::Secondary);
        assert!(matches!(
            resolve_display(Some(&t), &ds),
            Err(DisplayError::Ambiguous {
                alias: DisplayAlias::Secondary,
                ..
            })
        ));
    }

    #[test]
    fn external_alias() {
        let t = DisplayTarget::Alias(DisplayAlias::External);

        let one = vec![display(1, "Built-in", true, true), display(2, "DELL", false, false)];
        assert_eq!(resolve_display(Some(&t), &one).unwrap().id, 2);

        let none = vec![display(1, "Built-in", true, true)];
        assert_eq!(resolve_display(Some(&t), &none).unwrap().id, 1);

        let two = vec![
            display(1, "Built-in", true, true),
            display(2, "DELL", false, false),
            display(3, "LG", false, false),
        ];
        assert!(matches!(
            resolve_display(Some(&t), &two),
            Err(DisplayError::Ambiguous { .. })
        ));
    }

    #[test]
    fn internal_alias() {
        let t = DisplayTarget::Alias(DisplayAlias::Internal);
        let ds = vec![display(1, "DELL", true, false), display(2, "Built-in", false, true)];
        assert_eq!(resolve_display(Some(&t), &ds).unwrap().id, 2);

        let desktop = vec![display(1, "DELL", true, false), display(2, "LG", false, false)];
        assert_eq!(resolve_display(Some(&t), &desktop).unwrap().id, 1);
    }

    #[test]
    fn name_matches_case_insensitively() {
        let ds = vec![display(1, "Built-in Retina", true, true), display(2, "DELL U2720Q", false, false)];
        let t = DisplayTarget::Name("dell".into());
        assert_eq!(resolve_display(Some(&t), &ds).unwrap().id, 2);
        let t = DisplayTarget::Name("^built".into());
        assert_eq!(resolve_display(Some(&t), &ds).unwrap().id, 1);
    }

    #[test]
    fn invalid_regex_matches_as_substring() {
        let ds = vec![display(1, "Main", true, false), display(2, "Odd (name", false, false)];
        let t = DisplayTarget::Name("odd (".into());
        assert_eq!(resolve_display(Some(&t), &ds).unwrap().id, 2);
    }

    #[test]
    fn id_target() {
        let ds = vec![display(4, "A", true, false), display(7, "B", false, false)];
        assert_eq!(resolve_display(Some(&DisplayTarget::Id(7)), &ds).unwrap().id, 7);
    }

    #[test]
    fn unmatched_target_falls_back_to_primary() {
        let ds = vec![display(4, "A", false, false), display(7, "B", true, false)];
        assert_eq!(resolve_display(Some(&DisplayTarget::Id(99)), &ds).unwrap().id, 7);
        let t = DisplayTarget::Name("nothing-like-this".into());
        assert_eq!(resolve_display(Some(&t), &ds).unwrap().id, 7);
    }
}
