//! Entry point for the **unilayout** command-line tool.
//!
//! Loads the layout configuration, detects the running window manager and
//! hands the requested layouts to the [`LayoutEngine`].  Fatal conditions
//! (unreadable config, unknown layout, no supported window manager, no
//! displays) exit with status 1.

use argh::FromArgs;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use unilayout::aerospace::{AerospaceError, AerospaceWm};
use unilayout::command::{BackendKind, DisplayInfo};
use unilayout::config::{default_config_path, expand_tilde, ConfigError, LayoutConfig};
use unilayout::detect::{detect_backend, require_supported, DetectError, Platform, SystemEnvironment};
use unilayout::engine::{ApplyOptions, EngineError, LayoutEngine, RunSummary};
use unilayout::i3::{I3Error, I3Wm};
use unilayout::traits::WindowManager;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Apply declarative window layouts to i3, Sway or AeroSpace
#[derive(FromArgs)]
struct Cli {
    /// path to the layout configuration file
    /// (default: ~/.config/universal-wm/layouts.json)
    #[argh(option, short = 'c')]
    config_file: Option<String>,

    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Apply(ApplyCmd),
    List(ListCmd),
    Validate(ValidateCmd),
    Detect(DetectCmd),
    Displays(DisplaysCmd),
    Version(VersionCmd),
}

/// Apply one layout, or all of them
#[derive(FromArgs)]
#[argh(subcommand, name = "apply")]
struct ApplyCmd {
    /// name of the layout to apply
    #[argh(positional)]
    name: Option<String>,
    /// name of the layout to apply
    #[argh(option, short = 'l')]
    layout: Option<String>,
    /// apply every layout in the configuration
    #[argh(switch, short = 'a')]
    all: bool,
    /// only arrange windows that already exist, never launch apps
    #[argh(switch, short = 'n')]
    no_launch: bool,
}

/// List layout names
#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
struct ListCmd {}

/// Check a configuration file
#[derive(FromArgs)]
#[argh(subcommand, name = "validate")]
struct ValidateCmd {
    /// configuration file to check (default: the active configuration)
    #[argh(positional)]
    file: Option<String>,
}

/// Show the detected platform and window manager
#[derive(FromArgs)]
#[argh(subcommand, name = "detect")]
struct DetectCmd {}

/// List the displays the window manager reports
#[derive(FromArgs)]
#[argh(subcommand, name = "displays")]
struct DisplaysCmd {}

/// Show version information
#[derive(FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCmd {}

/// Everything that ends a run with a non-zero exit status.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    I3(#[from] I3Error),
    #[error(transparent)]
    Aerospace(#[from] AerospaceError),
    #[error("{0}")]
    Usage(String),
}

//  Main

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli: Cli = argh::from_env();
    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = config_path(cli.config_file.as_deref());
    match cli.command {
        SubCommand::Apply(cmd) => apply(&config_path, &cmd),
        SubCommand::List(_) => list(&config_path),
        SubCommand::Validate(cmd) => {
            let path = cmd
                .file
                .as_deref()
                .map(config_path_from)
                .unwrap_or(config_path);
            validate(&path)
        }
        SubCommand::Detect(_) => {
            detect();
            Ok(())
        }
        SubCommand::Displays(_) => displays(),
        SubCommand::Version(_) => {
            println!("unilayout v{}", VERSION);
            Ok(())
        }
    }
}

fn config_path_from(path: &str) -> PathBuf {
    expand_tilde(path, std::env::var("HOME").ok().as_deref())
}

fn config_path(flag: Option<&str>) -> PathBuf {
    flag.map(config_path_from).unwrap_or_else(default_config_path)
}

fn load_config(path: &Path) -> Result<LayoutConfig, CliError> {
    let config = LayoutConfig::load(path)?;
    info!("loaded config from {}", path.display());
    Ok(config)
}

fn detected_backend() -> Result<BackendKind, CliError> {
    let kind = detect_backend(Platform::current(), &SystemEnvironment)?;
    Ok(require_supported(kind)?)
}

//  Subcommands

fn apply(config_path: &Path, cmd: &ApplyCmd) -> Result<(), CliError> {
    let target = if cmd.all {
        None
    } else {
        let name = cmd.layout.clone().or_else(|| cmd.name.clone()).ok_or_else(|| {
            CliError::Usage("no layout given; pass a layout name or --all".into())
        })?;
        Some(name)
    };

    let config = load_config(config_path)?;
    let kind = detected_backend()?;
    info!("using {} backend", kind);

    let options = ApplyOptions {
        should_launch: !cmd.no_launch,
    };
    let summary = match kind {
        BackendKind::I3 | BackendKind::Sway => {
            apply_with(I3Wm::connect(kind)?, &config, options, target.as_deref())?
        }
        BackendKind::Aerospace => apply_with(AerospaceWm::new(), &config, options, target.as_deref())?,
        other => return Err(DetectError::Unsupported(other).into()),
    };
    report(&summary);
    Ok(())
}

fn apply_with<W: WindowManager>(
    wm: W,
    config: &LayoutConfig,
    options: ApplyOptions,
    target: Option<&str>,
) -> Result<RunSummary, CliError> {
    let engine = LayoutEngine::new(wm, config, options);
    let summary = match target {
        Some(name) => engine.apply_named(name)?,
        None => engine.apply_all()?,
    };
    Ok(summary)
}

fn report(summary: &RunSummary) {
    info!(
        "done: {} layout(s) applied, {} skipped; {} window(s) placed, {} skipped; {} resize(s) applied, {} skipped",
        summary.layouts_applied,
        summary.layouts_skipped,
        summary.windows_placed,
        summary.windows_skipped,
        summary.resizes_applied,
        summary.resizes_skipped,
    );
    if summary.nothing_placed() {
        warn!("no windows were placed");
    }
}

fn list(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    if config.layouts.is_empty() {
        println!("no layouts defined in {}", config_path.display());
        return Ok(());
    }
    println!("available layouts:");
    for name in config.layouts.names() {
        println!("  {}", name);
    }
    Ok(())
}

fn validate(path: &Path) -> Result<(), CliError> {
    let config = load_config(path)?;
    let report = config.validate();
    println!("{} is valid", path.display());
    println!("  layouts:         {}", report.layouts);
    println!("  app mappings:    {}", report.app_mappings);
    println!("  stash workspace: {}", report.stash_workspace);
    for warning in &report.warnings {
        warn!("{}", warning);
    }
    Ok(())
}

fn detect() {
    let platform = Platform::current();
    println!("platform:       {}", platform);
    match detect_backend(platform, &SystemEnvironment) {
        Ok(kind) => {
            println!("window manager: {}", kind);
            if kind.is_supported() {
                println!("status:         supported");
            } else {
                println!("status:         planned (not yet implemented)");
            }
        }
        Err(e) => {
            println!("window manager: unknown");
            println!("status:         {}", e);
        }
    }
}

fn displays() -> Result<(), CliError> {
    let kind = detected_backend()?;
    let displays = match kind {
        BackendKind::I3 | BackendKind::Sway => query_displays(&I3Wm::connect(kind)?)?,
        BackendKind::Aerospace => query_displays(&AerospaceWm::new())?,
        other => return Err(DetectError::Unsupported(other).into()),
    };
    if displays.is_empty() {
        return Err(EngineError::NoDisplays.into());
    }
    println!("available displays:");
    for display in &displays {
        println!("  [{}] {}", display.id, display);
    }
    Ok(())
}

fn query_displays<W: WindowManager>(wm: &W) -> Result<Vec<DisplayInfo>, CliError> {
    wm.displays()
        .map_err(|e| EngineError::WindowManager(e.to_string()).into())
}
