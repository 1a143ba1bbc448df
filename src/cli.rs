use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use ddmi::{
    config::{self, AppConfig},
    install::{self, InstallOptions, InstallRequest},
    launch, logging,
    progress::{AutoConfirm, ChannelSink, EngineEvent},
    steam,
    uninstall::{self, UninstallOutcome},
    APP_NAME, VERSION,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::mpsc::Receiver,
    thread,
};

const NOT_FOUND: &str = "Game directory not found automatically.";

/// Installs Doki Doki Literature Club mods from zip archives.
#[derive(Parser, Debug)]
#[command(name = "ddmi", author, version, about)]
pub struct Cli {
    /// Also print log output to the terminal, at debug level
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge a mod archive into the game (or a separate copy of it)
    Install(InstallArgs),
    /// Delete the whole game install
    Uninstall(UninstallArgs),
    /// Look for the game in the Steam libraries
    Detect,
    /// Show or change saved settings
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct InstallArgs {
    /// Mod archive (.zip)
    pub archive: PathBuf,

    /// Game directory; defaults to the saved or detected one
    #[arg(long, short = 'g')]
    pub game_dir: Option<PathBuf>,

    /// Install into a separate copy of the game instead of the game itself
    #[arg(long, short = 'm')]
    pub mod_dir: Option<PathBuf>,

    /// Do not open the destination afterwards
    #[arg(long)]
    pub no_open: bool,

    /// Remove the extracted archive after a successful install
    #[arg(long)]
    pub clean_staging: bool,
}

#[derive(Parser, Debug)]
pub struct UninstallArgs {
    /// Game directory; defaults to the saved or detected one
    #[arg(long, short = 'g')]
    pub game_dir: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[arg(long)]
    pub game_dir: Option<PathBuf>,

    #[arg(long, conflicts_with = "clear_mod_dir")]
    pub mod_dir: Option<PathBuf>,

    #[arg(long)]
    pub clear_mod_dir: bool,

    #[arg(long)]
    pub open_on_complete: Option<bool>,

    #[arg(long)]
    pub debug_logging: Option<bool>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_create()?;
    let _guard = logging::setup_logging(
        &config::log_dir()?,
        APP_NAME,
        cli.verbose || config.debug_logging,
        cli.verbose,
    )?;
    tracing::info!("Starting {APP_NAME} v{VERSION}");

    match cli.command {
        Commands::Install(args) => run_install(args, &mut config),
        Commands::Uninstall(args) => run_uninstall(args, &mut config),
        Commands::Detect => run_detect(&mut config),
        Commands::Config(args) => run_config(args, &mut config),
    }
}

fn run_install(args: InstallArgs, config: &mut AppConfig) -> Result<()> {
    let game_dir = pick_game_dir(args.game_dir, config)?;
    let mod_dir = args.mod_dir.or_else(|| config.mod_dir.clone());
    let request = InstallRequest::new(&args.archive, &game_dir, mod_dir)?;
    let options = InstallOptions {
        clean_staging: args.clean_staging,
    };

    let (sink, events) = ChannelSink::channel();
    let worker_request = request.clone();
    let worker = thread::Builder::new()
        .name("ddmi-install".to_string())
        .spawn(move || install::process_files_with(&worker_request, &options, &sink))
        .context("spawn install worker")?;
    render_events(events);
    let report = match worker
        .join()
        .map_err(|_| anyhow!("install worker panicked"))?
    {
        Ok(report) => report,
        Err(err) if err.is_user_error() => bail!(err),
        Err(err) => return Err(anyhow::Error::new(err).context("install failed")),
    };

    println!(
        "Installed {} item(s) into {} ({} ignored)",
        report.applied.len(),
        report.destination.display(),
        report.skipped.len()
    );

    config.game_dir = Some(request.game_directory().to_path_buf());
    config.save()?;

    if report.open_destination && config.open_on_complete && !args.no_open {
        if let Err(err) = launch::open_directory(&report.destination) {
            tracing::error!("open destination: {err:#}");
            eprintln!("Error: {err:#}");
        }
    }
    Ok(())
}

fn run_uninstall(args: UninstallArgs, config: &mut AppConfig) -> Result<()> {
    let game_dir = pick_game_dir(args.game_dir, config)?;
    let skip_prompt = args.yes;

    let (sink, events) = ChannelSink::channel();
    let worker_dir = game_dir.clone();
    let worker = thread::Builder::new()
        .name("ddmi-uninstall".to_string())
        .spawn(move || {
            if skip_prompt {
                uninstall::uninstall(&worker_dir, &AutoConfirm(true), &sink)
            } else {
                uninstall::uninstall(&worker_dir, &sink, &sink)
            }
        })
        .context("spawn uninstall worker")?;
    render_events(events);
    let outcome = match worker
        .join()
        .map_err(|_| anyhow!("uninstall worker panicked"))?
    {
        Ok(outcome) => outcome,
        Err(err) if err.is_user_error() => bail!(err),
        Err(err) => return Err(anyhow::Error::new(err).context("uninstall failed")),
    };

    match outcome {
        UninstallOutcome::Completed {
            removed_files,
            removed_bytes,
        } => {
            println!("Removed {removed_files} file(s), {removed_bytes} bytes");
            if config.game_dir.as_deref() == Some(game_dir.as_path()) {
                config.game_dir = None;
                config.save()?;
            }
        }
        UninstallOutcome::Cancelled => println!("Nothing was removed."),
    }
    Ok(())
}

fn run_detect(config: &mut AppConfig) -> Result<()> {
    match steam::resolve_game_directory() {
        Some(dir) => {
            println!("{}", dir.display());
            if config.game_dir.is_none() {
                config.game_dir = Some(dir);
                config.save()?;
            }
            Ok(())
        }
        None => bail!(NOT_FOUND),
    }
}

fn run_config(args: ConfigArgs, config: &mut AppConfig) -> Result<()> {
    let mut changed = false;
    if let Some(dir) = args.game_dir {
        config.game_dir = Some(dir);
        changed = true;
    }
    if let Some(dir) = args.mod_dir {
        config.mod_dir = Some(dir);
        changed = true;
    }
    if args.clear_mod_dir {
        config.mod_dir = None;
        changed = true;
    }
    if let Some(value) = args.open_on_complete {
        config.open_on_complete = value;
        changed = true;
    }
    if let Some(value) = args.debug_logging {
        config.debug_logging = value;
        changed = true;
    }
    if changed {
        config.save()?;
    }

    let raw = serde_json::to_string_pretty(config).context("serialize app config")?;
    println!("{raw}");
    Ok(())
}

fn pick_game_dir(explicit: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(dir) = &config.game_dir {
        return Ok(dir.clone());
    }
    match steam::resolve_game_directory() {
        Some(dir) => {
            println!("Using detected game directory: {}", dir.display());
            Ok(dir)
        }
        None => bail!("{NOT_FOUND} Pass --game-dir."),
    }
}

// Drains worker events until the worker drops its sink.
fn render_events(events: Receiver<EngineEvent>) {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);

    for event in events {
        match event {
            EngineEvent::Console(line) => bar.println(line),
            EngineEvent::Progress(percent) => {
                bar.set_position(percent.round().clamp(0.0, 100.0) as u64)
            }
            EngineEvent::CriticalAlert { title, message } => {
                bar.suspend(|| eprintln!("{title}: {message}"))
            }
            EngineEvent::InfoAlert { title, message } => bar.println(format!("{title}: {message}")),
            EngineEvent::ConfirmRequest {
                title,
                message,
                reply,
            } => {
                let answer = bar.suspend(|| prompt_yes_no(&title, &message));
                let _ = reply.send(answer);
            }
        }
    }
    bar.finish_and_clear();
}

fn prompt_yes_no(title: &str, message: &str) -> bool {
    print!("{title}: {message} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_install_with_separate_dir() {
        let cli = Cli::try_parse_from([
            "ddmi",
            "install",
            "mod.zip",
            "--game-dir",
            "/games/ddlc",
            "--mod-dir",
            "/games/modded",
            "--no-open",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert_eq!(args.archive, PathBuf::from("mod.zip"));
                assert_eq!(args.mod_dir, Some(PathBuf::from("/games/modded")));
                assert!(args.no_open);
                assert!(!args.clean_staging);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn explicit_game_dir_wins_over_config() {
        let config = AppConfig {
            game_dir: Some(PathBuf::from("/saved")),
            ..AppConfig::default()
        };
        let dir = pick_game_dir(Some(PathBuf::from("/explicit")), &config).unwrap();
        assert_eq!(dir, PathBuf::from("/explicit"));
        assert_eq!(pick_game_dir(None, &config).unwrap(), PathBuf::from("/saved"));
    }
}
