use anyhow::{bail, Result};
use std::{
    path::Path,
    process::{Command, Stdio},
};
use tracing::{info, warn};

fn browser_candidates(target: &str) -> Vec<(&'static str, Vec<&str>)> {
    if cfg!(windows) {
        vec![("explorer", vec![target])]
    } else if cfg!(target_os = "macos") {
        vec![("open", vec![target])]
    } else {
        vec![
            ("xdg-open", vec![target]),
            ("gio", vec!["open", target]),
            ("kde-open5", vec![target]),
        ]
    }
}

/// Shows `dir` in the platform file browser.
pub fn open_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("The specified path does not exist: {}", dir.display());
    }
    let absolute = std::path::absolute(dir)?;
    let target = absolute.to_string_lossy().into_owned();

    let mut errors = Vec::new();
    for (command, args) in browser_candidates(&target) {
        match Command::new(command)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => {
                info!("Opened {target} with {command}");
                return Ok(());
            }
            Err(err) => errors.push(format!("{command} failed: {err}")),
        }
    }
    warn!("Failed to open {target}: {}", errors.join("; "));
    bail!("failed to open {target}: {}", errors.join("; "))
}
