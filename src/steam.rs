use crate::game;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const REGISTRY_KEY: &str = r"SOFTWARE\Valve\Steam";
pub const REGISTRY_KEY_WOW64: &str = r"SOFTWARE\Wow6432Node\Valve\Steam";
pub const REGISTRY_VALUE: &str = "InstallPath";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: unterminated quoted string")]
    UnterminatedQuote { line: usize },
    #[error("line {line}: \"path\" key without a value")]
    MissingPathValue { line: usize },
}

/// Registry key holding Steam's install path. 64-bit Windows keeps it under
/// the WOW64 node.
pub fn registry_key_path(processor_architecture: Option<&str>) -> &'static str {
    match processor_architecture {
        Some(arch) if arch.ends_with("64") => REGISTRY_KEY_WOW64,
        _ => REGISTRY_KEY,
    }
}

#[cfg(windows)]
pub fn find_install_root() -> Option<PathBuf> {
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ};
    use winreg::RegKey;

    let arch = std::env::var("PROCESSOR_ARCHITECTURE").ok();
    let key_path = registry_key_path(arch.as_deref());
    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let key = match hklm.open_subkey_with_flags(key_path, KEY_READ) {
        Ok(key) => key,
        Err(err) => {
            warn!("Error accessing registry key {key_path}: {err}");
            return None;
        }
    };
    match key.get_value::<String, _>(REGISTRY_VALUE) {
        Ok(value) => {
            info!("Steam Path Value: {value}");
            Some(PathBuf::from(value))
        }
        Err(err) => {
            warn!("Error reading registry value {REGISTRY_VALUE}: {err}");
            None
        }
    }
}

#[cfg(not(windows))]
pub fn find_install_root() -> Option<PathBuf> {
    let base = directories::BaseDirs::new()?;
    let home = base.home_dir();
    let candidates = [
        home.join(".local/share/Steam"),
        home.join(".steam/steam"),
        home.join("Library/Application Support/Steam"),
    ];
    let found = candidates.into_iter().find(|path| path.is_dir());
    match &found {
        Some(path) => info!("Steam Path Value: {}", path.display()),
        None => warn!("Steam install not found in the usual locations"),
    }
    found
}

/// Library roots from `libraryfolders.vdf` that hold one of `app_ids`.
/// Broken or unreadable manifests yield an empty list.
pub fn parse_library_manifest(manifest_path: &Path, app_ids: &[&str]) -> Vec<PathBuf> {
    let raw = match fs::read_to_string(manifest_path) {
        Ok(raw) => raw,
        Err(source) => {
            let err = ManifestError::Read {
                path: manifest_path.to_path_buf(),
                source,
            };
            warn!("Error parsing VDF: {err}");
            return Vec::new();
        }
    };
    match parse_library_manifest_str(&raw, app_ids) {
        Ok(paths) => {
            info!("VDF Paths: {paths:?}");
            paths
        }
        Err(err) => {
            warn!("Error parsing VDF {}: {err}", manifest_path.display());
            Vec::new()
        }
    }
}

pub fn parse_library_manifest_str(
    raw: &str,
    app_ids: &[&str],
) -> Result<Vec<PathBuf>, ManifestError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut current_path: Option<String> = None;
    let mut in_apps = false;

    for (index, line) in raw.lines().enumerate() {
        let line_no = index + 1;
        let tokens = quoted_tokens(line, line_no)?;
        let key = tokens.first().map(String::as_str);

        if key == Some("path") {
            let value = tokens
                .get(1)
                .ok_or(ManifestError::MissingPathValue { line: line_no })?;
            current_path = Some(value.clone());
        }

        if key == Some("apps") {
            in_apps = true;
            continue;
        }
        if !in_apps {
            continue;
        }

        if key.is_some_and(|key| app_ids.contains(&key)) {
            if let Some(path) = current_path.take() {
                let path = PathBuf::from(path);
                if !paths.contains(&path) {
                    debug!("Found Steam library with game: {}", path.display());
                    paths.push(path);
                }
            }
            in_apps = false;
        } else if line.contains('}') {
            in_apps = false;
            current_path = None;
        }
    }

    Ok(paths)
}

// Pulls the quoted strings out of one VDF line, undoing backslash escapes.
fn quoted_tokens(line: &str, line_no: usize) -> Result<Vec<String>, ManifestError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        if ch != '"' {
            continue;
        }
        let mut token = String::new();
        let mut closed = false;
        while let Some(ch) = chars.next() {
            match ch {
                '"' => {
                    closed = true;
                    break;
                }
                '\\' => match chars.next() {
                    Some('n') => token.push('\n'),
                    Some('t') => token.push('\t'),
                    Some(other) => token.push(other),
                    None => break,
                },
                other => token.push(other),
            }
        }
        if !closed {
            return Err(ManifestError::UnterminatedQuote { line: line_no });
        }
        tokens.push(token);
    }
    Ok(tokens)
}

/// Ordered library roots to probe: the Steam root itself, then every
/// manifest library holding the game.
pub fn library_roots(install_root: &Path) -> Vec<PathBuf> {
    let manifest = install_root.join("steamapps").join("libraryfolders.vdf");
    let mut roots = vec![install_root.to_path_buf()];
    for path in parse_library_manifest(&manifest, &[game::STEAM_APP_ID]) {
        if !roots.contains(&path) {
            roots.push(path);
        }
    }
    roots
}

pub fn resolve_game_directory_from(install_root: &Path) -> Option<PathBuf> {
    for root in library_roots(install_root) {
        let candidate = root.join(game::steam_install_suffix());
        debug!("Game Path: {}", candidate.display());
        if candidate.exists() {
            info!("Game directory found: {}", candidate.display());
            return Some(candidate);
        }
    }
    None
}

pub fn resolve_game_directory() -> Option<PathBuf> {
    let root = find_install_root()?;
    resolve_game_directory_from(&root)
}
