use std::path::{Path, PathBuf};

pub const GAME_NAME: &str = "Doki Doki Literature Club";
pub const STEAM_APP_ID: &str = "698780";

/// Files or directories of which at least one sits at the root of a real install.
pub const INSTALL_MARKERS: [&str; 3] = ["DDLC.exe", "DDLC.sh", "game"];

/// Relative location of the game under a Steam library root.
pub fn steam_install_suffix() -> PathBuf {
    Path::new("steamapps").join("common").join(GAME_NAME)
}

pub fn path_names_game(path: &Path) -> bool {
    path.to_string_lossy().contains(GAME_NAME)
}

pub fn looks_like_game_root(path: &Path) -> bool {
    INSTALL_MARKERS
        .iter()
        .any(|marker| path.join(marker).exists())
}
