//! Recognizes installable game content inside an unpacked mod archive.

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const TARGET_DIRS: [&str; 4] = ["game", "characters", "lib", "renpy"];
pub const TARGET_FILES: [&str; 4] = ["audio.rpa", "fonts.rpa", "images.rpa", "scripts.rpa"];
pub const EXECUTABLE_EXTENSIONS: [&str; 4] = ["exe", "bat", "sh", "py"];
const APP_BUNDLE_SUFFIX: &str = ".app";
const DATA_DIR: &str = "game";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Launcher or script, placed at the destination root.
    Executable,
    /// One of the `.rpa` archives, placed under `game/`.
    TargetDataFile,
    /// Whole directory merged at the destination root.
    TargetDirectory,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedItem {
    pub source_path: PathBuf,
    pub kind: ItemKind,
    /// Relative to the destination root. Empty for unclassified items.
    pub relative_destination: PathBuf,
}

impl ClassifiedItem {
    pub fn is_installable(&self) -> bool {
        self.kind != ItemKind::Unclassified
    }

    /// True for placed `.exe` files; these make the destination worth opening.
    pub fn is_launcher(&self) -> bool {
        self.kind == ItemKind::Executable
            && self
                .source_path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
    }
}

pub fn is_target_dir_name(name: &str) -> bool {
    TARGET_DIRS.contains(&name) || name.ends_with(APP_BUNDLE_SUFFIX)
}

pub fn is_target_file_name(name: &str) -> bool {
    TARGET_FILES.contains(&name)
}

pub fn is_executable_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            EXECUTABLE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

/// First directory, walking top-down in name order, whose immediate children
/// include a target directory or a target data file.
pub fn locate_base_directory(staged_root: &Path) -> Option<PathBuf> {
    let walker = WalkDir::new(staged_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable staged entry: {err}");
                continue;
            }
        };
        if entry.file_type().is_dir() && has_target_child(entry.path()) {
            return Some(entry.into_path());
        }
    }
    None
}

fn has_target_child(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|entry| entry.ok()).any(|entry| {
        let Ok(file_type) = entry.file_type() else {
            return false;
        };
        let name = entry.file_name();
        let name = name.to_string_lossy();
        (file_type.is_dir() && TARGET_DIRS.iter().any(|dir| *dir == name))
            || (file_type.is_file() && is_target_file_name(&name))
    })
}

/// Classifies everything below `base_dir`, one directory level at a time:
/// the level's files first, then its target directories (reported as one
/// item each, not descended into), then the remaining subdirectories
/// recursively. Items are applied in this order, so it decides which copy
/// wins when two items land on the same destination path.
pub fn classify(base_dir: &Path) -> Vec<ClassifiedItem> {
    let mut items = Vec::new();
    classify_level(base_dir, &mut items);
    items
}

fn classify_level(dir: &Path, items: &mut Vec<ClassifiedItem>) {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry),
            Ok(entry) if entry.file_type().is_dir() => subdirs.push(entry),
            Ok(entry) => debug!("not classifying non-regular entry {:?}", entry.path()),
            Err(err) => warn!("skipping unreadable staged entry: {err}"),
        }
    }

    for entry in files {
        let name = entry.file_name().to_string_lossy().into_owned();
        let (kind, relative_destination) = if is_executable_name(&name) {
            (ItemKind::Executable, PathBuf::from(&name))
        } else if is_target_file_name(&name) {
            (ItemKind::TargetDataFile, Path::new(DATA_DIR).join(&name))
        } else {
            (ItemKind::Unclassified, PathBuf::new())
        };
        items.push(ClassifiedItem {
            source_path: entry.into_path(),
            kind,
            relative_destination,
        });
    }

    let (targets, others): (Vec<_>, Vec<_>) = subdirs
        .into_iter()
        .partition(|entry| is_target_dir_name(&entry.file_name().to_string_lossy()));
    for entry in targets {
        let name = entry.file_name().to_string_lossy().into_owned();
        items.push(ClassifiedItem {
            source_path: entry.into_path(),
            kind: ItemKind::TargetDirectory,
            relative_destination: PathBuf::from(name),
        });
    }
    for entry in others {
        classify_level(entry.path(), items);
    }
}
