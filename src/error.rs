use crate::classify::ClassifiedItem;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Bad input from the user. Raised before anything on disk is changed.
#[derive(Debug, Error)]
pub enum UserInputError {
    #[error("no mod archive was given")]
    ArchiveRequired,
    #[error("the provided path does not point to a zip file: {}", .0.display())]
    NotAZip(PathBuf),
    #[error("game directory is empty, please specify a valid path")]
    GameDirRequired,
    #[error("game directory does not exist: {}", .0.display())]
    GameDirMissing(PathBuf),
    #[error(
        "mod directory {} is inside the game directory {}",
        .mod_dir.display(),
        .game_dir.display()
    )]
    ModDirInsideGame { game_dir: PathBuf, mod_dir: PathBuf },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("open archive {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("read archive {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("archive entry {name:?} would extract outside {}", .staging.display())]
    UnsafeEntry { name: String, staging: PathBuf },
    #[error("permission denied during extraction to {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Filesystem failure tagged with what was being done and where.
#[derive(Debug, Error)]
#[error("{action} {}: {source}", .path.display())]
pub struct FsError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

pub(crate) trait FsContext<T> {
    fn fs_context(self, action: &'static str, path: &Path) -> Result<T, FsError>;
}

impl<T> FsContext<T> for io::Result<T> {
    fn fs_context(self, action: &'static str, path: &Path) -> Result<T, FsError> {
        self.map_err(|source| FsError {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    UserInput(#[from] UserInputError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("none of the target directories or files found in {}", .0.display())]
    NoInstallableContent(PathBuf),
    #[error("another operation is already running on {}", .0.display())]
    DestinationBusy(PathBuf),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(
        "merge stopped at {} after {} of {planned} item(s): {source}",
        .failed.relative_destination.display(),
        .applied.len()
    )]
    PartialMerge {
        applied: Vec<ClassifiedItem>,
        failed: ClassifiedItem,
        planned: usize,
        #[source]
        source: FsError,
    },
}

impl InstallError {
    pub fn is_user_error(&self) -> bool {
        matches!(self, InstallError::UserInput(_))
    }
}

#[derive(Debug, Error)]
pub enum UninstallError {
    #[error("game directory is empty, please specify a valid path")]
    PathRequired,
    #[error(
        "the specified directory does not appear to be a valid DDLC installation: {}",
        .0.display()
    )]
    NotAnInstall(PathBuf),
    #[error("the specified directory does not contain expected DDLC files: {}", .0.display())]
    MissingExpectedFiles(PathBuf),
    #[error("another operation is already running on {}", .0.display())]
    DestinationBusy(PathBuf),
    #[error("scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error(
        "uninstall stopped after removing {removed_files} of {planned_files} file(s) ({removed_bytes} bytes): {source}"
    )]
    Partial {
        removed_files: usize,
        planned_files: usize,
        removed_bytes: u64,
        #[source]
        source: FsError,
    },
}

impl UninstallError {
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            UninstallError::PathRequired
                | UninstallError::NotAnInstall(_)
                | UninstallError::MissingExpectedFiles(_)
        )
    }
}
