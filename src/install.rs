//! End-to-end mod install: stage the archive, work out what goes where, then
//! merge it into the destination.
//!
//! Everything that only reads (sizing, extraction into the staging area,
//! locating and classifying content) happens before the destination is
//! touched. If merging fails halfway the destination is left as it is and the
//! error names exactly which items were already applied.

use crate::archive;
use crate::classify::{self, ClassifiedItem, ItemKind};
use crate::error::{FsContext, InstallError, UserInputError};
use crate::lock::DestinationLock;
use crate::merge;
use crate::progress::{ProgressSink, Reporter};
use crate::size;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct InstallRequest {
    archive_path: PathBuf,
    game_directory: PathBuf,
    separate_mod_directory: Option<PathBuf>,
}

impl InstallRequest {
    pub fn new(
        archive_path: impl Into<PathBuf>,
        game_directory: impl Into<PathBuf>,
        separate_mod_directory: Option<PathBuf>,
    ) -> Result<Self, UserInputError> {
        let archive_path = archive_path.into();
        let game_directory = game_directory.into();

        if archive_path.as_os_str().is_empty() {
            return Err(UserInputError::ArchiveRequired);
        }
        let is_zip = archive_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if !is_zip {
            return Err(UserInputError::NotAZip(archive_path));
        }
        if game_directory.as_os_str().is_empty() {
            return Err(UserInputError::GameDirRequired);
        }

        let separate_mod_directory =
            separate_mod_directory.filter(|dir| !dir.as_os_str().is_empty());
        if let Some(mod_dir) = &separate_mod_directory {
            if !game_directory.is_dir() {
                return Err(UserInputError::GameDirMissing(game_directory));
            }
            if is_inside(mod_dir, &game_directory) {
                return Err(UserInputError::ModDirInsideGame {
                    game_dir: game_directory,
                    mod_dir: mod_dir.clone(),
                });
            }
        }

        Ok(Self {
            archive_path,
            game_directory,
            separate_mod_directory,
        })
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn game_directory(&self) -> &Path {
        &self.game_directory
    }

    pub fn separate_mod_directory(&self) -> Option<&Path> {
        self.separate_mod_directory.as_deref()
    }

    /// Tree the mod lands in.
    pub fn destination(&self) -> &Path {
        self.separate_mod_directory
            .as_deref()
            .unwrap_or(&self.game_directory)
    }
}

fn is_inside(candidate: &Path, parent: &Path) -> bool {
    let resolve = |path: &Path| {
        fs::canonicalize(path)
            .or_else(|_| std::path::absolute(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let parent = resolve(parent);
    // the mod dir usually does not exist yet; resolve its closest existing ancestor
    let mut probe = candidate.to_path_buf();
    let mut tail = Vec::new();
    while !probe.exists() {
        match (probe.file_name().map(|n| n.to_os_string()), probe.parent()) {
            (Some(name), Some(up)) => {
                tail.push(name);
                probe = up.to_path_buf();
            }
            _ => break,
        }
    }
    let mut resolved = resolve(&probe);
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    resolved.starts_with(&parent)
}

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Delete the staging directory after a successful install.
    pub clean_staging: bool,
}

#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub staging_dir: PathBuf,
    pub base_dir: PathBuf,
    pub items: Vec<ClassifiedItem>,
}

impl InstallPlan {
    pub fn installable(&self) -> impl Iterator<Item = &ClassifiedItem> {
        self.items.iter().filter(|item| item.is_installable())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ClassifiedItem> {
        self.items.iter().filter(|item| !item.is_installable())
    }
}

#[derive(Debug, Clone)]
pub struct InstallReport {
    pub destination: PathBuf,
    pub staging_dir: PathBuf,
    pub base_dir: PathBuf,
    pub applied: Vec<ClassifiedItem>,
    pub skipped: Vec<ClassifiedItem>,
    /// A launcher was placed; the front end should offer to open the destination.
    pub open_destination: bool,
    pub final_progress: f32,
}

/// Locates and classifies the content of an already staged archive.
pub fn plan(staging_dir: &Path) -> Result<InstallPlan, InstallError> {
    let Some(base_dir) = classify::locate_base_directory(staging_dir) else {
        return Err(InstallError::NoInstallableContent(staging_dir.to_path_buf()));
    };
    let items = classify::classify(&base_dir);
    Ok(InstallPlan {
        staging_dir: staging_dir.to_path_buf(),
        base_dir,
        items,
    })
}

pub fn process_files(
    request: &InstallRequest,
    sink: &dyn ProgressSink,
) -> Result<InstallReport, InstallError> {
    process_files_with(request, &InstallOptions::default(), sink)
}

/// Runs one install and reports the outcome to `sink`, including the
/// closing alert.
pub fn process_files_with(
    request: &InstallRequest,
    options: &InstallOptions,
    sink: &dyn ProgressSink,
) -> Result<InstallReport, InstallError> {
    match run(request, options, sink) {
        Ok(report) => {
            sink.info(
                "Process Completed",
                "All files have been processed successfully.",
            );
            Ok(report)
        }
        Err(err) => {
            error!("install failed: {err}");
            sink.console(&format!("Error during processing: {err}"));
            sink.critical("Error", &format!("An error occurred: {err}"));
            Err(err)
        }
    }
}

fn run(
    request: &InstallRequest,
    options: &InstallOptions,
    sink: &dyn ProgressSink,
) -> Result<InstallReport, InstallError> {
    let destination = request.destination().to_path_buf();
    let _lock = DestinationLock::acquire(&destination)
        .ok_or_else(|| InstallError::DestinationBusy(destination.clone()))?;

    let game_size = size::directory_size(request.game_directory());
    let archive_size = size::archive_uncompressed_size(request.archive_path())?;
    let mut reporter = Reporter::new(sink, game_size.saturating_add(archive_size));
    reporter.log(format!(
        "Processing files from: {} to {}",
        request.archive_path().display(),
        destination.display()
    ));

    let staging_dir = archive::extract(request.archive_path())?;
    reporter.log(format!("Extracted zip to: {}", staging_dir.display()));

    let plan = plan(&staging_dir)?;
    info!(
        "install plan: base {:?}, {} installable, {} skipped",
        plan.base_dir,
        plan.installable().count(),
        plan.skipped().count()
    );

    if let Some(mod_dir) = request.separate_mod_directory() {
        merge::copy_baseline_game_files(request.game_directory(), mod_dir, &mut reporter)?;
    } else {
        fs::create_dir_all(&destination).fs_context("create destination", &destination)?;
    }

    let applied = apply(&plan, &destination, &mut reporter)?;
    let open_destination = applied.iter().any(ClassifiedItem::is_launcher);

    reporter.finish();

    if options.clean_staging {
        if let Err(err) = fs::remove_dir_all(&staging_dir) {
            warn!("could not remove staging dir {:?}: {err}", staging_dir);
        }
    }

    Ok(InstallReport {
        destination,
        staging_dir,
        base_dir: plan.base_dir.clone(),
        applied,
        skipped: plan.skipped().cloned().collect(),
        open_destination,
        final_progress: 100.0,
    })
}

fn apply(
    plan: &InstallPlan,
    destination: &Path,
    reporter: &mut Reporter<'_>,
) -> Result<Vec<ClassifiedItem>, InstallError> {
    let planned = plan.installable().count();
    let mut applied: Vec<ClassifiedItem> = Vec::with_capacity(planned);

    for item in plan.installable() {
        let result = match item.kind {
            ItemKind::Executable => {
                reporter.log(format!(
                    "Moving executable/script: {}",
                    item.relative_destination.display()
                ));
                merge::overwrite_file(
                    &item.source_path,
                    &item.relative_destination,
                    destination,
                    reporter,
                )
            }
            ItemKind::TargetDataFile => {
                reporter.log(format!(
                    "Moving target file: {} to {}",
                    display_name(&item.source_path),
                    item.relative_destination.display()
                ));
                merge::overwrite_file(
                    &item.source_path,
                    &item.relative_destination,
                    destination,
                    reporter,
                )
            }
            ItemKind::TargetDirectory => {
                reporter.log(format!(
                    "Copying directory: {}",
                    item.relative_destination.display()
                ));
                merge::merge_directory(
                    &item.source_path,
                    &item.relative_destination,
                    destination,
                    reporter,
                )
            }
            ItemKind::Unclassified => continue,
        };

        if let Err(source) = result {
            return Err(InstallError::PartialMerge {
                applied,
                failed: item.clone(),
                planned,
                source,
            });
        }
        applied.push(item.clone());
    }

    Ok(applied)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
