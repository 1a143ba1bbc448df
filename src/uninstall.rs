use crate::error::{FsContext, UninstallError};
use crate::game;
use crate::lock::DestinationLock;
use crate::progress::{Confirm, ProgressSink, Reporter};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{error, info};
use walkdir::WalkDir;

pub const CONFIRM_TITLE: &str = "Confirm Uninstall";
pub const CONFIRM_MESSAGE: &str =
    "Are you sure you want to Uninstall DDLC? This action cannot be undone!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Completed { removed_files: usize, removed_bytes: u64 },
    Cancelled,
}

/// Everything that will be removed, worked out before the first deletion.
#[derive(Debug, Default)]
pub struct UninstallPlan {
    pub root: PathBuf,
    /// Files and symlinks with their sizes.
    pub files: Vec<(PathBuf, u64)>,
    /// Deepest first; the root is not included.
    pub dirs: Vec<PathBuf>,
    pub total_bytes: u64,
}

/// Checks that `game_dir` really is a game install. Touches nothing.
pub fn validate(game_dir: &Path) -> Result<(), UninstallError> {
    if game_dir.as_os_str().is_empty() {
        return Err(UninstallError::PathRequired);
    }
    if !game::path_names_game(game_dir) {
        return Err(UninstallError::NotAnInstall(game_dir.to_path_buf()));
    }
    if !game::looks_like_game_root(game_dir) {
        return Err(UninstallError::MissingExpectedFiles(game_dir.to_path_buf()));
    }
    Ok(())
}

pub fn plan(game_dir: &Path) -> Result<UninstallPlan, UninstallError> {
    let mut plan = UninstallPlan {
        root: game_dir.to_path_buf(),
        ..UninstallPlan::default()
    };
    for entry in WalkDir::new(game_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .contents_first(true)
    {
        let entry = entry.map_err(|source| UninstallError::Scan {
            path: game_dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            plan.dirs.push(entry.into_path());
            continue;
        }
        let len = if entry.file_type().is_file() {
            entry.metadata().map(|meta| meta.len()).unwrap_or(0)
        } else {
            0
        };
        plan.total_bytes = plan.total_bytes.saturating_add(len);
        plan.files.push((entry.into_path(), len));
    }
    Ok(plan)
}

/// Validates, asks for confirmation, then deletes the whole install.
pub fn uninstall(
    game_dir: &Path,
    confirm: &dyn Confirm,
    sink: &dyn ProgressSink,
) -> Result<UninstallOutcome, UninstallError> {
    if let Err(err) = validate(game_dir) {
        let console = match &err {
            UninstallError::NotAnInstall(_) => {
                "Error: Attempted to delete a non-DDLC directory.".to_string()
            }
            UninstallError::MissingExpectedFiles(_) => {
                "Error: The specified directory lacks expected DDLC files.".to_string()
            }
            other => format!("Error: {other}"),
        };
        sink.console(&console);
        sink.critical("Error", &capitalize(&err.to_string()));
        return Err(err);
    }

    if !confirm.confirm(CONFIRM_TITLE, CONFIRM_MESSAGE) {
        info!("uninstall of {:?} cancelled", game_dir);
        sink.console("Uninstallation cancelled.");
        return Ok(UninstallOutcome::Cancelled);
    }

    match remove_install(game_dir, sink) {
        Ok(outcome) => {
            sink.console(&format!(
                "DDLC has been uninstalled successfully from: {}",
                game_dir.display()
            ));
            sink.info(
                "Uninstall Complete",
                "DDLC has been successfully uninstalled.",
            );
            Ok(outcome)
        }
        Err(err) => {
            error!("uninstall failed: {err}");
            sink.console(&format!("Error during uninstallation: {err}"));
            sink.critical("Error", &format!("Failed to uninstall DDLC. {err}"));
            Err(err)
        }
    }
}

fn remove_install(
    game_dir: &Path,
    sink: &dyn ProgressSink,
) -> Result<UninstallOutcome, UninstallError> {
    let _lock = DestinationLock::acquire(game_dir)
        .ok_or_else(|| UninstallError::DestinationBusy(game_dir.to_path_buf()))?;

    let plan = plan(game_dir)?;
    delete_planned(&plan, sink)
}

// Deletes exactly what `plan` lists, files first, then directories bottom-up.
fn delete_planned(
    plan: &UninstallPlan,
    sink: &dyn ProgressSink,
) -> Result<UninstallOutcome, UninstallError> {
    let planned_files = plan.files.len();
    let mut reporter = Reporter::new(sink, plan.total_bytes);
    let mut removed_files = 0usize;

    let partial = |removed_files, removed_bytes, source| UninstallError::Partial {
        removed_files,
        planned_files,
        removed_bytes,
        source,
    };

    for (path, len) in &plan.files {
        if let Err(source) = fs::remove_file(path).fs_context("remove file", path) {
            return Err(partial(
                removed_files,
                reporter.state().processed_bytes(),
                source,
            ));
        }
        removed_files += 1;
        reporter.advance(*len);
    }
    for dir in plan.dirs.iter().chain(std::iter::once(&plan.root)) {
        if let Err(source) = fs::remove_dir(dir).fs_context("remove dir", dir) {
            return Err(partial(
                removed_files,
                reporter.state().processed_bytes(),
                source,
            ));
        }
    }
    reporter.finish();

    info!(
        "removed {removed_files} files ({} bytes) from {:?}",
        reporter.state().processed_bytes(),
        plan.root
    );
    Ok(UninstallOutcome::Completed {
        removed_files,
        removed_bytes: reporter.state().processed_bytes(),
    })
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{AutoConfirm, NullSink};
    use std::cell::Cell;
    use tempfile::TempDir;

    struct CountingConfirm {
        asked: Cell<usize>,
        answer: bool,
    }

    impl Confirm for CountingConfirm {
        fn confirm(&self, _title: &str, _message: &str) -> bool {
            self.asked.set(self.asked.get() + 1);
            self.answer
        }
    }

    fn fake_install(parent: &Path) -> PathBuf {
        let root = parent.join(game::GAME_NAME);
        fs::create_dir_all(root.join("game/saves")).unwrap();
        fs::write(root.join("DDLC.exe"), vec![1u8; 100]).unwrap();
        fs::write(root.join("game/scripts.rpa"), vec![2u8; 50]).unwrap();
        fs::write(root.join("game/saves/persistent"), vec![3u8; 5]).unwrap();
        root
    }

    #[test]
    fn empty_path_is_rejected() {
        let confirm = CountingConfirm {
            asked: Cell::new(0),
            answer: true,
        };
        let err = uninstall(Path::new(""), &confirm, &NullSink).unwrap_err();
        assert!(matches!(err, UninstallError::PathRequired));
        assert_eq!(confirm.asked.get(), 0);
    }

    #[test]
    fn wrong_name_is_rejected_without_touching_disk() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Some Other Game");
        fs::create_dir_all(dir.join("game")).unwrap();
        fs::write(dir.join("DDLC.exe"), b"x").unwrap();

        let confirm = CountingConfirm {
            asked: Cell::new(0),
            answer: true,
        };
        let err = uninstall(&dir, &confirm, &NullSink).unwrap_err();
        assert!(matches!(err, UninstallError::NotAnInstall(_)));
        assert!(err.is_user_error());
        assert_eq!(confirm.asked.get(), 0);
        assert!(dir.join("DDLC.exe").exists());
    }

    #[test]
    fn missing_markers_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(game::GAME_NAME);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("notes.txt"), b"x").unwrap();
        let err = uninstall(&dir, &AutoConfirm(true), &NullSink).unwrap_err();
        assert!(matches!(err, UninstallError::MissingExpectedFiles(_)));
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn declining_leaves_everything() {
        let temp = TempDir::new().unwrap();
        let root = fake_install(temp.path());
        let confirm = CountingConfirm {
            asked: Cell::new(0),
            answer: false,
        };
        let outcome = uninstall(&root, &confirm, &NullSink).unwrap();
        assert_eq!(outcome, UninstallOutcome::Cancelled);
        assert_eq!(confirm.asked.get(), 1);
        assert!(root.join("game/saves/persistent").exists());
    }

    #[test]
    fn confirmed_uninstall_removes_tree() {
        let temp = TempDir::new().unwrap();
        let root = fake_install(temp.path());
        let outcome = uninstall(&root, &AutoConfirm(true), &NullSink).unwrap();
        assert_eq!(
            outcome,
            UninstallOutcome::Completed {
                removed_files: 3,
                removed_bytes: 155
            }
        );
        assert!(!root.exists());
        assert!(temp.path().exists());
    }

    #[test]
    fn failed_file_removal_reports_progress_so_far() {
        let temp = TempDir::new().unwrap();
        let root = fake_install(temp.path());
        let plan = plan(&root).unwrap();
        let names: Vec<_> = plan.files.iter().map(|(path, _)| path.clone()).collect();
        assert_eq!(
            names,
            vec![
                root.join("DDLC.exe"),
                root.join("game/saves/persistent"),
                root.join("game/scripts.rpa"),
            ]
        );

        // a non-empty directory where the planned file was cannot be removed as a file
        let blocked = root.join("game/saves/persistent");
        fs::remove_file(&blocked).unwrap();
        fs::create_dir_all(blocked.join("inner")).unwrap();

        match delete_planned(&plan, &NullSink).unwrap_err() {
            UninstallError::Partial {
                removed_files,
                planned_files,
                removed_bytes,
                source,
            } => {
                assert_eq!(removed_files, 1);
                assert_eq!(planned_files, 3);
                assert_eq!(removed_bytes, 100);
                assert_eq!(source.path, blocked);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!root.join("DDLC.exe").exists());
        assert!(root.join("game/scripts.rpa").is_file());
    }

    #[test]
    fn failed_dir_removal_reports_all_files_removed() {
        let temp = TempDir::new().unwrap();
        let root = fake_install(temp.path());
        let plan = plan(&root).unwrap();
        // appears after planning, so game/saves is not empty when its turn comes
        fs::write(root.join("game/saves/late.save"), b"new").unwrap();

        match delete_planned(&plan, &NullSink).unwrap_err() {
            UninstallError::Partial {
                removed_files,
                planned_files,
                removed_bytes,
                source,
            } => {
                assert_eq!(removed_files, 3);
                assert_eq!(planned_files, 3);
                assert_eq!(removed_bytes, 155);
                assert_eq!(source.path, root.join("game/saves"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(root.join("game/saves/late.save").is_file());
    }

    #[test]
    fn plan_lists_children_before_parents() {
        let temp = TempDir::new().unwrap();
        let root = fake_install(temp.path());
        let plan = plan(&root).unwrap();
        assert_eq!(plan.total_bytes, 155);
        let saves = plan.dirs.iter().position(|d| d.ends_with("saves")).unwrap();
        let game_dir = plan.dirs.iter().position(|d| d.ends_with("game")).unwrap();
        assert!(saves < game_dir);
        assert!(!plan.dirs.contains(&root));
    }
}
