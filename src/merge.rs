use crate::error::{FsContext, FsError};
use crate::progress::Reporter;
use filetime::{set_file_times, FileTime};
use std::{fs, io, path::Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Copies `source_dir` into `destination_root/dest_relative_name`, keeping
/// sub-paths and replacing whatever is already there file by file.
pub fn merge_directory(
    source_dir: &Path,
    dest_relative_name: &Path,
    destination_root: &Path,
    reporter: &mut Reporter<'_>,
) -> Result<(), FsError> {
    let dest = destination_root.join(dest_relative_name);
    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|err| walk_error(source_dir, err))?;
        let Ok(rel) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        let target = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).fs_context("create dir", &target)?;
        } else if file_type.is_file() {
            if target.exists() {
                reporter.log(format!("Overwriting file: {}", target.display()));
            } else {
                reporter.log(format!("Copying file: {}", target.display()));
            }
            let bytes = copy_preserving_times(entry.path(), &target)?;
            reporter.advance(bytes);
        } else {
            warn!("skipping non-regular entry {:?}", entry.path());
        }
    }
    Ok(())
}

/// Replaces `destination_root/dest_relative_name` with `source_file`.
pub fn overwrite_file(
    source_file: &Path,
    dest_relative_name: &Path,
    destination_root: &Path,
    reporter: &mut Reporter<'_>,
) -> Result<(), FsError> {
    let target = destination_root.join(dest_relative_name);
    if fs::symlink_metadata(&target).is_ok() {
        fs::remove_file(&target).fs_context("remove existing file", &target)?;
        reporter.log(format!("Removed existing file: {}", target.display()));
    }
    let bytes = copy_preserving_times(source_file, &target)?;
    reporter.log(format!(
        "Copied {} to {}",
        source_file.display(),
        target.display()
    ));
    reporter.advance(bytes);
    Ok(())
}

/// Mirrors the whole game install into `destination_dir` so mod files land on
/// an independent copy.
pub fn copy_baseline_game_files(
    game_dir: &Path,
    destination_dir: &Path,
    reporter: &mut Reporter<'_>,
) -> Result<(), FsError> {
    fs::create_dir_all(destination_dir).fs_context("create mod dir", destination_dir)?;
    let walker = WalkDir::new(game_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != destination_dir);
    let mut copied = 0usize;
    for entry in walker {
        let entry = entry.map_err(|err| walk_error(game_dir, err))?;
        let Ok(rel) = entry.path().strip_prefix(game_dir) else {
            continue;
        };
        let target = destination_dir.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).fs_context("create dir", &target)?;
        } else if entry.file_type().is_file() {
            let bytes = copy_preserving_times(entry.path(), &target)?;
            debug!("baseline copy {:?} -> {:?}", entry.path(), target);
            copied += 1;
            reporter.advance(bytes);
        } else {
            warn!("skipping non-regular entry {:?}", entry.path());
        }
    }
    reporter.log(format!(
        "Copied game files to: {} ({copied} files)",
        destination_dir.display()
    ));
    Ok(())
}

/// `fs::copy` plus the source's access and modification times.
/// Returns the number of bytes copied.
pub fn copy_preserving_times(source: &Path, target: &Path) -> Result<u64, FsError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).fs_context("create file dir", parent)?;
    }
    let bytes = fs::copy(source, target).fs_context("copy file", source)?;
    preserve_times(source, target);
    Ok(bytes)
}

fn preserve_times(source: &Path, dest: &Path) {
    let Ok(meta) = fs::metadata(source) else {
        return;
    };
    let atime = FileTime::from_last_access_time(&meta);
    let mtime = FileTime::from_last_modification_time(&meta);
    if let Err(err) = set_file_times(dest, atime, mtime) {
        debug!("could not keep timestamps on {:?}: {err}", dest);
    }
}

pub(crate) fn walk_error(root: &Path, err: walkdir::Error) -> FsError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
    FsError {
        action: "walk",
        path,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressSink;
    use std::{cell::RefCell, path::PathBuf};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        lines: RefCell<Vec<String>>,
        progress: RefCell<Vec<f32>>,
    }

    impl ProgressSink for Recorder {
        fn console(&self, message: &str) {
            self.lines.borrow_mut().push(message.to_string());
        }
        fn progress(&self, percent: f32) {
            self.progress.borrow_mut().push(percent);
        }
        fn critical(&self, _title: &str, _message: &str) {}
        fn info(&self, _title: &str, _message: &str) {}
    }

    fn write(path: &Path, len: usize) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![7u8; len]).unwrap();
    }

    #[test]
    fn merge_overwrites_and_keeps_unrelated_files() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src/characters");
        let dest = temp.path().join("dest");
        write(&src.join("monika.chr"), 10);
        write(&src.join("sub/yuri.chr"), 20);
        write(&dest.join("characters/monika.chr"), 3);
        write(&dest.join("characters/sayori.chr"), 5);

        let sink = Recorder::default();
        let mut reporter = Reporter::new(&sink, 30);
        merge_directory(&src, Path::new("characters"), &dest, &mut reporter).unwrap();

        assert_eq!(fs::read(dest.join("characters/monika.chr")).unwrap().len(), 10);
        assert_eq!(fs::read(dest.join("characters/sub/yuri.chr")).unwrap().len(), 20);
        assert!(dest.join("characters/sayori.chr").exists());
        assert_eq!(reporter.state().processed_bytes(), 30);

        let lines = sink.lines.borrow();
        let logged = |prefix: &str, name: &str| {
            lines
                .iter()
                .any(|line| line.starts_with(prefix) && line.ends_with(name))
        };
        assert!(logged("Overwriting file:", "monika.chr"));
        assert!(logged("Copying file:", "yuri.chr"));
        assert_eq!(sink.progress.borrow().last().copied(), Some(100.0));
    }

    #[test]
    fn overwrite_replaces_and_creates_parents() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("scripts.rpa");
        write(&src, 150);
        let dest = temp.path().join("dest");

        let sink = Recorder::default();
        let mut reporter = Reporter::new(&sink, 300);
        let rel = PathBuf::from("game").join("scripts.rpa");
        overwrite_file(&src, &rel, &dest, &mut reporter).unwrap();
        assert_eq!(fs::metadata(dest.join(&rel)).unwrap().len(), 150);
        assert!(!sink.lines.borrow()[0].starts_with("Removed"));

        overwrite_file(&src, &rel, &dest, &mut reporter).unwrap();
        assert!(sink.lines.borrow()[1].starts_with("Removed existing file:"));
        assert_eq!(reporter.state().processed_bytes(), 300);
    }

    #[test]
    fn copy_keeps_modification_time() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.bin");
        write(&src, 4);
        let old = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        let target = temp.path().join("out/a.bin");
        copy_preserving_times(&src, &target).unwrap();
        let meta = fs::metadata(&target).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }

    #[test]
    fn baseline_copy_mirrors_tree() {
        let temp = TempDir::new().unwrap();
        let game = temp.path().join("Doki Doki Literature Club");
        write(&game.join("DDLC.exe"), 11);
        write(&game.join("game/scripts.rpa"), 22);
        fs::create_dir_all(game.join("empty")).unwrap();
        let mods = temp.path().join("DDLC Modded");

        let sink = Recorder::default();
        let mut reporter = Reporter::new(&sink, 33);
        copy_baseline_game_files(&game, &mods, &mut reporter).unwrap();

        assert!(mods.join("DDLC.exe").is_file());
        assert_eq!(fs::metadata(mods.join("game/scripts.rpa")).unwrap().len(), 22);
        assert!(mods.join("empty").is_dir());
        assert_eq!(reporter.state().processed_bytes(), 33);
        assert!(sink.lines.borrow().last().unwrap().starts_with("Copied game files to:"));
    }
}
