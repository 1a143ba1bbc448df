use crate::error::{ArchiveError, FsError};
use filetime::{set_file_mtime, FileTime};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};
use tracing::{debug, info};

/// Where an archive gets unpacked: next to it, named after it.
pub fn staging_dir_for(zip_path: &Path) -> PathBuf {
    zip_path.with_extension("")
}

pub fn extract(zip_path: &Path) -> Result<PathBuf, ArchiveError> {
    let staging = staging_dir_for(zip_path);
    let count = extract_to(zip_path, &staging)?;
    info!("Extracted {count} entries from {:?} to {:?}", zip_path, staging);
    Ok(staging)
}

/// Unpacks every entry into `dest`. Entry names are all checked before the
/// first write; one name that escapes `dest` rejects the whole archive.
pub fn extract_to(zip_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file = fs::File::open(zip_path).map_err(|source| ArchiveError::Open {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let read_err = |source| ArchiveError::Read {
        path: zip_path.to_path_buf(),
        source,
    };
    let mut archive = zip::ZipArchive::new(file).map_err(read_err)?;

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(read_err)?;
        if entry.enclosed_name().is_none() {
            return Err(ArchiveError::UnsafeEntry {
                name: entry.name().to_string(),
                staging: dest.to_path_buf(),
            });
        }
    }

    fs::create_dir_all(dest).map_err(|err| write_error("create staging dir", dest, err))?;

    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(read_err)?;
        let Some(rel) = file.enclosed_name() else {
            continue;
        };

        let out_path = dest.join(rel);
        if file.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|err| write_error("create zip dir", &out_path, err))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|err| write_error("create zip dir", parent, err))?;
        }

        let mut out_file = fs::File::create(&out_path)
            .map_err(|err| write_error("write zip entry", &out_path, err))?;
        io::copy(&mut file, &mut out_file)
            .map_err(|err| write_error("extract zip entry", &out_path, err))?;
        drop(out_file);
        if let Some(dt) = file.last_modified() {
            if let Some(mtime) = zip_time_to_unix(dt) {
                let mtime = FileTime::from_unix_time(mtime, 0);
                let _ = set_file_mtime(&out_path, mtime);
            }
        }
        debug!("extracted {:?}", out_path);
        written += 1;
    }

    Ok(written)
}

fn write_error(action: &'static str, path: &Path, source: io::Error) -> ArchiveError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        return ArchiveError::PermissionDenied(path.to_path_buf());
    }
    ArchiveError::Fs(FsError {
        action,
        path: path.to_path_buf(),
        source,
    })
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    let datetime = PrimitiveDateTime::new(date, time).assume_utc();
    Some(datetime.unix_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        for (name, body) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn staging_dir_strips_extension() {
        assert_eq!(
            staging_dir_for(Path::new("/downloads/Monika After Story.zip")),
            PathBuf::from("/downloads/Monika After Story")
        );
    }

    #[test]
    fn extracts_next_to_archive() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("mymod.zip");
        write_zip(
            &zip_path,
            &[
                ("mymod/game/script.rpy", b"label start:"),
                ("mymod/characters/x.png", b"png"),
            ],
        );

        let staging = extract(&zip_path).unwrap();
        assert_eq!(staging, temp.path().join("mymod"));
        assert_eq!(
            fs::read(staging.join("mymod/game/script.rpy")).unwrap(),
            b"label start:"
        );
        assert!(staging.join("mymod/characters/x.png").is_file());
    }

    #[test]
    fn rejects_entries_escaping_staging() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("evil.zip");
        write_zip(
            &zip_path,
            &[("ok.txt", b"fine"), ("../../escaped.txt", b"gotcha")],
        );

        let err = extract(&zip_path).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsafeEntry { .. }));
        assert!(!temp.path().join("evil").exists());
        assert!(!temp.path().join("escaped.txt").exists());
    }

    #[test]
    fn corrupt_archive_is_read_error() {
        let temp = TempDir::new().unwrap();
        let zip_path = temp.path().join("broken.zip");
        fs::write(&zip_path, b"PK but not really").unwrap();
        assert!(matches!(
            extract(&zip_path),
            Err(ArchiveError::Read { .. })
        ));
    }
}
