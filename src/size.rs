use crate::error::ArchiveError;
use std::{fs, path::Path};
use tracing::debug;
use walkdir::WalkDir;

/// Total size of the regular files below `path`. Symlinks are not followed;
/// a missing path counts as empty.
pub fn directory_size(path: &Path) -> u64 {
    if !path.exists() {
        return 0;
    }
    let mut total = 0u64;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("size scan skipped entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => total = total.saturating_add(meta.len()),
            Err(err) => debug!("size scan skipped {:?}: {err}", entry.path()),
        }
    }
    total
}

/// Sum of the declared uncompressed sizes in the archive's central directory.
pub fn archive_uncompressed_size(zip_path: &Path) -> Result<u64, ArchiveError> {
    let file = fs::File::open(zip_path).map_err(|source| ArchiveError::Open {
        path: zip_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| ArchiveError::Read {
        path: zip_path.to_path_buf(),
        source,
    })?;

    let mut total = 0u64;
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|source| ArchiveError::Read {
                path: zip_path.to_path_buf(),
                source,
            })?;
        total = total.saturating_add(entry.size());
    }
    Ok(total)
}
