use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, OnceLock},
};
use tracing::debug;

static ACTIVE_ROOTS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn active_roots() -> &'static Mutex<HashSet<PathBuf>> {
    ACTIVE_ROOTS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Exclusive claim on a destination tree for the lifetime of one operation.
/// Released on drop.
#[derive(Debug)]
pub struct DestinationLock {
    key: PathBuf,
}

impl DestinationLock {
    /// `None` while another operation holds the same root.
    pub fn acquire(root: &Path) -> Option<Self> {
        let key = lock_key(root);
        let mut roots = active_roots()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !roots.insert(key.clone()) {
            return None;
        }
        debug!("locked destination {:?}", key);
        Some(Self { key })
    }
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        let mut roots = active_roots()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        roots.remove(&self.key);
    }
}

fn lock_key(root: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(root) {
        return canonical;
    }
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_claim_on_same_root_fails() {
        let temp = TempDir::new().unwrap();
        let first = DestinationLock::acquire(temp.path()).unwrap();
        assert!(DestinationLock::acquire(temp.path()).is_none());
        assert!(DestinationLock::acquire(&temp.path().join(".")).is_none());
        drop(first);
        assert!(DestinationLock::acquire(temp.path()).is_some());
    }

    #[test]
    fn different_roots_do_not_conflict() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let _a = DestinationLock::acquire(a.path()).unwrap();
        assert!(DestinationLock::acquire(b.path()).is_some());
    }
}
