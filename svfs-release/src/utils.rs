use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ReleaseError, Result};

/// Set the permission bits of `path`.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|e| ReleaseError::fs(path, e))?;
    }

    #[cfg(not(unix))]
    {
        let _ = mode;
        fs::metadata(path).map_err(|e| ReleaseError::fs(path, e))?;
    }

    Ok(())
}

/// Copy `source` to `dest`, creating parent directories, and apply `mode`.
pub fn copy_with_mode(source: &Path, dest: &Path, mode: u32) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| ReleaseError::fs(parent, e))?;
    }
    fs::copy(source, dest).map_err(|e| ReleaseError::fs(source, e))?;
    set_mode(dest, mode)
}

/// Regular files directly inside `dir`.
pub fn list_files(dir: &Path) -> Result<BTreeSet<PathBuf>> {
    let mut files = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(|e| ReleaseError::fs(dir, e))? {
        let path = entry.map_err(|e| ReleaseError::fs(dir, e))?.path();
        if path.is_file() {
            files.insert(path);
        }
    }
    Ok(files)
}

/// Make `path` absolute against the current directory.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| ReleaseError::fs(path, e))
}
