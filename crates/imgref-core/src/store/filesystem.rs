use super::{Result, Store, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores each key as a file named after the key inside `base_path`.
///
/// Writes land in a sibling temp file that is then renamed over the target,
/// so a crash mid-write leaves the previous blob intact.
pub struct FileSystemStore {
    base_path: PathBuf,
}

impl FileSystemStore {
    /// Open a store rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Leading dots are reserved for in-flight temp files.
        if key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\'])
            || key.contains('\0')
        {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

impl Store for FileSystemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp_path = self.base_path.join(format!(".{key}.tmp"));
        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
