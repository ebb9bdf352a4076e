use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glob_match::glob_match;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File extensions treated as image assets by `unused`.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "bmp", "avif", "ico"];

/// A document found on disk.
///
/// `id` is the canonical root joined with the `/`-separated path relative to
/// that root, so documents from different roots never collide in one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub id: String,
    pub relative: String,
    pub name: String,
    pub path: PathBuf,
}

/// Id prefix shared by every document under `root`: its canonical path with
/// `/` separators and no trailing slash.
pub fn root_id(root: &Path) -> Result<String> {
    let canonical = fs::canonicalize(root)
        .with_context(|| format!("Failed to resolve {}", root.display()))?;
    let id = canonical.to_string_lossy().replace('\\', "/");
    Ok(id.trim_end_matches('/').to_string())
}

impl DocumentFile {
    pub fn from_path(root: &Path, root_id: &str, path: &Path) -> Result<Self> {
        let relative = path.strip_prefix(root).with_context(|| {
            format!("{} is not inside {}", path.display(), root.display())
        })?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| relative.clone());
        Ok(Self {
            id: format!("{}/{}", root_id, relative),
            relative,
            name,
            path: path.to_path_buf(),
        })
    }

    /// File contents; invalid UTF-8 is replaced rather than rejected.
    pub fn read_text(&self) -> Result<String> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Last modification time, falling back to now when the platform has none.
    pub fn modified(&self) -> DateTime<Utc> {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now())
    }
}

/// True when `relative_path` matches `pattern`. A leading `**/` also matches
/// files at the root itself.
pub fn matches_include(pattern: &str, relative_path: &str) -> bool {
    glob_match(pattern, relative_path)
        || pattern
            .strip_prefix("**/")
            .is_some_and(|rest| glob_match(rest, relative_path))
}

/// Every file under `root` whose relative path matches one of `include`,
/// sorted by id. Hidden files and directories are skipped.
pub fn find_documents(root: &Path, include: &[String]) -> Result<Vec<DocumentFile>> {
    let root_id = root_id(root)?;
    let mut documents = Vec::new();
    for path in walk_files(root)? {
        let document = DocumentFile::from_path(root, &root_id, &path)?;
        if include
            .iter()
            .any(|pattern| matches_include(pattern, &document.relative))
        {
            documents.push(document);
        }
    }
    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}

/// File names under `dir` whose extension marks them as images, sorted.
pub fn find_image_assets(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = walk_files(dir)?
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Regular files under `root`, following symlinks. Entries that cannot be
/// read (broken links, link cycles, permission errors) are logged and skipped.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(root)
        .with_context(|| format!("Failed to read directory {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let files = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(DirEntry::into_path)
        .collect();

    Ok(files)
}
