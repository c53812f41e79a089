use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// One entry the packer left in its output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Size in bytes, as reported by the filesystem for directories too.
    pub size: u64,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

/// List the entries directly inside `dir`, ordered by name.
///
/// Subdirectories are listed with their own size but not descended into.
pub fn scan(dir: &Path) -> Result<Vec<FileEntry>> {
    let mut out = Vec::new();

    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let meta = entry.metadata().map_err(std::io::Error::from)?;
        let is_dir = entry.file_type().is_dir();
        if is_dir {
            debug!(path = %entry.path().display(), size = meta.len(), "nested output directory");
        }

        out.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size: meta.len(),
            is_dir,
            modified: meta.modified().ok(),
        });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lists_entries_sorted_without_recursing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.siva"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("a.siva"), vec![0u8; 3]).unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.siva"), vec![0u8; 7]).unwrap();

        let files = scan(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.siva", "b.siva", "nested"]);
        assert_eq!(files[0].size, 3);
        assert_eq!(files[1].size, 10);
        assert!(!files[0].is_dir);
        assert!(files[0].modified.is_some());

        let nested = &files[2];
        assert!(nested.is_dir);
        let dir_size = fs::metadata(dir.path().join("nested")).unwrap().len();
        assert_eq!(nested.size, dir_size);
    }

    #[test]
    fn empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_dir_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(scan(&dir.path().join("gone")).is_err());
    }
}
