//! Directory traversal that yields regular files only.
//!
//! Symlinks are never followed and never reported, directories are
//! descended into but not reported, and special files (sockets, fifos,
//! devices) are skipped.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// A regular file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Last modification time
    pub modified: SystemTime,
}

impl FileInfo {
    fn from_entry(entry: &DirEntry) -> std::io::Result<Self> {
        Ok(Self {
            path: entry.path().to_path_buf(),
            modified: entry.metadata()?.modified()?,
        })
    }
}

/// Walk `root` in directory order and hand every regular file to `callback`.
///
/// Unreadable entries below the root go to `on_skip` and the walk moves on.
/// An unreadable root ends the walk with an error.
pub fn walk_regular_files<F, S>(root: &Path, mut callback: F, mut on_skip: S) -> std::io::Result<()>
where
    F: FnMut(FileInfo),
    S: FnMut(&Path, &std::io::Error),
{
    let walker = WalkDir::new(root).follow_links(false).sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(into_io(e)),
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                on_skip(&path, &into_io(e));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match FileInfo::from_entry(&entry) {
            Ok(info) => callback(info),
            Err(e) => on_skip(entry.path(), &e),
        }
    }

    Ok(())
}

fn into_io(e: walkdir::Error) -> std::io::Error {
    let message = e.to_string();
    e.into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        walk_regular_files(
            root,
            |f| files.push(f.path.strip_prefix(root).unwrap().to_path_buf()),
            |path, e| panic!("unexpected skip of {}: {}", path.display(), e),
        )?;
        Ok(files)
    }

    #[test]
    fn test_walk_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(relative_files(temp_dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_walk_with_subdirectories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("subdir"))?;
        fs::create_dir(temp_dir.path().join("empty"))?;
        fs::write(temp_dir.path().join("file1.txt"), b"content1")?;
        fs::write(temp_dir.path().join("subdir/file2.txt"), b"content2")?;

        assert_eq!(
            relative_files(temp_dir.path())?,
            vec![PathBuf::from("file1.txt"), PathBuf::from("subdir/file2.txt")]
        );
        Ok(())
    }

    #[test]
    fn test_modified_time_is_reported() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, b"a")?;
        let expected = fs::metadata(&path)?.modified()?;

        let mut seen = Vec::new();
        walk_regular_files(temp_dir.path(), |f| seen.push(f.modified), |_, _| {})?;
        assert_eq!(seen, vec![expected]);
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_are_not_reported() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("real.txt"), b"data")?;
        std::os::unix::fs::symlink(temp_dir.path().join("real.txt"), temp_dir.path().join("link.txt"))?;
        std::os::unix::fs::symlink(temp_dir.path().join("gone"), temp_dir.path().join("dangling"))?;

        assert_eq!(relative_files(temp_dir.path())?, vec![PathBuf::from("real.txt")]);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = walk_regular_files(&temp_dir.path().join("absent"), |_| {}, |_, _| {});
        assert!(result.is_err());
    }
}
