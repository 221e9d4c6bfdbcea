//! FileSystem trait definition

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Type of file system entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }
}

/// Read-only view of a repository on disk.
///
/// `read_dir` returns entries sorted by name so that every detector built on
/// top of it is deterministic.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    fn is_file(&self, path: &Path) -> bool;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Like `read_to_string`, but invalid UTF-8 is replaced instead of failing
    fn read_lossy(&self, path: &Path) -> Result<String> {
        self.read_to_string(path)
    }

    /// List directory contents, sorted by file name
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Recursively collect files under `root`, sorted by path.
    ///
    /// Directories for which `skip_dir` returns true are not descended into.
    /// Unreadable subdirectories are skipped; only a failure to list `root`
    /// itself is reported. The default walks through `read_dir`.
    fn walk_files(&self, root: &Path, skip_dir: fn(&str) -> bool) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut stack = vec![self.read_dir(root)?];

        while let Some(entries) = stack.pop() {
            let mut subdirs = Vec::new();
            for entry in entries {
                if entry.is_dir() {
                    if !skip_dir(entry.file_name()) {
                        subdirs.push(entry.path);
                    }
                } else if entry.is_file() {
                    files.push(entry.path);
                }
            }
            for dir in subdirs.into_iter().rev() {
                if let Ok(children) = self.read_dir(&dir) {
                    stack.push(children);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
