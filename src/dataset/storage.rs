//! File system access used by the dataset pipeline.
//!
//! Everything the pipeline does on disk goes through [`DatasetStorage`], so discovery,
//! splitting and augmentation can run against [`MemoryStorage`] in tests.
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

pub trait DatasetStorage {
    /// All regular files below `root`, recursively, in traversal order.
    /// Fails if `root` is missing or can't be read. Unreadable entries below it are skipped.
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
    fn is_file(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl DatasetStorage for FsStorage {
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        if !fs::metadata(root)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", root.display()),
            ));
        }
        fs::read_dir(root)?;
        let mut files = vec![];
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
                Err(e) if e.depth() == 0 => return Err(io::Error::from(e)),
                Err(e) => warn!("Skipping unreadable entry: {}", e),
            }
        }
        Ok(files)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}

/// In memory storage. Writing requires the parent directory to exist, like on disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RefCell<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: RefCell<BTreeSet<PathBuf>>,
    failing_writes: BTreeSet<PathBuf>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, creating its parent directories
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        let path = path.into();
        if let Some(parent) = path.parent() {
            self.add_dirs(parent);
        }
        self.files.borrow_mut().insert(path, contents.into());
    }

    /// Makes every later write to `path` fail
    pub fn fail_writes_to(&mut self, path: impl Into<PathBuf>) {
        self.failing_writes.insert(path.into());
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.dirs.borrow().contains(path)
    }

    /// Files directly inside `dir`, sorted
    pub fn files_in(&self, dir: &Path) -> Vec<PathBuf> {
        self.files
            .borrow()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect()
    }

    fn add_dirs(&self, path: &Path) {
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

impl DatasetStorage for MemoryStorage {
    fn list_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        if !self.is_dir(root) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", root.display()),
            ));
        }
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.failing_writes.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("write to {} refused", path.display()),
            ));
        }
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !self.is_dir(parent) => {
                Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("directory {} does not exist", parent.display()),
                ))
            }
            _ => {
                self.files
                    .borrow_mut()
                    .insert(path.to_path_buf(), contents.to_vec());
                Ok(())
            }
        }
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.add_dirs(path);
        Ok(())
    }
}
