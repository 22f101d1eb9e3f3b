//! File adapters
//!
//! The project store never touches the filesystem directly; it goes through
//! a [`FileAdapter`]. [`FsAdapter`] is the real disk, [`MemoryAdapter`] backs
//! projects that live only in memory (and tests).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Options for [`FileAdapter::list_directory`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only return files with this extension (without the dot)
    pub extension: Option<String>,
    /// Descend into subdirectories
    pub recursive: bool,
}

impl ListOptions {
    /// Lists files with the given extension, non-recursively
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
            recursive: false,
        }
    }

    fn matches(&self, path: &Path) -> bool {
        match &self.extension {
            Some(ext) => path.extension().is_some_and(|e| e == ext.as_str()),
            None => true,
        }
    }
}

/// Minimal file-system surface used by the project store
pub trait FileAdapter {
    fn exists(&self, path: &Path) -> bool;

    fn read_file(&self, path: &Path) -> io::Result<String>;

    /// Writes the whole file, replacing any existing content
    fn write_file(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Creates a directory and all missing parents
    fn mkdir(&self, path: &Path) -> io::Result<()>;

    /// Removes a file; removing a missing file is not an error
    fn delete(&self, path: &Path) -> io::Result<()>;

    /// Lists files (not directories) under `path`, sorted
    fn list_directory(&self, path: &Path, options: &ListOptions) -> io::Result<Vec<PathBuf>>;
}

/// Adapter over the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAdapter;

impl FsAdapter {
    pub fn new() -> Self {
        Self
    }

    fn collect(dir: &Path, options: &ListOptions, out: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if options.recursive {
                    Self::collect(&path, options, out)?;
                }
            } else if options.matches(&path) {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl FileAdapter for FsAdapter {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // Exclusive lock serializes writers of the same file; released on drop
        file.lock_exclusive()?;
        file.set_len(0)?;

        let mut writer = io::BufWriter::new(&file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn list_directory(&self, path: &Path, options: &ListOptions) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        Self::collect(path, options, &mut files)?;
        files.sort();
        Ok(files)
    }
}

/// In-memory adapter
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    files: RefCell<BTreeMap<PathBuf, String>>,
    dirs: RefCell<BTreeSet<PathBuf>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adapter pre-populated with files
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: Into<String>,
    {
        let adapter = Self::new();
        for (path, content) in files {
            let path = path.into();
            adapter.add_parents(&path);
            adapter.files.borrow_mut().insert(path, content.into());
        }
        adapter
    }

    /// Snapshot of every stored file
    pub fn files(&self) -> BTreeMap<PathBuf, String> {
        self.files.borrow().clone()
    }

    fn add_parents(&self, path: &Path) {
        let mut dirs = self.dirs.borrow_mut();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

impl FileAdapter for MemoryAdapter {
    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path) || self.dirs.borrow().contains(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<String> {
        self.files.borrow().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such file: {}", path.display()),
            )
        })
    }

    fn write_file(&self, path: &Path, content: &str) -> io::Result<()> {
        if self.dirs.borrow().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("Is a directory: {}", path.display()),
            ));
        }
        self.add_parents(path);
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        self.add_parents(path);
        self.dirs.borrow_mut().insert(path.to_path_buf());
        Ok(())
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        self.files.borrow_mut().remove(path);
        Ok(())
    }

    fn list_directory(&self, path: &Path, options: &ListOptions) -> io::Result<Vec<PathBuf>> {
        if !self.dirs.borrow().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("No such directory: {}", path.display()),
            ));
        }

        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|file| {
                if options.recursive {
                    file.starts_with(path)
                } else {
                    file.parent() == Some(path)
                }
            })
            .filter(|file| options.matches(file))
            .cloned()
            .collect())
    }
}
