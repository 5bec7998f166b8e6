//! Filesystem access and working directory scoping

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Filesystem operations used by the installer
pub trait Filesystem: Send + Sync {
    /// Check whether a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Create or truncate a file with `contents`
    ///
    /// # Errors
    /// Returns the underlying I/O error
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Remove a file
    ///
    /// # Errors
    /// Returns the underlying I/O error
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Entries of a directory
    ///
    /// # Errors
    /// Returns the underlying I/O error
    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Current working directory
    ///
    /// # Errors
    /// Returns the underlying I/O error
    fn current_dir(&self) -> io::Result<PathBuf>;

    /// Change the working directory
    ///
    /// # Errors
    /// Returns the underlying I/O error
    fn set_current_dir(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs` backed filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect()
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        std::env::current_dir()
    }

    fn set_current_dir(&self, path: &Path) -> io::Result<()> {
        std::env::set_current_dir(path)
    }
}

/// Working directory change that is undone on drop
///
/// The previous directory is restored on every exit path, including early
/// returns through `?`.
pub struct WorkdirGuard<'a> {
    fs: &'a dyn Filesystem,
    previous: Option<PathBuf>,
}

impl<'a> WorkdirGuard<'a> {
    /// Enter `target`, or stay put when `target` is `None`
    ///
    /// # Errors
    /// Returns the I/O error if the current directory cannot be read or
    /// `target` cannot be entered
    pub fn enter(fs: &'a dyn Filesystem, target: Option<&Path>) -> io::Result<Self> {
        let Some(target) = target else {
            return Ok(Self { fs, previous: None });
        };

        let previous = fs.current_dir()?;
        fs.set_current_dir(target)?;
        debug!(dir = %target.display(), "entered manifest directory");

        Ok(Self {
            fs,
            previous: Some(previous),
        })
    }
}

impl Drop for WorkdirGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take()
            && let Err(e) = self.fs.set_current_dir(&previous)
        {
            warn!(dir = %previous.display(), error = %e, "failed to restore working directory");
        }
    }
}
