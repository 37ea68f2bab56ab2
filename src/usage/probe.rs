//! Space probes: the operations that actually measure usage.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use super::cell::UsageCell;

/// Measures space usage and records it in a [`UsageCell`].
///
/// Probes may block on I/O for as long as they need. A probe is expected
/// to `set` (or `increment`) the cell before returning `Ok`.
pub trait SpaceProbe: Send {
    /// Perform one measurement.
    fn refresh(&mut self, used: &UsageCell) -> io::Result<()>;
}

impl<F> SpaceProbe for F
where
    F: FnMut(&UsageCell) -> io::Result<()> + Send,
{
    fn refresh(&mut self, used: &UsageCell) -> io::Result<()> {
        self(used)
    }
}

/// Probe that sums apparent file sizes under a directory.
///
/// Symlinks are counted by their own size and never followed. Entries that
/// disappear during the walk are skipped.
#[derive(Debug, Clone)]
pub struct DirWalkProbe {
    root: PathBuf,
}

impl DirWalkProbe {
    /// Create a probe rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being measured.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and return the total size in bytes.
    pub fn measure(&self) -> io::Result<u64> {
        tree_size(&self.root)
    }
}

impl SpaceProbe for DirWalkProbe {
    fn refresh(&mut self, used: &UsageCell) -> io::Result<()> {
        used.set(self.measure()?);
        Ok(())
    }
}

fn tree_size(path: &Path) -> io::Result<u64> {
    let metadata = fs::symlink_metadata(path)?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }

    let mut total = 0u64;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        match tree_size(&entry.path()) {
            Ok(size) => total = total.saturating_add(size),
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}
