use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Ordered set of audio files discovered in one directory.
///
/// The directory is listed once; afterwards [`WorkCatalog::next_path`] walks
/// the cached list and wraps around, so a run can request more work items than
/// there are distinct files.
#[derive(Debug, Clone)]
pub struct WorkCatalog {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl WorkCatalog {
    /// List `dir` and keep regular files whose extension matches `extension`
    /// (ASCII case-insensitive), sorted by file name.
    pub fn discover(dir: impl AsRef<Path>, extension: &str) -> io::Result<Self> {
        let dir = dir.as_ref();
        let extension = extension.trim_start_matches('.');

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if !matches {
                continue;
            }

            // Follows symlinks, so linked fixtures count as files.
            if !fs::metadata(&path)?.is_file() {
                debug!("Skipping non-file entry {}", path.display());
                continue;
            }

            files.push(path);
        }
        files.sort();

        info!(
            "Discovered {} .{} file(s) in {}",
            files.len(),
            extension,
            dir.display()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            cursor: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Next file in enumeration order, restarting from the first once the
    /// list is exhausted. `None` only when the catalog is empty.
    pub fn next_path(&mut self) -> Option<PathBuf> {
        if self.files.is_empty() {
            return None;
        }
        if self.cursor == self.files.len() {
            debug!("Work catalog exhausted, restarting from the first file");
            self.cursor = 0;
        }

        let path = self.files[self.cursor].clone();
        self.cursor += 1;
        Some(path)
    }

    /// Move the cursor back to the first file
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}
