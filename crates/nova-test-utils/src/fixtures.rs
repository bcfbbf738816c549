use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory of `.class` files laid out by internal name
/// (`p/q/A` is written to `<root>/p/q/A.class`).
pub struct ClassDir {
    dir: TempDir,
    files: Vec<PathBuf>,
}

impl ClassDir {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
            files: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_class(&mut self, internal_name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.root().join(format!("{internal_name}.class"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        self.files.push(path.clone());
        Ok(path)
    }

    /// Every file written so far, in write order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}
