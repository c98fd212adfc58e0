//! Per-island file logs.
//!
//! Each island (and the coordinator) owns a directory of buffered line
//! logs, flushed at generation boundaries. Creation failure is fatal;
//! write failures on an open log are ignored.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use crate::error::SearchError;

/// Create one buffered log file inside `dir`, creating the directory.
pub fn create_log(dir: &Path, name: &str) -> Result<BufWriter<File>, SearchError> {
    fs::create_dir_all(dir)
        .map_err(|e| SearchError::Io(format!("{}: {e}", dir.display())))?;
    let path = dir.join(name);
    let file = File::create(&path)
        .map_err(|e| SearchError::Io(format!("{}: {e}", path.display())))?;
    Ok(BufWriter::new(file))
}

/// The standard per-island log set.
pub struct IsleLogs {
    pub err: BufWriter<File>,
    pub main: BufWriter<File>,
    pub eqns: BufWriter<File>,
    pub sset: BufWriter<File>,
    pub fitness: BufWriter<File>,
    pub ipre: BufWriter<File>,
}

impl IsleLogs {
    pub fn create(dir: &Path) -> Result<Self, SearchError> {
        Ok(Self {
            err: create_log(dir, "err.log")?,
            main: create_log(dir, "main.log")?,
            eqns: create_log(dir, "eqns.log")?,
            sset: create_log(dir, "sset.log")?,
            fitness: create_log(dir, "fitness.log")?,
            ipre: create_log(dir, "ipre.log")?,
        })
    }

    pub fn flush_all(&mut self) {
        use std::io::Write;
        let _ = self.err.flush();
        let _ = self.main.flush();
        let _ = self.eqns.flush();
        let _ = self.sset.flush();
        let _ = self.fitness.flush();
        let _ = self.ipre.flush();
    }
}
