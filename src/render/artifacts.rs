//! On-disk artifact lifecycle.
//!
//! Every rendered image lives inside one per-process scratch directory under
//! the system temp path. The directory name carries a random suffix so
//! concurrently running instances never collide. Cleanup is idempotent and
//! best-effort: it runs exactly once, on normal exit or after a termination
//! signal, and ignores files that are already gone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::{Result, ServerError};

const SCRATCH_PREFIX: &str = "mdmath-";

/// Owns the scratch directory and the set of files written into it.
#[derive(Debug)]
pub struct ArtifactLifecycle {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cleaned: bool,
}

impl ArtifactLifecycle {
    /// Creates the scratch directory under the system temp path. An already
    /// existing directory is fine; any other creation failure is fatal.
    pub fn create() -> Result<Self> {
        Self::with_base(&std::env::temp_dir())
    }

    pub fn with_base(base: &Path) -> Result<Self> {
        let mut rng = rand::rng();
        let suffix: [u8; 3] = rng.random();
        let name = format!(
            "{SCRATCH_PREFIX}{:02x}{:02x}{:02x}",
            suffix[0], suffix[1], suffix[2]
        );
        let dir = base.join(name);

        match fs::create_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => {
                return Err(ServerError::Startup(format!(
                    "cannot create scratch directory {}: {err}",
                    dir.display()
                )));
            }
        }

        debug!(dir = %dir.display(), "scratch directory ready");
        Ok(Self {
            dir,
            files: Vec::new(),
            cleaned: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for an artifact: first seven hex chars of the source hash plus
    /// the pixel dimensions, always inside the scratch directory.
    pub fn artifact_path(&self, source: &str, pixel_width: u32, pixel_height: u32) -> PathBuf {
        let hash = format!("{:x}", Sha256::digest(source.as_bytes()));
        self.dir
            .join(format!("{}_{pixel_width}x{pixel_height}.png", &hash[..7]))
    }

    /// Records a written file for teardown.
    pub fn record(&mut self, path: PathBuf) {
        self.files.push(path);
    }

    /// Removes every recorded artifact, then the scratch directory itself.
    /// Errors are ignored; a file may already be gone. Safe to call more
    /// than once, only the first call does work.
    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        for file in self.files.drain(..) {
            if let Err(err) = fs::remove_file(&file) {
                debug!(file = %file.display(), %err, "artifact already gone or not removable");
            }
        }
        if let Err(err) = fs::remove_dir(&self.dir) {
            warn!(dir = %self.dir.display(), %err, "scratch directory not removed");
        } else {
            debug!(dir = %self.dir.display(), "scratch directory removed");
        }
    }
}

impl Drop for ArtifactLifecycle {
    fn drop(&mut self) {
        self.cleanup();
    }
}
