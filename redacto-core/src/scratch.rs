//! Scratch file management for one redaction session.
//!
//! An uploaded video is copied into a private temporary directory before
//! processing, and the redacted video is written next to it until the host
//! has delivered it. Both files are deleted afterwards. Deletion failures are
//! not errors: they come back as [`CleanupWarning`]s so the run still
//! succeeds. If a session is dropped without an explicit cleanup (an error
//! path), the tempfile crate removes the directory on drop.

use crate::error::CoreResult;

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tempfile::{Builder as TempFileBuilder, TempDir};

const SCRATCH_PREFIX: &str = "redacto_";
const OUTPUT_FILE_NAME: &str = "redacted.mp4";

/// A scratch file that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not delete temporary file {}: {}",
            self.path.display(),
            self.reason
        )
    }
}

/// Staged input and reserved output of one session.
#[derive(Debug)]
pub struct ScratchFiles {
    dir: Option<TempDir>,
    dir_path: PathBuf,
    input: PathBuf,
    output: PathBuf,
    keep: bool,
}

impl ScratchFiles {
    /// Copies `upload` into a new scratch directory under `base` (the system
    /// temp directory when `None`) as `input.<extension>`.
    ///
    /// The output path is reserved but not created.
    pub fn stage<R: Read + ?Sized>(
        base: Option<&Path>,
        upload: &mut R,
        extension: &str,
        keep: bool,
    ) -> CoreResult<Self> {
        let base = base.map_or_else(std::env::temp_dir, Path::to_path_buf);
        fs::create_dir_all(&base)?;

        let dir = TempFileBuilder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&base)?;
        let dir_path = dir.path().to_path_buf();

        let extension = sanitize_extension(extension);
        let input = dir_path.join(format!("input.{extension}"));
        let output = dir_path.join(OUTPUT_FILE_NAME);

        let mut file = fs::File::create(&input)?;
        let bytes = io::copy(upload, &mut file)?;
        file.sync_all()?;
        log::debug!("Staged {} byte(s) at {}", bytes, input.display());

        Ok(Self {
            dir: Some(dir),
            dir_path,
            input,
            output,
            keep,
        })
    }

    #[must_use]
    pub fn input_path(&self) -> &Path {
        &self.input
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir_path
    }

    /// Deletes the staged input, the output and the scratch directory.
    ///
    /// Files that are already gone are fine. Every other failure becomes a
    /// warning. With `keep` set nothing is deleted.
    pub fn cleanup(mut self) -> Vec<CleanupWarning> {
        let Some(dir) = self.dir.take() else {
            return Vec::new();
        };
        let dir_path = dir.keep();
        if self.keep {
            log::info!("Keeping scratch files in {}", dir_path.display());
            return Vec::new();
        }

        let mut warnings = Vec::new();
        for path in [&self.input, &self.output] {
            if let Some(warning) = remove(path, |p| fs::remove_file(p)) {
                warnings.push(warning);
            }
        }
        if let Some(warning) = remove(&dir_path, |p| fs::remove_dir(p)) {
            warnings.push(warning);
        }

        if warnings.is_empty() {
            log::debug!("Removed scratch directory {}", dir_path.display());
        }
        warnings
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if self.keep {
                let path = dir.keep();
                log::info!("Keeping scratch files in {}", path.display());
            } else {
                log::debug!("Removing scratch directory {}", dir.path().display());
                if let Err(e) = dir.close() {
                    log::warn!("Could not delete temporary directory: {}", e);
                }
            }
        }
    }
}

fn remove(path: &Path, remover: fn(&Path) -> io::Result<()>) -> Option<CleanupWarning> {
    match remover(path) {
        Ok(()) => None,
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => Some(CleanupWarning {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn sanitize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.is_empty() {
        "mp4".to_string()
    } else {
        cleaned
    }
}
