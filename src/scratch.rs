//! Scratch-file lifetime management.
//!
//! Every blob downloaded for a notification gets a fresh file under the
//! configured scratch directory; its lifetime is bounded by that single
//! notification - there is no persistent state in the core. Each
//! download is backed by a [`ScratchFile`] so a failure partway through a
//! notification (a later blob fails validation, an I/O error mid-stream)
//! still releases every file created so far, not just the last one.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// An RAII guard around one scratch file.
///
/// Call [`ScratchFile::remove`] explicitly at the point a notification's
/// processing is done with this file; `Drop` only exists as a fallback for
/// paths that return early without reaching that point. Both routes apply
/// the same fatal policy: a filesystem error while removing a scratch file
/// is presumed infrastructural, never recoverable, and terminates the
/// process the way an unrecoverable publish error does in the worker pool.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserves a fresh path under `dir` - the caller still has to create
    /// the file (via the blob-store download).
    pub fn reserve(dir: &Path, hint: &str) -> Self {
        let sanitized: String = hint
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        let path = dir.join(format!("{sanitized}-{}", Uuid::new_v4()));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the file from disk. Terminates the process on any error
    /// other than the file already being gone.
    pub fn remove(self) {
        remove_or_fatal(&self.path);
        // The removal already happened; skip `Drop`'s redundant attempt.
        std::mem::forget(self);
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        remove_or_fatal(&self.path);
    }
}

fn remove_or_fatal(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to remove scratch file; terminating");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_remove_deletes_the_file() {
        let dir = tempdir().unwrap();
        let scratch = ScratchFile::reserve(dir.path(), "batch-1.mrc");
        std::fs::write(scratch.path(), b"data").unwrap();
        let path = scratch.path().to_path_buf();

        scratch.remove();

        assert!(!path.exists());
    }

    #[test]
    fn drop_deletes_the_file_when_remove_was_never_called() {
        let dir = tempdir().unwrap();
        let path = {
            let scratch = ScratchFile::reserve(dir.path(), "batch-1.mrc");
            std::fs::write(scratch.path(), b"data").unwrap();
            scratch.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn remove_of_an_already_missing_file_does_not_panic() {
        let dir = tempdir().unwrap();
        let scratch = ScratchFile::reserve(dir.path(), "never-created");
        scratch.remove();
    }
}
