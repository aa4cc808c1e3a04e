//! Per-request working directories.
//!
//! Every request gets its own directory, named by its [`RequestId`], under
//! the upload directory. Requests never share paths, so two uploads named
//! `app.ipa` cannot clobber each other. The directory is removed on every
//! exit path unless the [`CleanupPolicy`] asks to keep failed requests.

use std::path::{Path, PathBuf};

use crate::error::{Result, SigningError};
use crate::models::{CleanupPolicy, InputRole, RequestId, SigningInputs, signed_output_name};
use crate::pipeline::SigningJob;

/// Scoped working directory for one signing request.
///
/// Dropping the workspace removes the directory, so early returns, errors
/// and panics all release it. Call [`RequestWorkspace::mark_failed`] before
/// dropping to let `KeepOnFailure` retain it.
#[derive(Debug)]
pub struct RequestWorkspace {
    id: RequestId,
    root: PathBuf,
    policy: CleanupPolicy,
    failed: bool,
    released: bool,
}

impl RequestWorkspace {
    /// Creates the request directory under `upload_dir`.
    pub async fn create(upload_dir: &Path, id: RequestId, policy: CleanupPolicy) -> Result<Self> {
        tokio::fs::create_dir_all(upload_dir)
            .await
            .map_err(SigningError::Workspace)?;

        let root = upload_dir.join(id.to_string());
        tokio::fs::create_dir(&root)
            .await
            .map_err(SigningError::Workspace)?;

        tracing::debug!("Created request workspace: {}", root.display());

        Ok(Self {
            id,
            root,
            policy,
            failed: false,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes the uploaded files into role subdirectories and returns the job.
    ///
    /// Consumes the inputs so the file contents are freed once on disk.
    pub async fn persist(&self, inputs: SigningInputs) -> Result<SigningJob> {
        let archive = self.write_input(InputRole::Archive, &inputs).await?;
        let certificate = self.write_input(InputRole::Certificate, &inputs).await?;
        let profile = self.write_input(InputRole::Profile, &inputs).await?;

        let output = self
            .root
            .join(InputRole::Archive.dir_name())
            .join(signed_output_name(&inputs.archive.file_name));

        Ok(SigningJob {
            archive,
            certificate,
            profile,
            output,
            password: inputs.password,
        })
    }

    async fn write_input(&self, role: InputRole, inputs: &SigningInputs) -> Result<PathBuf> {
        let file = inputs.file(role);
        let dir = self.root.join(role.dir_name());
        tokio::fs::create_dir(&dir)
            .await
            .map_err(SigningError::Workspace)?;

        let path = dir.join(&file.file_name);
        tokio::fs::write(&path, &file.data)
            .await
            .map_err(SigningError::Workspace)?;

        Ok(path)
    }

    /// Records that the request failed; only affects `KeepOnFailure`.
    pub fn mark_failed(&mut self) {
        self.failed = true;
    }

    /// Removes the directory now, reporting any error.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        if self.root.exists() {
            tokio::fs::remove_dir_all(&self.root).await?;
            tracing::debug!("Released request workspace: {}", self.root.display());
        }
        Ok(())
    }

    fn should_keep(&self) -> bool {
        self.failed && self.policy == CleanupPolicy::KeepOnFailure
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        if self.should_keep() {
            tracing::warn!(
                "Keeping workspace of failed request {} for inspection: {}",
                self.id,
                self.root.display()
            );
            return;
        }

        // Drop may run outside the runtime (e.g. during a panic), so stay synchronous
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => tracing::debug!("Released request workspace: {}", self.root.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                "Failed to remove request workspace {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}

/// Removes request directories left behind by a previous process.
///
/// Only directories named by a valid request ID are touched; anything else
/// in the upload directory is left alone. Returns the number removed.
pub async fn sweep_stale_workspaces(upload_dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(upload_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if RequestId::from_string(name).is_err() {
            continue;
        }

        tokio::fs::remove_dir_all(entry.path()).await?;
        tracing::debug!("Removed stale request workspace: {}", name);
        removed += 1;
    }

    Ok(removed)
}
