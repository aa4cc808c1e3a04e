//! Test utilities for ipasign-server integration tests.

use async_trait::async_trait;
use axum::Router;
use ipasign_core::models::CleanupPolicy;
use ipasign_core::pipeline::{CommandOutput, CommandRunner, Invocation};
use ipasign_core::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use walkdir::WalkDir;

use crate::routes;
use crate::state::{AppState, ServerConfig};

/// Prefix the scripted signing step prepends to the archive contents.
pub const SIGNED_MARKER: &[u8] = b"SIGNED:";

/// Canned behavior for one scripted stage.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Exit 0. The signing step writes `SIGNED_MARKER` + archive bytes to `-o`.
    Succeed,
    /// Exit 0 without producing output, so the download step fails.
    SucceedWithoutOutput,
    /// Exit 1 with the given stderr.
    Fail(String),
}

/// A command as the runner saw it, with paths captured while the files existed.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
}

impl RecordedCall {
    pub fn is_import(&self) -> bool {
        self.args.first().is_some_and(|a| a == "import")
    }

    pub fn is_sign(&self) -> bool {
        self.args.iter().any(|a| a == "PackageApplication")
    }

    /// Value following `flag`.
    pub fn flag(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1).map(String::as_str)
    }

    /// Certificate path of an import call.
    pub fn certificate_path(&self) -> Option<PathBuf> {
        self.args.get(1).map(PathBuf::from)
    }
}

/// Command runner that answers the two stages from a script.
///
/// It never launches a process. Every invocation is recorded so tests can
/// assert on the argument vectors and the files they point at.
pub struct ScriptedRunner {
    import: ScriptedStep,
    sign: ScriptedStep,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn new(import: ScriptedStep, sign: ScriptedStep) -> Self {
        Self {
            import,
            sign,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Both stages succeed.
    pub fn succeeding() -> Self {
        Self::new(ScriptedStep::Succeed, ScriptedStep::Succeed)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, invocation: &Invocation) -> RecordedCall {
        let call = RecordedCall {
            program: invocation.program_name(),
            args: invocation
                .args()
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.clone());
        }
        call
    }
}

fn exit(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        let call = self.record(invocation);

        let step = if call.is_import() {
            &self.import
        } else if call.is_sign() {
            &self.sign
        } else {
            let stderr = format!("unexpected command: {}", invocation.display_command());
            return Ok(exit(127, &stderr));
        };

        match step {
            ScriptedStep::Fail(stderr) => Ok(exit(1, stderr)),
            ScriptedStep::SucceedWithoutOutput => Ok(exit(0, "")),
            ScriptedStep::Succeed if call.is_sign() => {
                let (Some(archive), Some(output)) = (call.flag("-v"), call.flag("-o")) else {
                    return Ok(exit(1, "missing -v or -o"));
                };
                let mut signed = SIGNED_MARKER.to_vec();
                signed.extend(tokio::fs::read(archive).await?);
                tokio::fs::write(output, signed).await?;
                Ok(exit(0, ""))
            }
            ScriptedStep::Succeed => Ok(exit(0, "")),
        }
    }
}

/// Builds a configuration rooted at `upload_dir`.
pub fn test_config(upload_dir: &Path, cleanup: CleanupPolicy) -> ServerConfig {
    ServerConfig {
        upload_dir: upload_dir.to_path_buf(),
        max_upload_bytes: 8 * 1024 * 1024,
        cleanup,
        ..ServerConfig::default()
    }
}

/// Creates test application state backed by the scripted runner.
pub fn setup_test_state(
    upload_dir: &Path,
    cleanup: CleanupPolicy,
    runner: Arc<ScriptedRunner>,
) -> AppState {
    AppState::new(test_config(upload_dir, cleanup), runner)
}

/// Creates the full application router for testing.
pub fn create_test_app(
    upload_dir: &Path,
    cleanup: CleanupPolicy,
    runner: Arc<ScriptedRunner>,
) -> Router {
    routes::router(setup_test_state(upload_dir, cleanup, runner))
}

/// Lists every file below `dir`, relative to it.
///
/// Panics if any part of the tree cannot be read, so an unreadable directory
/// never passes for an empty one.
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .map(|entry| {
            entry.unwrap_or_else(|e| panic!("Failed to walk {}: {}", dir.display(), e))
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.path().strip_prefix(dir).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}
