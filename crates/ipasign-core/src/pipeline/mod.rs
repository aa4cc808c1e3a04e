//! Two-stage signing pipeline.
//!
//! A job moves through `ImportCertificate` then `SignArchive`. Each stage
//! reports a typed [`StageOutcome`]; the first failure ends the job. Commands
//! run through an injected [`CommandRunner`], so the whole contract can be
//! exercised without the platform tools.

pub mod executor;

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Result, SigningError};
use crate::signing::{
    SigningTools, import_certificate_invocation, package_application_invocation,
};

pub use executor::*;

/// On-disk paths of one request's inputs and expected output.
#[derive(Debug)]
pub struct SigningJob {
    pub archive: PathBuf,
    pub certificate: PathBuf,
    pub profile: PathBuf,
    /// Where the signing tool is told to write the signed archive.
    pub output: PathBuf,
    pub password: SecretString,
}

/// The signed archive produced by a successful job.
#[derive(Debug, Clone)]
pub struct SignedArchive {
    pub path: PathBuf,
    pub bytes: Bytes,
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ImportCertificate,
    SignArchive,
}

impl Stage {
    pub const SEQUENCE: [Stage; 2] = [Stage::ImportCertificate, Stage::SignArchive];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ImportCertificate => "import_certificate",
            Stage::SignArchive => "sign_archive",
        }
    }

    /// Converts a failed stage's diagnostic into the matching error.
    fn into_error(self, diagnostic: String) -> SigningError {
        match self {
            Stage::ImportCertificate => SigningError::CertificateImport(diagnostic),
            Stage::SignArchive => SigningError::ArchiveSign(diagnostic),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of running a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded,
    Failed { diagnostic: String },
}

/// Runs signing jobs against a command runner.
pub struct SigningPipeline {
    runner: Arc<dyn CommandRunner>,
    tools: SigningTools,
}

impl SigningPipeline {
    pub fn new(runner: Arc<dyn CommandRunner>, tools: SigningTools) -> Self {
        Self { runner, tools }
    }

    /// Builds the command for a stage.
    pub fn invocation(&self, stage: Stage, job: &SigningJob) -> Invocation {
        match stage {
            Stage::ImportCertificate => import_certificate_invocation(&self.tools, job),
            Stage::SignArchive => package_application_invocation(&self.tools, job),
        }
    }

    /// Runs one stage. Diagnostics are redacted before they leave this method.
    pub async fn run_stage(&self, stage: Stage, job: &SigningJob) -> StageOutcome {
        let invocation = self.invocation(stage, job);
        let password = job.password.expose_secret();

        match self.runner.run(&invocation).await {
            Ok(output) if output.success() => StageOutcome::Succeeded,
            Ok(output) => StageOutcome::Failed {
                diagnostic: redact(&output.diagnostic(), password),
            },
            Err(e) => StageOutcome::Failed {
                diagnostic: redact(&e.to_string(), password),
            },
        }
    }

    /// Runs every stage in order, then reads back the signed archive.
    pub async fn run(&self, job: &SigningJob) -> Result<SignedArchive> {
        for stage in Stage::SEQUENCE {
            tracing::debug!("Starting stage {}", stage);
            match self.run_stage(stage, job).await {
                StageOutcome::Succeeded => {
                    tracing::debug!("Stage {} succeeded", stage);
                }
                StageOutcome::Failed { diagnostic } => {
                    tracing::warn!("Stage {} failed: {}", stage, diagnostic.trim_end());
                    return Err(stage.into_error(diagnostic));
                }
            }
        }

        let bytes = tokio::fs::read(&job.output)
            .await
            .map_err(SigningError::Download)?;

        Ok(SignedArchive {
            path: job.output.clone(),
            bytes: Bytes::from(bytes),
        })
    }
}

/// Shortest secret that is masked in diagnostics.
///
/// Masking every match of a one or two character password garbles the
/// message and reveals the password through the gaps it leaves.
pub const MIN_REDACTED_LEN: usize = 3;

/// Masks every occurrence of `secret` in `text`.
///
/// Secrets shorter than [`MIN_REDACTED_LEN`] characters are left alone.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.chars().count() < MIN_REDACTED_LEN {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Runner that answers each stage with a canned output and records calls.
    struct CannedRunner {
        import: CommandOutput,
        sign: CommandOutput,
        write_output: Option<&'static [u8]>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl CannedRunner {
        fn new(import: CommandOutput, sign: CommandOutput) -> Self {
            Self {
                import,
                sign,
                write_output: Some(b"signed"),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            if invocation.args().first().is_some_and(|a| a == "import") {
                return Ok(self.import.clone());
            }
            if self.sign.success() {
                if let (Some(out), Some(bytes)) = (invocation.flag_value("-o"), self.write_output) {
                    tokio::fs::write(out, bytes).await?;
                }
            }
            Ok(self.sign.clone())
        }
    }

    fn ok() -> CommandOutput {
        CommandOutput {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            exit_code: Some(1),
            stderr: stderr.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    fn job(dir: &std::path::Path) -> SigningJob {
        SigningJob {
            archive: dir.join("a.ipa"),
            certificate: dir.join("c.p12"),
            profile: dir.join("m.mobileprovision"),
            output: dir.join("a-signed.ipa"),
            password: SecretString::from("s3cret"),
        }
    }

    fn pipeline(runner: Arc<CannedRunner>) -> SigningPipeline {
        SigningPipeline::new(runner, SigningTools::default())
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("bad password s3cret!", "s3cret"), "bad password ***!");
        assert_eq!(redact("s3crets3cret", "s3cret"), "******");
        assert_eq!(redact("nothing here", ""), "nothing here");
    }

    #[test]
    fn test_redact_skips_short_secrets() {
        let diagnostic = "security: SecKeychainItemImport: MAC verification failed";
        assert_eq!(redact(diagnostic, "e"), diagnostic);
        assert_eq!(redact(diagnostic, "ec"), diagnostic);
        assert_eq!(redact("key abc here", "abc"), "key *** here");
    }

    #[test]
    fn test_stage_sequence_order() {
        assert_eq!(
            Stage::SEQUENCE,
            [Stage::ImportCertificate, Stage::SignArchive]
        );
        assert_eq!(Stage::SignArchive.to_string(), "sign_archive");
    }

    #[tokio::test]
    async fn test_run_success_reads_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(CannedRunner::new(ok(), ok()));
        let job = job(dir.path());

        let signed = pipeline(runner.clone()).run(&job).await.unwrap();

        assert_eq!(&signed.bytes[..], b"signed");
        assert_eq!(signed.path, job.output);
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_import_failure_skips_signing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(CannedRunner::new(
            failed("security: SecKeychainItemImport: MAC verification failed"),
            ok(),
        ));

        let err = pipeline(runner.clone()).run(&job(dir.path())).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to import .p12 certificate: security: SecKeychainItemImport: MAC verification failed"
        );
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(CannedRunner::new(ok(), failed("error: no identity found")));

        let err = pipeline(runner.clone()).run(&job(dir.path())).await.unwrap_err();

        assert!(matches!(err, SigningError::ArchiveSign(ref d) if d == "error: no identity found"));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_output_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = CannedRunner::new(ok(), ok());
        runner.write_output = None;

        let err = pipeline(Arc::new(runner)).run(&job(dir.path())).await.unwrap_err();

        assert!(matches!(err, SigningError::Download(_)));
        assert_eq!(err.to_string(), "Error downloading signed IPA.");
    }

    #[tokio::test]
    async fn test_diagnostic_is_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(CannedRunner::new(
            failed("wrong password \"s3cret\" for c.p12"),
            ok(),
        ));

        let job = job(dir.path());
        let outcome = pipeline(runner).run_stage(Stage::ImportCertificate, &job).await;

        assert_eq!(
            outcome,
            StageOutcome::Failed {
                diagnostic: "wrong password \"***\" for c.p12".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_runner_error_becomes_stage_failure() {
        struct Unavailable;

        #[async_trait]
        impl CommandRunner for Unavailable {
            async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
                Err(SigningError::Timeout {
                    program: invocation.program_name(),
                    secs: 600,
                })
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let pipeline = SigningPipeline::new(Arc::new(Unavailable), SigningTools::default());

        let err = pipeline.run(&job(dir.path())).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to import .p12 certificate: security exceeded timeout of 600 seconds"
        );
    }
}
