//! Certificate import into the macOS keychain.

use secrecy::ExposeSecret;

use super::SigningTools;
use crate::pipeline::{Invocation, SigningJob};

/// Builds the `security import` invocation for a job's p12 bundle.
///
/// The password is the only place the secret leaves its wrapper, and it is
/// marked so it never shows up in logs.
pub fn import_certificate_invocation(tools: &SigningTools, job: &SigningJob) -> Invocation {
    let mut invocation = Invocation::new(&tools.security)
        .arg("import")
        .arg(&job.certificate);

    if let Some(keychain) = &tools.keychain {
        invocation = invocation.arg("-k").arg(keychain);
    }

    invocation
        .arg("-P")
        .secret_arg(job.password.expose_secret())
        .arg("-T")
        .arg(&tools.codesign_path)
}
