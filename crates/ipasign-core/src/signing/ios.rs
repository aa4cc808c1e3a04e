//! iOS archive signing through `xcrun PackageApplication`.

use super::SigningTools;
use crate::pipeline::{Invocation, SigningJob};

/// Builds the invocation that re-signs the archive and embeds the profile.
pub fn package_application_invocation(tools: &SigningTools, job: &SigningJob) -> Invocation {
    Invocation::new(&tools.xcrun)
        .arg("-sdk")
        .arg(&tools.sdk)
        .arg("PackageApplication")
        .arg("-v")
        .arg(&job.archive)
        .arg("-o")
        .arg(&job.output)
        .arg("--sign")
        .arg(&tools.identity)
        .arg("--embed")
        .arg(&job.profile)
}
