//! Request identity and workspace retention policy.

use ulid::Ulid;

/// Unique identifier for a signing request.
///
/// Also names the request's working directory under the upload directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Ulid);

impl RequestId {
    /// Creates a new random request ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a request ID from a string.
    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happens to a request's working directory once the request ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Remove the directory on every exit path.
    #[default]
    Always,
    /// Remove on success, keep inputs and partial output after a failure.
    KeepOnFailure,
}

impl CleanupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupPolicy::Always => "always",
            CleanupPolicy::KeepOnFailure => "keep-on-failure",
        }
    }
}

impl std::fmt::Display for CleanupPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CleanupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(CleanupPolicy::Always),
            "keep-on-failure" | "keep_on_failure" => Ok(CleanupPolicy::KeepOnFailure),
            _ => Err(format!("Invalid cleanup policy: {}", s)),
        }
    }
}
