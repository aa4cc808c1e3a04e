//! Invocations of the platform signing tools.
//!
//! This module provides:
//! - the configurable set of tool paths and signing parameters
//! - the certificate import command (`security import`)
//! - the archive signing command (`xcrun PackageApplication`)

pub mod ios;
pub mod keychain;

use std::path::PathBuf;

pub use ios::*;
pub use keychain::*;

/// Tool locations and fixed parameters passed to the signing commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningTools {
    /// Certificate store utility.
    pub security: PathBuf,
    /// Xcode tool driver.
    pub xcrun: PathBuf,
    /// SDK passed to `xcrun -sdk`.
    pub sdk: String,
    /// Signing identity passed to `--sign`.
    pub identity: String,
    /// Application granted access to the imported key (`-T`).
    pub codesign_path: PathBuf,
    /// Target keychain for the import; the default keychain when unset.
    pub keychain: Option<PathBuf>,
}

impl Default for SigningTools {
    fn default() -> Self {
        Self {
            security: PathBuf::from("security"),
            xcrun: PathBuf::from("xcrun"),
            sdk: "iphoneos".to_string(),
            identity: "iPhone Distribution".to_string(),
            codesign_path: PathBuf::from("/usr/bin/codesign"),
            keychain: None,
        }
    }
}

impl SigningTools {
    /// Loads tool settings from environment variables with defaults.
    pub fn from_env() -> Self {
        let mut tools = Self::default();

        if let Ok(val) = std::env::var("IPASIGN_SECURITY_BIN") {
            tools.security = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("IPASIGN_XCRUN_BIN") {
            tools.xcrun = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("IPASIGN_SDK") {
            tools.sdk = val;
        }

        if let Ok(val) = std::env::var("IPASIGN_SIGNING_IDENTITY") {
            tools.identity = val;
        }

        if let Ok(val) = std::env::var("IPASIGN_CODESIGN_PATH") {
            tools.codesign_path = PathBuf::from(val);
        }

        tools.keychain = std::env::var("IPASIGN_KEYCHAIN")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        tools
    }
}
