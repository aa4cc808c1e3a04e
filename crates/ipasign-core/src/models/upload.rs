//! Uploaded signing inputs.

use bytes::Bytes;
use secrecy::SecretString;

use crate::error::{Result, SigningError};

/// Multipart field carrying the password for the p12 bundle.
pub const PASSWORD_FIELD: &str = "password";

/// Suffix convention linking an archive to its signed counterpart.
const ARCHIVE_SUFFIX: &str = ".ipa";
const SIGNED_ARCHIVE_SUFFIX: &str = "-signed.ipa";

/// The three file inputs of a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputRole {
    Archive,
    Certificate,
    Profile,
}

impl InputRole {
    pub const ALL: [InputRole; 3] = [
        InputRole::Archive,
        InputRole::Certificate,
        InputRole::Profile,
    ];

    /// Multipart field name for this input.
    pub fn field_name(&self) -> &'static str {
        match self {
            InputRole::Archive => "ipaFile",
            InputRole::Certificate => "p12File",
            InputRole::Profile => "mobileProvision",
        }
    }

    /// Resolves a multipart field name to an input role.
    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.field_name() == name)
    }

    /// File name used when the client does not supply a usable one.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            InputRole::Archive => "app.ipa",
            InputRole::Certificate => "cert.p12",
            InputRole::Profile => "profile.mobileprovision",
        }
    }

    /// Subdirectory of the request workspace holding this input.
    pub fn dir_name(&self) -> &'static str {
        match self {
            InputRole::Archive => "archive",
            InputRole::Certificate => "certificate",
            InputRole::Profile => "profile",
        }
    }
}

impl std::fmt::Display for InputRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// An uploaded file held in memory until the workspace is created.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Sanitized file name (final path component only).
    pub file_name: String,
    /// Raw contents, never inspected.
    pub data: Bytes,
}

impl UploadedFile {
    /// Creates an uploaded file, reducing the client's file name to a safe basename.
    pub fn new(role: InputRole, file_name: Option<&str>, data: Bytes) -> Self {
        Self {
            file_name: sanitize_file_name(file_name, role),
            data,
        }
    }
}

/// A complete, validated signing request.
#[derive(Debug)]
pub struct SigningInputs {
    pub archive: UploadedFile,
    pub certificate: UploadedFile,
    pub profile: UploadedFile,
    pub password: SecretString,
}

impl SigningInputs {
    pub fn file(&self, role: InputRole) -> &UploadedFile {
        match role {
            InputRole::Archive => &self.archive,
            InputRole::Certificate => &self.certificate,
            InputRole::Profile => &self.profile,
        }
    }
}

/// Collects multipart fields in arrival order and validates them as a whole.
#[derive(Debug, Default)]
pub struct SigningInputsBuilder {
    archive: Option<UploadedFile>,
    certificate: Option<UploadedFile>,
    profile: Option<UploadedFile>,
    password: Option<SecretString>,
    password_seen: bool,
}

impl SigningInputsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a file part. Each role may appear at most once.
    pub fn file(&mut self, role: InputRole, file: UploadedFile) -> Result<&mut Self> {
        let slot = match role {
            InputRole::Archive => &mut self.archive,
            InputRole::Certificate => &mut self.certificate,
            InputRole::Profile => &mut self.profile,
        };
        if slot.is_some() {
            return Err(SigningError::DuplicateField(role.field_name()));
        }
        *slot = Some(file);
        Ok(self)
    }

    /// Records the password field. An empty value counts as absent, but a
    /// second password part is a duplicate whatever either value was.
    pub fn password(&mut self, password: String) -> Result<&mut Self> {
        if self.password_seen {
            return Err(SigningError::DuplicateField(PASSWORD_FIELD));
        }
        self.password_seen = true;
        if !password.is_empty() {
            self.password = Some(SecretString::from(password));
        }
        Ok(self)
    }

    /// Returns the inputs, or `MissingInput` if any of the four is absent.
    pub fn build(self) -> Result<SigningInputs> {
        match (self.archive, self.certificate, self.profile, self.password) {
            (Some(archive), Some(certificate), Some(profile), Some(password)) => {
                Ok(SigningInputs {
                    archive,
                    certificate,
                    profile,
                    password,
                })
            }
            _ => Err(SigningError::MissingInput),
        }
    }
}

/// Reduces a client-supplied file name to its final path component.
///
/// Falls back to the role's default name when nothing usable remains.
pub fn sanitize_file_name(file_name: Option<&str>, role: InputRole) -> String {
    let name = file_name
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");
    let name = name.trim();

    if name.is_empty() || name == "." || name == ".." {
        role.default_file_name().to_string()
    } else {
        name.to_string()
    }
}

/// Derives the signed archive's file name from the uploaded archive's name.
///
/// The first `.ipa` is replaced by `-signed.ipa`; names without it get the
/// suffix appended so the output never overwrites the input.
pub fn signed_output_name(archive_name: &str) -> String {
    if archive_name.contains(ARCHIVE_SUFFIX) {
        archive_name.replacen(ARCHIVE_SUFFIX, SIGNED_ARCHIVE_SUFFIX, 1)
    } else {
        format!("{}{}", archive_name, SIGNED_ARCHIVE_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn file(name: &str) -> UploadedFile {
        UploadedFile::new(InputRole::Archive, Some(name), Bytes::from_static(b"data"))
    }

    #[test]
    fn test_role_field_names() {
        assert_eq!(InputRole::from_field_name("ipaFile"), Some(InputRole::Archive));
        assert_eq!(InputRole::from_field_name("p12File"), Some(InputRole::Certificate));
        assert_eq!(
            InputRole::from_field_name("mobileProvision"),
            Some(InputRole::Profile)
        );
        assert_eq!(InputRole::from_field_name("password"), None);
        assert_eq!(InputRole::from_field_name("ipafile"), None);
    }

    #[test]
    fn test_sanitize_keeps_plain_names() {
        assert_eq!(sanitize_file_name(Some("a.ipa"), InputRole::Archive), "a.ipa");
        assert_eq!(
            sanitize_file_name(Some("My App 1.2.ipa"), InputRole::Archive),
            "My App 1.2.ipa"
        );
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(
            sanitize_file_name(Some("../../etc/passwd"), InputRole::Certificate),
            "passwd"
        );
        assert_eq!(
            sanitize_file_name(Some("C:\\Users\\me\\cert.p12"), InputRole::Certificate),
            "cert.p12"
        );
    }

    #[test]
    fn test_sanitize_falls_back_to_default() {
        assert_eq!(sanitize_file_name(None, InputRole::Archive), "app.ipa");
        assert_eq!(sanitize_file_name(Some(""), InputRole::Certificate), "cert.p12");
        assert_eq!(
            sanitize_file_name(Some(".."), InputRole::Profile),
            "profile.mobileprovision"
        );
        assert_eq!(sanitize_file_name(Some("dir/"), InputRole::Archive), "app.ipa");
    }

    #[test]
    fn test_signed_output_name() {
        assert_eq!(signed_output_name("a.ipa"), "a-signed.ipa");
        assert_eq!(signed_output_name("app.ipa.ipa"), "app-signed.ipa.ipa");
        assert_eq!(signed_output_name("archive.zip"), "archive.zip-signed.ipa");
    }

    #[test]
    fn test_builder_complete() {
        let mut builder = SigningInputsBuilder::new();
        builder.file(InputRole::Archive, file("a.ipa")).unwrap();
        builder.file(InputRole::Certificate, file("c.p12")).unwrap();
        builder.file(InputRole::Profile, file("m.mobileprovision")).unwrap();
        builder.password("pw".to_string()).unwrap();

        let inputs = builder.build().unwrap();
        assert_eq!(inputs.archive.file_name, "a.ipa");
        assert_eq!(inputs.file(InputRole::Profile).file_name, "m.mobileprovision");
        assert_eq!(inputs.password.expose_secret(), "pw");
    }

    #[test]
    fn test_builder_missing_password() {
        let mut builder = SigningInputsBuilder::new();
        builder.file(InputRole::Archive, file("a.ipa")).unwrap();
        builder.file(InputRole::Certificate, file("c.p12")).unwrap();
        builder.file(InputRole::Profile, file("m.mobileprovision")).unwrap();

        assert!(matches!(builder.build(), Err(SigningError::MissingInput)));
    }

    #[test]
    fn test_builder_empty_password_counts_as_missing() {
        let mut builder = SigningInputsBuilder::new();
        builder.file(InputRole::Archive, file("a.ipa")).unwrap();
        builder.file(InputRole::Certificate, file("c.p12")).unwrap();
        builder.file(InputRole::Profile, file("m.mobileprovision")).unwrap();
        builder.password(String::new()).unwrap();

        assert!(matches!(builder.build(), Err(SigningError::MissingInput)));
    }

    #[test]
    fn test_builder_missing_file() {
        let mut builder = SigningInputsBuilder::new();
        builder.file(InputRole::Archive, file("a.ipa")).unwrap();
        builder.password("pw".to_string()).unwrap();

        assert!(matches!(builder.build(), Err(SigningError::MissingInput)));
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let mut builder = SigningInputsBuilder::new();
        builder.file(InputRole::Archive, file("a.ipa")).unwrap();
        let err = builder.file(InputRole::Archive, file("b.ipa")).unwrap_err();
        assert!(matches!(err, SigningError::DuplicateField("ipaFile")));

        builder.password("pw".to_string()).unwrap();
        let err = builder.password("again".to_string()).unwrap_err();
        assert!(matches!(err, SigningError::DuplicateField("password")));
    }

    #[test]
    fn test_builder_rejects_duplicate_password_after_empty() {
        let mut builder = SigningInputsBuilder::new();
        builder.password(String::new()).unwrap();
        let err = builder.password("pw".to_string()).unwrap_err();
        assert!(matches!(err, SigningError::DuplicateField("password")));

        let mut builder = SigningInputsBuilder::new();
        builder.password("pw".to_string()).unwrap();
        let err = builder.password(String::new()).unwrap_err();
        assert!(matches!(err, SigningError::DuplicateField("password")));
    }
}
