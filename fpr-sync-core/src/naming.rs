//! Local artifact file naming: `{application};{version}.fpr`.
//!
//! `;` is the only delimiter. Names that contain it, or a path separator, cannot round-trip through a
//! file name and are rejected on both the composing and the parsing side.

use std::fmt;

use crate::error::{Result, SyncError};

pub const DELIMITER: char = ';';
pub const EXTENSION: &str = ".fpr";

/// The (application, version) pair encoded in an artifact file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactName {
    application: String,
    version: String,
}

impl ArtifactName {
    pub fn new(application: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let application = application.into();
        let version = version.into();
        let display = format!("{application}{DELIMITER}{version}{EXTENSION}");
        validate_component(&application, "application", &display)?;
        validate_component(&version, "version", &display)?;
        Ok(ArtifactName {
            application,
            version,
        })
    }

    /// Decomposes `AppX;1.0.fpr` into `("AppX", "1.0")`.
    pub fn parse(file_name: &str) -> Result<Self> {
        let malformed = |reason: &str| SyncError::MalformedArtifactName {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
        };
        let stem = file_name
            .strip_suffix(EXTENSION)
            .ok_or_else(|| malformed("missing .fpr extension"))?;
        let mut parts = stem.split(DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(application), Some(version), None) => Self::new(application, version),
            (_, None, _) => Err(malformed("no ';' between application and version")),
            _ => Err(malformed("more than one ';' delimiter")),
        }
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn file_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DELIMITER}{}{EXTENSION}",
            self.application, self.version
        )
    }
}

fn validate_component(value: &str, role: &str, file_name: &str) -> Result<()> {
    let reason = if value.is_empty() {
        format!("empty {role} name")
    } else if value.contains(DELIMITER) {
        format!("{role} name contains '{DELIMITER}'")
    } else if value.contains('/') || value.contains('\\') {
        format!("{role} name contains a path separator")
    } else {
        return Ok(());
    };
    Err(SyncError::MalformedArtifactName {
        file_name: file_name.to_string(),
        reason,
    })
}

/// True when the file name carries the artifact extension, whether or not it decomposes.
pub fn has_artifact_extension(file_name: &str) -> bool {
    file_name.ends_with(EXTENSION)
}
