//! Errors that abort a whole patch operation.
//!
//! Everything that goes wrong for a single unit or a single global action is
//! reported as a warning instead; see [`crate::apply`].

use std::path::PathBuf;

/// Fatal patch errors.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// No patch file exists for the requested update.
    #[error("patch file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Patch text could not be decoded.
    #[error("malformed patch: {0}")]
    Format(String),

    /// Patch data could not be encoded.
    #[error("failed to encode patch: {0}")]
    Encode(String),

    /// A module or update name is not a valid machine name.
    #[error("invalid {kind} name `{value}`")]
    InvalidId { kind: &'static str, value: String },

    /// Reading or writing a patch file failed.
    #[error("{action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    /// Prefix a format error with the file it came from.
    pub(crate) fn in_file(self, path: &std::path::Path) -> Self {
        match self {
            PatchError::Format(message) => {
                PatchError::Format(format!("{}: {message}", path.display()))
            }
            other => other,
        }
    }
}
