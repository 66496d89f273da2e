//! Format version checks shared by the CLOG and SLOG-2 readers
//!
//! A mismatch is never fatal by itself; the caller decides whether to go on.

/// Outcome of comparing a file's version tag against what we support
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Exactly the version this build writes
    Exact,
    /// Older version we know how to read
    Compatible(String),
    /// Unknown version; reading may fail or misinterpret data
    Incompatible(String),
}

impl VersionCheck {
    pub fn evaluate(found: &str, exact: &str, compatible: &[&str]) -> Self {
        if found == exact {
            VersionCheck::Exact
        } else if compatible.contains(&found) {
            VersionCheck::Compatible(found.to_string())
        } else {
            VersionCheck::Incompatible(found.to_string())
        }
    }

    pub fn is_readable(&self) -> bool {
        !matches!(self, VersionCheck::Incompatible(_))
    }
}
