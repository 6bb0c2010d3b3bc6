//! envd capability thresholds
//!
//! Features that depend on the envd release are gated here with a single
//! version comparison each.

use semver::Version;

use crate::error::{Error, Result};

/// First envd release that accepts `stdin = false` on start
pub const ENVD_COMMANDS_STDIN: Version = Version::new(0, 3, 0);

/// Fail with [`Error::Unsupported`] when `actual` is older than `required`.
///
/// An unknown envd version is treated as current.
pub fn require(feature: &'static str, required: &Version, actual: Option<&Version>) -> Result<()> {
    match actual {
        Some(actual) if actual < required => Err(Error::Unsupported {
            feature,
            required: required.clone(),
            actual: actual.clone(),
        }),
        _ => Ok(()),
    }
}
