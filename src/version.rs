//! Library Version Inspection Utilities
//!
//! ## Example
//!
//! ```rust
//! use mitab::version::{version_num, VersionInfo};
//!
//! let num = version_num();
//! assert!(num >= 1000);
//! println!("{}", VersionInfo::VERSION_SUMMARY);
//! ```
//! ```text,
//! MITAB-RS 0.3.0, file format version 300
//! ```

use std::fmt::{Debug, Display, Formatter};

/// Highest `.TAB` / `.MAP` format version this crate writes.
pub const MAX_FORMAT_VERSION: i16 = 650;

fn component(text: &str) -> i32 {
    text.parse().unwrap_or(0)
}

/// Library version as a single integer: `major*1000000 + minor*1000 + patch`.
pub fn version_num() -> i32 {
    component(env!("CARGO_PKG_VERSION_MAJOR")) * 1_000_000
        + component(env!("CARGO_PKG_VERSION_MINOR")) * 1_000
        + component(env!("CARGO_PKG_VERSION_PATCH"))
}

/// Convenience selector for the library version properties.
///
/// `VersionInfo` has a `Display` implementation which renders the
/// associated value.
///
/// ```rust
/// # use mitab::version::VersionInfo;
/// let report = VersionInfo::VERSION_REPORT.to_string();
/// assert!(report.contains("RELEASE_NAME"));
/// ```
#[allow(non_camel_case_types)]
#[non_exhaustive]
#[derive(Copy, Clone)]
pub enum VersionInfo {
    /// One line version message, i.e. "MITAB-RS 0.3.0, file format version 300"
    VERSION_SUMMARY,
    /// The value of [`version_num`] formatted as a string, i.e. "3000"
    VERSION_NUM,
    /// The crate release name, i.e. "0.3.0"
    RELEASE_NAME,
    /// Render all available version details in a multiline, debug string
    VERSION_REPORT,
}

use VersionInfo::*;
impl VersionInfo {
    /// Get the complete list of variants.
    pub fn options() -> Vec<Self> {
        vec![VERSION_SUMMARY, VERSION_NUM, RELEASE_NAME, VERSION_REPORT]
    }

    /// Get the variant's name
    pub fn name(&self) -> &'static str {
        match self {
            VERSION_SUMMARY => "VERSION_SUMMARY",
            VERSION_NUM => "VERSION_NUM",
            RELEASE_NAME => "RELEASE_NAME",
            VERSION_REPORT => "VERSION_REPORT",
        }
    }

    fn value(&self) -> Option<String> {
        match self {
            VERSION_SUMMARY => Some(format!(
                "MITAB-RS {}, file format version 300",
                env!("CARGO_PKG_VERSION")
            )),
            VERSION_NUM => Some(version_num().to_string()),
            RELEASE_NAME => Some(env!("CARGO_PKG_VERSION").to_string()),
            VERSION_REPORT => None,
        }
    }
}

impl Debug for VersionInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VERSION_REPORT => f
                .debug_struct("MitabVersionInfo")
                .field(RELEASE_NAME.name(), &RELEASE_NAME.to_string())
                .field(VERSION_NUM.name(), &VERSION_NUM.to_string())
                .field("MAX_FORMAT_VERSION", &MAX_FORMAT_VERSION)
                .finish(),
            i => f.debug_tuple(i.name()).field(&i.to_string()).finish(),
        }
    }
}

impl Display for VersionInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.value() {
            Some(value) => f.write_str(&value),
            None => f.write_fmt(format_args!("{self:#?}")),
        }
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        VERSION_SUMMARY
    }
}

#[cfg(test)]
mod tests {
    use super::VersionInfo::*;
    use super::*;

    #[test]
    fn test_version_num() {
        let parts: Vec<i32> = env!("CARGO_PKG_VERSION")
            .split('.')
            .map(|p| p.parse().unwrap())
            .collect();
        assert_eq!(version_num(), parts[0] * 1_000_000 + parts[1] * 1_000 + parts[2]);
    }

    #[test]
    fn test_version_enum() {
        let rel_name = RELEASE_NAME.to_string();
        assert!(!rel_name.is_empty());
        let rpt = VERSION_REPORT.to_string();
        assert!(rpt.contains(&rel_name));
        assert!(VERSION_SUMMARY.to_string().contains(&rel_name));
    }
}
