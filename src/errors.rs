use std::path::PathBuf;

use thiserror::Error;

use crate::vector::FieldType;

/// Broad failure classes reported by every fallible operation.
///
/// Each [`MitabError`] variant belongs to exactly one category; the
/// category's numeric code is what [`MitabError::code`] returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound = 1,
    TruncatedData = 2,
    CorruptFormat = 3,
    SchemaFrozen = 4,
    SchemaMismatch = 5,
    TypeMismatch = 6,
    UnsupportedGeometry = 7,
    OutOfBounds = 8,
    UnknownProjectionBounds = 9,
    InvalidState = 10,
    BadArgument = 11,
    Io = 12,
}

#[derive(Debug, Error)]
pub enum MitabError {
    #[error("Unable to open '{path}': {reason}")]
    FileNotFound { path: PathBuf, reason: String },
    #[error("Feature {fid} does not exist or was deleted (method {method_name})")]
    FeatureNotFound { fid: u64, method_name: &'static str },
    #[error("Invalid field name '{field_name}' used on method {method_name}")]
    InvalidFieldName {
        field_name: String,
        method_name: &'static str,
    },
    #[error("Invalid field index {index} used on method {method_name}")]
    InvalidFieldIndex {
        index: usize,
        method_name: &'static str,
    },
    #[error("Truncated {what}: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedData {
        what: &'static str,
        offset: u64,
        needed: usize,
        available: usize,
    },
    #[error("Corrupt file: {0}")]
    CorruptFormat(String),
    #[error("Parse error at line {line}: {msg}")]
    ParseError { line: usize, msg: String },
    #[error("Cannot add field '{field_name}': schema is frozen once a feature has been written")]
    SchemaFrozen { field_name: String },
    #[error("Feature does not match the table schema: {0}")]
    SchemaMismatch(String),
    #[error("Field '{field_name}' has type {field_type:?}, not usable by method {method_name}")]
    TypeMismatch {
        field_name: String,
        field_type: FieldType,
        method_name: &'static str,
    },
    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    #[error("Coordinate ({x}, {y}) is outside the dataset bounds")]
    OutOfBounds { x: f64, y: f64 },
    #[error("No default bounds known for coordinate system '{coordsys}'")]
    UnknownProjectionBounds { coordsys: String },
    #[error("Method {method_name} is not valid while the dataset is {state}")]
    InvalidState {
        method_name: &'static str,
        state: &'static str,
    },
    #[error("BadArgument error: {0}")]
    BadArgument(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MitabError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MitabError::FileNotFound { .. }
            | MitabError::FeatureNotFound { .. }
            | MitabError::InvalidFieldName { .. }
            | MitabError::InvalidFieldIndex { .. } => ErrorCategory::NotFound,
            MitabError::TruncatedData { .. } => ErrorCategory::TruncatedData,
            MitabError::CorruptFormat(_) | MitabError::ParseError { .. } => {
                ErrorCategory::CorruptFormat
            }
            MitabError::SchemaFrozen { .. } => ErrorCategory::SchemaFrozen,
            MitabError::SchemaMismatch(_) => ErrorCategory::SchemaMismatch,
            MitabError::TypeMismatch { .. } => ErrorCategory::TypeMismatch,
            MitabError::UnsupportedGeometry(_) => ErrorCategory::UnsupportedGeometry,
            MitabError::OutOfBounds { .. } => ErrorCategory::OutOfBounds,
            MitabError::UnknownProjectionBounds { .. } => ErrorCategory::UnknownProjectionBounds,
            MitabError::InvalidState { .. } => ErrorCategory::InvalidState,
            MitabError::BadArgument(_) => ErrorCategory::BadArgument,
            MitabError::Io(_) => ErrorCategory::Io,
        }
    }

    /// Numeric code of the error category, stable across releases.
    pub fn code(&self) -> i32 {
        self.category() as i32
    }
}

pub type Result<T> = std::result::Result<T, MitabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_category() {
        let err = MitabError::FeatureNotFound {
            fid: 7,
            method_name: "read_feature",
        };
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(err.code(), 1);

        let err = MitabError::ParseError {
            line: 3,
            msg: "bad".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::CorruptFormat);
        assert_eq!(err.to_string(), "Parse error at line 3: bad");
    }

    #[test]
    fn test_io_error_converts() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
