//! Code Generation
//!
//! Pure text templates from a [`xcsync_types::TypeMapping`] to Objective-C and
//! managed designer source.

mod designer;
mod objc;

pub use designer::{declared_class_count, designer};
pub use objc::{header, header_file_name, implementation, implementation_file_name};

/// Error type for code generation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("Type {0} has no base type")]
    MissingBase(String),

    #[error("Selector '{selector}' does not match {parameters} parameter(s)")]
    SelectorMismatch { selector: String, parameters: usize },
}

/// Check that a name is a C-family identifier
pub(crate) fn check_identifier(name: &str) -> Result<(), CodegenError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CodegenError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("FileLabel").is_ok());
        assert!(check_identifier("_private2").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("2fast").is_err());
        assert!(check_identifier("with space").is_err());
    }
}
