//! Input validation utilities
//!
//! Checks for command-line parameters and file paths with consistent error messages.
//! All functions return the structured errors of [`crate::errors`].

use crate::errors::{Result, TranscodeError};
use std::fmt::Display;
use std::path::Path;

/// Validate that a file exists
///
/// # Example
/// ```
/// use mgtranscode_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/input.sam", "Input SAM");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.is_file() {
        return Err(TranscodeError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that multiple files exist, failing on the first missing one
pub fn validate_files_exist<P: AsRef<Path>>(files: &[(P, &str)]) -> Result<()> {
    for (path, desc) in files {
        validate_file_exists(path, desc)?;
    }
    Ok(())
}

/// Validate that the directory an output file will be written into exists
pub fn validate_output_parent<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    match path_ref.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            Err(TranscodeError::InvalidFileFormat {
                file_type: description.to_string(),
                path: path_ref.display().to_string(),
                reason: format!("Parent directory {} does not exist", parent.display()),
            })
        }
        _ => Ok(()),
    }
}

/// Validate that a scratch location is a directory, when one is given
pub fn validate_directory<P: AsRef<Path>>(path: Option<P>, description: &str) -> Result<()> {
    if let Some(path) = path {
        let path_ref = path.as_ref();
        if !path_ref.is_dir() {
            return Err(TranscodeError::InvalidFileFormat {
                file_type: description.to_string(),
                path: path_ref.display().to_string(),
                reason: "Not a directory".to_string(),
            });
        }
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Example
/// ```
/// use mgtranscode_lib::validation::validate_positive;
///
/// validate_positive(500_000, "buffer-size").unwrap();
/// assert!(validate_positive(0, "buffer-size").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(TranscodeError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_validate_file_exists() {
        let temp_file = NamedTempFile::new().unwrap();
        validate_file_exists(temp_file.path(), "Input SAM").unwrap();

        let err = validate_file_exists("/nonexistent/input.sam", "Input SAM").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Input SAM"));
        assert!(msg.contains("/nonexistent/input.sam"));
        assert!(msg.contains("File does not exist"));
    }

    #[test]
    fn test_validate_file_exists_rejects_directory() {
        let dir = TempDir::new().unwrap();
        assert!(validate_file_exists(dir.path(), "Input SAM").is_err());
    }

    #[test]
    fn test_validate_files_exist_reports_first_missing() {
        let temp_file = NamedTempFile::new().unwrap();
        let files = [
            (temp_file.path().to_path_buf(), "Input mgrec"),
            ("/missing/header.sam".into(), "Header SAM"),
        ];
        let err = validate_files_exist(&files).unwrap_err();
        assert!(err.to_string().contains("Header SAM"));
    }

    #[test]
    fn test_validate_output_parent() {
        let dir = TempDir::new().unwrap();
        validate_output_parent(dir.path().join("out.mgrec"), "Output").unwrap();
        validate_output_parent("out.mgrec", "Output").unwrap();
        assert!(validate_output_parent(dir.path().join("missing/out.mgrec"), "Output").is_err());
    }

    #[test]
    fn test_validate_directory() {
        let dir = TempDir::new().unwrap();
        validate_directory(Some(dir.path()), "Temporary directory").unwrap();
        validate_directory(None::<&Path>, "Temporary directory").unwrap();
        assert!(validate_directory(Some(dir.path().join("nope")), "Temporary directory").is_err());
    }

    #[test]
    fn test_validate_positive() {
        validate_positive(1usize, "threads").unwrap();
        let err = validate_positive(0usize, "buffer-size").unwrap_err();
        assert!(err.to_string().contains("buffer-size"));
        assert!(err.to_string().contains("got: 0"));
    }
}
