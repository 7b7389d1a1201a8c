// file: src/utils/validation.rs
// description: input path validation and output name helpers
// reference: input validation patterns

use crate::error::{ProgressError, Result};
use std::fs;
use std::path::Path;

pub struct Validator;

impl Validator {
    pub fn validate_file_path(path: &Path) -> Result<()> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            ProgressError::Validation(format!(
                "Cannot canonicalize path {}: {}",
                path.display(),
                e
            ))
        })?;

        if !canonical.is_file() {
            return Err(ProgressError::Validation(format!(
                "Path is not a file: {}",
                canonical.display()
            )));
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(ProgressError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(ProgressError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_table_extension(path: &Path) -> Result<()> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") | Some("tsv") => Ok(()),
            _ => Err(ProgressError::Validation(format!(
                "File is not a delimited table (.csv/.tsv): {}",
                path.display()
            ))),
        }
    }

    /// Checks an input table path before reading it.
    pub fn validate_table_input(path: &Path) -> Result<()> {
        Self::validate_table_extension(path)?;
        Self::validate_file_path(path)
    }

    /// Output directories may not exist yet, but must not be a file.
    pub fn validate_output_dir(path: &Path) -> Result<()> {
        if path.exists() && !path.is_dir() {
            return Err(ProgressError::Validation(format!(
                "Output path exists and is not a directory: {}",
                path.display()
            )));
        }
        Ok(())
    }

    /// Lowercase file stem with every run of non-alphanumerics collapsed to `_`.
    pub fn sanitize_file_stem(name: &str) -> String {
        let mut stem = String::with_capacity(name.len());
        for ch in name.trim().chars() {
            if ch.is_alphanumeric() {
                stem.extend(ch.to_lowercase());
            } else if !stem.ends_with('_') {
                stem.push('_');
            }
        }

        let stem = stem.trim_matches('_');
        if stem.is_empty() {
            "table".to_string()
        } else {
            stem.to_string()
        }
    }
}
