use std::path::{Path, PathBuf};

use validator::ValidationError;

fn check_directory(path: &Path) -> Result<(), &'static str> {
    let Ok(metadata) = path.metadata() else {
        return Err("Directory does not exist");
    };

    if !metadata.is_dir() {
        return Err("Path is not a directory");
    }

    if metadata.permissions().readonly() {
        return Err("Directory is read-only");
    }

    Ok(())
}

/// An existing, writable directory.
pub fn validate_output_directory(path: &Path) -> Result<(), ValidationError> {
    check_directory(path).map_err(ValidationError::new)
}

/// Scratch roots are created on startup, so only an existing path is checked.
pub fn validate_scratch_root(path: &Path) -> Result<(), ValidationError> {
    if !path.exists() {
        return Ok(());
    }

    validate_output_directory(path)
}

/// Parse an existing, writable directory into its canonical path.
#[must_use]
pub fn value_parser_output_directory() -> impl clap::builder::TypedValueParser {
    move |s: &str| {
        let path = Path::new(s);

        check_directory(path)?;

        path.canonicalize()
            .map_err(|_| "Failed to canonicalize path")
            .map(PathBuf::from)
    }
}
