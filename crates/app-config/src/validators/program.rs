use std::path::{Path, PathBuf};

use validator::ValidationError;

fn check_executable(path: &Path) -> Result<(), &'static str> {
    let Ok(metadata) = path.metadata() else {
        return Err("File does not exist");
    };

    if !metadata.is_file() {
        return Err("Path is not a file");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if metadata.permissions().mode() & 0o111 == 0 {
            return Err("File is not executable");
        }
    }

    Ok(())
}

pub fn validate_executable(path: &Path) -> Result<(), ValidationError> {
    check_executable(path).map_err(ValidationError::new)
}

#[must_use]
pub fn value_parser_executable() -> impl clap::builder::TypedValueParser {
    move |s: &str| {
        let path = PathBuf::from(s);

        check_executable(&path).map(|()| path)
    }
}
