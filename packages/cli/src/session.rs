//! The session token saved by `login`/`signup` and removed by `logout`.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to access session file {path}: {source}")]
pub struct SessionFileError {
    path: String,
    source: std::io::Error,
}

impl SessionFileError {
    fn new(path: &Path, source: std::io::Error) -> Self {
        Self {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Reads the saved token. A missing or blank file means no session.
///
/// # Errors
///
/// Returns [`SessionFileError`] if the file exists but can't be read.
pub fn load(path: &Path) -> Result<Option<String>, SessionFileError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text.trim().to_string()).filter(|t| !t.is_empty())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SessionFileError::new(path, e)),
    }
}

/// Saves `token`, readable only by the current user where supported.
///
/// # Errors
///
/// Returns [`SessionFileError`] if the file can't be written.
pub fn save(path: &Path, token: &str) -> Result<(), SessionFileError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SessionFileError::new(path, e))?;
    }
    std::fs::write(path, format!("{token}\n")).map_err(|e| SessionFileError::new(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| SessionFileError::new(path, e))?;
    }

    log::debug!("Session saved to {}", path.display());
    Ok(())
}

/// Deletes the saved token. Returns `false` if there was none.
///
/// # Errors
///
/// Returns [`SessionFileError`] if the file exists but can't be removed.
pub fn remove(path: &Path) -> Result<bool, SessionFileError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SessionFileError::new(path, e)),
    }
}
