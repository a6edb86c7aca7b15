use crate::error::{ViewerError, ViewerResult};
use std::path::Path;

pub trait Validator<T: ?Sized> {
    fn validate(&self, input: &T) -> ViewerResult<()>;
}

/// Rejects transform requests that have nothing to upload.
pub struct SourceImageValidator;

impl Validator<[u8]> for SourceImageValidator {
    fn validate(&self, source: &[u8]) -> ViewerResult<()> {
        if source.is_empty() {
            return Err(ViewerError::Precondition(
                "no source image loaded".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct ApiKeyValidator;

impl Validator<str> for ApiKeyValidator {
    fn validate(&self, key: &str) -> ViewerResult<()> {
        if key.trim().is_empty() {
            return Err(ViewerError::ConfigurationError(
                "API key is empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct SaveDirValidator;

impl Validator<Path> for SaveDirValidator {
    fn validate(&self, dir: &Path) -> ViewerResult<()> {
        if dir.as_os_str().is_empty() {
            return Err(ViewerError::ConfigurationError(
                "Save directory cannot be empty".to_string(),
            ));
        }

        if !dir.is_dir() {
            return Err(ViewerError::ConfigurationError(format!(
                "Save directory does not exist: {}",
                dir.display()
            )));
        }

        Ok(())
    }
}
