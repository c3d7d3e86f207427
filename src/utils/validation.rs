use crate::utils::error::{BootstrapError, Result};
use std::path::Path;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &Path) -> Result<()> {
    let display = path.to_string_lossy();
    if display.is_empty() {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: display.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if display.contains('\0') {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: display.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_existing_dir(field_name: &str, path: &Path) -> Result<()> {
    validate_path(field_name, path)?;
    if !path.is_dir() {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.display().to_string(),
            reason: "Directory does not exist".to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BootstrapError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}
