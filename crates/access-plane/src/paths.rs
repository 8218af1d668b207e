use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path {0} escapes base directory {1}")]
    OutsideBase(String, String),
    #[error("path {0} resolves through a symlink")]
    Symlink(String),
    #[error("invalid path {0}: {1}")]
    Invalid(String, String),
}

pub fn resolve_within_base(candidate: &Path, base_dir: &Path) -> Result<PathBuf, PathError> {
    if candidate
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(PathError::OutsideBase(
            candidate.display().to_string(),
            base_dir.display().to_string(),
        ));
    }

    fs::create_dir_all(base_dir)
        .map_err(|err| PathError::Invalid(base_dir.display().to_string(), err.to_string()))?;
    let base = fs::canonicalize(base_dir)
        .map_err(|err| PathError::Invalid(base_dir.display().to_string(), err.to_string()))?;

    let file_name = candidate
        .file_name()
        .ok_or_else(|| {
            PathError::Invalid(candidate.display().to_string(), "missing file name".to_string())
        })?
        .to_os_string();
    let parent = match candidate.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .map_err(|err| PathError::Invalid(parent.display().to_string(), err.to_string()))?;
    let parent = fs::canonicalize(&parent)
        .map_err(|err| PathError::Invalid(parent.display().to_string(), err.to_string()))?;

    if !parent.starts_with(&base) {
        return Err(PathError::OutsideBase(
            candidate.display().to_string(),
            base.display().to_string(),
        ));
    }

    let resolved = parent.join(file_name);
    let is_symlink = fs::symlink_metadata(&resolved)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false);
    if is_symlink {
        return Err(PathError::Symlink(resolved.display().to_string()));
    }
    Ok(resolved)
}
