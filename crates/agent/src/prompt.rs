use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("could not read system prompt `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("system prompt `{0}` is empty")]
    Empty(PathBuf),
}

/// Reads the extraction instruction once at startup.
pub fn load_system_prompt(path: &Path) -> Result<String, PromptError> {
    let prompt = std::fs::read_to_string(path)
        .map_err(|source| PromptError::Read { path: path.to_path_buf(), source })?;

    if prompt.trim().is_empty() {
        return Err(PromptError::Empty(path.to_path_buf()));
    }

    Ok(prompt)
}
