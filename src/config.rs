use std::{env, path::PathBuf};

use thiserror::Error;

/// Model requested from the vision service when `OPENAI_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Chat-completions endpoint used when `OPENAI_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("failed to prepare upload directory {}: {}", .0.display(), .1)]
    UploadDir(PathBuf, std::io::Error),
}

/// Process configuration read once at startup.
///
/// The API key is the only mandatory setting; everything else falls back to a
/// sensible default. `UPLOAD_DIR` points at the directory where uploads are
/// staged while a request is in flight (system temp dir by default).
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let api_url = env::var("OPENAI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());
        std::fs::create_dir_all(&upload_dir)
            .map_err(|e| ConfigError::UploadDir(upload_dir.clone(), e))?;

        Ok(Self {
            api_key,
            model,
            api_url,
            upload_dir,
        })
    }
}
