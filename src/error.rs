use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Failed to download {0}\n\n\
             Hint: the repository did not answer in time or returned an error.\n\
             Check the repository URL with: plugpm config show")]
    DownloadFailed(String),

    #[error("Corrupted package: {0}")]
    CorruptPackage(String),

    #[error("Installer '{script}' failed ({status})\n{output}")]
    InstallScriptFailed {
        script: String,
        status: String,
        output: String,
    },

    #[error("Install path is still occupied after removing the previous version: {}", .0.display())]
    InstallPathOccupied(PathBuf),

    #[error("'{target}' is not an entry of the search path '{current}'")]
    SearchPathMismatch { current: String, target: String },

    #[error("Main context is no longer accepting tasks")]
    MainThreadUnavailable,

    #[error("{0}")]
    Other(String),
}
