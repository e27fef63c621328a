use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Profile already exists: {0}")]
    DuplicateName(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid profile name: {0:?}")]
    InvalidName(String),

    #[error("No active profile selected")]
    NoActiveProfile,

    #[error("Install folder is not set")]
    EmptyInstallFolder,

    #[error("Could not locate the documents directory")]
    NoDocumentsDir,

    #[error("Malformed XML in {}: {message}", path.display())]
    XmlParse { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LauncherError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        LauncherError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type LaunchResult<T> = std::result::Result<T, LauncherError>;
