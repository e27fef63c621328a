use crate::error::{LaunchResult, LauncherError};
use directories::UserDirs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "altv.toml";
pub const EXECUTABLE_NAME: &str = "altv.exe";
const GTA_STEAM_APP_ID: &str = "271590";
const GTA_SETTINGS_SUBPATH: [&str; 3] = ["Rockstar Games", "GTA V", "settings.xml"];

#[derive(Debug, Clone)]
pub struct LaunchPaths {
    pub install_folder: PathBuf,
    pub config_path: PathBuf,
    pub executable_path: PathBuf,
    pub graphics_settings_path: PathBuf,
}

impl LaunchPaths {
    pub fn new(install_folder: &Path, graphics_settings_path: PathBuf) -> Self {
        Self {
            install_folder: install_folder.to_path_buf(),
            config_path: install_folder.join(CONFIG_FILE_NAME),
            executable_path: install_folder.join(EXECUTABLE_NAME),
            graphics_settings_path,
        }
    }
}

/// Location of GTA V's `settings.xml`. An explicit override wins; otherwise
/// the first existing candidate, falling back to the documents path.
pub fn resolve_graphics_settings(override_path: Option<&Path>) -> LaunchResult<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }
    let documents = documents_settings_path();
    let mut candidates: Vec<PathBuf> = documents.iter().cloned().collect();
    candidates.extend(proton_settings_paths());
    if let Some(found) = candidates.iter().find(|candidate| candidate.is_file()) {
        return Ok(found.clone());
    }
    documents.ok_or(LauncherError::NoDocumentsDir)
}

fn documents_settings_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    let documents = dirs
        .document_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dirs.home_dir().join("Documents"));
    Some(join_settings(documents))
}

fn proton_settings_paths() -> Vec<PathBuf> {
    let Some(home) = dirs_home() else {
        return Vec::new();
    };
    [".local/share/Steam", ".steam/steam"]
        .iter()
        .map(|steam| {
            join_settings(
                home.join(steam)
                    .join("steamapps/compatdata")
                    .join(GTA_STEAM_APP_ID)
                    .join("pfx/drive_c/users/steamuser/Documents"),
            )
        })
        .collect()
}

fn join_settings(documents: PathBuf) -> PathBuf {
    GTA_SETTINGS_SUBPATH
        .iter()
        .fold(documents, |path, part| path.join(part))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Whether `path` looks like an alt:V client folder.
pub fn looks_like_install_folder(path: &Path) -> bool {
    path.join(EXECUTABLE_NAME).is_file() || path.join(CONFIG_FILE_NAME).is_file()
}
