use crate::{
    error::{LaunchResult, LauncherError},
    profile::{Branch, GraphicsSetting, Profile},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// Everything the launcher persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(rename = "altv_folder", default)]
    install_folder: PathBuf,
    #[serde(rename = "last_selected_profile", default, with = "empty_as_none")]
    active_profile: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

impl AppState {
    pub fn install_folder(&self) -> &Path {
        &self.install_folder
    }

    pub fn has_install_folder(&self) -> bool {
        !self.install_folder.as_os_str().is_empty()
    }

    pub fn set_install_folder(&mut self, path: PathBuf) {
        self.install_folder = path;
    }

    pub fn profiles(&self) -> &BTreeMap<String, Profile> {
        &self.profiles
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn active_profile_name(&self) -> Option<&str> {
        self.active_profile.as_deref()
    }

    pub fn active_profile(&self) -> Option<&Profile> {
        self.active_profile
            .as_deref()
            .and_then(|name| self.profiles.get(name))
    }

    fn active_profile_mut(&mut self) -> LaunchResult<&mut Profile> {
        let name = self
            .active_profile
            .as_deref()
            .ok_or(LauncherError::NoActiveProfile)?;
        self.profiles
            .get_mut(name)
            .ok_or(LauncherError::NoActiveProfile)
    }

    /// Creates a default profile and makes it active. Returns the stored name.
    pub fn add_profile(&mut self, name: &str) -> LaunchResult<String> {
        let name = normalize_profile_name(name)?;
        self.insert_profile(name, Profile::default())
    }

    pub fn delete_profile(&mut self, name: &str) -> LaunchResult<()> {
        if self.profiles.remove(name).is_none() {
            return Err(LauncherError::ProfileNotFound(name.to_string()));
        }
        if self.active_profile.as_deref() == Some(name) {
            self.active_profile = self.profiles.keys().next().cloned();
        }
        Ok(())
    }

    pub fn select_profile(&mut self, name: &str) -> LaunchResult<()> {
        if !self.profiles.contains_key(name) {
            return Err(LauncherError::ProfileNotFound(name.to_string()));
        }
        self.active_profile = Some(name.to_string());
        Ok(())
    }

    /// Reads a single profile record and stores it under the file stem.
    pub fn import_profile(&mut self, path: &Path) -> LaunchResult<String> {
        if !path.is_file() {
            return Err(LauncherError::FileNotFound(path.to_path_buf()));
        }
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = normalize_profile_name(&stem)?;
        if self.profiles.contains_key(&name) {
            return Err(LauncherError::DuplicateName(name));
        }
        let raw = fs::read_to_string(path).map_err(|err| LauncherError::io(path, err))?;
        let mut profile: Profile =
            serde_json::from_str(&raw).map_err(|err| LauncherError::json(path, err))?;
        profile.fill_missing_graphics();
        self.insert_profile(name, profile)
    }

    pub fn export_profile(&self, name: &str, path: &Path) -> LaunchResult<()> {
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| LauncherError::ProfileNotFound(name.to_string()))?;
        let raw = serde_json::to_string_pretty(profile).map_err(|err| LauncherError::json(path, err))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| LauncherError::io(parent, err))?;
        }
        fs::write(path, raw).map_err(|err| LauncherError::io(path, err))
    }

    pub fn set_branch(&mut self, branch: Branch) -> LaunchResult<()> {
        self.active_profile_mut()?.branch = branch;
        Ok(())
    }

    pub fn set_debug_mode(&mut self, enabled: bool) -> LaunchResult<()> {
        self.active_profile_mut()?.debug_mode = enabled;
        Ok(())
    }

    pub fn set_graphics(&mut self, setting: GraphicsSetting, value: &str) -> LaunchResult<()> {
        self.active_profile_mut()?
            .graphics_settings
            .insert(setting, value.to_string());
        Ok(())
    }

    fn insert_profile(&mut self, name: String, profile: Profile) -> LaunchResult<String> {
        if self.profiles.contains_key(&name) {
            return Err(LauncherError::DuplicateName(name));
        }
        self.profiles.insert(name.clone(), profile);
        self.active_profile = Some(name.clone());
        Ok(name)
    }

    fn repair(&mut self) {
        for profile in self.profiles.values_mut() {
            profile.fill_missing_graphics();
        }
        if let Some(name) = &self.active_profile {
            if !self.profiles.contains_key(name) {
                self.active_profile = None;
            }
        }
    }
}

fn normalize_profile_name(name: &str) -> LaunchResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

/// JSON file holding the [`AppState`].
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> LaunchResult<AppState> {
        if !self.path.exists() {
            return Ok(AppState::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|err| LauncherError::io(&self.path, err))?;
        let mut state: AppState =
            serde_json::from_str(&raw).map_err(|err| LauncherError::json(&self.path, err))?;
        state.repair();
        Ok(state)
    }

    pub fn save(&self, state: &AppState) -> LaunchResult<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| LauncherError::io(parent, err))?;
        }
        let raw =
            serde_json::to_string_pretty(state).map_err(|err| LauncherError::json(&self.path, err))?;
        fs::write(&self.path, raw).map_err(|err| LauncherError::io(&self.path, err))
    }
}

mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.filter(|value| !value.is_empty()))
    }
}
