use crate::{
    config::LauncherConfig,
    error::{LaunchResult, LauncherError},
    launch::{self, LaunchOutcome},
    paths,
    profile::{Branch, GraphicsSetting},
    store::{AppState, ProfileStore},
};
use anyhow::{Context, Result};
use std::{
    collections::VecDeque,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    Ui,
    Cli,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: OffsetDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    /// `<rfc3339> [LEVEL] message`, as appended to `easylaunch.log`.
    fn file_line(&self) -> String {
        let stamp = self.at.format(&Rfc3339).unwrap_or_default();
        format!("{stamp} [{}] {}", self.level.label(), self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Profiles,
    Settings,
}

/// Rows of the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    InstallFolder,
    Branch,
    DebugMode,
    Graphics(GraphicsSetting),
}

impl Field {
    pub fn all() -> Vec<Field> {
        let mut fields = vec![Field::InstallFolder, Field::Branch, Field::DebugMode];
        fields.extend(GraphicsSetting::ALL.into_iter().map(Field::Graphics));
        fields
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::InstallFolder => "Install Folder",
            Field::Branch => "Branch",
            Field::DebugMode => "Debug Mode",
            Field::Graphics(setting) => setting.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    CreateProfile,
    ImportProfile,
    ExportProfile { profile: String },
    InstallFolder,
    GraphicsSettingsPath,
}

#[derive(Debug, Clone)]
pub enum InputMode {
    Normal,
    Editing {
        prompt: String,
        buffer: String,
        purpose: InputPurpose,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogChoice {
    Yes,
    No,
}

#[derive(Debug, Clone)]
pub enum DialogKind {
    DeleteProfile { name: String },
}

#[derive(Debug, Clone)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    pub yes_label: String,
    pub no_label: String,
    pub choice: DialogChoice,
    pub kind: DialogKind,
}

pub struct App {
    pub config: LauncherConfig,
    pub store: ProfileStore,
    pub state: AppState,
    pub mode: StartupMode,
    pub status: String,
    pub logs: VecDeque<LogEntry>,
    pub log_scroll: usize,
    pub focus: Focus,
    pub profile_selected: usize,
    pub field_selected: usize,
    pub input_mode: InputMode,
    pub dialog: Option<Dialog>,
    pub should_quit: bool,
    log_path: PathBuf,
}

impl App {
    pub fn initialize(mode: StartupMode, settings_override: Option<PathBuf>) -> Result<Self> {
        let config = LauncherConfig::load_or_create()?;
        let settings_path = settings_override.unwrap_or_else(|| config.settings_path());
        Self::with_config(mode, config, ProfileStore::new(settings_path))
    }

    pub fn with_config(mode: StartupMode, config: LauncherConfig, store: ProfileStore) -> Result<Self> {
        let state = store
            .load()
            .with_context(|| format!("load profiles from {}", store.path().display()))?;
        let log_path = config.log_path();
        let mut app = Self {
            config,
            store,
            state,
            mode,
            status: "Ready".to_string(),
            logs: VecDeque::new(),
            log_scroll: 0,
            focus: Focus::Profiles,
            profile_selected: 0,
            field_selected: 0,
            input_mode: InputMode::Normal,
            dialog: None,
            should_quit: false,
            log_path,
        };
        app.sync_profile_selection();

        if mode == StartupMode::Ui {
            let count = app.state.profiles().len();
            app.log_info(format!("Loaded {count} profile(s)"));
            if app.state.profiles().is_empty() {
                app.status = "No profiles yet: press n to create one".to_string();
            } else if !app.state.has_install_folder() {
                app.status = "Install folder not set: press f to choose it".to_string();
            }
        }
        Ok(app)
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.state.profiles().keys().cloned().collect()
    }

    pub fn selected_profile_name(&self) -> Option<String> {
        self.profile_names().get(self.profile_selected).cloned()
    }

    pub fn active_profile_label(&self) -> String {
        self.state
            .active_profile_name()
            .unwrap_or("(none)")
            .to_string()
    }

    pub fn selected_field(&self) -> Field {
        let fields = Field::all();
        fields[self.field_selected.min(fields.len() - 1)]
    }

    pub fn sync_profile_selection(&mut self) {
        if let Some(active) = self.state.active_profile_name() {
            if let Some(index) = self.state.profiles().keys().position(|name| name == active) {
                self.profile_selected = index;
            }
        }
        self.clamp_selection();
    }

    pub fn clamp_selection(&mut self) {
        let count = self.state.profiles().len();
        if count == 0 {
            self.profile_selected = 0;
        } else if self.profile_selected >= count {
            self.profile_selected = count - 1;
        }
        let fields = Field::all().len();
        if self.field_selected >= fields {
            self.field_selected = fields - 1;
        }
    }

    pub fn move_selection(&mut self, down: bool) {
        match self.focus {
            Focus::Profiles => {
                let count = self.state.profiles().len();
                if down && self.profile_selected + 1 < count {
                    self.profile_selected += 1;
                } else if !down && self.profile_selected > 0 {
                    self.profile_selected -= 1;
                }
            }
            Focus::Settings => {
                let count = Field::all().len();
                if down && self.field_selected + 1 < count {
                    self.field_selected += 1;
                } else if !down && self.field_selected > 0 {
                    self.field_selected -= 1;
                }
            }
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Profiles => Focus::Settings,
            Focus::Settings => Focus::Profiles,
        };
    }

    pub fn hint(&self) -> &'static str {
        if self.dialog.is_some() {
            return "←/→ choose | Enter confirm | Esc cancel";
        }
        match self.focus {
            Focus::Profiles => {
                "↑/↓ move | Enter select | n new | d delete | i import | e export | Tab settings | F5 launch | q quit"
            }
            Focus::Settings => {
                "↑/↓ move | ←/→ change | Enter edit | f folder | g settings.xml | Tab profiles | F5 launch | q quit"
            }
        }
    }

    /// Runs a user action, surfacing any failure in the status bar and log.
    pub fn run_action<F>(&mut self, label: &str, action: F)
    where
        F: FnOnce(&mut App) -> LaunchResult<()>,
    {
        if let Err(err) = action(self) {
            self.report_error(label, &err);
        }
    }

    pub fn report_error(&mut self, label: &str, err: &LauncherError) {
        self.status = format!("{label} failed: {err}");
        self.log_error(format!("{label} failed: {err}"));
    }

    fn persist(&mut self) -> LaunchResult<()> {
        self.store.save(&self.state)
    }

    pub fn create_profile(&mut self, name: &str) -> LaunchResult<()> {
        let name = self.state.add_profile(name)?;
        self.persist()?;
        self.sync_profile_selection();
        self.status = format!("Profile created: {name}");
        self.log_info(format!("Profile created: {name}"));
        Ok(())
    }

    pub fn select_profile(&mut self, name: &str) -> LaunchResult<()> {
        self.state.select_profile(name)?;
        self.persist()?;
        self.sync_profile_selection();
        self.status = format!("Active profile: {name}");
        self.log_info(format!("Active profile: {name}"));
        Ok(())
    }

    pub fn request_delete_selected(&mut self) {
        let Some(name) = self.selected_profile_name() else {
            self.status = "No profile selected".to_string();
            return;
        };
        if !self.config.confirm_profile_delete {
            self.run_action("Delete profile", |app| app.delete_profile(&name));
            return;
        }
        self.dialog = Some(Dialog {
            title: "Delete profile".to_string(),
            message: format!("Delete profile \"{name}\"?\nThis cannot be undone."),
            yes_label: "Delete".to_string(),
            no_label: "Cancel".to_string(),
            choice: DialogChoice::No,
            kind: DialogKind::DeleteProfile { name },
        });
    }

    pub fn delete_profile(&mut self, name: &str) -> LaunchResult<()> {
        self.state.delete_profile(name)?;
        self.persist()?;
        self.sync_profile_selection();
        self.status = format!("Profile deleted: {name}");
        self.log_info(format!(
            "Profile deleted: {name} (active: {})",
            self.active_profile_label()
        ));
        Ok(())
    }

    pub fn import_profile(&mut self, input: &str) -> LaunchResult<()> {
        let path = expand_path(input);
        let name = self.state.import_profile(&path)?;
        self.persist()?;
        self.sync_profile_selection();
        self.status = format!("Profile imported: {name}");
        self.log_info(format!("Profile imported: {name} from {}", path.display()));
        Ok(())
    }

    pub fn export_profile(&mut self, name: &str, input: &str) -> LaunchResult<()> {
        let path = expand_path(input);
        self.state.export_profile(name, &path)?;
        self.status = format!("Profile exported: {name}");
        self.log_info(format!("Profile exported: {name} to {}", path.display()));
        Ok(())
    }

    pub fn set_install_folder(&mut self, input: &str) -> LaunchResult<()> {
        let path = expand_path(input);
        if !path.as_os_str().is_empty() && !paths::looks_like_install_folder(&path) {
            self.log_warn(format!(
                "{} has neither {} nor {}",
                path.display(),
                paths::EXECUTABLE_NAME,
                paths::CONFIG_FILE_NAME
            ));
        }
        self.state.set_install_folder(path.clone());
        self.persist()?;
        self.status = format!("Install folder: {}", path.display());
        self.log_info(format!("Install folder set: {}", path.display()));
        Ok(())
    }

    pub fn set_branch(&mut self, branch: Branch) -> LaunchResult<()> {
        self.state.set_branch(branch)?;
        self.persist()?;
        self.status = format!("Branch: {}", branch.as_str());
        Ok(())
    }

    pub fn set_debug_mode(&mut self, enabled: bool) -> LaunchResult<()> {
        self.state.set_debug_mode(enabled)?;
        self.persist()?;
        self.status = format!("Debug mode: {}", if enabled { "on" } else { "off" });
        Ok(())
    }

    pub fn set_graphics(&mut self, setting: GraphicsSetting, value: &str) -> LaunchResult<()> {
        self.state.set_graphics(setting, value)?;
        self.persist()?;
        self.status = format!("{}: {value}", setting.label());
        Ok(())
    }

    /// Steps the selected settings row. The install folder row opens the editor.
    pub fn adjust_field(&mut self, forward: bool) -> LaunchResult<()> {
        let field = self.selected_field();
        if field == Field::InstallFolder {
            self.enter_input(InputPurpose::InstallFolder);
            return Ok(());
        }
        let Some(profile) = self.state.active_profile() else {
            return Err(LauncherError::NoActiveProfile);
        };
        match field {
            Field::InstallFolder => Ok(()),
            Field::Branch => {
                let next = profile.branch.cycle(forward);
                self.set_branch(next)
            }
            Field::DebugMode => {
                let next = !profile.debug_mode;
                self.set_debug_mode(next)
            }
            Field::Graphics(setting) => {
                let next = setting.cycle(profile.graphics_value(setting), forward);
                self.set_graphics(setting, next)
            }
        }
    }

    pub fn set_graphics_settings_path(&mut self, input: Option<&str>) -> Result<()> {
        self.config.graphics_settings_path = input
            .map(expand_path)
            .filter(|path| !path.as_os_str().is_empty());
        self.config.save()?;
        match &self.config.graphics_settings_path {
            Some(path) => self.log_info(format!("settings.xml override: {}", path.display())),
            None => self.log_info("settings.xml override cleared".to_string()),
        }
        Ok(())
    }

    pub fn graphics_settings_path(&self) -> LaunchResult<PathBuf> {
        paths::resolve_graphics_settings(self.config.graphics_settings_path.as_deref())
    }

    pub fn launch(&mut self) -> LaunchResult<LaunchOutcome> {
        let profile = launch::prepare(&self.state)?;
        let graphics = self.graphics_settings_path()?;
        self.log_info(format!(
            "Launching {profile}: patching {} and {}",
            paths::CONFIG_FILE_NAME,
            graphics.display()
        ));
        let outcome = launch::launch(&self.state, &graphics)?;
        self.status = format!("Launched {} (pid {})", outcome.profile, outcome.pid);
        self.log_info(format!(
            "Started {} (pid {})",
            outcome.paths.executable_path.display(),
            outcome.pid
        ));
        Ok(outcome)
    }

    pub fn enter_input(&mut self, purpose: InputPurpose) {
        let (prompt, buffer) = match &purpose {
            InputPurpose::CreateProfile => ("New profile name".to_string(), String::new()),
            InputPurpose::ImportProfile => ("Import profile from".to_string(), String::new()),
            InputPurpose::ExportProfile { profile } => {
                (format!("Export {profile} to"), format!("{profile}.json"))
            }
            InputPurpose::InstallFolder => (
                "Install folder".to_string(),
                self.state.install_folder().display().to_string(),
            ),
            InputPurpose::GraphicsSettingsPath => (
                "settings.xml path (empty = auto)".to_string(),
                self.config
                    .graphics_settings_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
            ),
        };
        self.input_mode = InputMode::Editing {
            prompt,
            buffer,
            purpose,
        };
    }

    pub fn handle_submit(&mut self, purpose: InputPurpose, value: String) {
        match purpose {
            InputPurpose::CreateProfile => {
                self.run_action("Create profile", |app| app.create_profile(&value))
            }
            InputPurpose::ImportProfile => {
                self.run_action("Import profile", |app| app.import_profile(&value))
            }
            InputPurpose::ExportProfile { profile } => {
                self.run_action("Export profile", |app| app.export_profile(&profile, &value))
            }
            InputPurpose::InstallFolder => {
                self.run_action("Set install folder", |app| app.set_install_folder(&value))
            }
            InputPurpose::GraphicsSettingsPath => {
                let input = Some(value.as_str()).filter(|value| !value.trim().is_empty());
                if let Err(err) = self.set_graphics_settings_path(input) {
                    self.status = format!("Save config failed: {err}");
                    self.log_error(format!("Save config failed: {err}"));
                } else {
                    self.status = "settings.xml location updated".to_string();
                }
            }
        }
    }

    pub fn dialog_choice_toggle(&mut self) {
        if let Some(dialog) = &mut self.dialog {
            dialog.choice = match dialog.choice {
                DialogChoice::Yes => DialogChoice::No,
                DialogChoice::No => DialogChoice::Yes,
            };
        }
    }

    pub fn dialog_set_choice(&mut self, choice: DialogChoice) {
        if let Some(dialog) = &mut self.dialog {
            dialog.choice = choice;
        }
    }

    pub fn dialog_confirm(&mut self) {
        let Some(dialog) = self.dialog.take() else {
            return;
        };
        match dialog.kind {
            DialogKind::DeleteProfile { name } => {
                if dialog.choice == DialogChoice::Yes {
                    self.run_action("Delete profile", |app| app.delete_profile(&name));
                } else {
                    self.status = format!("Delete cancelled: {name}");
                }
            }
        }
    }

    pub fn log_info(&mut self, message: String) {
        self.push_log(LogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: String) {
        self.push_log(LogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: String) {
        self.push_log(LogLevel::Error, message);
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Records an event in the ring shown by the form and in the log file.
    /// A file that cannot be written never blocks the in-memory entry.
    fn push_log(&mut self, level: LogLevel, message: String) {
        let entry = LogEntry {
            at: OffsetDateTime::now_utc(),
            level,
            message,
        };
        let _ = append_log_line(&self.log_path, &entry.file_line());
        self.logs.push_back(entry);

        // Scrolled-back views stay on the same entries.
        if self.log_scroll > 0 {
            self.log_scroll += 1;
        }
        while self.logs.len() > LOG_CAPACITY {
            self.logs.pop_front();
            self.log_scroll = self.log_scroll.saturating_sub(1);
        }
    }
}

fn append_log_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

/// Normalizes a typed or pasted path: quotes, `file://` URIs and `~`.
pub(crate) fn expand_path(input: &str) -> PathBuf {
    let mut value = strip_outer_quotes(input.trim());
    if let Some(rest) = value.strip_prefix("file://") {
        value = rest.trim_start_matches("localhost/").to_string();
    }
    if let Some(stripped) = value.strip_prefix('~') {
        if stripped.is_empty() || stripped.starts_with('/') {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(stripped.trim_start_matches('/'));
            }
        }
    }
    PathBuf::from(value)
}

fn strip_outer_quotes(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app(dir: &Path) -> App {
        let config = LauncherConfig::load_or_create_in(dir).unwrap();
        let store = ProfileStore::new(config.settings_path());
        App::with_config(StartupMode::Ui, config, store).unwrap()
    }

    #[test]
    fn every_mutation_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.create_profile("Main").unwrap();
        app.set_branch(Branch::Rc).unwrap();
        app.set_graphics(GraphicsSetting::VSync, "Half").unwrap();

        let reloaded = ProfileStore::new(dir.path().join("settings.json")).load().unwrap();
        assert_eq!(reloaded, app.state);
        assert_eq!(reloaded.active_profile().unwrap().branch, Branch::Rc);
    }

    #[test]
    fn failed_actions_are_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.create_profile("Main").unwrap();

        app.run_action("Create profile", |app| app.create_profile("Main"));
        assert!(app.status.contains("Profile already exists: Main"));
        let last = app.logs.back().unwrap();
        assert_eq!(last.level, LogLevel::Error);

        let log = fs::read_to_string(app.log_path()).unwrap();
        assert!(log.contains("[ERROR] Create profile failed"));
    }

    #[test]
    fn log_file_lines_start_with_an_rfc3339_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.log_warn("settings.xml not found".to_string());

        let log = fs::read_to_string(app.log_path()).unwrap();
        let line = log.lines().last().unwrap();
        let (stamp, rest) = line.split_once(' ').unwrap();
        let bytes = stamp.as_bytes();
        assert_eq!((bytes[4], bytes[7], bytes[10]), (b'-', b'-', b'T'), "{stamp}");
        assert!(stamp.ends_with('Z'), "{stamp}");
        assert_eq!(rest, "[WARN] settings.xml not found");
    }

    #[test]
    fn log_ring_is_capped_and_keeps_scroll_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.logs.clear();
        for index in 0..LOG_CAPACITY {
            app.log_info(format!("event {index}"));
        }
        app.log_scroll = 5;
        app.log_info("one more".to_string());

        assert_eq!(app.logs.len(), LOG_CAPACITY);
        assert_eq!(app.logs.front().unwrap().message, "event 1");
        assert_eq!(app.logs.back().unwrap().message, "one more");
        assert_eq!(app.log_scroll, 5);
    }

    #[test]
    fn launch_without_profile_reports_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let err = app.launch().unwrap_err();
        assert!(matches!(err, LauncherError::NoActiveProfile));
        assert!(!dir.path().join("settings.json").exists());
    }

    #[test]
    fn delete_goes_through_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.create_profile("A").unwrap();
        app.create_profile("B").unwrap();
        app.focus = Focus::Profiles;
        app.profile_selected = 1;

        app.request_delete_selected();
        assert!(app.dialog.is_some());
        app.dialog_confirm();
        assert!(app.state.profile("B").is_some());

        app.request_delete_selected();
        app.dialog_set_choice(DialogChoice::Yes);
        app.dialog_confirm();
        assert!(app.state.profile("B").is_none());
        assert_eq!(app.state.active_profile_name(), Some("A"));
        assert_eq!(app.profile_selected, 0);
    }

    #[test]
    fn adjusting_fields_cycles_values() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.create_profile("Main").unwrap();
        app.focus = Focus::Settings;

        app.field_selected = 1;
        app.adjust_field(true).unwrap();
        assert_eq!(app.state.active_profile().unwrap().branch, Branch::Rc);

        app.field_selected = 2;
        app.adjust_field(true).unwrap();
        assert!(app.state.active_profile().unwrap().debug_mode);

        let vsync = Field::all()
            .iter()
            .position(|field| *field == Field::Graphics(GraphicsSetting::VSync))
            .unwrap();
        app.field_selected = vsync;
        app.adjust_field(false).unwrap();
        assert_eq!(
            app.state.active_profile().unwrap().graphics_value(GraphicsSetting::VSync),
            "Off"
        );

        app.field_selected = 0;
        app.adjust_field(true).unwrap();
        assert!(matches!(
            app.input_mode,
            InputMode::Editing {
                purpose: InputPurpose::InstallFolder,
                ..
            }
        ));
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(expand_path("\"/games/alt v\""), PathBuf::from("/games/alt v"));
        assert_eq!(expand_path("file:///games/altv"), PathBuf::from("/games/altv"));
        assert_eq!(expand_path("  relative/dir "), PathBuf::from("relative/dir"));
    }
}
