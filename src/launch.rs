use crate::{
    config_patch,
    error::{LaunchResult, LauncherError},
    graphics,
    paths::LaunchPaths,
    store::AppState,
};
use std::{
    path::Path,
    process::{Command, Stdio},
    thread,
};

#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub profile: String,
    pub pid: u32,
    pub paths: LaunchPaths,
}

/// Checks launch preconditions without touching any file. Returns the
/// active profile name.
pub fn prepare(state: &AppState) -> LaunchResult<String> {
    let profile = state
        .active_profile_name()
        .ok_or(LauncherError::NoActiveProfile)?
        .to_string();
    if !state.has_install_folder() {
        return Err(LauncherError::EmptyInstallFolder);
    }
    Ok(profile)
}

/// Patches both config files for the active profile. A failed graphics patch
/// leaves the earlier `altv.toml` edits in place.
pub fn apply_profile(state: &AppState, paths: &LaunchPaths) -> LaunchResult<()> {
    let profile = state.active_profile().ok_or(LauncherError::NoActiveProfile)?;
    config_patch::set_branch(&paths.config_path, profile.branch)?;
    config_patch::set_debug(&paths.config_path, profile.debug_mode)?;
    graphics::patch_graphics_xml(&paths.graphics_settings_path, profile)
}

pub fn launch(state: &AppState, graphics_settings: &Path) -> LaunchResult<LaunchOutcome> {
    let profile = prepare(state)?;
    let paths = LaunchPaths::new(state.install_folder(), graphics_settings.to_path_buf());
    apply_profile(state, &paths)?;
    if !paths.executable_path.is_file() {
        return Err(LauncherError::FileNotFound(paths.executable_path.clone()));
    }
    let pid = spawn_detached(&paths.executable_path, &paths.install_folder)?;
    Ok(LaunchOutcome {
        profile,
        pid,
        paths,
    })
}

/// Starts the executable without blocking on it or capturing its output.
pub fn spawn_detached(executable: &Path, working_dir: &Path) -> LaunchResult<u32> {
    let mut command = Command::new(executable);
    command
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        command.creation_flags(DETACHED_PROCESS);
    }
    let mut child = command.spawn().map_err(|source| LauncherError::Spawn {
        path: executable.to_path_buf(),
        source,
    })?;
    let pid = child.id();
    // Reaped off-thread; callers never wait on the game.
    thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Branch;
    use std::{fs, path::PathBuf};

    struct Fixture {
        _dir: tempfile::TempDir,
        install: PathBuf,
        settings_xml: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("altv");
        fs::create_dir_all(&install).unwrap();
        fs::write(install.join("altv.toml"), "name = 'me'\ndebug = false\nbranch = \"release\"\n")
            .unwrap();
        let settings_xml = dir.path().join("settings.xml");
        fs::write(&settings_xml, "<Settings><graphics/><video/></Settings>").unwrap();
        Fixture {
            _dir: dir,
            install,
            settings_xml,
        }
    }

    #[test]
    fn no_active_profile_touches_nothing() {
        let fixture = fixture();
        let mut state = AppState::default();
        state.set_install_folder(fixture.install.clone());
        let toml_before = fs::read_to_string(fixture.install.join("altv.toml")).unwrap();
        let xml_before = fs::read_to_string(&fixture.settings_xml).unwrap();

        let err = launch(&state, &fixture.settings_xml).unwrap_err();
        assert!(matches!(err, LauncherError::NoActiveProfile));
        assert_eq!(fs::read_to_string(fixture.install.join("altv.toml")).unwrap(), toml_before);
        assert_eq!(fs::read_to_string(&fixture.settings_xml).unwrap(), xml_before);
    }

    #[test]
    fn empty_install_folder_is_rejected() {
        let fixture = fixture();
        let mut state = AppState::default();
        state.add_profile("Main").unwrap();
        let err = launch(&state, &fixture.settings_xml).unwrap_err();
        assert!(matches!(err, LauncherError::EmptyInstallFolder));
    }

    #[test]
    fn missing_executable_is_reported_after_patching() {
        let fixture = fixture();
        let mut state = AppState::default();
        state.add_profile("Main").unwrap();
        state.set_branch(Branch::Dev).unwrap();
        state.set_debug_mode(true).unwrap();
        state.set_install_folder(fixture.install.clone());

        let err = launch(&state, &fixture.settings_xml).unwrap_err();
        assert!(matches!(err, LauncherError::FileNotFound(path) if path.ends_with("altv.exe")));

        let toml = fs::read_to_string(fixture.install.join("altv.toml")).unwrap();
        assert_eq!(toml, "name = 'me'\ndebug = true\nbranch = \"dev\"\n");
        let xml = fs::read_to_string(&fixture.settings_xml).unwrap();
        assert!(xml.contains("<FXAA_Enabled value=\"true\"/>"));
    }

    #[test]
    fn failed_graphics_patch_keeps_config_edits() {
        let fixture = fixture();
        fs::remove_file(&fixture.settings_xml).unwrap();
        let mut state = AppState::default();
        state.add_profile("Main").unwrap();
        state.set_debug_mode(true).unwrap();
        state.set_install_folder(fixture.install.clone());

        let err = launch(&state, &fixture.settings_xml).unwrap_err();
        assert!(matches!(err, LauncherError::FileNotFound(path) if path == fixture.settings_xml));
        let toml = fs::read_to_string(fixture.install.join("altv.toml")).unwrap();
        assert!(toml.contains("debug = true"));
    }

    #[cfg(unix)]
    #[test]
    fn successful_launch_patches_both_files_and_returns_a_pid() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = fixture();
        let exe = fixture.install.join("altv.exe");
        fs::write(&exe, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        let mut state = AppState::default();
        state.add_profile("Main").unwrap();
        state.set_branch(Branch::Rc).unwrap();
        state
            .set_graphics(crate::profile::GraphicsSetting::VSync, "Off")
            .unwrap();
        state.set_install_folder(fixture.install.clone());

        let outcome = launch(&state, &fixture.settings_xml).unwrap();
        assert_eq!(outcome.profile, "Main");
        assert!(outcome.pid > 0);
        assert_eq!(outcome.paths.executable_path, exe);

        let toml = fs::read_to_string(fixture.install.join("altv.toml")).unwrap();
        assert!(toml.contains("branch = \"rc\""));
        let xml = fs::read_to_string(&fixture.settings_xml).unwrap();
        assert!(xml.contains("<VSync value=\"0\"/>"));
    }

    #[cfg(unix)]
    #[test]
    fn spawn_returns_before_the_child_exits() {
        use std::{os::unix::fs::PermissionsExt, time::Instant};

        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("altv.exe");
        fs::write(&exe, "#!/bin/sh\nsleep 3\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        let started = Instant::now();
        let pid = spawn_detached(&exe, dir.path()).unwrap();
        assert!(pid > 0);
        assert!(started.elapsed().as_secs() < 2);
    }

    #[test]
    fn missing_executable_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("altv.exe");
        let err = spawn_detached(&exe, dir.path()).unwrap_err();
        assert!(matches!(err, LauncherError::Spawn { path, .. } if path == exe));
    }

    #[test]
    fn unreadable_settings_xml_is_an_io_error() {
        let fixture = fixture();
        fs::write(&fixture.settings_xml, [0xff, 0xfe, 0x00, 0x3c]).unwrap();
        let mut state = AppState::default();
        state.add_profile("Main").unwrap();
        state.set_install_folder(fixture.install.clone());

        let err = launch(&state, &fixture.settings_xml).unwrap_err();
        assert!(matches!(err, LauncherError::Io { path, .. } if path == fixture.settings_xml));
    }

    #[cfg(unix)]
    #[test]
    fn read_only_settings_dir_is_an_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = fixture();
        let documents = fixture.settings_xml.parent().unwrap().join("documents");
        fs::create_dir_all(&documents).unwrap();
        let settings_xml = documents.join("settings.xml");
        fs::copy(&fixture.settings_xml, &settings_xml).unwrap();
        fs::set_permissions(&documents, fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not stop root.
        let writable = fs::write(documents.join("write-check"), "").is_ok();
        let mut state = AppState::default();
        state.add_profile("Main").unwrap();
        state.set_install_folder(fixture.install.clone());
        let result = launch(&state, &settings_xml);
        fs::set_permissions(&documents, fs::Permissions::from_mode(0o755)).unwrap();
        if writable {
            return;
        }

        let err = result.unwrap_err();
        assert!(matches!(err, LauncherError::Io { .. }), "{err:?}");
        let xml = fs::read_to_string(&settings_xml).unwrap();
        assert_eq!(xml, "<Settings><graphics/><video/></Settings>");
    }

    #[test]
    fn missing_config_file_aborts_before_graphics() {
        let fixture = fixture();
        fs::remove_file(fixture.install.join("altv.toml")).unwrap();
        let mut state = AppState::default();
        state.add_profile("Main").unwrap();
        state.set_install_folder(fixture.install.clone());
        let xml_before = fs::read_to_string(&fixture.settings_xml).unwrap();

        let err = launch(&state, &fixture.settings_xml).unwrap_err();
        assert!(matches!(err, LauncherError::FileNotFound(path) if path.ends_with("altv.toml")));
        assert_eq!(fs::read_to_string(&fixture.settings_xml).unwrap(), xml_before);
    }
}
