use crate::{
    error::{LaunchResult, LauncherError},
    profile::Branch,
};
use std::{fs, path::Path};

pub const DEBUG_KEY: &str = "debug";
pub const BRANCH_KEY: &str = "branch";

/// Upserts `key = value` in a line-oriented config file.
///
/// Every line whose trimmed content starts with `key` is rewritten; when none
/// match, the pair is appended. Other lines keep their exact bytes, including
/// line endings.
pub fn set_config_key(path: &Path, key: &str, value: &str) -> LaunchResult<()> {
    if !path.is_file() {
        return Err(LauncherError::FileNotFound(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|err| LauncherError::io(path, err))?;
    let patched = upsert_key(&raw, key, value);
    if patched == raw {
        return Ok(());
    }
    write_atomic_text(path, &patched)
}

pub fn set_debug(path: &Path, enabled: bool) -> LaunchResult<()> {
    set_config_key(path, DEBUG_KEY, if enabled { "true" } else { "false" })
}

pub fn set_branch(path: &Path, branch: Branch) -> LaunchResult<()> {
    set_config_key(path, BRANCH_KEY, &format!("\"{}\"", branch.as_str()))
}

pub fn upsert_key(raw: &str, key: &str, value: &str) -> String {
    let replacement = format!("{key} = {value}");
    let mut out = String::with_capacity(raw.len() + replacement.len() + 1);
    let mut matched = false;
    let body = match raw.strip_prefix('\u{feff}') {
        Some(rest) => {
            out.push('\u{feff}');
            rest
        }
        None => raw,
    };

    for line in body.split_inclusive('\n') {
        let (content, ending) = split_line_ending(line);
        if content.trim().starts_with(key) {
            matched = true;
            out.push_str(&replacement);
            out.push_str(ending);
        } else {
            out.push_str(line);
        }
    }

    if !matched {
        if !body.is_empty() && !out.ends_with('\n') {
            out.push_str(detect_line_ending(raw));
        }
        out.push_str(&replacement);
        out.push_str(detect_line_ending(raw));
    }
    out
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

fn detect_line_ending(raw: &str) -> &'static str {
    if raw.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// Writes through a sibling temp file so a failed write leaves the target intact.
pub(crate) fn write_atomic_text(path: &Path, contents: &str) -> LaunchResult<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| LauncherError::FileNotFound(path.to_path_buf()))?;
    let mut temp_name = std::ffi::OsString::from(file_name);
    temp_name.push(".tmp");
    let mut temp_path = parent.join(temp_name);
    if temp_path.exists() {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut temp_name = std::ffi::OsString::from(file_name);
        temp_name.push(format!(".{stamp}.tmp"));
        temp_path = parent.join(temp_name);
    }
    fs::write(&temp_path, contents).map_err(|err| LauncherError::io(&temp_path, err))?;
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(LauncherError::io(path, err));
    }
    Ok(())
}
