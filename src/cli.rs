use crate::{
    app::{App, StartupMode},
    paths::{self, LaunchPaths},
    profile::{Branch, GraphicsSetting, Profile},
    ui,
};
use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct GlobalOptions {
    format: Option<OutputFormat>,
    settings: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Ui,
    ProfilesList,
    ProfilesAdd(String),
    ProfilesDelete(String),
    ProfilesSelect(String),
    ProfilesImport(String),
    ProfilesExport { name: String, path: String },
    Show,
    SetFolder(String),
    SetBranch(Branch),
    SetDebug(bool),
    SetGraphics { setting: GraphicsSetting, value: String },
    SetGraphicsPath(Option<String>),
    Launch,
    Paths,
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args)?;
    let command = parse_command(&tokens)?;
    let format = global.format.unwrap_or(OutputFormat::Text);

    match command {
        CliCommand::Help => {
            print_help();
            Ok(())
        }
        CliCommand::Version => {
            println!("easylaunch v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Ui => {
            let mut app = App::initialize(StartupMode::Ui, global.settings)?;
            ui::run(&mut app)
        }
        command => {
            let mut app = App::initialize(StartupMode::Cli, global.settings)?;
            run_command(&mut app, command, format)
        }
    }
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut global = GlobalOptions::default();
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--format=") {
            global.format = Some(parse_format(value)?);
            continue;
        }
        if arg == "--format" {
            let value = iter.next().ok_or_else(|| anyhow!("--format requires a value"))?;
            global.format = Some(parse_format(value)?);
            continue;
        }
        if let Some(value) = arg.strip_prefix("--settings=") {
            global.settings = Some(PathBuf::from(value));
            continue;
        }
        if arg == "--settings" {
            let value = iter.next().ok_or_else(|| anyhow!("--settings requires a path"))?;
            global.settings = Some(PathBuf::from(value));
            continue;
        }
        tokens.push(arg.to_string());
    }
    Ok((global, tokens))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).ok_or_else(|| anyhow!("Unknown format: {value} (use text or json)"))
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let words: Vec<&str> = tokens.iter().map(|token| token.as_str()).collect();
    let command = match words.as_slice() {
        [] => CliCommand::Ui,
        ["--help" | "-h" | "help", ..] => CliCommand::Help,
        ["--version" | "-V" | "version", ..] => CliCommand::Version,
        ["profiles"] | ["profiles", "list"] => CliCommand::ProfilesList,
        ["profiles", "add", name] => CliCommand::ProfilesAdd(name.to_string()),
        ["profiles", "delete" | "rm", name] => CliCommand::ProfilesDelete(name.to_string()),
        ["profiles", "select" | "use", name] => CliCommand::ProfilesSelect(name.to_string()),
        ["profiles", "import", path] => CliCommand::ProfilesImport(path.to_string()),
        ["profiles", "export", name, path] => CliCommand::ProfilesExport {
            name: name.to_string(),
            path: path.to_string(),
        },
        ["profiles", sub, ..] => {
            bail!("Unknown or incomplete profiles command: {sub} (see easylaunch help)")
        }
        ["show"] => CliCommand::Show,
        ["set", "folder", path] => CliCommand::SetFolder(path.to_string()),
        ["set", "branch", value] => CliCommand::SetBranch(
            Branch::parse(value)
                .ok_or_else(|| anyhow!("Unknown branch: {value} (use release, rc or dev)"))?,
        ),
        ["set", "debug", value] => CliCommand::SetDebug(parse_switch(value)?),
        ["set", "graphics", setting, value @ ..] if !value.is_empty() => {
            let setting = GraphicsSetting::parse(setting)
                .ok_or_else(|| anyhow!("Unknown graphics setting: {setting}"))?;
            let joined = value.join(" ");
            let value = setting.canonical_option(&joined).ok_or_else(|| {
                anyhow!(
                    "Invalid value for {}: {joined} (options: {})",
                    setting.as_str(),
                    setting.options().join(", ")
                )
            })?;
            CliCommand::SetGraphics {
                setting,
                value: value.to_string(),
            }
        }
        ["set", "graphics-path", "auto"] => CliCommand::SetGraphicsPath(None),
        ["set", "graphics-path", path] => CliCommand::SetGraphicsPath(Some(path.to_string())),
        ["set", ..] => bail!("Usage: easylaunch set <folder|branch|debug|graphics|graphics-path> <value>"),
        ["launch"] => CliCommand::Launch,
        ["paths"] => CliCommand::Paths,
        [other, ..] => bail!("Unknown command: {other} (see easylaunch help)"),
    };
    Ok(command)
}

fn parse_switch(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => bail!("Expected on or off, got {value}"),
    }
}

fn run_command(app: &mut App, command: CliCommand, format: OutputFormat) -> Result<()> {
    match command {
        CliCommand::ProfilesList => return list_profiles(app, format),
        CliCommand::ProfilesAdd(name) => app.create_profile(&name)?,
        CliCommand::ProfilesDelete(name) => app.delete_profile(&name)?,
        CliCommand::ProfilesSelect(name) => app.select_profile(&name)?,
        CliCommand::ProfilesImport(path) => app.import_profile(&path)?,
        CliCommand::ProfilesExport { name, path } => app.export_profile(&name, &path)?,
        CliCommand::Show => return show_active(app, format),
        CliCommand::SetFolder(path) => app.set_install_folder(&path)?,
        CliCommand::SetBranch(branch) => app.set_branch(branch)?,
        CliCommand::SetDebug(enabled) => app.set_debug_mode(enabled)?,
        CliCommand::SetGraphics { setting, value } => app.set_graphics(setting, &value)?,
        CliCommand::SetGraphicsPath(path) => {
            app.set_graphics_settings_path(path.as_deref())?;
            app.status = match &app.config.graphics_settings_path {
                Some(path) => format!("settings.xml override: {}", path.display()),
                None => "settings.xml location: auto-detect".to_string(),
            };
        }
        CliCommand::Launch => {
            if let Err(err) = app.launch() {
                app.log_error(format!("Launch failed: {err}"));
                return Err(err.into());
            }
        }
        CliCommand::Paths => return list_paths(app, format),
        CliCommand::Ui | CliCommand::Help | CliCommand::Version => return Ok(()),
    }

    match format {
        OutputFormat::Json => {
            let output = StatusOutput {
                status: app.status.clone(),
                active_profile: app.state.active_profile_name().map(str::to_string),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => println!("{}", app.status),
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusOutput {
    status: String,
    active_profile: Option<String>,
}

#[derive(Serialize)]
struct ProfileListItem {
    name: String,
    active: bool,
}

fn list_profiles(app: &App, format: OutputFormat) -> Result<()> {
    let active = app.state.active_profile_name();
    let items: Vec<ProfileListItem> = app
        .state
        .profiles()
        .keys()
        .map(|name| ProfileListItem {
            name: name.clone(),
            active: active == Some(name.as_str()),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No profiles.");
            }
            for item in items {
                if item.active {
                    println!("* {}", item.name);
                } else {
                    println!("  {}", item.name);
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    install_folder: String,
    active_profile: Option<&'a str>,
    profile: Option<&'a Profile>,
}

fn show_active(app: &App, format: OutputFormat) -> Result<()> {
    let output = ShowOutput {
        install_folder: app.state.install_folder().display().to_string(),
        active_profile: app.state.active_profile_name(),
        profile: app.state.active_profile(),
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Install folder: {}", output.install_folder);
            let Some(profile) = output.profile else {
                println!("Active profile: (none)");
                return Ok(());
            };
            println!("Active profile: {}", output.active_profile.unwrap_or_default());
            println!("  Branch: {}", profile.branch.as_str());
            println!("  Debug mode: {}", profile.debug_mode);
            for setting in GraphicsSetting::ALL {
                println!(
                    "  {:<22} {}",
                    setting.as_str(),
                    profile.graphics_value(setting)
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    settings_file: String,
    log_file: String,
    config_file: String,
    executable: String,
    graphics_settings: String,
    error: Option<String>,
}

fn list_paths(app: &App, format: OutputFormat) -> Result<()> {
    let (graphics, error) = match app.graphics_settings_path() {
        Ok(path) => (path, None),
        Err(err) => (PathBuf::new(), Some(err.to_string())),
    };
    let launch_paths = LaunchPaths::new(app.state.install_folder(), graphics);
    let output = PathsOutput {
        settings_file: app.store.path().display().to_string(),
        log_file: app.log_path().display().to_string(),
        config_file: launch_paths.config_path.display().to_string(),
        executable: launch_paths.executable_path.display().to_string(),
        graphics_settings: launch_paths.graphics_settings_path.display().to_string(),
        error,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("Profiles: {}", output.settings_file);
            println!("Log: {}", output.log_file);
            println!("{}: {}", paths::CONFIG_FILE_NAME, output.config_file);
            println!("{}: {}", paths::EXECUTABLE_NAME, output.executable);
            println!("settings.xml: {}", output.graphics_settings);
            if let Some(error) = output.error {
                println!("Warning: {error}");
            }
        }
    }
    Ok(())
}

fn print_help() {
    println!("easylaunch v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  easylaunch                              Open the launcher form");
    println!("  easylaunch profiles [list]              List profiles");
    println!("  easylaunch profiles add <name>          Create a profile and make it active");
    println!("  easylaunch profiles delete <name>       Delete a profile");
    println!("  easylaunch profiles select <name>       Make a profile active");
    println!("  easylaunch profiles import <file.json>  Import a profile named after the file");
    println!("  easylaunch profiles export <name> <file.json>");
    println!("  easylaunch show                         Show the active profile");
    println!("  easylaunch set folder <path>            Set the alt:V install folder");
    println!("  easylaunch set branch <release|rc|dev>");
    println!("  easylaunch set debug <on|off>");
    println!("  easylaunch set graphics <Setting> <value>");
    println!("  easylaunch set graphics-path <path|auto>");
    println!("  easylaunch launch                       Patch configs and start altv.exe");
    println!("  easylaunch paths                        Show file locations");
    println!();
    println!("Global options:");
    println!("  --format <text|json>                    Output format");
    println!("  --settings <path>                       Use another profile store file");
    println!("  -h, --help                              Show help");
    println!("  -V, --version                           Show version");
    println!();
    println!("Graphics settings:");
    for setting in GraphicsSetting::ALL {
        println!("  {:<22} {}", setting.as_str(), setting.options().join(" | "));
    }
}
