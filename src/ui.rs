use crate::app::{App, DialogChoice, Field, Focus, InputMode, InputPurpose, LogLevel};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Padding, Paragraph},
};
use std::{io, time::Duration};
use time::macros::format_description;

const PROFILE_PANEL_WIDTH: u16 = 32;
const LOG_PANEL_HEIGHT: u16 = 8;

#[derive(Clone)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
    log_bg: Color,
}

impl Theme {
    fn new() -> Self {
        Self {
            accent: Color::Rgb(120, 190, 255),
            accent_soft: Color::Rgb(70, 110, 160),
            border: Color::Rgb(65, 75, 90),
            text: Color::Rgb(220, 230, 240),
            muted: Color::Rgb(135, 145, 155),
            success: Color::Rgb(120, 220, 140),
            warning: Color::Rgb(230, 200, 120),
            error: Color::Rgb(235, 100, 95),
            header_bg: Color::Rgb(22, 28, 36),
            log_bg: Color::Rgb(16, 20, 26),
        }
    }

    fn panel(&self, title: &'static str, focused: bool) -> Block<'static> {
        let border = if focused { self.accent_soft } else { self.border };
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .padding(Padding {
                left: 1,
                right: 1,
                top: 0,
                bottom: 0,
            })
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    loop {
        app.clamp_selection();
        terminal.draw(|frame| draw(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key);
                }
            }
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if app.dialog.is_some() {
        handle_dialog_mode(app, key);
        return;
    }

    let mode = std::mem::replace(&mut app.input_mode, InputMode::Normal);
    match mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing {
            prompt,
            mut buffer,
            purpose,
        } => handle_input_mode(app, key, &mut buffer, purpose, prompt),
    }
}

fn handle_dialog_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
            app.dialog_choice_toggle();
        }
        KeyCode::Char('y') | KeyCode::Char('Y') => app.dialog_set_choice(DialogChoice::Yes),
        KeyCode::Char('n') | KeyCode::Char('N') => app.dialog_set_choice(DialogChoice::No),
        KeyCode::Enter | KeyCode::Char(' ') => app.dialog_confirm(),
        KeyCode::Esc => {
            app.dialog_set_choice(DialogChoice::No);
            app.dialog_confirm();
        }
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('Q'), _) | (KeyCode::Esc, _) => {
            app.should_quit = true
        }
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => app.should_quit = true,
        (KeyCode::Tab, _) | (KeyCode::BackTab, _) => app.toggle_focus(),
        (KeyCode::F(5), _) | (KeyCode::Char('L'), _) => {
            app.run_action("Launch", |app| app.launch().map(|_| ()));
        }
        (KeyCode::Char('n'), _) => app.enter_input(InputPurpose::CreateProfile),
        (KeyCode::Char('i'), _) => app.enter_input(InputPurpose::ImportProfile),
        (KeyCode::Char('e'), _) => match app.selected_profile_name() {
            Some(profile) => app.enter_input(InputPurpose::ExportProfile { profile }),
            None => app.status = "No profile selected".to_string(),
        },
        (KeyCode::Char('f'), _) => app.enter_input(InputPurpose::InstallFolder),
        (KeyCode::Char('g'), _) => app.enter_input(InputPurpose::GraphicsSettingsPath),
        (KeyCode::PageUp, _) => app.log_scroll = app.log_scroll.saturating_add(1),
        (KeyCode::PageDown, _) => app.log_scroll = app.log_scroll.saturating_sub(1),
        _ => match app.focus {
            Focus::Profiles => handle_profiles_mode(app, key),
            Focus::Settings => handle_settings_mode(app, key),
        },
    }
}

fn handle_profiles_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(true),
        KeyCode::Enter | KeyCode::Char(' ') => {
            if let Some(name) = app.selected_profile_name() {
                app.run_action("Select profile", |app| app.select_profile(&name));
            }
        }
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete_selected(),
        KeyCode::Right => app.focus = Focus::Settings,
        _ => {}
    }
}

fn handle_settings_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(true),
        KeyCode::Right | KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('l') => {
            app.run_action("Change setting", |app| app.adjust_field(true));
        }
        KeyCode::Left | KeyCode::Char('h') => {
            if app.selected_field() == Field::InstallFolder {
                app.focus = Focus::Profiles;
            } else {
                app.run_action("Change setting", |app| app.adjust_field(false));
            }
        }
        _ => {}
    }
}

fn handle_input_mode(
    app: &mut App,
    key: KeyEvent,
    buffer: &mut String,
    purpose: InputPurpose,
    prompt: String,
) {
    let mut keep_editing = true;
    match key.code {
        KeyCode::Esc => {
            keep_editing = false;
            app.status = match &purpose {
                InputPurpose::CreateProfile => "Create profile cancelled".to_string(),
                InputPurpose::ImportProfile => "Import cancelled".to_string(),
                InputPurpose::ExportProfile { profile } => format!("Export cancelled: {profile}"),
                InputPurpose::InstallFolder => "Install folder unchanged".to_string(),
                InputPurpose::GraphicsSettingsPath => "settings.xml location unchanged".to_string(),
            };
        }
        KeyCode::Enter => {
            keep_editing = false;
            let value = buffer.trim().to_string();
            if !value.is_empty() || purpose == InputPurpose::GraphicsSettingsPath {
                app.handle_submit(purpose.clone(), value);
            }
        }
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL)
                || key.modifiers.contains(KeyModifiers::ALT)
            {
                return restore_input(app, prompt, buffer, purpose);
            }
            buffer.push(c);
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        _ => {}
    }

    if keep_editing {
        restore_input(app, prompt, buffer, purpose);
    }
}

fn restore_input(app: &mut App, prompt: String, buffer: &str, purpose: InputPurpose) {
    app.input_mode = InputMode::Editing {
        prompt,
        buffer: buffer.to_string(),
        purpose,
    };
}

fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.size();
    let theme = Theme::new();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(LOG_PANEL_HEIGHT),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(build_header(app, &theme), chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(PROFILE_PANEL_WIDTH), Constraint::Min(30)])
        .split(chunks[1]);

    draw_profiles(frame, app, &theme, body[0]);
    draw_settings(frame, app, &theme, body[1]);

    let log_height = chunks[2].height.saturating_sub(2) as usize;
    let logs = Paragraph::new(build_log_lines(app, &theme, log_height))
        .style(Style::default().bg(theme.log_bg))
        .block(theme.panel("Log", false));
    frame.render_widget(logs, chunks[2]);

    let status = Paragraph::new(status_bar_line(app, chunks[3].width))
        .style(Style::default().fg(theme.text).bg(theme.header_bg));
    frame.render_widget(status, chunks[3]);

    draw_dialog(frame, app, &theme);
}

fn build_header(app: &App, theme: &Theme) -> Paragraph<'static> {
    let folder = if app.state.has_install_folder() {
        app.state.install_folder().display().to_string()
    } else {
        "(not set)".to_string()
    };
    Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                "alt:V Easy Launch",
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                format!("v{}", env!("CARGO_PKG_VERSION")),
                Style::default().fg(theme.muted),
            ),
        ]),
        Line::from(vec![
            Span::styled("Profile: ", Style::default().fg(theme.muted)),
            Span::styled(app.active_profile_label(), Style::default().fg(theme.accent)),
            Span::raw("   "),
            Span::styled("Folder: ", Style::default().fg(theme.muted)),
            Span::styled(folder, Style::default().fg(theme.text)),
        ]),
    ])
    .style(Style::default().bg(theme.header_bg))
    .alignment(Alignment::Center)
}

fn draw_profiles(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let focused = app.focus == Focus::Profiles;
    let names = app.profile_names();
    if names.is_empty() {
        let empty = Paragraph::new("No profiles.\nPress n to create one.")
            .style(Style::default().fg(theme.muted))
            .block(theme.panel("Profiles", focused))
            .alignment(Alignment::Center);
        frame.render_widget(empty, area);
        return;
    }

    let active = app.state.active_profile_name();
    let items: Vec<ListItem> = names
        .iter()
        .map(|name| {
            let is_active = active == Some(name.as_str());
            let marker = if is_active { "● " } else { "  " };
            let style = if is_active {
                Style::default().fg(theme.success).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.text)
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(theme.success)),
                Span::styled(name.clone(), style),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(theme.panel("Profiles", focused))
        .highlight_style(highlight_style(theme, focused));
    let mut state = ListState::default();
    state.select(Some(app.profile_selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_settings(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let focused = app.focus == Focus::Settings;
    let profile = app.state.active_profile();
    let items: Vec<ListItem> = Field::all()
        .into_iter()
        .map(|field| {
            let value = match (field, profile) {
                (Field::InstallFolder, _) => {
                    if app.state.has_install_folder() {
                        app.state.install_folder().display().to_string()
                    } else {
                        "(not set)".to_string()
                    }
                }
                (_, None) => "-".to_string(),
                (Field::Branch, Some(profile)) => profile.branch.as_str().to_string(),
                (Field::DebugMode, Some(profile)) => {
                    let mark = if profile.debug_mode { "[x]" } else { "[ ]" };
                    mark.to_string()
                }
                (Field::Graphics(setting), Some(profile)) => {
                    profile.graphics_value(setting).to_string()
                }
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<24}", field.label()), Style::default().fg(theme.muted)),
                Span::styled(value, Style::default().fg(theme.text)),
            ]))
        })
        .collect();

    let title = if profile.is_some() {
        "Settings"
    } else {
        "Settings (no active profile)"
    };
    let list = List::new(items)
        .block(theme.panel(title, focused))
        .highlight_style(highlight_style(theme, focused));
    let mut state = ListState::default();
    state.select(Some(app.field_selected));
    frame.render_stateful_widget(list, area, &mut state);
}

fn highlight_style(theme: &Theme, focused: bool) -> Style {
    if focused {
        Style::default()
            .bg(theme.accent_soft)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.accent)
    }
}

fn status_bar_line(app: &App, width: u16) -> String {
    let width = width as usize;
    let (left, right) = match &app.input_mode {
        InputMode::Normal => (format!("Status: {}", app.status), app.hint().to_string()),
        InputMode::Editing { prompt, buffer, .. } => (
            format!("{prompt}: {buffer}_"),
            "Enter confirm | Esc cancel".to_string(),
        ),
    };

    if width == 0 {
        return String::new();
    }

    let left_len = left.chars().count();
    let right_len = right.chars().count();
    if left_len + right_len + 1 > width {
        let available = width.saturating_sub(left_len + 1);
        let trimmed_right: String = right.chars().take(available).collect();
        return format!("{left} {trimmed_right}");
    }

    let spaces = width - left_len - right_len;
    format!("{left}{}{right}", " ".repeat(spaces))
}

fn build_log_lines(app: &App, theme: &Theme, height: usize) -> Vec<Line<'static>> {
    if height == 0 {
        return Vec::new();
    }
    if app.logs.is_empty() {
        return vec![Line::from(Span::styled(
            "Nothing logged yet.",
            Style::default().fg(theme.muted),
        ))];
    }

    // `log_scroll` counts entries hidden below the window.
    let hidden_below = app.log_scroll.min(app.logs.len().saturating_sub(height));
    let skip = app.logs.len().saturating_sub(height + hidden_below);
    let clock = format_description!("[hour]:[minute]:[second]");

    app.logs
        .iter()
        .skip(skip)
        .take(height)
        .map(|entry| {
            let color = match entry.level {
                LogLevel::Info => theme.accent,
                LogLevel::Warn => theme.warning,
                LogLevel::Error => theme.error,
            };
            let time = entry.at.format(clock).unwrap_or_default();
            Line::from(vec![
                Span::styled(time, Style::default().fg(theme.muted)),
                Span::raw(" "),
                Span::styled(
                    format!("{:<5}", entry.level.label()),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::styled(entry.message.clone(), Style::default().fg(theme.text)),
            ])
        })
        .collect()
}

fn draw_dialog(frame: &mut Frame<'_>, app: &App, theme: &Theme) {
    let Some(dialog) = &app.dialog else {
        return;
    };

    let area = frame.size();
    let message_lines: Vec<Line> = dialog
        .message
        .lines()
        .map(|line| Line::from(line.to_string()))
        .collect();
    let content_height = message_lines.len().max(1) as u16;
    let height = (content_height + 6).clamp(7, area.height.saturating_sub(2).max(7));
    let width = area.width.saturating_mul(2) / 3;
    let width = width.clamp(34, area.width.saturating_sub(2).max(34));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let dialog_area = Rect::new(x, y, width.min(area.width), height.min(area.height));

    let yes_selected = dialog.choice == DialogChoice::Yes;
    let yes_style = if yes_selected {
        Style::default()
            .fg(Color::Black)
            .bg(theme.error)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };
    let no_style = if !yes_selected {
        Style::default()
            .fg(Color::Black)
            .bg(theme.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };

    let mut lines = vec![
        Line::from(Span::styled(
            dialog.title.clone(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(message_lines);
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(format!(" {} ", dialog.yes_label), yes_style),
        Span::raw("   "),
        Span::styled(format!(" {} ", dialog.no_label), no_style),
    ]));

    frame.render_widget(Clear, dialog_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.accent_soft))
        .style(Style::default().bg(theme.header_bg));
    let widget = Paragraph::new(lines)
        .block(block)
        .style(Style::default().fg(theme.text))
        .alignment(Alignment::Center);
    frame.render_widget(widget, dialog_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::LauncherConfig, app::StartupMode, store::ProfileStore};
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            handle_key(app, key(KeyCode::Char(ch)));
        }
    }

    fn test_app(dir: &std::path::Path) -> App {
        let config = LauncherConfig::load_or_create_in(dir).unwrap();
        let store = ProfileStore::new(config.settings_path());
        App::with_config(StartupMode::Ui, config, store).unwrap()
    }

    #[test]
    fn creating_a_profile_from_the_keyboard() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        handle_key(&mut app, key(KeyCode::Char('n')));
        type_text(&mut app, "Racing");
        handle_key(&mut app, key(KeyCode::Enter));

        assert!(matches!(app.input_mode, InputMode::Normal));
        assert_eq!(app.state.active_profile_name(), Some("Racing"));
    }

    #[test]
    fn escape_cancels_input_without_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        handle_key(&mut app, key(KeyCode::Char('n')));
        type_text(&mut app, "Nope");
        handle_key(&mut app, key(KeyCode::Esc));

        assert!(app.state.profiles().is_empty());
        assert_eq!(app.status, "Create profile cancelled");
        assert!(!app.should_quit);
    }

    #[test]
    fn launch_key_reports_missing_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        handle_key(&mut app, key(KeyCode::F(5)));
        assert!(app.status.contains("No active profile"));
        assert!(!app.should_quit);
    }

    #[test]
    fn status_bar_fits_the_width() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let line = status_bar_line(&app, 200);
        assert_eq!(line.chars().count(), 200);
        assert!(line.starts_with("Status: "));
    }

    #[test]
    fn log_panel_shows_the_newest_entries_unless_scrolled() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.logs.clear();
        for index in 0..5 {
            app.log_info(format!("event {index}"));
        }
        let theme = Theme::new();
        let text = |lines: Vec<Line<'static>>| -> Vec<String> {
            lines
                .iter()
                .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
                .collect()
        };

        let newest = text(build_log_lines(&app, &theme, 2));
        assert_eq!(newest.len(), 2);
        assert!(newest[0].ends_with("INFO  event 3"), "{newest:?}");
        assert!(newest[1].ends_with("INFO  event 4"), "{newest:?}");

        app.log_scroll = 10;
        let oldest = text(build_log_lines(&app, &theme, 2));
        assert!(oldest[0].ends_with("event 0"), "{oldest:?}");
        assert!(oldest[1].ends_with("event 1"), "{oldest:?}");
    }

}
