use crate::{
    addon::{self, Addon, HealthStatus},
    app::{
        login_field_label, App, DialogChoice, InputMode, InputPurpose, LogLevel, LoginField,
        LoginMode, Screen, ToastLevel,
    },
};
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Cell, Clear, Padding, Paragraph, Row, Table, TableState, Wrap,
    },
};
use std::{
    io,
    time::{Duration, Instant},
};

const SIDE_PANEL_WIDTH: u16 = 44;

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
            accent: Color::Rgb(130, 180, 255),
            accent_soft: Color::Rgb(70, 105, 160),
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

    fn block(&self, title: &'static str) -> Block<'static> {
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
    }

    fn panel(&self, title: &'static str) -> Block<'static> {
        self.block(title).padding(Padding {
            left: 1,
            right: 1,
            top: 1,
            bottom: 0,
        })
    }

    fn panel_dense(&self, title: &'static str) -> Block<'static> {
        self.block(title).padding(Padding {
            left: 0,
            right: 1,
            top: 1,
            bottom: 0,
        })
    }

    fn toast_colors(&self, level: ToastLevel) -> (Color, Color) {
        match level {
            ToastLevel::Info => (self.accent, self.text),
            ToastLevel::Success => (self.success, self.text),
            ToastLevel::Warn => (self.warning, self.text),
            ToastLevel::Error => (self.error, self.text),
        }
    }
}

pub fn run(app: &mut App) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        app.clamp_selection();
        terminal.draw(|frame| draw(frame, app))?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(200))? {
            match event::read()? {
                Event::Key(key) => {
                    handle_key(app, key)?;
                }
                Event::Paste(text) => handle_paste(app, text),
                _ => {}
            }
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    if app.help_open {
        app.help_open = false;
        return Ok(());
    }
    if app.dialog.is_some() {
        handle_dialog_mode(app, key);
        return Ok(());
    }

    let mode = std::mem::replace(&mut app.input_mode, InputMode::Normal);
    match mode {
        InputMode::Normal => {
            app.input_mode = InputMode::Normal;
            match app.screen {
                Screen::Login => handle_login_screen(app, key),
                Screen::Main => handle_main_screen(app, key),
            }
            Ok(())
        }
        InputMode::Editing {
            prompt,
            mut buffer,
            purpose,
            mut last_edit_at,
        } => handle_input_mode(app, key, &mut buffer, purpose, prompt, &mut last_edit_at),
    }
}

fn handle_dialog_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::Char('h') | KeyCode::Char('l') => {
            app.dialog_toggle_choice();
        }
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            app.dialog_set_choice(DialogChoice::Yes);
        }
        KeyCode::Char('n') | KeyCode::Char('N') => {
            app.dialog_set_choice(DialogChoice::No);
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.dialog_confirm();
        }
        KeyCode::Esc => {
            app.dialog_set_choice(DialogChoice::No);
            app.dialog_confirm();
        }
        _ => {}
    }
}

fn handle_login_screen(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Char('t') => app.login_form.cycle_mode(),
            KeyCode::Char('b') => app.enter_api_base_url(),
            KeyCode::Char('u') => app.login_form.buffer_mut().clear(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::F(2) => app.login_form.cycle_mode(),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
            app.login_form.cycle_focus()
        }
        KeyCode::Enter => app.start_login(),
        KeyCode::Backspace => {
            app.login_form.buffer_mut().pop();
        }
        KeyCode::Char(c) => {
            app.login_form.buffer_mut().push(c);
        }
        _ => {}
    }
}

fn handle_main_screen(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => app.should_quit = true,
            KeyCode::Char('b') => app.enter_api_base_url(),
            _ => {}
        }
        return;
    }

    if app.move_mode {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => app.move_selected(-1),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => app.move_selected(1),
            KeyCode::Char('g') => app.move_selected_top(),
            KeyCode::Char('G') => app.move_selected_bottom(),
            KeyCode::Enter | KeyCode::Char('m') => app.exit_move_mode(true),
            KeyCode::Esc => app.exit_move_mode(false),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.help_open = true,
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Char('K') => {
            if app.selected > 0 {
                app.selected -= 1;
            }
        }
        KeyCode::Down | KeyCode::Char('j') | KeyCode::Char('J') => {
            app.selected += 1;
            app.clamp_selection();
        }
        KeyCode::Char('g') => app.selected = 0,
        KeyCode::Char('G') => {
            app.selected = app.visible_indices().len().saturating_sub(1);
        }
        KeyCode::Char(' ') => app.toggle_enabled(),
        KeyCode::Char('l') => app.toggle_update_lock(),
        KeyCode::Char('v') => app.toggle_selected_mark(),
        KeyCode::Char('V') => app.toggle_select_all(),
        KeyCode::Char('e') => app.enable_selected(),
        KeyCode::Char('E') => app.disable_selected(),
        KeyCode::Char('a') | KeyCode::Char('A') => app.enter_add_addon(),
        KeyCode::Char('r') => app.start_rename(),
        KeyCode::Char('t') | KeyCode::Char('T') => app.start_edit_url(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_remove_selected_entry(),
        KeyCode::Char('D') => app.request_remove_marked(),
        KeyCode::Char('u') => app.undo(),
        KeyCode::Char('U') => app.redo(),
        KeyCode::Char('s') | KeyCode::Char('S') => app.save_order(),
        KeyCode::Char('R') => app.refresh_addons(),
        KeyCode::Char('f') | KeyCode::Char('F') => app.cycle_filter(),
        KeyCode::Char('/') => app.enter_search(),
        KeyCode::Esc => app.clear_search(),
        KeyCode::Char('m') | KeyCode::Char('M') => app.enter_move_mode(),
        KeyCode::Enter => app.toggle_details(),
        KeyCode::Char('h') | KeyCode::Char('H') => app.check_all_status(),
        KeyCode::Char('p') | KeyCode::Char('P') => app.speed_test(),
        KeyCode::Char('w') => app.run_auto_update(true),
        KeyCode::Char('W') => app.toggle_auto_update_enabled(),
        KeyCode::Char('i') | KeyCode::Char('I') => app.enter_import_mode(),
        KeyCode::Char('b') => app.enter_export_backup(),
        KeyCode::Char('B') => app.enter_export_list(),
        KeyCode::Char('c') => app.copy_manifest_url(),
        KeyCode::Char('o') | KeyCode::Char('O') => app.open_configure(),
        KeyCode::Char('L') => app.request_logout(),
        KeyCode::PageUp => app.scroll_log_up(3),
        KeyCode::PageDown => app.scroll_log_down(3),
        _ => {}
    }
}

fn handle_input_mode(
    app: &mut App,
    key: KeyEvent,
    buffer: &mut String,
    purpose: InputPurpose,
    prompt: String,
    last_edit_at: &mut Instant,
) -> Result<()> {
    let mut keep_editing = true;
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            keep_editing = false;
            if purpose == InputPurpose::SearchAddons {
                // Search applies as it is typed; leaving the prompt keeps
                // whatever is in the buffer as the active query.
                app.handle_submit(purpose.clone(), buffer.clone())?;
            } else {
                app.set_toast("Cancelled", ToastLevel::Warn);
            }
        }
        KeyCode::Enter => {
            let value = buffer.trim().to_string();
            app.input_mode = InputMode::Normal;
            keep_editing = false;
            let submit_empty = purpose == InputPurpose::SearchAddons;
            if !value.is_empty() || submit_empty {
                if let Err(err) = app.handle_submit(purpose.clone(), value) {
                    app.status = format!("Action failed: {err}");
                    app.log_error(format!("Action failed: {err}"));
                }
            }
        }
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL)
                || key.modifiers.contains(KeyModifiers::ALT)
            {
                if key.modifiers.contains(KeyModifiers::CONTROL) && c == 'u' {
                    buffer.clear();
                    *last_edit_at = Instant::now();
                } else {
                    return Ok(());
                }
            } else {
                buffer.push(c);
                *last_edit_at = Instant::now();
            }
        }
        KeyCode::Backspace => {
            buffer.pop();
            *last_edit_at = Instant::now();
        }
        _ => {}
    }

    if keep_editing {
        app.input_mode = InputMode::Editing {
            prompt,
            buffer: buffer.clone(),
            purpose,
            last_edit_at: *last_edit_at,
        };
    }

    Ok(())
}

fn handle_paste(app: &mut App, text: String) {
    let trimmed = text.trim().to_string();
    if trimmed.is_empty() || app.dialog.is_some() {
        return;
    }

    if let InputMode::Editing {
        buffer,
        last_edit_at,
        ..
    } = &mut app.input_mode
    {
        buffer.push_str(&trimmed);
        *last_edit_at = Instant::now();
        return;
    }

    if app.screen == Screen::Login {
        app.login_form.buffer_mut().push_str(&trimmed);
        return;
    }

    // A URL pasted over the list starts the add flow with it prefilled.
    if trimmed.starts_with("http") {
        app.enter_add_addon();
        if let InputMode::Editing {
            buffer,
            last_edit_at,
            ..
        } = &mut app.input_mode
        {
            buffer.push_str(&trimmed);
            *last_edit_at = Instant::now();
        }
    }
}

fn draw(frame: &mut Frame<'_>, app: &App) {
    let theme = Theme::new();
    match app.screen {
        Screen::Login => draw_login(frame, app, &theme),
        Screen::Main => draw_main(frame, app, &theme),
    }

    if app.help_open {
        draw_help(frame, &theme);
    }
    if app.dialog.is_some() {
        draw_dialog(frame, app, &theme);
    }
    draw_toast(frame, app, &theme, frame.size());
}

fn draw_login(frame: &mut Frame<'_>, app: &App, theme: &Theme) {
    let area = frame.size();
    let width = 56u16.min(area.width.saturating_sub(2)).max(30);
    let height = 14u16.min(area.height.saturating_sub(2)).max(10);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let panel_area = Rect::new(x, y, width, height);

    let mode_label = match app.login_form.mode {
        LoginMode::Password => "Email + password",
        LoginMode::Token => "Auth token",
        LoginMode::Monitor => "Monitor (read-only)",
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Mode: ", Style::default().fg(theme.muted)),
            Span::styled(
                mode_label,
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  (F2 to switch)", Style::default().fg(theme.muted)),
        ]),
        Line::from(""),
    ];

    for field in app.login_form.fields() {
        let focused = *field == app.login_form.focus;
        let marker = if focused { "> " } else { "  " };
        let value = app.login_form.field_value(*field);
        let shown = if is_secret_field(*field) {
            "*".repeat(value.chars().count())
        } else {
            value.to_string()
        };
        let label_style = if focused {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.muted)
        };
        lines.push(Line::from(vec![
            Span::styled(marker.to_string(), label_style),
            Span::styled(format!("{}: ", login_field_label(*field)), label_style),
            Span::styled(shown, Style::default().fg(theme.text)),
            if focused {
                Span::styled("_", Style::default().fg(theme.accent))
            } else {
                Span::raw("")
            },
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Server: {}", app.config.api_base_url),
        Style::default().fg(theme.muted),
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter login | Tab next field | Ctrl+B server URL | Esc quit",
        Style::default().fg(theme.muted),
    )));
    if app.is_busy() {
        lines.push(Line::from(Span::styled(
            "Logging in...",
            Style::default().fg(theme.warning),
        )));
    }

    let panel = Paragraph::new(lines)
        .style(Style::default().fg(theme.text))
        .block(theme.panel("StreamSmith Login"));
    frame.render_widget(Clear, panel_area);
    frame.render_widget(panel, panel_area);
}

fn is_secret_field(field: LoginField) -> bool {
    matches!(
        field,
        LoginField::Password | LoginField::AuthKey | LoginField::AdminKey
    )
}

fn draw_main(frame: &mut Frame<'_>, app: &App, theme: &Theme) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(11),
        ])
        .split(area);

    draw_header(frame, app, theme, chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(SIDE_PANEL_WIDTH)])
        .split(chunks[1]);

    draw_addon_table(frame, app, theme, body_chunks[0]);
    draw_details(frame, app, theme, body_chunks[1]);

    let footer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Length(7)])
        .split(chunks[2]);

    let status_block = theme.panel("Status");
    let status_inner = status_block.inner(footer_chunks[0]);
    let footer = Paragraph::new(status_bar_line(app, status_inner.width))
        .style(Style::default().fg(theme.text))
        .block(status_block);
    frame.render_widget(footer, footer_chunks[0]);

    let log_area = footer_chunks[1];
    let log_block = theme.panel("Log").style(Style::default().bg(theme.log_bg));
    let log_inner = log_block.inner(log_area);
    let log_lines = build_log_lines(app, theme, log_inner.height as usize);
    let log = Paragraph::new(log_lines)
        .style(Style::default().fg(theme.text).bg(theme.log_bg))
        .block(log_block);
    frame.render_widget(log, log_area);
}

fn draw_header(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let counts = app.counts();
    let mut title_spans = vec![
        Span::styled(
            "StreamSmith",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(app.email.clone(), Style::default().fg(theme.text)),
    ];
    if app.monitoring {
        title_spans.push(Span::styled(
            "  MONITOR",
            Style::default()
                .fg(theme.warning)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if app.move_mode {
        title_spans.push(Span::styled(
            "  MOVE",
            Style::default()
                .fg(theme.warning)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if app.has_unsaved_changes() {
        title_spans.push(Span::styled(
            "  * unsaved",
            Style::default().fg(theme.warning),
        ));
    }

    let mut info_spans = vec![
        Span::styled("Addons: ", Style::default().fg(theme.muted)),
        Span::styled(counts.total.to_string(), Style::default().fg(theme.text)),
        Span::raw("   "),
        Span::styled("Enabled: ", Style::default().fg(theme.muted)),
        Span::styled(
            counts.enabled.to_string(),
            Style::default()
                .fg(theme.success)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled("Disabled: ", Style::default().fg(theme.muted)),
        Span::styled(counts.disabled.to_string(), Style::default().fg(theme.muted)),
        Span::raw("   "),
        Span::styled("Filter: ", Style::default().fg(theme.muted)),
        Span::styled(app.filter.label(), Style::default().fg(theme.accent)),
    ];
    if counts.errors > 0 {
        info_spans.push(Span::raw("   "));
        info_spans.push(Span::styled("Errors: ", Style::default().fg(theme.muted)));
        info_spans.push(Span::styled(
            counts.errors.to_string(),
            Style::default().fg(theme.error),
        ));
    }
    if app.history.can_undo() {
        info_spans.push(Span::raw("   "));
        info_spans.push(Span::styled("Undo: ", Style::default().fg(theme.muted)));
        info_spans.push(Span::styled(
            app.history.undo_depth().to_string(),
            Style::default().fg(theme.text),
        ));
    }
    if app.history.can_redo() {
        info_spans.push(Span::styled(
            " (+redo)",
            Style::default().fg(theme.muted),
        ));
    }
    if counts.selected > 0 {
        info_spans.push(Span::raw("   "));
        info_spans.push(Span::styled("Marked: ", Style::default().fg(theme.muted)));
        info_spans.push(Span::styled(
            counts.selected.to_string(),
            Style::default().fg(theme.warning),
        ));
    }
    if !app.search_query.is_empty() {
        info_spans.push(Span::raw("   "));
        info_spans.push(Span::styled("Search: ", Style::default().fg(theme.muted)));
        info_spans.push(Span::styled(
            app.search_query.clone(),
            Style::default().fg(theme.accent),
        ));
    }
    info_spans.push(Span::raw("   "));
    info_spans.push(Span::styled(
        if app.config.auto_update_enabled {
            "Auto-update: On"
        } else {
            "Auto-update: Off"
        },
        Style::default().fg(theme.muted),
    ));

    let header = Paragraph::new(vec![Line::from(title_spans), Line::from(info_spans)])
        .style(Style::default().bg(theme.header_bg))
        .alignment(Alignment::Center);
    frame.render_widget(header, area);
}

fn draw_addon_table(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let visible = app.visible_indices();

    if visible.is_empty() {
        let message = if app.addons.is_empty() {
            "No addons. Press a to add one, R to refresh from the server."
        } else {
            "No addons match the current filter."
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(theme.muted))
            .block(theme.panel_dense("Addons"))
            .alignment(Alignment::Center);
        frame.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = visible
        .iter()
        .map(|&index| addon_row(&app.addons[index], index, theme))
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(16),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec![
            Cell::from("Sel"),
            Cell::from("On"),
            Cell::from("HP"),
            Cell::from("Upd"),
            Cell::from("Addon"),
            Cell::from("Version"),
        ])
        .style(Style::default().fg(theme.text).add_modifier(Modifier::BOLD)),
    )
    .column_spacing(1)
    .block(theme.panel_dense("Addons"))
    .highlight_style(
        Style::default()
            .bg(theme.accent_soft)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol(">");

    let mut state = TableState::default();
    state.select(Some(app.selected.min(visible.len().saturating_sub(1))));
    frame.render_stateful_widget(table, area, &mut state);
}

fn addon_row<'a>(addon: &Addon, index: usize, theme: &Theme) -> Row<'a> {
    let mark = if addon.selected { "[*]" } else { "[ ]" };
    let on = if addon.is_enabled { "[x]" } else { "[ ]" };
    let health = match addon.status {
        HealthStatus::Unchecked => Cell::from("-").style(Style::default().fg(theme.muted)),
        HealthStatus::Checking => Cell::from("?").style(Style::default().fg(theme.warning)),
        HealthStatus::Ok => Cell::from("+").style(Style::default().fg(theme.success)),
        HealthStatus::Error => Cell::from("x").style(Style::default().fg(theme.error)),
    };
    let lock = if addon.disable_auto_update {
        Cell::from("off").style(Style::default().fg(theme.warning))
    } else {
        Cell::from("on").style(Style::default().fg(theme.muted))
    };

    let name_style = if !addon.is_enabled {
        Style::default().fg(theme.muted)
    } else if addon.status == HealthStatus::Error {
        Style::default().fg(theme.error)
    } else {
        Style::default().fg(theme.text)
    };
    let name = format!("{:>3}. {}", index + 1, addon.display_name());

    Row::new(vec![
        Cell::from(mark.to_string()).style(Style::default().fg(theme.warning)),
        Cell::from(on.to_string()).style(Style::default().fg(if addon.is_enabled {
            theme.success
        } else {
            theme.muted
        })),
        health,
        lock,
        Cell::from(name).style(name_style),
        Cell::from(addon.manifest.version.clone()).style(Style::default().fg(theme.muted)),
    ])
}

fn draw_details(frame: &mut Frame<'_>, app: &App, theme: &Theme, area: Rect) {
    let details_block = theme.panel("Details");
    let lines = match app.selected_addon() {
        Some(addon) => build_details(addon, theme),
        None => vec![Line::from(Span::styled(
            "Nothing selected.",
            Style::default().fg(theme.muted),
        ))],
    };
    let details = Paragraph::new(lines)
        .style(Style::default().fg(theme.text))
        .block(details_block)
        .wrap(Wrap { trim: false });
    frame.render_widget(details, area);
}

fn build_details(addon: &Addon, theme: &Theme) -> Vec<Line<'static>> {
    let muted = Style::default().fg(theme.muted);
    let text = Style::default().fg(theme.text);

    let mut lines = vec![
        Line::from(Span::styled(
            addon.display_name().to_string(),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("Version: ", muted),
            Span::styled(addon.manifest.version.clone(), text),
        ]),
        Line::from(vec![
            Span::styled("Id: ", muted),
            Span::styled(addon.manifest.id.clone(), text),
        ]),
        Line::from(vec![
            Span::styled("Types: ", muted),
            Span::styled(addon.manifest.types.join(", "), text),
        ]),
        Line::from(vec![
            Span::styled("Resources: ", muted),
            Span::styled(addon.manifest.resource_names(), text),
        ]),
        Line::from(vec![
            Span::styled("URL: ", muted),
            Span::styled(addon.transport_url.clone(), text),
        ]),
        Line::from(vec![
            Span::styled("Configure: ", muted),
            Span::styled(addon::configure_url(&addon.transport_url), text),
        ]),
    ];

    match addon.status {
        HealthStatus::Unchecked => {}
        HealthStatus::Checking => lines.push(Line::from(Span::styled(
            "Health: checking...",
            Style::default().fg(theme.warning),
        ))),
        HealthStatus::Ok => lines.push(Line::from(Span::styled(
            "Health: ok",
            Style::default().fg(theme.success),
        ))),
        HealthStatus::Error => {
            let details = addon
                .error_details
                .clone()
                .unwrap_or_else(|| "check failed".to_string());
            lines.push(Line::from(Span::styled(
                format!("Health: {details}"),
                Style::default().fg(theme.error),
            )));
        }
    }

    if addon.is_expanded {
        lines.push(Line::from(""));
        if let Some(description) = &addon.manifest.description {
            lines.push(Line::from(Span::styled(description.clone(), muted)));
            lines.push(Line::from(""));
        }
        if addon.is_loading_github {
            lines.push(Line::from(Span::styled(
                "GitHub: loading...",
                Style::default().fg(theme.warning),
            )));
        } else if let Some(info) = &addon.github_info {
            lines.push(Line::from(vec![
                Span::styled("GitHub: ", muted),
                Span::styled(
                    format!(
                        "{} stars, {} forks, {} issues",
                        info.stars, info.forks, info.issues
                    ),
                    text,
                ),
            ]));
            lines.push(Line::from(Span::styled(info.url.clone(), muted)));
        } else if let Some(err) = &addon.github_error {
            lines.push(Line::from(Span::styled(
                format!("GitHub: {err}"),
                Style::default().fg(theme.error),
            )));
        }
    } else {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Enter for description and GitHub info",
            muted,
        )));
    }

    lines
}

fn status_bar_line(app: &App, width: u16) -> String {
    let width = width as usize;
    let (left, right) = match &app.input_mode {
        InputMode::Normal => (format!("Status: {}", app.status), app.hint().to_string()),
        InputMode::Editing { prompt, buffer, .. } => (
            format!("{prompt}: {buffer}"),
            "Enter confirm | Esc cancel".to_string(),
        ),
    };

    if width == 0 {
        return String::new();
    }

    if left.len() + right.len() + 1 > width {
        let available = width.saturating_sub(left.len() + 1);
        let mut trimmed_right = right;
        if trimmed_right.len() > available {
            trimmed_right.truncate(available);
        }
        return format!("{left} {}", trimmed_right);
    }

    let spaces = width - left.len() - right.len();
    format!("{left}{}{}", " ".repeat(spaces), right)
}

fn build_log_lines(app: &App, theme: &Theme, height: usize) -> Vec<Line<'static>> {
    if height == 0 {
        return Vec::new();
    }

    if app.logs.is_empty() {
        return vec![Line::from(Span::styled(
            "No recent events.",
            Style::default().fg(theme.muted),
        ))];
    }

    let total = app.logs.len();
    let view = height.max(1);
    let max_scroll = total.saturating_sub(view);
    let scroll = app.log_scroll.min(max_scroll);
    let start = total.saturating_sub(view + scroll);
    let end = (start + view).min(total);

    app.logs[start..end]
        .iter()
        .map(|entry| {
            let (label, color) = match entry.level {
                LogLevel::Info => ("[i]", theme.accent),
                LogLevel::Warn => ("[!]", theme.warning),
                LogLevel::Error => ("[x]", theme.error),
            };
            Line::from(vec![
                Span::styled(
                    label,
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
    let mut height = content_height + 6;
    if height < 7 {
        height = 7;
    }
    if height > area.height.saturating_sub(2) {
        height = area.height.saturating_sub(2);
    }
    let width = area.width.saturating_mul(2) / 3;
    let width = width.clamp(34, area.width.saturating_sub(2).max(34));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let dialog_area = Rect::new(x, y, width, height);

    let yes_selected = matches!(dialog.choice, DialogChoice::Yes);
    let yes_style = if yes_selected {
        Style::default()
            .fg(Color::Black)
            .bg(theme.accent)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };
    let no_style = if !yes_selected {
        Style::default()
            .fg(Color::Black)
            .bg(theme.warning)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };

    let buttons = Line::from(vec![
        Span::raw(" "),
        Span::styled(format!(" {} ", dialog.yes_label), yes_style),
        Span::raw("   "),
        Span::styled(format!(" {} ", dialog.no_label), no_style),
    ]);

    let mut lines = Vec::new();
    lines.push(Line::from(Span::styled(
        dialog.title.clone(),
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
    lines.extend(message_lines);
    lines.push(Line::from(""));
    lines.push(buttons);

    frame.render_widget(Clear, dialog_area);
    let dialog_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.accent_soft))
        .style(Style::default().bg(theme.header_bg));
    let dialog_widget = Paragraph::new(lines)
        .block(dialog_block)
        .style(Style::default().fg(theme.text))
        .alignment(Alignment::Center);
    frame.render_widget(dialog_widget, dialog_area);
}

fn draw_help(frame: &mut Frame<'_>, theme: &Theme) {
    let area = frame.size();
    let width = 62u16.min(area.width.saturating_sub(2));
    let height = 24u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let help_area = Rect::new(x, y, width, height);

    let entries: &[(&str, &str)] = &[
        ("j/k, arrows", "move selection"),
        ("Space", "enable / disable addon"),
        ("m", "move mode (j/k reorder, Enter apply, Esc cancel)"),
        ("a", "add addon by manifest URL"),
        ("r / t", "rename / change transport URL"),
        ("d / D", "remove addon / remove marked"),
        ("v / V", "mark addon / mark all visible"),
        ("e / E", "enable marked / disable marked"),
        ("u / U", "undo / redo"),
        ("s", "save collection to server"),
        ("R", "refresh from server"),
        ("f, /", "cycle filter, search"),
        ("l", "toggle auto-update lock for addon"),
        ("w / W", "run update sweep / toggle auto-update"),
        ("h", "health check all addons"),
        ("p", "speed test selected addon"),
        ("i", "import backup file"),
        ("b / B", "export backup / export plain list"),
        ("c / o", "copy manifest URL / open configure page"),
        ("L", "log out"),
        ("q", "quit"),
    ];

    let mut lines = Vec::new();
    for (key, action) in entries {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{key:>12}  "),
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled((*action).to_string(), Style::default().fg(theme.text)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Press any key to close",
        Style::default().fg(theme.muted),
    )));

    frame.render_widget(Clear, help_area);
    let help = Paragraph::new(lines)
        .style(Style::default().fg(theme.text).bg(theme.header_bg))
        .block(theme.panel("Keys"));
    frame.render_widget(help, help_area);
}

fn mode_toast(app: &App) -> Option<(String, ToastLevel)> {
    if app.dialog.is_some() {
        return None;
    }

    if let InputMode::Editing {
        buffer, purpose, ..
    } = &app.input_mode
    {
        let hint = "Enter confirm | Esc cancel";
        let value = |placeholder: &str| {
            let trimmed = buffer.trim();
            if trimmed.is_empty() {
                placeholder.to_string()
            } else {
                buffer.to_string()
            }
        };
        let message = match purpose {
            InputPurpose::AddAddonUrl => {
                format!("Add addon: {} | {hint}", value("<manifest url>"))
            }
            InputPurpose::RenameAddon { .. } => {
                format!("Rename: {} | {hint}", value("<new name>"))
            }
            InputPurpose::EditTransportUrl { .. } => {
                format!("New URL: {} | {hint}", value("<url>"))
            }
            InputPurpose::ImportPath => format!("Import: {} | {hint}", value("<path>")),
            InputPurpose::ExportBackupPath => {
                format!("Export backup: {} | {hint}", value("<path>"))
            }
            InputPurpose::ExportListPath => format!("Export list: {} | {hint}", value("<path>")),
            InputPurpose::SearchAddons => format!("Search: {} | Esc done", value("<query>")),
            InputPurpose::ApiBaseUrl => format!("Server: {} | {hint}", value("<url>")),
        };
        return Some((message, ToastLevel::Info));
    }

    if app.move_mode {
        return Some((
            "Move mode: j/k reorder | Enter apply | Esc cancel".to_string(),
            ToastLevel::Info,
        ));
    }

    None
}

/// Cuts a message down to `max_chars`, always on a character boundary.
/// Messages carry user-supplied addon names, so byte offsets are not safe
/// truncation points.
fn clip_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut clipped: String = message.chars().take(keep).collect();
    clipped.push_str("...");
    clipped
}

fn render_toast(
    frame: &mut Frame<'_>,
    theme: &Theme,
    body_area: Rect,
    message: &str,
    level: ToastLevel,
) {
    let max_width = body_area.width.saturating_sub(4).max(24);
    let max_text = max_width.saturating_sub(4) as usize;
    let message = clip_message(message, max_text);
    let width = (message.chars().count() as u16 + 4).clamp(24, max_width);
    let height = 3u16;
    let x = body_area.x + (body_area.width.saturating_sub(width)) / 2;
    let y = body_area.y + 1;
    let toast_area = Rect::new(x, y, width, height);

    let (border, text) = theme.toast_colors(level);

    frame.render_widget(Clear, toast_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(theme.header_bg));
    let content = Paragraph::new(message)
        .block(block)
        .style(Style::default().fg(text))
        .alignment(Alignment::Center);
    frame.render_widget(content, toast_area);
}

fn draw_toast(frame: &mut Frame<'_>, app: &App, theme: &Theme, body_area: Rect) {
    if let Some((message, level)) = mode_toast(app) {
        render_toast(frame, theme, body_area, &message, level);
        return;
    }

    let Some(toast) = app.toast.as_ref() else {
        return;
    };
    if toast.expires_at <= Instant::now() {
        return;
    }

    render_toast(frame, theme, body_area, &toast.message, toast.level);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    #[test]
    fn clip_message_cuts_on_char_boundaries() {
        let clipped = clip_message(&"Ä".repeat(20), 10);
        assert_eq!(clipped.chars().count(), 10);
        assert!(clipped.ends_with("..."));

        assert_eq!(clip_message("Saved", 10), "Saved");
        assert_eq!(clip_message("Добавлено", 9), "Добавлено");
    }

    #[test]
    fn toast_renders_long_multibyte_message_on_narrow_terminal() {
        let backend = TestBackend::new(30, 10);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::new();
        let message = format!("Added {}", "Ä".repeat(40));
        terminal
            .draw(|frame| {
                let area = frame.size();
                render_toast(frame, &theme, area, &message, ToastLevel::Success);
            })
            .unwrap();
    }
}
