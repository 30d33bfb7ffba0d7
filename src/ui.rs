use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};

use crate::app::{App, InputMode, MenuView, ResourceView, TextView, View};
use crate::list::{ListItem, ordinal_for};
use crate::message::MessageLevel;
use crate::wizard::{FieldKind, Wizard};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const SELECTED_BG: Color = Color::Rgb(24, 36, 58);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);

pub fn render(frame: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_body(frame, root[1], app);
    render_footer(frame, root[2], app);

    if let Some(wizard) = app.wizard() {
        render_wizard(frame, wizard);
    }
    if let Some(prompt) = app.pending_prompt() {
        render_confirm(frame, prompt);
    }
    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " podnav ", Color::Black, ACCENT, PL_A);
    push_powerline_segment(
        &mut spans,
        format!(" ctx {} ", compact_text(app.context(), 40)),
        Color::White,
        PL_A,
        PL_B,
    );
    push_powerline_segment(
        &mut spans,
        format!(" ns {} ", app.scope()),
        Color::White,
        PL_B,
        BG,
    );
    spans.push(Span::styled(
        format!(" {}", display_cluster_endpoint(app.cluster())),
        Style::default().fg(MUTED).bg(BG),
    ));

    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &mut App) {
    let filtering = app.mode() == InputMode::Filtering;
    let (list_area, filter_area) = if filtering {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);
        (chunks[0], Some(chunks[1]))
    } else {
        (area, None)
    };

    app.set_viewport_height(list_rows_visible(list_area));

    let title = app.breadcrumb();
    match app.view() {
        Some(View::Menu(menu)) => render_menu(frame, list_area, menu, &title),
        Some(View::Resources(view)) => render_resources(frame, list_area, app, view),
        Some(View::Text(text)) => render_text(frame, list_area, text),
        None => {}
    }

    if let Some(filter_area) = filter_area {
        let input = Paragraph::new(Line::from(vec![
            Span::styled("/", Style::default().fg(ACCENT)),
            Span::styled(app.filter().query().to_string(), Style::default().fg(Color::White)),
            Span::styled("█", Style::default().fg(MUTED)),
        ]))
        .block(
            Block::default()
                .title(format!("Filter ({} matches)", app.filter().matched().len()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(WARN))
                .style(Style::default().bg(PANEL)),
        );
        frame.render_widget(input, filter_area);
    }
}

fn render_menu(frame: &mut Frame, area: Rect, menu: &MenuView, title: &str) {
    let rows = menu.list.visible().map(|(_, item)| {
        Row::new(vec![
            Cell::from(ordinal_label(item.ordinal_key())).style(Style::default().fg(WARN)),
            Cell::from(format!("{} {}", item.icon, item.title()))
                .style(Style::default().fg(Color::White)),
            Cell::from(item.description.clone()).style(Style::default().fg(MUTED)),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(24),
            Constraint::Min(10),
        ],
    )
    .block(panel_block(title.to_string(), ACCENT))
    .column_spacing(1)
    .row_highlight_style(
        Style::default()
            .bg(SELECTED_BG)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("› ");

    let mut state = TableState::default();
    state.select(relative_cursor(menu.list.cursor(), menu.list.offset()));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_resources(frame: &mut Frame, area: Rect, app: &App, view: &ResourceView) {
    let mut title = format!(
        "{} ({}/{})",
        view.kind.title(),
        view.list.len(),
        view.total()
    );
    if let Some(query) = &view.applied_filter {
        title.push_str(&format!("  filter: {query}"));
    }
    if !view.list.selected().is_empty() {
        title.push_str(&format!("  {} selected", view.list.selected().len()));
    }
    if app.is_loading() {
        title = format!("{} {title}  loading…", app.spinner_frame());
    }

    if let Some(error) = app.load_error().filter(|_| view.list.is_empty()) {
        let panel = Paragraph::new(Text::from(error.to_string()))
            .wrap(Wrap { trim: false })
            .block(panel_block(format!("{} Error", view.kind.title()), ERROR))
            .style(Style::default().fg(ERROR));
        frame.render_widget(panel, area);
        return;
    }

    let multi = view.list.multi_select();
    let mut headers = vec!["#"];
    if multi {
        headers.push("");
    }
    headers.extend(view.kind.headers().iter().copied());

    let header_row = Row::new(headers.iter().map(|header| {
        Cell::from(header.to_string()).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = view.list.visible().map(|(index, row)| {
        let mut cells = Vec::with_capacity(row.columns.len() + 2);
        cells.push(
            Cell::from(ordinal_label(ordinal_for(index))).style(Style::default().fg(WARN)),
        );
        if multi {
            let mark = if view.list.selected().contains(&index) {
                "✓"
            } else {
                " "
            };
            cells.push(Cell::from(mark).style(Style::default().fg(WARN)));
        }
        cells.extend(row.columns.iter().map(|column| {
            Cell::from(column.clone()).style(Style::default().fg(status_color(column)))
        }));
        Row::new(cells)
    });

    let mut constraints = vec![Constraint::Length(1)];
    if multi {
        constraints.push(Constraint::Length(1));
    }
    constraints.extend(column_constraints(view.kind.headers().len()));

    let table = Table::new(rows, constraints)
        .header(header_row)
        .block(panel_block(title, ACCENT))
        .column_spacing(1)
        .row_highlight_style(
            Style::default()
                .bg(SELECTED_BG)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("› ");

    let mut state = TableState::default();
    state.select(relative_cursor(view.list.cursor(), view.list.offset()));
    frame.render_stateful_widget(table, area, &mut state);
}

fn ordinal_label(key: Option<char>) -> String {
    key.map(String::from).unwrap_or_default()
}

fn render_text(frame: &mut Frame, area: Rect, view: &TextView) {
    let highlight = view.title.starts_with("Describe") || view.title.starts_with("Data");
    let lines = view
        .lines
        .iter()
        .skip(view.scroll)
        .take(view.height)
        .map(|line| {
            if highlight {
                highlight_yaml_line(line)
            } else {
                Line::from(Span::styled(line.clone(), Style::default().fg(Color::White)))
            }
        })
        .collect::<Vec<_>>();

    let mut title = format!(
        "{}  [{}-{} of {}]",
        view.title,
        (view.scroll + 1).min(view.lines.len()),
        (view.scroll + view.height).min(view.lines.len()),
        view.lines.len()
    );
    if view.follow_id.is_some() {
        title.push_str("  following");
    }

    let paragraph = Paragraph::new(Text::from(lines)).block(panel_block(
        title,
        if view.follow_id.is_some() { WARN } else { ACCENT },
    ));
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let (mode_label, mode_bg) = match app.mode() {
        InputMode::Browsing => (" nav ", PL_A),
        InputMode::Filtering => (" filter ", WARN),
        InputMode::Wizard => (" wizard ", PL_B),
        InputMode::Confirm => (" confirm ", ERROR),
    };

    let (status_text, status_bg) = match app.status() {
        Some(message) => (
            format!(
                " {} {} ",
                message.at.format("%H:%M:%S"),
                compact_text(&message.text, area.width.saturating_sub(16).max(24) as usize)
            ),
            match message.level {
                MessageLevel::Info => PANEL,
                MessageLevel::Success => PL_A,
                MessageLevel::Error => Color::Rgb(127, 29, 29),
            },
        ),
        None => (" ? for help ".to_string(), PANEL),
    };

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, mode_label, Color::Black, mode_bg, status_bg);
    push_powerline_segment(&mut spans, status_text, Color::White, status_bg, BG);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_confirm(frame: &mut Frame, prompt: &str) {
    let area = centered_rect(50, 20, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            prompt.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
            Span::styled(" confirm   ", Style::default().fg(MUTED)),
            Span::styled("any other key", Style::default().fg(WARN)),
            Span::styled(" cancel", Style::default().fg(MUTED)),
        ]),
    ];
    let popup = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel_block("Confirm (y/N)".to_string(), WARN));
    frame.render_widget(popup, area);
}

fn render_wizard(frame: &mut Frame, wizard: &Wizard) {
    let area = centered_rect(64, 50, frame.area());
    frame.render_widget(Clear, area);

    let step = wizard.current_step();
    let mut lines = vec![
        Line::from(Span::styled(
            format!(
                "Step {}/{}: {}",
                wizard.step() + 1,
                wizard.step_count(),
                step.title
            ),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            step_progress(wizard),
            Style::default().fg(MUTED),
        )),
        Line::from(""),
    ];

    for (index, field) in step.fields.iter().enumerate() {
        let focused = index == wizard.focus();
        let raw = wizard.value(field.name);
        let value = match &field.kind {
            FieldKind::Text { masked: true } => "•".repeat(raw.chars().count()),
            FieldKind::Text { masked: false } => raw.to_string(),
            FieldKind::Choice(_) => format!("‹ {raw} ›"),
        };
        let marker = if focused { "› " } else { "  " };
        let value_style = if focused {
            Style::default().fg(Color::White).bg(SELECTED_BG)
        } else {
            Style::default().fg(Color::White)
        };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(ACCENT)),
            Span::styled(format!("{:<12}", field.label), Style::default().fg(MUTED)),
            Span::styled(value, value_style),
            Span::styled(if focused { "▏" } else { "" }, Style::default().fg(ACCENT)),
        ]));
    }

    lines.push(Line::from(""));
    if let Some(error) = wizard.error() {
        lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(ERROR),
        )));
    } else if wizard.is_submitting() {
        lines.push(Line::from(Span::styled(
            "Submitting…",
            Style::default().fg(WARN),
        )));
    }
    lines.push(Line::from(Span::styled(
        "Enter next · Ctrl-b back · Tab field · ↑/↓ choice · Esc cancel",
        Style::default().fg(MUTED),
    )));

    let popup = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel_block(wizard.title().to_string(), ACCENT));
    frame.render_widget(popup, area);
}

fn step_progress(wizard: &Wizard) -> String {
    (0..wizard.step_count())
        .map(|step| {
            if step == wizard.step() {
                "◉"
            } else if wizard.is_validated(step) {
                "●"
            } else {
                "○"
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "podnav help  mode:{}  scope:{}",
            help_mode_label(app.mode()),
            app.scope()
        )),
        Line::from(""),
    ];
    lines.extend(HELP_LINES.iter().map(|line| Line::from(*line)));

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel_block("Help".to_string(), ACCENT))
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

const HELP_LINES: [&str; 12] = [
    "↑/k ↓/j          move",
    "PgUp/Ctrl-b/u    page up      PgDn/Ctrl-f/d   page down",
    "Home/g End/G     first / last",
    "1-9              pick by number   0/Esc  back",
    "Enter            open / run",
    "/                filter (Enter keep, Esc clear)",
    "space            mark row (pods, secrets, configmaps)",
    "d l f s x        describe, logs, follow, shell, delete",
    "n                create secret",
    "r/F5             reload",
    "?                toggle help",
    "q/Ctrl-c         quit",
];

fn help_mode_label(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Browsing => "browse",
        InputMode::Filtering => "filter",
        InputMode::Wizard => "wizard",
        InputMode::Confirm => "confirm",
    }
}

fn panel_block(title: String, border: Color) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(PANEL))
}

fn relative_cursor(cursor: Option<usize>, offset: usize) -> Option<usize> {
    cursor.map(|cursor| cursor.saturating_sub(offset))
}

fn status_color(value: &str) -> Color {
    match value {
        "Running" | "Active" | "Available" | "Succeeded" => ACCENT,
        "Pending" | "Progressing" | "ContainerCreating" | "Terminating" => WARN,
        "Failed" | "CrashLoopBackOff" | "ImagePullBackOff" | "ErrImagePull" | "Error" => ERROR,
        _ => Color::White,
    }
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let indent_len = line
        .as_bytes()
        .iter()
        .take_while(|byte| **byte == b' ')
        .count();
    let (indent, trimmed) = line.split_at(indent_len);

    let mut spans = vec![Span::raw(indent.to_string())];
    let content = match trimmed.strip_prefix("- ") {
        Some(rest) => {
            spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
            rest
        }
        None => trimmed,
    };

    match content.split_once(':') {
        Some((key, value)) if !key.is_empty() && !key.contains(' ') => {
            spans.push(Span::styled(
                key.to_string(),
                Style::default().fg(Color::Rgb(103, 232, 249)),
            ));
            spans.push(Span::styled(":", Style::default().fg(MUTED)));
            spans.push(Span::styled(
                value.to_string(),
                Style::default().fg(Color::Rgb(147, 197, 253)),
            ));
        }
        _ => spans.push(Span::styled(
            content.to_string(),
            Style::default().fg(Color::White),
        )),
    }
    Line::from(spans)
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn list_rows_visible(area: Rect) -> usize {
    area.height.saturating_sub(3).max(1) as usize
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn display_cluster_endpoint(cluster: &str) -> String {
    let trimmed = cluster.trim().trim_end_matches('/');
    trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed)
        .to_string()
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn column_constraints(columns: usize) -> Vec<Constraint> {
    if columns == 0 {
        return vec![Constraint::Percentage(100)];
    }

    let width = (100 / columns as u16).max(1);
    (0..columns)
        .map(|_| Constraint::Percentage(width))
        .collect()
}
