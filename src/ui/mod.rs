mod theme;

use crate::app::{
    AppModel, ClonePhase, ClonePicker, DirectoryPicker, LineEditor, Mode, Notice, PendingAction,
    ScrollList,
};
use crate::domain::{AgentState, DirectoryEntry, Item, ItemStatus, Session};
use ratatui::prelude::*;
use ratatui::widgets::*;
use time::{Duration, OffsetDateTime};
use unicode_width::UnicodeWidthStr;

const SPINNER: [&str; 3] = ["·  ", "·· ", "···"];

pub fn render(frame: &mut Frame, model: &AppModel) {
    let area = frame.area();
    if area.width == 0 || area.height == 0 {
        return;
    }
    frame.render_widget(Block::default().style(Style::default().bg(theme::BG)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(area);

    render_title(frame, chunks[0], model);
    render_prompt(frame, chunks[1], model);

    let block = Block::default()
        .borders(Borders::TOP | Borders::BOTTOM)
        .border_style(Style::default().fg(theme::BORDER));
    let body = block.inner(chunks[2]);
    frame.render_widget(block, chunks[2]);
    let width = usize::from(body.width);
    let rows = match &model.mode {
        Mode::Normal | Mode::ConfirmKill(_) | Mode::Create(_) => session_rows(model, width),
        Mode::PickDirectory(picker) | Mode::ConfirmRemoveFolder { picker, .. } => {
            directory_rows(picker, width)
        }
        Mode::CloneRepo(picker) => clone_rows(picker, model.animation_frame, width),
        Mode::Bookmarks(list) => bookmark_rows(list, width),
    };
    frame.render_widget(Paragraph::new(rows), body);

    render_notice(frame, chunks[3], model.notice.as_ref());
    frame.render_widget(
        Paragraph::new(state_line(model)).style(Style::default().fg(theme::DIM)),
        chunks[4],
    );
    frame.render_widget(
        Paragraph::new(hint_lines(&model.mode)).style(Style::default().fg(theme::DIM)),
        chunks[5],
    );
}

fn render_title(frame: &mut Frame, area: Rect, model: &AppModel) {
    let title = match &model.mode {
        Mode::Normal | Mode::ConfirmKill(_) => "Sessions",
        Mode::Create(_) => "New session",
        Mode::PickDirectory(_) | Mode::ConfirmRemoveFolder { .. } => "Open directory",
        Mode::CloneRepo(_) => "Clone repository",
        Mode::Bookmarks(_) => "Bookmarks",
    };
    let line = Line::from(vec![
        Span::styled(
            " tsm ",
            Style::default()
                .fg(theme::BG)
                .bg(theme::ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {title}"), Style::default().fg(theme::FG)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_prompt(frame: &mut Frame, area: Rect, model: &AppModel) {
    let filter = match &model.mode {
        Mode::ConfirmKill(pending) | Mode::ConfirmRemoveFolder { pending, .. } => {
            frame.render_widget(Paragraph::new(confirm_line(pending)), area);
            return;
        }
        Mode::Create(editor) => {
            render_editor(frame, area, editor);
            return;
        }
        Mode::Normal => model.filter.as_str(),
        Mode::PickDirectory(picker) => picker.list.filter(),
        Mode::CloneRepo(picker) => picker.list.filter(),
        Mode::Bookmarks(list) => list.filter(),
    };
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(theme::ACCENT)),
        Span::styled(filter.to_string(), Style::default().fg(theme::FG)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn confirm_line(pending: &PendingAction) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            pending.prompt(),
            Style::default()
                .fg(theme::ERROR)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "  Ctrl-x/Ctrl-y confirm · Esc cancel",
            Style::default().fg(theme::MUTED),
        ),
    ])
}

fn render_editor(frame: &mut Frame, area: Rect, editor: &LineEditor) {
    let label = "Name: ";
    let line = Line::from(vec![
        Span::styled(label, Style::default().fg(theme::ACCENT)),
        Span::styled(editor.text.clone(), Style::default().fg(theme::FG)),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    let before_cursor = editor
        .text
        .chars()
        .take(editor.cursor_col)
        .collect::<String>();
    let offset = UnicodeWidthStr::width(label) + UnicodeWidthStr::width(before_cursor.as_str());
    let x = area
        .x
        .saturating_add(u16::try_from(offset).unwrap_or(u16::MAX))
        .min(area.right().saturating_sub(1));
    frame.set_cursor_position((x, area.y));
}

fn render_notice(frame: &mut Frame, area: Rect, notice: Option<&Notice>) {
    let Some(notice) = notice else {
        return;
    };
    let color = if notice.is_error {
        theme::ERROR
    } else {
        theme::SUCCESS
    };
    let text = truncate_end(&notice.text, usize::from(area.width));
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(color)),
        area,
    );
}

fn session_rows(model: &AppModel, width: usize) -> Vec<Line<'static>> {
    if !model.sessions_loaded {
        return vec![muted_line("Loading sessions…")];
    }
    if model.items.is_empty() {
        if model.filter.is_empty() {
            return vec![muted_line("No other sessions. Ctrl-n creates one.")];
        }
        return vec![muted_line(&format!("No sessions match \"{}\"", model.filter))];
    }

    let now = OffsetDateTime::now_utc();
    model
        .items
        .visible()
        .filter_map(|(position, item)| {
            let selected = position == model.items.cursor();
            let line = match *item {
                Item::Session { session_index } => {
                    let session = model.sessions.get(session_index)?;
                    session_line(
                        session,
                        session_index,
                        model.status_for(&session.name),
                        model.animation_frame,
                        now,
                        width,
                    )
                }
                Item::Window {
                    session_index,
                    window_index,
                } => {
                    let window = model
                        .sessions
                        .get(session_index)?
                        .windows
                        .get(window_index)?;
                    let text = format!("      {}: {}", window.index, window.name);
                    Line::from(Span::styled(
                        truncate_end(&text, width),
                        Style::default().fg(theme::MUTED),
                    ))
                }
            };
            Some(highlight(line, selected))
        })
        .collect()
}

fn session_line(
    session: &Session,
    session_index: usize,
    status: Option<&ItemStatus>,
    frame_index: u8,
    now: OffsetDateTime,
    width: usize,
) -> Line<'static> {
    let number = match session_index {
        0..=8 => format!("{} ", session_index + 1),
        _ => "  ".to_string(),
    };
    let icon = if session.expanded { "▾ " } else { "▸ " };
    let badge = status.map(|status| status_badge(status.state, frame_index));
    let age = relative_time_ago(session.last_activity, now);

    let right_width = badge
        .as_ref()
        .map_or(0, |(text, _)| UnicodeWidthStr::width(text.as_str()) + 2)
        + UnicodeWidthStr::width(age.as_str());
    let prefix_width = UnicodeWidthStr::width(number.as_str()) + UnicodeWidthStr::width(icon);
    let name_width = width.saturating_sub(prefix_width + right_width + 2);
    let name = truncate_end(&session.name, name_width);
    let padding = width.saturating_sub(
        prefix_width + UnicodeWidthStr::width(name.as_str()) + right_width,
    );

    let mut spans = vec![
        Span::styled(number, Style::default().fg(theme::DIM)),
        Span::styled(icon, Style::default().fg(theme::MUTED)),
        Span::styled(name, Style::default().fg(theme::FG)),
        Span::raw(" ".repeat(padding)),
    ];
    if let Some((text, color)) = badge {
        spans.push(Span::styled(text, Style::default().fg(color)));
        spans.push(Span::raw("  "));
    }
    spans.push(Span::styled(age, Style::default().fg(theme::DIM)));
    Line::from(spans)
}

fn status_badge(state: AgentState, frame_index: u8) -> (String, Color) {
    match state {
        AgentState::Working => {
            let spinner = SPINNER[usize::from(frame_index) % SPINNER.len()];
            (format!("{spinner} {}", state.label()), theme::ACCENT)
        }
        AgentState::Waiting => (state.label().to_string(), theme::SUCCESS),
        AgentState::New => (state.label().to_string(), theme::MUTED),
    }
}

fn directory_rows(picker: &DirectoryPicker, width: usize) -> Vec<Line<'static>> {
    if picker.list.is_empty() {
        let text = if picker.scanning {
            "Scanning…"
        } else if picker.list.filter().is_empty() {
            "No directories found."
        } else {
            "No directories match."
        };
        return vec![muted_line(text)];
    }
    entry_rows(&picker.list, width, false)
}

fn bookmark_rows(list: &ScrollList<DirectoryEntry>, width: usize) -> Vec<Line<'static>> {
    if list.is_empty() {
        let text = if list.total() == 0 {
            "No bookmarks. Ctrl-a on a session or directory adds one."
        } else {
            "No bookmarks match."
        };
        return vec![muted_line(text)];
    }
    entry_rows(list, width, list.filter().is_empty())
}

fn entry_rows(
    list: &ScrollList<DirectoryEntry>,
    width: usize,
    numbered: bool,
) -> Vec<Line<'static>> {
    list.visible()
        .map(|(position, entry)| {
            let number = match position {
                0..=8 if numbered => format!("{} ", position + 1),
                _ => "  ".to_string(),
            };
            let text = truncate_end(&entry.display, width.saturating_sub(2));
            let line = Line::from(vec![
                Span::styled(number, Style::default().fg(theme::DIM)),
                Span::styled(text, Style::default().fg(theme::FG)),
            ]);
            highlight(line, position == list.cursor())
        })
        .collect()
}

fn clone_rows(picker: &ClonePicker, frame_index: u8, width: usize) -> Vec<Line<'static>> {
    let spinner = SPINNER[usize::from(frame_index) % SPINNER.len()];
    match &picker.phase {
        ClonePhase::Loading => vec![muted_line(&format!("{spinner} Fetching repositories"))],
        ClonePhase::Failed(error) => vec![Line::from(Span::styled(
            truncate_end(error, width),
            Style::default().fg(theme::ERROR),
        ))],
        ClonePhase::Cloning { repo } => vec![muted_line(&format!("{spinner} Cloning {repo}"))],
        ClonePhase::Cloned(cloned) => vec![
            Line::from(Span::styled(
                format!("Cloned {} into {}", cloned.repo, cloned.path.display()),
                Style::default().fg(theme::SUCCESS),
            )),
            muted_line(&format!(
                "Enter opens session {} · Esc returns",
                cloned.session
            )),
        ],
        ClonePhase::Ready if picker.list.is_empty() => vec![muted_line("No repositories match.")],
        ClonePhase::Ready => picker
            .list
            .visible()
            .map(|(position, repo)| {
                let line = Line::from(Span::styled(
                    truncate_end(repo, width),
                    Style::default().fg(theme::FG),
                ));
                highlight(line, position == picker.list.cursor())
            })
            .collect(),
    }
}

fn state_line(model: &AppModel) -> String {
    match &model.mode {
        Mode::Normal | Mode::ConfirmKill(_) | Mode::Create(_) => {
            let shown = model
                .items
                .items()
                .iter()
                .filter(|item| item.is_session())
                .count();
            format!("{shown}/{} sessions", model.sessions.len())
        }
        Mode::PickDirectory(picker) | Mode::ConfirmRemoveFolder { picker, .. } => {
            format!("{}/{} directories", picker.list.len(), picker.list.total())
        }
        Mode::CloneRepo(picker) => {
            format!("{}/{} repositories", picker.list.len(), picker.list.total())
        }
        Mode::Bookmarks(list) => format!("{}/{} bookmarks", list.len(), list.total()),
    }
}

fn hint_lines(mode: &Mode) -> Vec<Line<'static>> {
    let (first, second) = match mode {
        Mode::Normal => (
            "Enter switch · 1-9 jump · Ctrl-l/Ctrl-h windows · Ctrl-x kill · Ctrl-n new",
            "Ctrl-p directories · Ctrl-r clone · Ctrl-b bookmarks · Ctrl-a bookmark · Ctrl-g lazygit · Esc quit",
        ),
        Mode::ConfirmKill(_) | Mode::ConfirmRemoveFolder { .. } => {
            ("Ctrl-x/Ctrl-y confirm", "Esc cancel")
        }
        Mode::Create(_) => ("Enter create", "Esc cancel"),
        Mode::PickDirectory(_) => (
            "Enter open · Ctrl-x delete folder · Ctrl-a bookmark",
            "Esc clear filter / back",
        ),
        Mode::CloneRepo(_) => ("Enter clone", "Esc clear filter / back"),
        Mode::Bookmarks(_) => (
            "Enter open · 1-9 slot · Ctrl-x remove · Shift-Up/Shift-Down move",
            "Esc clear filter / back",
        ),
    };
    vec![Line::from(first), Line::from(second)]
}

fn highlight(line: Line<'static>, selected: bool) -> Line<'static> {
    if !selected {
        return line;
    }
    line.style(
        Style::default()
            .bg(theme::ACCENT_BG)
            .add_modifier(Modifier::BOLD),
    )
}

fn muted_line(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        text.to_string(),
        Style::default().fg(theme::MUTED),
    ))
}

fn truncate_end(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let ellipsis = "…";
    let available = max_width.saturating_sub(UnicodeWidthStr::width(ellipsis));
    let mut out = String::new();
    for ch in text.chars() {
        let next = format!("{out}{ch}");
        if UnicodeWidthStr::width(next.as_str()) > available {
            break;
        }
        out.push(ch);
    }
    out.push_str(ellipsis);
    out
}

fn relative_time_ago(moment: OffsetDateTime, now: OffsetDateTime) -> String {
    let diff = now - moment;
    if diff < Duration::minutes(1) {
        return "just now".to_string();
    }
    humanize_duration(diff)
}

fn humanize_duration(duration: Duration) -> String {
    let minutes = duration.whole_minutes();
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = duration.whole_hours();
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", duration.whole_days())
}
