use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Offset, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, Wrap,
};

use crate::db::BookmarkRecord;

use super::super::collection_name;
use super::super::display::{percentage_ratio, resume_label, truncate};
use super::super::playback::PlaybackStatus;
use super::super::sequence::normalize_row_id;
use super::actions::context_matches;
use super::{Focus, PendingDelete, TuiPlayer, TuiState};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const SOUNDING: Color = Color::Rgb(255, 205, 110);
const AUDIO_GAP: Color = Color::Rgb(255, 145, 120);

pub(super) fn draw_tui(
    frame: &mut Frame,
    player: &TuiPlayer,
    state: &mut TuiState,
    points: &[BookmarkRecord],
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let machine = player.machine();
    let status = machine.status();
    let collection = player.browser().collection();
    let category = state.current_category().unwrap_or("-").to_string();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "VOCAB PLAYER",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(collection.to_string(), Style::default().fg(MUTED)),
        Span::raw("   "),
        Span::styled(truncate(&category, 32), Style::default().fg(MUTED)),
        Span::raw("   "),
        Span::styled(status.label(), status_label_style(status)),
        Span::styled(
            if machine.cursor().cross_collection {
                "  → next category"
            } else {
                ""
            },
            Style::default().fg(Color::Yellow),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(50),
            Constraint::Percentage(30),
        ])
        .split(chunks[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3)])
        .split(body[2]);

    let center = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(6)])
        .split(body[1]);

    draw_categories(frame, body[0], state);
    draw_rows(frame, center[0], player, state);
    draw_row_detail(frame, center[1], state);
    draw_resume_points(frame, side[0], state, points);

    let gauge = match (machine.context(), machine.sounding_row()) {
        (Some(context), Some(row)) => {
            let percentage = context.sequence.percentage_for_row(row);
            percentage_ratio(&percentage).map(|ratio| (ratio, resume_label(row, &percentage)))
        }
        _ => state
            .points_state
            .selected()
            .and_then(|idx| points.get(idx))
            .and_then(|record| {
                percentage_ratio(&record.percentage)
                    .map(|ratio| (ratio, resume_label(&record.row_id, &record.percentage)))
            }),
    };
    if let Some((ratio, label)) = gauge {
        let progress = Gauge::default()
            .block(panel_block("Progress"))
            .gauge_style(
                Style::default()
                    .fg(Color::Rgb(130, 190, 255))
                    .bg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .label(label)
            .ratio(ratio);
        frame.render_widget(progress, side[1]);
    }

    let command_bar = Paragraph::new(controls_line(status))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(command_bar, chunks[2]);

    let status_widget = Paragraph::new(state.status.clone())
        .style(status_style(&state.status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(confirm) = &state.pending_delete {
        draw_confirm_forget(frame, confirm);
    }
}

fn draw_categories(frame: &mut Frame, area: Rect, state: &TuiState) {
    let rows: Vec<Row> = state
        .categories
        .iter()
        .enumerate()
        .map(|(idx, category)| {
            let style = if idx == state.category_idx {
                highlight_style()
            } else {
                Style::default().fg(MUTED)
            };
            Row::new(vec![Cell::from(category.clone())]).style(style)
        })
        .collect();
    let table = Table::new(rows, [Constraint::Percentage(100)]).block(panel_block("Categories"));
    frame.render_widget(table, area);
}

fn draw_rows(frame: &mut Frame, area: Rect, player: &TuiPlayer, state: &mut TuiState) {
    let sounding = player.machine().sounding_row();
    let on_screen = context_matches(player, state);
    let sequence = player
        .machine()
        .context()
        .filter(|_| on_screen)
        .map(|context| &context.sequence);
    let voices_sentences = player.browser().collection().level.voices_sentences();
    let rows: Vec<Row> = state
        .rows
        .iter()
        .map(|row| {
            let row_id = normalize_row_id(&row.number);
            let is_sounding = sounding.is_some() && row_id.as_deref() == sounding;
            let marker = if is_sounding { "♪" } else { "" };
            let gaps = sequence
                .zip(row_id.as_deref())
                .and_then(|(sequence, row_id)| sequence.skipped_audio(row_id))
                .map(|(word, sentence)| {
                    let sentence = sentence && voices_sentences && row.has_sentence();
                    match (word, sentence) {
                        (true, true) => "✗ both",
                        (true, false) => "✗ word",
                        (false, true) => "✗ sent.",
                        (false, false) => "",
                    }
                })
                .unwrap_or_default();
            let line = Row::new(vec![
                Cell::from(marker),
                Cell::from(Span::styled(gaps, Style::default().fg(AUDIO_GAP))),
                Cell::from(row.number.clone()),
                Cell::from(row.word.clone()),
                Cell::from(row.phonetic.clone()),
                Cell::from(row.meaning.clone()),
            ]);
            if is_sounding {
                line.style(Style::default().fg(SOUNDING).add_modifier(Modifier::BOLD))
            } else {
                line
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ],
    )
    .header(
        Row::new(vec!["", "Audio", "No.", "Word", "Phonetic", "Meaning"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(focus_block("Rows", state.focus == Focus::Rows))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, &mut state.row_state);
}

fn draw_row_detail(frame: &mut Frame, area: Rect, state: &TuiState) {
    let text = match state.row_state.selected().and_then(|idx| state.rows.get(idx)) {
        Some(row) => {
            let mut lines = vec![Line::from(vec![
                Span::styled("Sentence  ", Style::default().fg(ACCENT)),
                Span::raw(row.sentence.trim().to_string()),
            ])];
            if !row.translation.trim().is_empty() {
                lines.push(Line::from(vec![
                    Span::styled("Meaning   ", Style::default().fg(ACCENT)),
                    Span::raw(row.translation.trim().to_string()),
                ]));
            }
            if !row.notes.trim().is_empty() {
                lines.push(Line::from(vec![
                    Span::styled("Notes     ", Style::default().fg(ACCENT)),
                    Span::raw(row.notes.trim().to_string()),
                ]));
            }
            lines
        }
        None => vec![Line::from("No row selected.")],
    };
    let detail = Paragraph::new(text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: true })
        .block(panel_block("Example"));
    frame.render_widget(detail, area);
}

fn draw_resume_points(
    frame: &mut Frame,
    area: Rect,
    state: &mut TuiState,
    points: &[BookmarkRecord],
) {
    if points.is_empty() {
        let empty = Paragraph::new("No resume points yet.\n\nPlay a row or press b\nto save one.")
            .style(Style::default().fg(MUTED))
            .block(focus_block("Resume Points", state.focus == Focus::ResumePoints));
        frame.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = points
        .iter()
        .map(|record| {
            Row::new(vec![
                Cell::from(truncate(&collection_name(&record.collection_id), 18)),
                Cell::from(truncate(&record.sub_collection_id, 16)),
                Cell::from(resume_label(&record.row_id, &record.percentage)),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Percentage(36),
            Constraint::Percentage(30),
            Constraint::Percentage(34),
        ],
    )
    .block(focus_block(
        "Resume Points",
        state.focus == Focus::ResumePoints,
    ))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, &mut state.points_state);
}

fn draw_confirm_forget(frame: &mut Frame, confirm: &PendingDelete) {
    let text = format!(
        "Forget resume point?\n\n{}\n\n[y / Enter] Forget   [n / Esc] Cancel",
        truncate(&confirm.label, 56)
    );
    let area = popup_area(frame.area(), &text);

    // One cell down and right, clipped to the screen.
    let screen = frame.area();
    let shadow = area.offset(Offset { x: 1, y: 1 }).intersection(screen);
    if !shadow.is_empty() {
        let shade = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
        frame.render_widget(shade, shadow);
    }
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block("Confirm Forget"));
    frame.render_widget(popup, area);
}

/// Centered box that fits `text` with padding, clamped to the screen.
fn popup_area(screen: Rect, text: &str) -> Rect {
    let widest = text.lines().map(|line| line.chars().count()).max().unwrap_or(0) as u16;
    let lines = text.lines().count() as u16;
    let width = widest.saturating_add(12).clamp(48, 72).min(screen.width);
    let height = lines.saturating_add(6).clamp(10, 16).min(screen.height);
    Rect::new(
        screen.x + (screen.width - width) / 2,
        screen.y + (screen.height - height) / 2,
        width,
        height,
    )
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn focus_block(title: &'static str, focused: bool) -> Block<'static> {
    if focused {
        panel_block(title).border_style(Style::default().fg(ACCENT))
    } else {
        panel_block(title)
    }
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn highlight_style() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn status_label_style(status: PlaybackStatus) -> Style {
    match status {
        PlaybackStatus::Playing => Style::default().fg(Color::Green),
        PlaybackStatus::Paused => Style::default().fg(Color::Yellow),
        PlaybackStatus::Idle => Style::default().fg(MUTED),
    }
}

fn controls_line(status: PlaybackStatus) -> Line<'static> {
    let space_label = match status {
        PlaybackStatus::Playing => " PAUSE ",
        PlaybackStatus::Paused => " RESUME ",
        PlaybackStatus::Idle => " CONTINUE ",
    };
    let stop_style = if status.is_active() {
        highlight_style()
    } else {
        pill_inactive()
    };
    Line::from(vec![
        Span::styled(space_label, highlight_style()),
        Span::raw(" "),
        Span::styled(" STOP ", stop_style),
        Span::styled(
            "   Enter play  Space pause  x stop  ←/→ category  [/] collection  b mark  r resume  d forget  Tab focus  q quit",
            Style::default().fg(MUTED),
        ),
    ])
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}
