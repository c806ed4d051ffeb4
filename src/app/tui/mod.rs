mod actions;
mod render;
mod session;

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;
use tracing::info;

use crate::cli::CollectionArgs;
use crate::db::BookmarkRecord;

use super::browser::CatalogBrowser;
use super::catalog::{Catalog, VocabRow};
use super::collection_from_args;
use super::playback::{PlaybackEvent, PlaybackStatus};
use super::player::{Player, ProcessAudio};
use super::progress::{BookmarkKey, ProgressStore};
use super::settings::Settings;

use self::actions::{
    bookmark_selected_row, open_resume_point, play_selected_row, reload_categories,
    select_category, status_error, status_info, switch_collection, sync_with_playback,
    toggle_pause,
};
use self::render::draw_tui;
use self::session::TuiSession;

/// Audio signals need polling, so the loop wakes up faster than keystrokes alone would need.
const TICK: Duration = Duration::from_millis(100);

pub(super) type TuiPlayer = Player<ProcessAudio, CatalogBrowser>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Focus {
    Rows,
    ResumePoints,
}

impl Focus {
    fn toggle(self) -> Self {
        match self {
            Self::Rows => Self::ResumePoints,
            Self::ResumePoints => Self::Rows,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct PendingDelete {
    pub(super) key: BookmarkKey,
    pub(super) label: String,
}

pub(super) struct TuiState {
    pub(super) categories: Vec<String>,
    pub(super) category_idx: usize,
    pub(super) rows: Vec<VocabRow>,
    pub(super) row_state: TableState,
    pub(super) points_state: TableState,
    pub(super) focus: Focus,
    pub(super) status: String,
    pub(super) pending_delete: Option<PendingDelete>,
    /// Last sounding row the selection jumped to.
    pub(super) followed_row: Option<String>,
}

impl TuiState {
    fn new() -> Self {
        Self {
            categories: Vec::new(),
            category_idx: 0,
            rows: Vec::new(),
            row_state: TableState::default(),
            points_state: TableState::default(),
            focus: Focus::Rows,
            status: status_info("Ready."),
            pending_delete: None,
            followed_row: None,
        }
    }

    pub(super) fn current_category(&self) -> Option<&str> {
        self.categories.get(self.category_idx).map(String::as_str)
    }
}

fn clamp_selection(state: &mut TableState, len: usize) {
    if len == 0 {
        state.select(None);
        return;
    }
    match state.selected() {
        Some(selected) => state.select(Some(selected.min(len - 1))),
        None => state.select(Some(0)),
    }
}

fn move_selection(state: &mut TableState, len: usize, down: bool) {
    let Some(selected) = state.selected() else {
        clamp_selection(state, len);
        return;
    };
    if down {
        state.select(Some((selected + 1).min(len.saturating_sub(1))));
    } else {
        state.select(Some(selected.saturating_sub(1)));
    }
}

pub(crate) fn run_tui(settings: &Settings, store: ProgressStore, args: &CollectionArgs) -> Result<()> {
    let catalog = Catalog::load(&settings.catalog_path)?;
    let collection = match collection_from_args(args)? {
        Some(collection) => collection,
        None => catalog
            .collections()
            .first()
            .map(|data| data.collection)
            .ok_or_else(|| anyhow!("the catalog has no collections"))?,
    };
    let browser = CatalogBrowser::new(catalog, collection, settings.media_base.clone())?;
    let audio = ProcessAudio::new(
        settings.audio_command.clone(),
        settings.start_marker.clone(),
    )?;
    let mut player = Player::new(audio, browser, store, settings.notices.clone())
        .with_settle_delay(settings.settle_delay);

    let points: Rc<RefCell<Vec<BookmarkRecord>>> =
        Rc::new(RefCell::new(player.store().list().to_vec()));
    {
        let points = Rc::clone(&points);
        player
            .store_mut()
            .subscribe(move |records| *points.borrow_mut() = records.to_vec());
    }

    let mut state = TuiState::new();
    reload_categories(&mut player, &mut state);
    clamp_selection(&mut state.points_state, points.borrow().len());
    info!(%collection, "interactive viewer started");

    let session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let mut last_status = PlaybackStatus::Idle;
    loop {
        player.pump();
        if let Some(message) = player.take_messages().pop() {
            state.status = status_info(&message);
        }
        let status = player.machine().status();
        if last_status.is_active() && status == PlaybackStatus::Idle {
            state.status = status_info("Playback finished.");
        }
        sync_with_playback(&player, &mut state);
        clamp_selection(&mut state.points_state, points.borrow().len());

        terminal.draw(|frame| draw_tui(frame, &player, &mut state, &points.borrow()))?;

        if !event::poll(TICK)? {
            last_status = player.machine().status();
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(dialog) = state.pending_delete.take() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    player
                        .store_mut()
                        .remove(&dialog.key.collection_id, &dialog.key.sub_collection_id);
                    state.status = status_info(&format!("Forgot resume point: {}", dialog.label));
                }
                KeyCode::Esc | KeyCode::Char('n') => {
                    state.status = status_info("Forget canceled.");
                }
                _ => state.pending_delete = Some(dialog),
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Tab => state.focus = state.focus.toggle(),
            KeyCode::Up | KeyCode::Down => {
                let down = key.code == KeyCode::Down;
                match state.focus {
                    Focus::Rows => move_selection(&mut state.row_state, state.rows.len(), down),
                    Focus::ResumePoints => {
                        move_selection(&mut state.points_state, points.borrow().len(), down)
                    }
                }
            }
            KeyCode::Left => {
                let idx = state.category_idx.saturating_sub(1);
                select_category(&mut player, &mut state, idx);
            }
            KeyCode::Right => {
                let idx = (state.category_idx + 1).min(state.categories.len().saturating_sub(1));
                select_category(&mut player, &mut state, idx);
            }
            KeyCode::Char('[') => switch_collection(&mut player, &mut state, -1),
            KeyCode::Char(']') => switch_collection(&mut player, &mut state, 1),
            KeyCode::Enter => match state.focus {
                Focus::Rows => play_selected_row(&mut player, &mut state),
                Focus::ResumePoints => {
                    let record = selected_point(&state, &points.borrow());
                    open_resume_point(&mut player, &mut state, record.as_ref());
                }
            },
            KeyCode::Char('r') => {
                let record = selected_point(&state, &points.borrow());
                open_resume_point(&mut player, &mut state, record.as_ref());
            }
            KeyCode::Char(' ') => {
                let first = points.borrow().first().cloned();
                toggle_pause(&mut player, &mut state, first.as_ref());
            }
            KeyCode::Char('x') | KeyCode::Esc => {
                if player.machine().status().is_active() {
                    player.submit(PlaybackEvent::UserStop);
                    state.status = status_info("Stopped.");
                }
            }
            KeyCode::Char('b') => bookmark_selected_row(&mut player, &mut state),
            KeyCode::Char('d') => match selected_point(&state, &points.borrow()) {
                Some(record) if state.focus == Focus::ResumePoints => {
                    state.pending_delete = Some(PendingDelete {
                        key: BookmarkKey::of(&record),
                        label: actions::point_label(&record),
                    });
                    state.status =
                        status_info("Confirm forget: y/Enter to forget, n/Esc to cancel.");
                }
                Some(_) => state.status = status_info("Press Tab to select a resume point first."),
                None => state.status = status_error("No resume point selected."),
            },
            _ => {}
        }
        last_status = player.machine().status();
    }

    drop(terminal);
    session.leave()
}

fn selected_point(state: &TuiState, points: &[BookmarkRecord]) -> Option<BookmarkRecord> {
    let idx = match state.focus {
        Focus::ResumePoints => state.points_state.selected().unwrap_or(0),
        Focus::Rows => 0,
    };
    points.get(idx).cloned()
}
