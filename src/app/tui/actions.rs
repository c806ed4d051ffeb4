use anyhow::{Result, anyhow};

use crate::db::BookmarkRecord;

use super::super::collection_name;
use super::super::deeplink::DeepLink;
use super::super::display::resume_label;
use super::super::playback::{PlaybackEvent, PlaybackStatus};
use super::super::sequence::normalize_row_id;
use super::{TuiPlayer, TuiState, clamp_selection};

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(super) fn point_label(record: &BookmarkRecord) -> String {
    format!(
        "{} / {} {}",
        collection_name(&record.collection_id),
        record.sub_collection_id,
        resume_label(&record.row_id, &record.percentage)
    )
}

/// Whether the loaded playback context is the category on screen.
pub(super) fn context_matches(player: &TuiPlayer, state: &TuiState) -> bool {
    let Some(context) = player.machine().context() else {
        return false;
    };
    context.collection_id == player.browser().collection().id()
        && Some(context.sub_collection_id.as_str()) == state.current_category()
}

/// Shows the category and loads it into the player. Active playback is halted.
fn load_category(player: &mut TuiPlayer, state: &mut TuiState, idx: usize) -> Result<()> {
    let name = state
        .categories
        .get(idx)
        .cloned()
        .ok_or_else(|| anyhow!("no category at position {idx}"))?;
    state.category_idx = idx;
    state.rows = player.browser().rows(&name);
    state.row_state.select(None);
    clamp_selection(&mut state.row_state, state.rows.len());
    state.followed_row = None;
    player.select(&name)
}

pub(super) fn reload_categories(player: &mut TuiPlayer, state: &mut TuiState) {
    state.categories = player.browser().categories();
    state.category_idx = 0;
    if state.categories.is_empty() {
        state.rows.clear();
        state.row_state.select(None);
        state.status = status_error("This collection has no categories.");
        return;
    }
    if let Err(err) = load_category(player, state, 0) {
        state.status = status_error(&format!("{err:#}"));
    }
}

pub(super) fn select_category(player: &mut TuiPlayer, state: &mut TuiState, idx: usize) {
    if idx == state.category_idx && context_matches(player, state) {
        return;
    }
    let was_active = player.machine().status().is_active();
    match load_category(player, state, idx) {
        Ok(()) => {
            let name = state.current_category().unwrap_or_default();
            let saved = player
                .store()
                .lookup(&player.browser().collection().id(), name)
                .map(|record| {
                    format!(
                        ", resume point {}",
                        resume_label(&record.row_id, &record.percentage)
                    )
                })
                .unwrap_or_default();
            state.status = if was_active {
                status_info(&format!("Playback stopped. Showing {name}{saved}."))
            } else {
                status_info(&format!("{name}: {} rows{saved}", state.rows.len()))
            };
        }
        Err(err) => state.status = status_error(&format!("{err:#}")),
    }
}

pub(super) fn switch_collection(player: &mut TuiPlayer, state: &mut TuiState, step: isize) {
    let current = player.browser().collection();
    let Some(next) = player.browser().catalog().neighbor(current, step) else {
        return;
    };
    if next == current {
        return;
    }
    if player.machine().status().is_active() {
        player.submit(PlaybackEvent::UserStop);
    }
    if let Err(err) = player.browser_mut().set_collection(next) {
        state.status = status_error(&format!("{err:#}"));
        return;
    }
    reload_categories(player, state);
    if !state.categories.is_empty() {
        state.status = status_info(&format!("Collection: {next}"));
    }
}

/// Keeps the screen on the category and row that are actually playing.
pub(super) fn sync_with_playback(player: &TuiPlayer, state: &mut TuiState) {
    let machine = player.machine();
    let Some(context) = machine.context() else {
        return;
    };
    if context.collection_id != player.browser().collection().id() {
        return;
    }

    if state.current_category() != Some(context.sub_collection_id.as_str())
        && let Some(idx) = state
            .categories
            .iter()
            .position(|category| *category == context.sub_collection_id)
    {
        state.category_idx = idx;
        state.rows = player.browser().rows(&context.sub_collection_id);
        state.row_state.select(None);
        clamp_selection(&mut state.row_state, state.rows.len());
        state.followed_row = None;
    }

    let Some(row) = machine.sounding_row() else {
        return;
    };
    if state.followed_row.as_deref() == Some(row) {
        return;
    }
    if let Some(idx) = state
        .rows
        .iter()
        .position(|candidate| normalize_row_id(&candidate.number).as_deref() == Some(row))
    {
        state.row_state.select(Some(idx));
    }
    state.followed_row = Some(row.to_string());
}

fn selected_row_id(state: &TuiState) -> Option<String> {
    let row = state.rows.get(state.row_state.selected()?)?;
    normalize_row_id(&row.number)
}

pub(super) fn play_selected_row(player: &mut TuiPlayer, state: &mut TuiState) {
    let Some(row_id) = selected_row_id(state) else {
        state.status = status_error("No row selected.");
        return;
    };
    if !context_matches(player, state) {
        let idx = state.category_idx;
        if let Err(err) = load_category(player, state, idx) {
            state.status = status_error(&format!("{err:#}"));
            return;
        }
    }
    let index = player
        .machine()
        .context()
        .and_then(|context| context.sequence.index_of_row(&row_id));
    let Some(index) = index else {
        state.status = status_error(&format!("Row {row_id} has no audio sequence."));
        return;
    };
    player.submit(PlaybackEvent::PlayFrom { index });
    state.status = status_info(&format!(
        "Playing {} from #{row_id}",
        state.current_category().unwrap_or_default()
    ));
}

pub(super) fn toggle_pause(
    player: &mut TuiPlayer,
    state: &mut TuiState,
    most_recent: Option<&BookmarkRecord>,
) {
    match player.machine().status() {
        PlaybackStatus::Playing => {
            player.submit(PlaybackEvent::UserPause);
            state.status = if player.machine().status() == PlaybackStatus::Paused {
                status_info("Paused.")
            } else {
                status_info("Nothing is sounding yet.")
            };
        }
        PlaybackStatus::Paused => {
            player.submit(PlaybackEvent::UserResume);
            state.status = status_info("Resumed.");
        }
        PlaybackStatus::Idle => open_resume_point(player, state, most_recent),
    }
}

pub(super) fn open_resume_point(
    player: &mut TuiPlayer,
    state: &mut TuiState,
    record: Option<&BookmarkRecord>,
) {
    let Some(record) = record else {
        state.status = status_error("No resume points saved yet.");
        return;
    };
    if let Err(err) = resume_from(player, state, record) {
        state.status = status_error(&format!("{err:#}"));
    }
}

fn resume_from(player: &mut TuiPlayer, state: &mut TuiState, record: &BookmarkRecord) -> Result<()> {
    let target = DeepLink::from_bookmark(record)?;
    if target.collection != player.browser().collection() {
        if player.machine().status().is_active() {
            player.submit(PlaybackEvent::UserStop);
        }
        player.browser_mut().set_collection(target.collection)?;
        state.categories = player.browser().categories();
    }

    let idx = state
        .categories
        .iter()
        .position(|category| *category == target.category)
        .ok_or_else(|| anyhow!("category {} no longer exists", target.category))?;
    load_category(player, state, idx)?;

    let row_id = target.row_id.unwrap_or_default();
    let index = player
        .machine()
        .context()
        .and_then(|context| context.sequence.index_of_row(&row_id))
        .ok_or_else(|| anyhow!("row {row_id} is no longer in {}", target.category))?;
    player.submit(PlaybackEvent::PlayFrom { index });
    state.status = status_info(&format!("Resuming {}", point_label(record)));
    Ok(())
}

pub(super) fn bookmark_selected_row(player: &mut TuiPlayer, state: &mut TuiState) {
    let Some(row_id) = selected_row_id(state) else {
        state.status = status_error("No row selected.");
        return;
    };
    if !context_matches(player, state) {
        state.status = status_error("The selected category is not loaded.");
        return;
    }
    player.submit(PlaybackEvent::UserBookmark {
        row_id: row_id.clone(),
    });
    state.status = status_info(&format!(
        "Saved resume point: {} #{row_id}",
        state.current_category().unwrap_or_default()
    ));
}
