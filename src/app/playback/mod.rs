//! Playback cursor, continuation across categories, and the event dispatch
//! that ties them together. Everything here is synchronous and infallible:
//! the machine consumes events and answers with actions for the driver.

mod continuation;
mod control;
mod sequencer;

use std::collections::VecDeque;

use super::progress::BookmarkKey;
use super::sequence::PlaybackSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PlaybackStatus {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub(crate) fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// Identifies one unit start. Audio events carrying an outdated ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct UnitTicket {
    pub(crate) generation: u64,
    pub(crate) index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NoticeCue {
    EmptyCollection,
    EndOfPlayback,
}

/// Units and sibling categories of the selected category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlaybackContext {
    pub(crate) collection_id: String,
    pub(crate) sub_collection_id: String,
    pub(crate) sub_collections: Vec<String>,
    pub(crate) sequence: PlaybackSequence,
}

impl PlaybackContext {
    pub(crate) fn key(&self) -> BookmarkKey {
        BookmarkKey::new(&self.collection_id, &self.sub_collection_id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub(crate) fn next_sub_collection(&self) -> Option<&str> {
        let position = self
            .sub_collections
            .iter()
            .position(|sub| *sub == self.sub_collection_id)?;
        self.sub_collections.get(position + 1).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlaybackCursor {
    pub(crate) current_index: usize,
    pub(crate) status: PlaybackStatus,
    pub(crate) cross_collection: bool,
    pub(crate) pending_finished: Option<BookmarkKey>,
    pub(crate) generation: u64,
    /// Unit currently producing audio.
    pub(crate) sounding: Option<usize>,
    /// Unit that ended while paused; playback moves past it on resume.
    pub(crate) parked: Option<usize>,
}

impl PlaybackCursor {
    fn is_live(&self, ticket: UnitTicket) -> bool {
        self.status == PlaybackStatus::Playing && self.is_current(ticket)
    }

    fn is_current(&self, ticket: UnitTicket) -> bool {
        ticket.generation == self.generation && ticket.index == self.current_index
    }

    fn bump(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlaybackEvent {
    CollectionLoaded(PlaybackContext),
    PlayFrom { index: usize },
    UnitStarted(UnitTicket),
    UnitCompleted(UnitTicket),
    UnitFailed { ticket: UnitTicket, reason: String },
    SequenceExhausted { generation: u64 },
    CollectionEmpty,
    NoticeFinished { generation: u64, cue: NoticeCue },
    SelectionFailed { sub_collection: String },
    UserPause,
    UserResume,
    UserStop,
    UserBookmark { row_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlaybackAction {
    StartUnit { ticket: UnitTicket, source: String },
    PauseUnit,
    ResumeUnit,
    HaltAudio,
    SaveBookmark {
        key: BookmarkKey,
        row_id: String,
        percentage: String,
    },
    RemoveBookmark(BookmarkKey),
    SelectSubCollection(String),
    PlayNotice { generation: u64, cue: NoticeCue },
    Message(String),
}

/// Actions in emission order plus events the machine raises for itself.
#[derive(Debug, Default)]
struct Outbox {
    actions: Vec<PlaybackAction>,
    follow_ups: VecDeque<PlaybackEvent>,
}

impl Outbox {
    fn emit(&mut self, action: PlaybackAction) {
        self.actions.push(action);
    }

    fn raise(&mut self, event: PlaybackEvent) {
        self.follow_ups.push_back(event);
    }

    fn message(&mut self, text: impl Into<String>) {
        self.actions.push(PlaybackAction::Message(text.into()));
    }
}

/// The one playback cursor of the process.
#[derive(Debug, Default)]
pub(crate) struct PlaybackMachine {
    cursor: PlaybackCursor,
    context: Option<PlaybackContext>,
}

impl PlaybackMachine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub(crate) fn status(&self) -> PlaybackStatus {
        self.cursor.status
    }

    pub(crate) fn context(&self) -> Option<&PlaybackContext> {
        self.context.as_ref()
    }

    /// Row of the unit producing audio right now.
    pub(crate) fn sounding_row(&self) -> Option<&str> {
        let index = self.cursor.sounding?;
        let unit = self.context.as_ref()?.sequence.get(index)?;
        Some(&unit.row_id)
    }
}
