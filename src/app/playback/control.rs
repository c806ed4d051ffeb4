use tracing::{debug, trace};

use super::{Outbox, PlaybackAction, PlaybackEvent, PlaybackMachine, PlaybackStatus};
use crate::app::sequence::normalize_row_id;

impl PlaybackMachine {
    /// Handles one event and every follow-up it raises, returning the
    /// resulting actions in the order they must be executed.
    pub(crate) fn dispatch(&mut self, event: PlaybackEvent) -> Vec<PlaybackAction> {
        let mut out = Outbox::default();
        out.raise(event);
        while let Some(event) = out.follow_ups.pop_front() {
            trace!(?event, generation = self.cursor.generation, "dispatch");
            self.handle(event, &mut out);
        }
        out.actions
    }

    fn handle(&mut self, event: PlaybackEvent, out: &mut Outbox) {
        match event {
            PlaybackEvent::CollectionLoaded(context) => self.on_collection_loaded(context, out),
            PlaybackEvent::PlayFrom { index } => self.play_from(index, out),
            PlaybackEvent::UnitStarted(ticket) => self.on_unit_started(ticket, out),
            PlaybackEvent::UnitCompleted(ticket) => self.on_unit_completed(ticket, out),
            PlaybackEvent::UnitFailed { ticket, reason } => {
                self.on_unit_failed(ticket, &reason, out)
            }
            PlaybackEvent::SequenceExhausted { generation } => {
                self.on_sequence_exhausted(generation, out)
            }
            PlaybackEvent::CollectionEmpty => self.on_collection_empty(out),
            PlaybackEvent::NoticeFinished { generation, cue } => {
                self.on_notice_finished(generation, cue, out)
            }
            PlaybackEvent::SelectionFailed { sub_collection } => {
                self.on_selection_failed(&sub_collection, out)
            }
            PlaybackEvent::UserPause => self.pause(out),
            PlaybackEvent::UserResume => self.resume(out),
            PlaybackEvent::UserStop => self.stop(out),
            PlaybackEvent::UserBookmark { row_id } => self.bookmark(&row_id, out),
        }
    }

    fn pause(&mut self, out: &mut Outbox) {
        if self.cursor.status != PlaybackStatus::Playing || self.cursor.sounding.is_none() {
            debug!(status = ?self.cursor.status, "pause ignored");
            return;
        }
        self.cursor.status = PlaybackStatus::Paused;
        out.emit(PlaybackAction::PauseUnit);
    }

    fn resume(&mut self, out: &mut Outbox) {
        if self.cursor.status != PlaybackStatus::Paused {
            debug!(status = ?self.cursor.status, "resume ignored");
            return;
        }
        self.cursor.status = PlaybackStatus::Playing;
        match self.cursor.parked.take() {
            Some(index) => {
                self.cursor.current_index = index + 1;
                self.advance(out);
            }
            None => out.emit(PlaybackAction::ResumeUnit),
        }
    }

    fn stop(&mut self, out: &mut Outbox) {
        if !self.cursor.status.is_active() {
            return;
        }
        self.halt(out);
        self.cursor.cross_collection = false;
        self.cursor.pending_finished = None;
    }

    fn bookmark(&mut self, row_id: &str, out: &mut Outbox) {
        let Some(context) = &self.context else {
            out.message("No category is loaded.");
            return;
        };
        let Some(row_id) = normalize_row_id(row_id) else {
            out.message(format!("Not a row number: {row_id}"));
            return;
        };
        if context.sequence.index_of_row(&row_id).is_none() {
            out.message(format!(
                "Row {row_id} is not part of {}.",
                context.sub_collection_id
            ));
            return;
        }
        out.emit(PlaybackAction::SaveBookmark {
            key: context.key(),
            percentage: context.sequence.percentage_for_row(&row_id),
            row_id,
        });
    }
}
