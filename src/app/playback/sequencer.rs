use tracing::{debug, warn};

use super::{
    NoticeCue, Outbox, PlaybackAction, PlaybackEvent, PlaybackMachine, PlaybackStatus, UnitTicket,
};

impl PlaybackMachine {
    pub(super) fn play_from(&mut self, index: usize, out: &mut Outbox) {
        let len = match &self.context {
            Some(context) => context.sequence.len(),
            None => {
                out.message("Select a category before starting playback.");
                return;
            }
        };
        if index >= len {
            out.message(format!("Nothing to play at position {index}."));
            return;
        }

        if self.cursor.status.is_active() {
            self.halt(out);
        }
        self.cursor.cross_collection = false;
        self.cursor.pending_finished = None;
        self.cursor.status = PlaybackStatus::Playing;
        self.cursor.bump();
        self.cursor.current_index = index;
        self.advance(out);
    }

    /// Starts the first playable unit at or after the cursor, or reports exhaustion.
    pub(super) fn advance(&mut self, out: &mut Outbox) {
        self.cursor.sounding = None;
        let Some(context) = &self.context else {
            return;
        };
        let sequence = &context.sequence;

        let mut index = self.cursor.current_index;
        while let Some(unit) = sequence.get(index) {
            if let (false, Some(source)) = (unit.skip, &unit.source) {
                self.cursor.current_index = index;
                out.emit(PlaybackAction::StartUnit {
                    ticket: UnitTicket {
                        generation: self.cursor.generation,
                        index,
                    },
                    source: source.clone(),
                });
                return;
            }
            debug!(index, row = %unit.row_id, kind = ?unit.kind, "skipping unit");
            index += 1;
        }

        self.cursor.current_index = index;
        out.raise(PlaybackEvent::SequenceExhausted {
            generation: self.cursor.generation,
        });
    }

    pub(super) fn on_unit_started(&mut self, ticket: UnitTicket, out: &mut Outbox) {
        if !self.cursor.is_live(ticket) {
            debug!(?ticket, "stale start ignored");
            return;
        }
        let Some(context) = &self.context else {
            return;
        };
        let Some(unit) = context.sequence.get(ticket.index) else {
            return;
        };
        self.cursor.sounding = Some(ticket.index);

        if let Some(finished) = self.cursor.pending_finished.take() {
            out.emit(PlaybackAction::RemoveBookmark(finished));
        }
        out.emit(PlaybackAction::SaveBookmark {
            key: context.key(),
            row_id: unit.row_id.clone(),
            percentage: context.sequence.percentage_for_row(&unit.row_id),
        });
    }

    pub(super) fn on_unit_completed(&mut self, ticket: UnitTicket, out: &mut Outbox) {
        if self.park(ticket) {
            return;
        }
        if !self.cursor.is_live(ticket) {
            debug!(?ticket, "stale completion ignored");
            return;
        }
        self.cursor.current_index = ticket.index + 1;
        self.advance(out);
    }

    pub(super) fn on_unit_failed(&mut self, ticket: UnitTicket, reason: &str, out: &mut Outbox) {
        if self.park(ticket) {
            warn!(index = ticket.index, reason, "audio unit failed while paused");
            return;
        }
        if !self.cursor.is_live(ticket) {
            debug!(?ticket, "stale failure ignored");
            return;
        }
        warn!(index = ticket.index, reason, "audio unit failed, skipping");
        self.cursor.current_index = ticket.index + 1;
        self.advance(out);
    }

    /// Holds the end of the current unit until the user resumes.
    fn park(&mut self, ticket: UnitTicket) -> bool {
        if self.cursor.status != PlaybackStatus::Paused || !self.cursor.is_current(ticket) {
            return false;
        }
        debug!(?ticket, "unit ended while paused");
        self.cursor.parked = Some(ticket.index);
        self.cursor.sounding = None;
        true
    }

    /// Silences the current unit and invalidates every ticket in flight.
    pub(super) fn halt(&mut self, out: &mut Outbox) {
        out.emit(PlaybackAction::HaltAudio);
        self.cursor.current_index = 0;
        self.cursor.status = PlaybackStatus::Idle;
        self.cursor.sounding = None;
        self.cursor.parked = None;
        self.cursor.bump();
    }

    /// End of the whole run. An unresolved pending key is dropped, not removed.
    pub(super) fn terminate(&mut self, out: &mut Outbox) {
        self.cursor.current_index = 0;
        self.cursor.status = PlaybackStatus::Idle;
        self.cursor.sounding = None;
        self.cursor.parked = None;
        self.cursor.cross_collection = false;
        self.cursor.pending_finished = None;
        let generation = self.cursor.bump();
        out.emit(PlaybackAction::PlayNotice {
            generation,
            cue: NoticeCue::EndOfPlayback,
        });
    }
}
