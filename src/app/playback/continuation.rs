use tracing::{debug, error, info};

use super::{
    NoticeCue, Outbox, PlaybackAction, PlaybackContext, PlaybackEvent, PlaybackMachine,
    PlaybackStatus,
};

impl PlaybackMachine {
    pub(super) fn on_sequence_exhausted(&mut self, generation: u64, out: &mut Outbox) {
        if generation != self.cursor.generation || self.cursor.status != PlaybackStatus::Playing {
            return;
        }
        let Some(context) = &self.context else {
            return;
        };
        let Some(next) = context.next_sub_collection().map(str::to_string) else {
            self.terminate(out);
            return;
        };

        info!(from = %context.sub_collection_id, to = %next, "category finished, continuing");
        if let Some(outstanding) = self.cursor.pending_finished.replace(context.key()) {
            out.emit(PlaybackAction::RemoveBookmark(outstanding));
        }
        self.cursor.cross_collection = true;
        self.cursor.sounding = None;
        self.cursor.bump();
        out.emit(PlaybackAction::SelectSubCollection(next));
    }

    pub(super) fn on_collection_loaded(&mut self, context: PlaybackContext, out: &mut Outbox) {
        let continuing = self.cursor.cross_collection && self.cursor.status == PlaybackStatus::Playing;
        if !continuing && self.cursor.status.is_active() {
            self.halt(out);
        }

        let empty = context.is_empty();
        self.context = Some(context);
        self.cursor.current_index = 0;
        self.cursor.sounding = None;

        if empty {
            out.raise(PlaybackEvent::CollectionEmpty);
        } else if continuing {
            self.cursor.cross_collection = false;
            self.cursor.bump();
            self.advance(out);
        }
    }

    pub(super) fn on_collection_empty(&mut self, out: &mut Outbox) {
        let name = self
            .context
            .as_ref()
            .map(|context| context.sub_collection_id.clone())
            .unwrap_or_default();

        if self.cursor.cross_collection && self.cursor.status == PlaybackStatus::Playing {
            info!(category = %name, "category is empty, skipping");
            out.emit(PlaybackAction::PlayNotice {
                generation: self.cursor.generation,
                cue: NoticeCue::EmptyCollection,
            });
        } else {
            out.message(format!("Category {name} has no rows to play."));
        }
    }

    pub(super) fn on_notice_finished(&mut self, generation: u64, cue: NoticeCue, out: &mut Outbox) {
        if generation != self.cursor.generation || cue != NoticeCue::EmptyCollection {
            debug!(?cue, generation, "notice finished");
            return;
        }
        if !self.cursor.cross_collection || self.cursor.status != PlaybackStatus::Playing {
            return;
        }

        if let Some(finished) = self.cursor.pending_finished.take() {
            out.emit(PlaybackAction::RemoveBookmark(finished));
        }
        let next = self
            .context
            .as_ref()
            .and_then(|context| context.next_sub_collection())
            .map(str::to_string);
        match next {
            Some(next) => {
                self.cursor.bump();
                out.emit(PlaybackAction::SelectSubCollection(next));
            }
            None => self.terminate(out),
        }
    }

    pub(super) fn on_selection_failed(&mut self, sub_collection: &str, out: &mut Outbox) {
        if self.cursor.cross_collection && self.cursor.status == PlaybackStatus::Playing {
            error!(category = sub_collection, "could not open next category, ending playback");
            self.terminate(out);
        } else {
            out.message(format!("Could not open category {sub_collection}."));
        }
    }
}
