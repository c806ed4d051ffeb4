mod audio;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::playback::{
    NoticeCue, PlaybackAction, PlaybackContext, PlaybackEvent, PlaybackMachine, PlaybackStatus,
    UnitTicket,
};
use super::progress::ProgressStore;

pub(crate) use audio::{ProcessAudio, split_command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AudioTicket {
    Unit(UnitTicket),
    Notice { generation: u64, cue: NoticeCue },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AudioSignal {
    Started(AudioTicket),
    Finished(AudioTicket),
    Failed(AudioTicket, String),
}

/// One clip at a time; `play` replaces whatever is sounding.
pub(crate) trait AudioOutput {
    fn play(&mut self, ticket: AudioTicket, source: &str) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn halt(&mut self);
    fn poll(&mut self) -> Vec<AudioSignal>;
    fn is_busy(&self) -> bool;
}

/// Builds the playback context for a category of the active collection.
pub(crate) trait CategoryBrowser {
    fn open(&mut self, sub_collection_id: &str) -> Result<PlaybackContext>;
}

#[derive(Debug, Clone)]
pub(crate) struct NoticeSources {
    pub(crate) empty_collection: PathBuf,
    pub(crate) end_of_playback: PathBuf,
}

impl NoticeSources {
    fn source(&self, cue: NoticeCue) -> String {
        let path = match cue {
            NoticeCue::EmptyCollection => &self.empty_collection,
            NoticeCue::EndOfPlayback => &self.end_of_playback,
        };
        path.to_string_lossy().into_owned()
    }
}

/// Executes machine actions against audio, browser and store, and turns
/// audio signals back into machine events.
pub(crate) struct Player<A, B> {
    machine: PlaybackMachine,
    audio: A,
    browser: B,
    store: ProgressStore,
    notices: NoticeSources,
    settle_delay: Duration,
    queue: VecDeque<PlaybackEvent>,
    messages: Vec<String>,
}

impl<A: AudioOutput, B: CategoryBrowser> Player<A, B> {
    pub(crate) fn new(audio: A, browser: B, store: ProgressStore, notices: NoticeSources) -> Self {
        Self {
            machine: PlaybackMachine::new(),
            audio,
            browser,
            store,
            notices,
            settle_delay: Duration::ZERO,
            queue: VecDeque::new(),
            messages: Vec::new(),
        }
    }

    pub(crate) fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub(crate) fn machine(&self) -> &PlaybackMachine {
        &self.machine
    }

    pub(crate) fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ProgressStore {
        &mut self.store
    }

    pub(crate) fn browser(&self) -> &B {
        &self.browser
    }

    pub(crate) fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    #[cfg(test)]
    pub(crate) fn audio(&self) -> &A {
        &self.audio
    }

    /// Manual category selection.
    pub(crate) fn select(&mut self, sub_collection_id: &str) -> Result<()> {
        let context = self.browser.open(sub_collection_id)?;
        self.submit(PlaybackEvent::CollectionLoaded(context));
        Ok(())
    }

    pub(crate) fn submit(&mut self, event: PlaybackEvent) {
        self.queue.push_back(event);
        self.drain();
    }

    /// Collects audio signals and processes everything they cause.
    /// Returns whether anything happened.
    pub(crate) fn pump(&mut self) -> bool {
        for signal in self.audio.poll() {
            if let Some(event) = signal_event(signal) {
                self.queue.push_back(event);
            }
        }
        self.drain()
    }

    pub(crate) fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    /// Idle with nothing sounding and nothing queued.
    pub(crate) fn is_settled(&self) -> bool {
        self.machine.status() == PlaybackStatus::Idle
            && !self.audio.is_busy()
            && self.queue.is_empty()
    }

    fn drain(&mut self) -> bool {
        let mut progressed = false;
        while let Some(event) = self.queue.pop_front() {
            progressed = true;
            for action in self.machine.dispatch(event) {
                self.execute(action);
            }
        }
        progressed
    }

    fn execute(&mut self, action: PlaybackAction) {
        match action {
            PlaybackAction::StartUnit { ticket, source } => {
                if let Err(err) = self.audio.play(AudioTicket::Unit(ticket), &source) {
                    self.queue.push_back(PlaybackEvent::UnitFailed {
                        ticket,
                        reason: format!("{err:#}"),
                    });
                }
            }
            PlaybackAction::PauseUnit => {
                if let Err(err) = self.audio.pause() {
                    warn!(error = %err, "failed to pause audio");
                }
            }
            PlaybackAction::ResumeUnit => {
                if let Err(err) = self.audio.resume() {
                    warn!(error = %err, "failed to resume audio");
                }
            }
            PlaybackAction::HaltAudio => self.audio.halt(),
            PlaybackAction::SaveBookmark {
                key,
                row_id,
                percentage,
            } => self.store.save(
                &row_id,
                &percentage,
                &key.sub_collection_id,
                &key.collection_id,
            ),
            PlaybackAction::RemoveBookmark(key) => {
                self.store.remove(&key.collection_id, &key.sub_collection_id)
            }
            PlaybackAction::SelectSubCollection(sub_collection) => {
                if !self.settle_delay.is_zero() {
                    thread::sleep(self.settle_delay);
                }
                match self.browser.open(&sub_collection) {
                    Ok(context) => self.queue.push_back(PlaybackEvent::CollectionLoaded(context)),
                    Err(err) => {
                        warn!(category = %sub_collection, error = %err, "category selection failed");
                        self.queue
                            .push_back(PlaybackEvent::SelectionFailed { sub_collection });
                    }
                }
            }
            PlaybackAction::PlayNotice { generation, cue } => {
                let source = self.notices.source(cue);
                if let Err(err) = self
                    .audio
                    .play(AudioTicket::Notice { generation, cue }, &source)
                {
                    warn!(?cue, error = %err, "failed to play notice cue");
                    self.queue
                        .push_back(PlaybackEvent::NoticeFinished { generation, cue });
                }
            }
            PlaybackAction::Message(text) => {
                info!("{text}");
                self.messages.push(text);
            }
        }
    }
}

fn signal_event(signal: AudioSignal) -> Option<PlaybackEvent> {
    match signal {
        AudioSignal::Started(AudioTicket::Unit(ticket)) => Some(PlaybackEvent::UnitStarted(ticket)),
        AudioSignal::Finished(AudioTicket::Unit(ticket)) => {
            Some(PlaybackEvent::UnitCompleted(ticket))
        }
        AudioSignal::Failed(AudioTicket::Unit(ticket), reason) => {
            Some(PlaybackEvent::UnitFailed { ticket, reason })
        }
        AudioSignal::Started(AudioTicket::Notice { .. }) => None,
        AudioSignal::Finished(AudioTicket::Notice { generation, cue }) => {
            Some(PlaybackEvent::NoticeFinished { generation, cue })
        }
        AudioSignal::Failed(AudioTicket::Notice { generation, cue }, reason) => {
            debug!(?cue, reason, "notice cue failed");
            Some(PlaybackEvent::NoticeFinished { generation, cue })
        }
    }
}
