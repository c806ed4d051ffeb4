use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStdout, Command as ProcessCommand, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, warn};

use super::{AudioOutput, AudioSignal, AudioTicket};

struct ActiveClip {
    ticket: AudioTicket,
    child: Child,
    /// Fires once the player prints the start marker.
    playing: Option<Receiver<()>>,
    announced: bool,
}

impl ActiveClip {
    fn marker_seen(&mut self) -> bool {
        let Some(playing) = &self.playing else {
            return false;
        };
        match playing.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.playing = None;
                false
            }
        }
    }
}

/// Plays each clip through an external player process (`mpv` by default).
///
/// A clip counts as started when the player prints `start_marker` on stdout.
/// Without a marker the start is only known once the player exits cleanly.
pub(crate) struct ProcessAudio {
    command: Vec<String>,
    start_marker: Option<String>,
    active: Option<ActiveClip>,
}

impl ProcessAudio {
    pub(crate) fn new(command: Vec<String>, start_marker: Option<String>) -> Result<Self> {
        if command.is_empty() {
            bail!("audio command is empty");
        }
        Ok(Self {
            command,
            start_marker: start_marker.filter(|marker| !marker.is_empty()),
            active: None,
        })
    }

    fn stop_active(&mut self) {
        let Some(mut clip) = self.active.take() else {
            return;
        };
        if let Err(err) = clip.child.kill() {
            debug!(error = %err, "audio process already gone");
        }
        if let Err(err) = clip.child.wait() {
            warn!(error = %err, "failed to reap audio process");
        }
    }

    #[cfg(test)]
    fn active_pid(&self) -> Option<u32> {
        self.active.as_ref().map(|clip| clip.child.id())
    }
}

/// Reads player output until it closes, signalling the first marker line.
fn watch_for_marker(stdout: ChildStdout, marker: String) -> Receiver<()> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut tx = Some(tx);
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else {
                break;
            };
            if line.contains(&marker)
                && let Some(tx) = tx.take()
            {
                let _ = tx.send(());
            }
        }
    });
    rx
}

impl AudioOutput for ProcessAudio {
    fn play(&mut self, ticket: AudioTicket, source: &str) -> Result<()> {
        self.stop_active();
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("audio command is empty"))?;
        let stdout = if self.start_marker.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = ProcessCommand::new(program)
            .args(args)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch {program}"))?;
        debug!(?ticket, pid = child.id(), source, "audio launched");

        let playing = match (&self.start_marker, child.stdout.take()) {
            (Some(marker), Some(out)) => Some(watch_for_marker(out, marker.clone())),
            _ => None,
        };
        self.active = Some(ActiveClip {
            ticket,
            child,
            playing,
            announced: false,
        });
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let clip = self.active.as_mut().context("no audio to pause")?;
        signal_child(&clip.child, Signal::Stop)
    }

    fn resume(&mut self) -> Result<()> {
        let clip = self.active.as_mut().context("no audio to resume")?;
        signal_child(&clip.child, Signal::Continue)
    }

    fn halt(&mut self) {
        self.stop_active();
    }

    fn poll(&mut self) -> Vec<AudioSignal> {
        let mut signals = Vec::new();
        let Some(clip) = self.active.as_mut() else {
            return signals;
        };

        if !clip.announced && clip.marker_seen() {
            clip.announced = true;
            signals.push(AudioSignal::Started(clip.ticket));
        }

        match clip.child.try_wait() {
            Ok(Some(status)) => {
                let ticket = clip.ticket;
                let announced = clip.announced || clip.marker_seen();
                self.active = None;
                if status.success() {
                    if !announced {
                        signals.push(AudioSignal::Started(ticket));
                    }
                    signals.push(AudioSignal::Finished(ticket));
                } else {
                    signals.push(AudioSignal::Failed(
                        ticket,
                        format!("player exited with {status}"),
                    ));
                }
            }
            Ok(None) => {}
            Err(err) => {
                let ticket = clip.ticket;
                self.stop_active();
                signals.push(AudioSignal::Failed(
                    ticket,
                    format!("failed to poll player: {err}"),
                ));
            }
        }
        signals
    }

    fn is_busy(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for ProcessAudio {
    fn drop(&mut self) {
        self.stop_active();
    }
}

enum Signal {
    Stop,
    Continue,
}

#[cfg(unix)]
fn signal_child(child: &Child, signal: Signal) -> Result<()> {
    let signum = match signal {
        Signal::Stop => libc::SIGSTOP,
        Signal::Continue => libc::SIGCONT,
    };
    let pid = child.id() as libc::pid_t;
    if unsafe { libc::kill(pid, signum) } != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("failed to signal audio process {pid}"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn signal_child(_child: &Child, _signal: Signal) -> Result<()> {
    bail!("pausing audio is only supported on unix")
}

/// Splits a command line on whitespace, honoring double quotes.
pub(crate) fn split_command(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in raw.chars() {
        match ch {
            '"' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::app::playback::UnitTicket;
    use std::time::{Duration, Instant};

    const TICKET: AudioTicket = AudioTicket::Unit(UnitTicket {
        generation: 1,
        index: 0,
    });

    fn shell(script: &str, marker: Option<&str>) -> ProcessAudio {
        let command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        ProcessAudio::new(command, marker.map(str::to_string)).expect("audio")
    }

    fn poll_for(
        audio: &mut ProcessAudio,
        wait: Duration,
        done: impl Fn(&[AudioSignal]) -> bool,
    ) -> Vec<AudioSignal> {
        let deadline = Instant::now() + wait;
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            seen.extend(audio.poll());
            if done(&seen) {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        seen
    }

    fn ended(signals: &[AudioSignal]) -> bool {
        signals
            .iter()
            .any(|signal| matches!(signal, AudioSignal::Finished(_) | AudioSignal::Failed(..)))
    }

    fn started(signals: &[AudioSignal]) -> bool {
        signals
            .iter()
            .any(|signal| matches!(signal, AudioSignal::Started(_)))
    }

    #[cfg(target_os = "linux")]
    fn process_state(pid: u32) -> Option<char> {
        let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
        stat.rsplit_once(") ")?.1.chars().next()
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(ProcessAudio::new(Vec::new(), None).is_err());
    }

    #[test]
    fn missing_program_fails_to_play() {
        let mut audio =
            ProcessAudio::new(vec!["/nonexistent/vocab-player-audio".to_string()], None)
                .expect("audio");
        assert!(audio.play(TICKET, "a.mp3").is_err());
        assert!(!audio.is_busy());
    }

    #[test]
    fn clean_exit_without_marker_counts_as_start_and_finish() {
        let mut audio = shell("exit 0", None);
        audio.play(TICKET, "a.mp3").expect("play");

        let signals = poll_for(&mut audio, Duration::from_secs(3), ended);

        assert_eq!(
            signals,
            vec![AudioSignal::Started(TICKET), AudioSignal::Finished(TICKET)]
        );
        assert!(!audio.is_busy());
    }

    #[test]
    fn slow_rejection_is_never_reported_as_started() {
        for marker in [None, Some("vocab-player:playing")] {
            let mut audio = shell("echo resolving; sleep 0.8; exit 2", marker);
            audio.play(TICKET, "https://media.test/a.mp3").expect("play");

            let early = poll_for(&mut audio, Duration::from_millis(300), |_| false);
            assert!(early.is_empty(), "signals while still loading: {early:?}");

            let signals = poll_for(&mut audio, Duration::from_secs(3), ended);
            assert!(
                matches!(signals.as_slice(), [AudioSignal::Failed(TICKET, _)]),
                "unexpected signals: {signals:?}"
            );
        }
    }

    #[test]
    fn marker_line_announces_the_start_while_playing() {
        let mut audio = shell(
            "echo vocab-player:playing; exec sleep 5",
            Some("vocab-player:playing"),
        );
        audio.play(TICKET, "a.mp3").expect("play");

        let signals = poll_for(&mut audio, Duration::from_secs(3), started);
        assert_eq!(signals, vec![AudioSignal::Started(TICKET)]);
        assert!(audio.is_busy());

        audio.halt();
        assert!(!audio.is_busy());
        assert!(audio.poll().is_empty());
    }

    #[test]
    fn failure_after_marker_reports_start_then_failure() {
        let mut audio = shell(
            "echo vocab-player:playing; sleep 0.2; exit 3",
            Some("vocab-player:playing"),
        );
        audio.play(TICKET, "a.mp3").expect("play");

        let signals = poll_for(&mut audio, Duration::from_secs(3), ended);
        assert!(
            matches!(
                signals.as_slice(),
                [AudioSignal::Started(TICKET), AudioSignal::Failed(TICKET, _)]
            ),
            "unexpected signals: {signals:?}"
        );
    }

    #[test]
    fn pause_and_resume_need_a_clip() {
        let mut audio = shell("exit 0", None);
        assert!(audio.pause().is_err());
        assert!(audio.resume().is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pause_and_resume_stop_and_continue_the_process() {
        let mut audio = shell("exec sleep 5", None);
        audio.play(TICKET, "a.mp3").expect("play");
        let pid = audio.active_pid().expect("pid");

        let wait_for = |want_stopped: bool| {
            let deadline = Instant::now() + Duration::from_secs(2);
            while Instant::now() < deadline {
                if (process_state(pid) == Some('T')) == want_stopped {
                    return true;
                }
                thread::sleep(Duration::from_millis(10));
            }
            false
        };

        audio.pause().expect("pause");
        assert!(wait_for(true), "process was not stopped");
        audio.resume().expect("resume");
        assert!(wait_for(false), "process was not continued");
        audio.halt();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn halt_replay_and_drop_reap_the_process() {
        let mut audio = shell("exec sleep 5", None);
        audio.play(TICKET, "a.mp3").expect("play");
        let first = audio.active_pid().expect("pid");

        audio.play(TICKET, "b.mp3").expect("replay");
        let second = audio.active_pid().expect("pid");
        assert_ne!(first, second);
        assert_eq!(process_state(first), None, "replaced clip still running");

        audio.halt();
        assert_eq!(process_state(second), None, "halted clip still running");

        audio.play(TICKET, "c.mp3").expect("play");
        let third = audio.active_pid().expect("pid");
        drop(audio);
        assert_eq!(process_state(third), None, "dropped clip still running");
    }
}
