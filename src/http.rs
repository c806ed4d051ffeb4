use std::thread;
use std::time::Duration;

use tracing::debug;

/// Timeouts and retry policy for audio locator probes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProbeConfig {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(5),
            attempts: 2,
            retry_delay: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProbeOutcome {
    Reachable(u16),
    /// The server answered, but not with the file.
    Rejected { status: u16, attempts: usize },
    Unreachable { attempts: usize, reason: String },
}

impl ProbeOutcome {
    pub(crate) fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable(_))
    }
}

fn is_transient(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

/// HEADs `url`. Transient statuses and transport errors are retried; a
/// definite answer such as 404 is returned on the first attempt.
pub(crate) fn probe(url: &str, config: &ProbeConfig) -> ProbeOutcome {
    let attempts = config.attempts.max(1);
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(config.connect_timeout)
        .timeout_read(config.read_timeout)
        .timeout_write(config.read_timeout)
        .build();

    let mut attempt = 1;
    loop {
        let retry = match agent.head(url).call() {
            Ok(response) => return ProbeOutcome::Reachable(response.status()),
            Err(ureq::Error::Status(status, _)) if !is_transient(status) || attempt == attempts => {
                return ProbeOutcome::Rejected { status, attempts: attempt };
            }
            Err(ureq::Error::Status(status, _)) => format!("HTTP {status}"),
            Err(ureq::Error::Transport(err)) if attempt == attempts => {
                return ProbeOutcome::Unreachable {
                    attempts: attempt,
                    reason: err.to_string(),
                };
            }
            Err(ureq::Error::Transport(err)) => err.to_string(),
        };
        debug!(url, attempt, reason = %retry, "probe failed, retrying");
        attempt += 1;
        thread::sleep(config.retry_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers one connection per scripted `(delay, status)` entry, in order.
    struct ScriptedServer {
        url: String,
        hits: Arc<AtomicUsize>,
    }

    impl ScriptedServer {
        fn start(script: Vec<(Duration, u16)>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
            let url = format!("http://{}/si-01-001.mp3", listener.local_addr().expect("addr"));
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = Arc::clone(&hits);
            thread::spawn(move || {
                for (stream, (delay, status)) in listener.incoming().zip(script) {
                    let Ok(mut stream) = stream else {
                        break;
                    };
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::spawn(move || {
                        read_head(&mut stream);
                        thread::sleep(delay);
                        let _ = write!(
                            stream,
                            "HTTP/1.1 {status} Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        );
                    });
                }
            });
            Self { url, hits }
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    fn read_head(stream: &mut TcpStream) {
        let _ = stream.set_read_timeout(Some(Duration::from_millis(200)));
        let mut seen = Vec::new();
        let mut buf = [0_u8; 512];
        while let Ok(read) = stream.read(&mut buf) {
            if read == 0 {
                break;
            }
            seen.extend_from_slice(&buf[..read]);
            if seen.windows(4).any(|window| window == b"\r\n\r\n") {
                break;
            }
        }
    }

    fn quick(attempts: usize) -> ProbeConfig {
        ProbeConfig {
            connect_timeout: Duration::from_millis(200),
            read_timeout: Duration::from_millis(200),
            attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn transient_statuses_are_retried_until_the_file_answers() {
        let server = ScriptedServer::start(vec![
            (Duration::ZERO, 503),
            (Duration::ZERO, 429),
            (Duration::ZERO, 200),
        ]);

        let outcome = probe(&server.url, &quick(3));

        assert_eq!(outcome, ProbeOutcome::Reachable(200));
        assert!(outcome.is_reachable());
        assert_eq!(server.hits(), 3);
    }

    #[test]
    fn missing_file_is_reported_without_retrying() {
        let server = ScriptedServer::start(vec![(Duration::ZERO, 404)]);

        let outcome = probe(&server.url, &quick(5));

        assert_eq!(
            outcome,
            ProbeOutcome::Rejected {
                status: 404,
                attempts: 1
            }
        );
        assert_eq!(server.hits(), 1);
    }

    #[test]
    fn slow_answer_is_retried_after_read_timeout() {
        let server = ScriptedServer::start(vec![
            (Duration::from_millis(150), 200),
            (Duration::ZERO, 200),
        ]);
        let config = ProbeConfig {
            read_timeout: Duration::from_millis(20),
            ..quick(2)
        };

        assert_eq!(probe(&server.url, &config), ProbeOutcome::Reachable(200));
        assert_eq!(server.hits(), 2);
    }

    #[test]
    fn exhausted_transient_status_is_rejected_with_attempt_count() {
        let server = ScriptedServer::start(vec![(Duration::ZERO, 500), (Duration::ZERO, 500)]);

        assert_eq!(
            probe(&server.url, &quick(2)),
            ProbeOutcome::Rejected {
                status: 500,
                attempts: 2
            }
        );
    }

    #[test]
    fn closed_port_is_unreachable() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let url = format!("http://{}/a.mp3", listener.local_addr().expect("addr"));
        drop(listener);

        let outcome = probe(&url, &quick(2));

        assert!(
            matches!(outcome, ProbeOutcome::Unreachable { attempts: 2, .. }),
            "unexpected outcome: {outcome:?}"
        );
    }
}
