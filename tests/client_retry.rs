// Retry, timeout and momentary-pulse behaviour against a scripted in-memory
// board. Each connection attempt consumes one scripted reply.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::{sleep, Duration, Instant};

use tcp_switch::{
    Connector, DeviceClient, DeviceConfig, DeviceEvent, Endpoint, ErrorKind, RelayError,
};

#[derive(Debug, Clone, Copy)]
enum Reply {
    /// Connection refused
    Refuse,
    /// Accept, read the command and answer with this text
    Answer(&'static str),
    /// Accept and read the command, then never answer
    Silent,
}

#[derive(Clone, Default)]
struct ScriptedBoard {
    script: Arc<Mutex<VecDeque<Reply>>>,
    attempts: Arc<AtomicU32>,
    received: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl ScriptedBoard {
    fn new(script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Default::default()
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn commands(&self) -> Vec<String> {
        self.received.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    fn received_at(&self) -> Vec<Instant> {
        self.received.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl Connector for ScriptedBoard {
    type Stream = DuplexStream;

    async fn connect(
        &self,
        _endpoint: &Endpoint,
        _connect_timeout: Duration,
    ) -> tcp_switch::Result<DuplexStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Refuse);
        let answer = match reply {
            Reply::Refuse => {
                return Err(RelayError::Io(std::io::ErrorKind::ConnectionRefused.into()));
            }
            Reply::Answer(text) => Some(text),
            Reply::Silent => None,
        };

        let (client, mut device) = duplex(1024);
        let received = Arc::clone(&self.received);
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = device.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            let command = String::from_utf8_lossy(&buf[..n]).into_owned();
            received.lock().unwrap().push((Instant::now(), command));
            match answer {
                Some(text) => {
                    let _ = device.write_all(text.as_bytes()).await;
                }
                // keep our end open so the client has to time out
                None => std::future::pending::<()>().await,
            }
        });
        Ok(client)
    }
}

fn client(board: &ScriptedBoard, channels: u8, delay: u8) -> DeviceClient<ScriptedBoard> {
    let config = DeviceConfig::builder()
        .name("Bench")
        .host("relay.test")
        .channel_count(channels)
        .momentary_delay(delay)
        .build();
    DeviceClient::with_connector(config, board.clone()).unwrap()
}

// =========================================================================
// Retry bound
// =========================================================================

#[tokio::test]
async fn succeeds_on_the_last_allowed_attempt() {
    use Reply::*;
    let board = ScriptedBoard::new([Refuse, Refuse, Refuse, Answer("010")]);
    let client = client(&board, 3, 0);

    assert!(client.get_status(1).await);
    assert_eq!(board.attempts(), 4);
}

#[tokio::test]
async fn switch_succeeds_on_the_last_allowed_attempt() {
    use Reply::*;
    let board = ScriptedBoard::new([Answer(""), Answer(""), Answer(""), Answer("10")]);
    let client = client(&board, 2, 0);

    assert!(client.turn_on(0).await);
    assert_eq!(board.attempts(), 4);
    assert_eq!(board.commands(), vec!["11", "11", "11", "11"]);
    assert_eq!(board.remaining(), 0);
}

#[tokio::test]
async fn gives_up_after_four_attempts() {
    use Reply::*;
    // a fifth reply is queued but must never be used
    let board = ScriptedBoard::new([Refuse, Refuse, Refuse, Refuse, Answer("111")]);
    let client = client(&board, 3, 0);
    let mut events = client.subscribe();

    assert!(!client.get_status(0).await);
    assert_eq!(board.attempts(), 4);
    assert_eq!(board.remaining(), 1);

    match events.recv().await.unwrap() {
        DeviceEvent::CommandFailed(diagnostic) => {
            assert_eq!(diagnostic.attempts, 4);
            assert_eq!(diagnostic.kind, ErrorKind::Transport);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn exhausted_switch_reports_typed_error() {
    let board = ScriptedBoard::default();
    let client = client(&board, 2, 0);

    let err = client.try_set_channel(0, true).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.attempts(), Some(4));
    match err {
        RelayError::RetriesExhausted {
            endpoint,
            command,
            source,
            ..
        } => {
            assert_eq!(endpoint.to_string(), "relay.test:6722");
            assert_eq!(command, "11");
            assert!(matches!(*source, RelayError::Io(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn short_response_is_retried() {
    use Reply::*;
    let board = ScriptedBoard::new([Answer("1"), Answer("0010")]);
    let client = client(&board, 4, 0);

    assert!(client.get_status(2).await);
    assert_eq!(board.attempts(), 2);
    assert_eq!(board.commands(), vec!["00", "00"]);
}

#[tokio::test]
async fn repeated_short_responses_exhaust_as_protocol_error() {
    use Reply::*;
    let board = ScriptedBoard::new([Answer("1"), Answer("1"), Answer("1"), Answer("1")]);
    let client = client(&board, 4, 0);

    match client.try_get_status(3).await {
        Err(RelayError::RetriesExhausted { source, .. }) => {
            assert_eq!(source.kind(), ErrorKind::Protocol);
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(board.attempts(), 4);
}

#[tokio::test]
async fn empty_reply_counts_as_failure() {
    use Reply::*;
    let board = ScriptedBoard::new([Answer(""), Answer("11")]);
    let client = client(&board, 2, 0);

    assert!(client.get_status(1).await);
    assert_eq!(board.attempts(), 2);
}

// =========================================================================
// Timeouts
// =========================================================================

#[tokio::test(start_paused = true)]
async fn silent_board_times_out_then_retries() {
    use Reply::*;
    let board = ScriptedBoard::new([Silent, Answer("01")]);
    let client = client(&board, 2, 0);

    let start = Instant::now();
    assert!(client.get_status(1).await);
    assert!(start.elapsed() >= Duration::from_millis(5000));
    assert_eq!(board.attempts(), 2);
}

// =========================================================================
// Commands on the wire
// =========================================================================

#[tokio::test(start_paused = true)]
async fn momentary_switch_command_carries_delay() {
    let board = ScriptedBoard::new([Reply::Answer("010")]);
    let client = client(&board, 3, 5);

    assert!(client.turn_on(1).await);
    assert_eq!(board.commands(), vec!["12:5"]);
}

#[tokio::test]
async fn latching_switch_command_has_no_suffix() {
    let board = ScriptedBoard::new([Reply::Answer("000"), Reply::Answer("OK")]);
    let client = client(&board, 3, 0);

    assert!(!client.turn_off(1).await);
    assert!(client.turn_on(2).await);
    assert_eq!(board.commands(), vec!["22", "13"]);
}

#[tokio::test]
async fn raw_command_returns_response_text() {
    let board = ScriptedBoard::new([Reply::Answer("1010")]);
    let client = client(&board, 4, 0);

    assert_eq!(client.send_command("00").await.unwrap(), "1010");
}

// =========================================================================
// Momentary delay
// =========================================================================

#[tokio::test(start_paused = true)]
async fn momentary_switch_waits_for_the_pulse() {
    let board = ScriptedBoard::new([Reply::Answer("10")]);
    let client = client(&board, 2, 2);

    let start = Instant::now();
    assert!(client.turn_on(0).await);
    assert!(start.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn latching_switch_returns_immediately() {
    let board = ScriptedBoard::new([Reply::Answer("10")]);
    let client = client(&board, 2, 0);

    let start = Instant::now();
    assert!(client.turn_on(0).await);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn status_read_waits_out_a_running_pulse() {
    use Reply::*;
    let board = ScriptedBoard::new([Answer("10"), Answer("00")]);
    let client = client(&board, 2, 2);

    let (switched, status) = tokio::join!(client.turn_on(0), async {
        sleep(Duration::from_millis(10)).await;
        client.get_status(0).await
    });
    assert!(switched);
    // the pulse has ended by the time the read reaches the board
    assert!(!status);

    let times = board.received_at();
    assert_eq!(times.len(), 2);
    assert!(times[1] - times[0] >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn failed_momentary_switch_does_not_wait() {
    let board = ScriptedBoard::default();
    let client = client(&board, 2, 3);

    let start = Instant::now();
    assert!(!client.turn_on(0).await);
    assert!(start.elapsed() < Duration::from_secs(3));
}
