// geocontrol_node/src/transport.rs

//! JSON-lines plumbing between the outside world and the [`StateStore`].
//!
//! Input: one tagged envelope per line,
//! `{"topic": "current_state", "msg": {...odometry...}}` or
//! `{"topic": "desired_state", "msg": {...trajectory point...}}`.
//! Output: one [`Actuators`] object per line on the `rotor_speed_cmds` stream.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use geocontrol_core::prelude::{
    Actuators, MessageError, Odometry, RotorSpeedCommand, StateStore, TrajectoryPoint,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

// --- Topics ---

pub const CURRENT_STATE_TOPIC: &str = "current_state";
pub const DESIRED_STATE_TOPIC: &str = "desired_state";
pub const ROTOR_SPEED_TOPIC: &str = "rotor_speed_cmds";

/// One line of the input stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "topic", content = "msg", rename_all = "snake_case")]
pub enum FeedMessage {
    CurrentState(Odometry),
    DesiredState(TrajectoryPoint),
}

impl FeedMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            FeedMessage::CurrentState(_) => CURRENT_STATE_TOPIC,
            FeedMessage::DesiredState(_) => DESIRED_STATE_TOPIC,
        }
    }

    /// Validates the message and stores it. Returns the new sequence number of its feed.
    pub fn apply(&self, store: &StateStore) -> Result<u64, MessageError> {
        match self {
            FeedMessage::CurrentState(odometry) => store.update_current(odometry),
            FeedMessage::DesiredState(point) => store.update_desired(point),
        }
    }
}

/// Counters of one feed reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub current_accepted: u64,
    pub desired_accepted: u64,
    /// Lines that were not valid JSON envelopes.
    pub unparsable: u64,
    /// Envelopes whose message failed validation.
    pub rejected: u64,
}

impl FeedStats {
    pub fn accepted(&self) -> u64 {
        self.current_accepted + self.desired_accepted
    }
}

/// Reads envelopes from `reader` until end of input, updating `store` for every
/// valid message. Malformed lines, invalid UTF-8 included, are logged and
/// skipped; the last good snapshot stays in effect. Only a read error from
/// `reader` ends the loop early.
pub fn run_feed<R: BufRead>(mut reader: R, store: &StateStore) -> io::Result<FeedStats> {
    let mut stats = FeedStats::default();
    let mut line = Vec::new();
    let mut line_no = 0u64;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let message: FeedMessage = match serde_json::from_slice(&line) {
            Ok(m) => m,
            Err(e) => {
                stats.unparsable += 1;
                warn!("Ignoring feed line {}: {}", line_no, e);
                continue;
            }
        };

        match message.apply(store) {
            Ok(sequence) => {
                match message {
                    FeedMessage::CurrentState(_) => stats.current_accepted += 1,
                    FeedMessage::DesiredState(_) => stats.desired_accepted += 1,
                }
                debug!("Accepted {} #{} (line {})", message.topic(), sequence, line_no);
            }
            Err(e) => {
                stats.rejected += 1;
                warn!(
                    "Rejected {} message on line {}: {}. Keeping the last good state.",
                    message.topic(),
                    line_no,
                    e
                );
            }
        }
    }

    info!(
        "Feed input closed after {} accepted message(s) ({} unparsable, {} rejected).",
        stats.accepted(),
        stats.unparsable,
        stats.rejected
    );
    Ok(stats)
}

/// Runs [`run_feed`] on its own named thread. A read error is logged on that
/// thread before it is returned through the handle, so a detached feed does
/// not fail silently.
pub fn spawn_feed<R>(reader: R, store: Arc<StateStore>) -> io::Result<JoinHandle<io::Result<FeedStats>>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("feed".to_string())
        .spawn(move || {
            let result = run_feed(reader, &store);
            if let Err(e) = &result {
                error!("Feed input failed: {}. The last good state is held until it goes stale.", e);
            }
            result
        })
}

// =========================================================================
// == Rotor Command Output ==
// =========================================================================

/// The contract for anything that delivers rotor-speed commands to the vehicle.
pub trait RotorCommandSink: Send {
    fn publish(&mut self, command: &RotorSpeedCommand) -> io::Result<()>;
}

/// Writes every command as one `Actuators` JSON line and flushes immediately.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    published: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RotorCommandSink for JsonLinesSink<W> {
    fn publish(&mut self, command: &RotorSpeedCommand) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, &Actuators::from(*command))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.published += 1;
        Ok(())
    }
}

/// Commands queued between the tick and the writer thread.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Hands commands to a dedicated writer thread over a bounded channel, so
/// `publish` never blocks on the output stream.
///
/// A full queue drops the command and reports `WouldBlock`; the writer having
/// stopped (closed output, write error) reports `BrokenPipe`. Dropping the sink
/// closes the queue and waits for the writer to drain it.
#[derive(Debug)]
pub struct ChannelSink {
    sender: Option<SyncSender<RotorSpeedCommand>>,
    writer: Option<JoinHandle<io::Result<u64>>>,
    dropped: u64,
}

impl ChannelSink {
    /// Moves `inner` onto the `rotor-writer` thread, behind a queue of `capacity` commands.
    pub fn spawn<S>(inner: S, capacity: usize) -> io::Result<Self>
    where
        S: RotorCommandSink + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let writer = thread::Builder::new()
            .name("rotor-writer".to_string())
            .spawn(move || write_commands(inner, receiver))?;
        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
            dropped: 0,
        })
    }

    /// Commands discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Closes the queue, waits for the writer and returns how many commands it wrote.
    pub fn finish(mut self) -> io::Result<u64> {
        self.close()
    }

    fn close(&mut self) -> io::Result<u64> {
        drop(self.sender.take());
        match self.writer.take() {
            Some(writer) => writer
                .join()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "rotor writer panicked"))?,
            None => Ok(0),
        }
    }
}

impl RotorCommandSink for ChannelSink {
    fn publish(&mut self, command: &RotorSpeedCommand) -> io::Result<()> {
        let Some(sender) = &self.sender else {
            return Err(io::ErrorKind::BrokenPipe.into());
        };
        match sender.try_send(*command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "rotor command queue is full",
                ))
            }
            Err(TrySendError::Disconnected(_)) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "rotor writer has stopped",
            )),
        }
    }
}

impl Drop for ChannelSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Rotor command output failed: {}", e);
        }
    }
}

fn write_commands<S: RotorCommandSink>(
    mut inner: S,
    receiver: Receiver<RotorSpeedCommand>,
) -> io::Result<u64> {
    let mut written = 0;
    for command in receiver {
        if let Err(e) = inner.publish(&command) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                info!("Rotor command output closed after {} command(s).", written);
            } else {
                error!("Writing rotor commands failed after {} command(s): {}", written, e);
            }
            return Err(e);
        }
        written += 1;
    }
    debug!("Rotor writer drained after {} command(s).", written);
    Ok(written)
}

/// Keeps every published command in memory. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub commands: Vec<RotorSpeedCommand>,
}

impl RotorCommandSink for RecordingSink {
    fn publish(&mut self, command: &RotorSpeedCommand) -> io::Result<()> {
        self.commands.push(*command);
        Ok(())
    }
}

impl<S: RotorCommandSink + ?Sized> RotorCommandSink for Box<S> {
    fn publish(&mut self, command: &RotorSpeedCommand) -> io::Result<()> {
        (**self).publish(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    const HOVER_FEED: &str = r#"
{"topic": "current_state", "msg": {"pose": {"position": {"x": 0.0, "y": 0.0, "z": 1.0}, "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}}, "twist": {"linear": {"x": 0.0, "y": 0.0, "z": 0.0}, "angular": {"x": 0.0, "y": 0.0, "z": 0.0}}}}
{"topic": "desired_state", "msg": {"transforms": [{"translation": {"x": 0.0, "y": 0.0, "z": 1.0}, "rotation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}}], "velocities": [{"linear": {"x": 0.0, "y": 0.0, "z": 0.0}, "angular": {"x": 0.0, "y": 0.0, "z": 0.0}}], "accelerations": [{"linear": {"x": 0.0, "y": 0.0, "z": 0.0}, "angular": {"x": 0.0, "y": 0.0, "z": 0.0}}]}}
"#;

    #[test]
    fn feed_fills_the_store() {
        let store = StateStore::new();
        let stats = run_feed(Cursor::new(HOVER_FEED), &store).unwrap();

        assert_eq!(stats.current_accepted, 1);
        assert_eq!(stats.desired_accepted, 1);
        let snapshot = store.snapshot();
        let (current, desired) = snapshot.ready().unwrap();
        assert_eq!(current.position, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(desired.position, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let input = format!(
            "not json\n{}\n{}\n{}",
            r#"{"topic": "battery", "msg": {}}"#,
            r#"{"topic": "desired_state", "msg": {"transforms": [], "velocities": [], "accelerations": []}}"#,
            HOVER_FEED
        );
        let store = StateStore::new();
        let stats = run_feed(Cursor::new(input), &store).unwrap();

        assert_eq!(stats.unparsable, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.accepted(), 2);
        assert_eq!(store.snapshot().desired.unwrap().sequence, 1);
    }

    #[test]
    fn invalid_utf8_line_does_not_end_the_feed() {
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(HOVER_FEED.as_bytes());
        let store = StateStore::new();
        let stats = run_feed(Cursor::new(input), &store).unwrap();

        assert_eq!(stats.unparsable, 1);
        assert_eq!(stats.accepted(), 2);
        assert_eq!(
            store.snapshot().current.unwrap().value.position,
            Vector3::new(0.0, 0.0, 1.0)
        );
    }

    struct FailingReader;

    impl io::Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }
    }

    #[test]
    fn read_errors_reach_the_feed_handle() {
        let store = Arc::new(StateStore::new());
        let handle = spawn_feed(io::BufReader::new(FailingReader), Arc::clone(&store)).unwrap();
        let err = handle.join().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "device gone");
        assert!(store.snapshot().current.is_none());
    }

    #[test]
    fn spawned_feed_reports_its_stats() {
        let store = Arc::new(StateStore::new());
        let handle = spawn_feed(Cursor::new(HOVER_FEED.to_string()), Arc::clone(&store)).unwrap();
        let stats = handle.join().unwrap().unwrap();
        assert_eq!(stats.accepted(), 2);
        assert!(store.snapshot().ready().is_some());
    }

    #[test]
    fn envelope_uses_topic_names() {
        let line = serde_json::to_string(&FeedMessage::CurrentState(Odometry::default())).unwrap();
        assert!(line.starts_with(r#"{"topic":"current_state","msg":"#));
        assert_eq!(FeedMessage::CurrentState(Odometry::default()).topic(), CURRENT_STATE_TOPIC);
    }

    #[test]
    fn json_sink_writes_one_line_per_command() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&RotorSpeedCommand([1.0, -2.0, 3.5, 0.0])).unwrap();
        sink.publish(&RotorSpeedCommand([4.0, 4.0, 4.0, 4.0])).unwrap();
        assert_eq!(sink.published(), 2);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"angular_velocities":[1.0,-2.0,3.5,0.0]}"#);

        let parsed: Actuators = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.angular_velocities, [4.0; 4]);
    }

    /// Holds every write until the gate sender is dropped.
    struct GatedSink {
        gate: Receiver<()>,
        written: Arc<Mutex<Vec<RotorSpeedCommand>>>,
    }

    impl RotorCommandSink for GatedSink {
        fn publish(&mut self, command: &RotorSpeedCommand) -> io::Result<()> {
            let _ = self.gate.recv();
            self.written.lock().unwrap().push(*command);
            Ok(())
        }
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (gate, gate_rx) = mpsc::channel::<()>();
        let written = Arc::new(Mutex::new(Vec::new()));
        let mut sink = ChannelSink::spawn(
            GatedSink {
                gate: gate_rx,
                written: Arc::clone(&written),
            },
            4,
        )
        .unwrap();

        let mut accepted = 0;
        for i in 0..10 {
            match sink.publish(&RotorSpeedCommand([i as f64; 4])) {
                Ok(()) => accepted += 1,
                Err(e) => assert_eq!(e.kind(), io::ErrorKind::WouldBlock),
            }
        }
        // Four queued, plus at most one already taken by the writer.
        assert!((4..=5).contains(&accepted));
        assert_eq!(sink.dropped(), 10 - accepted);

        drop(gate);
        assert_eq!(sink.finish().unwrap(), accepted);
        let written = written.lock().unwrap();
        assert_eq!(written.len() as u64, accepted);
        assert_eq!(written[0], RotorSpeedCommand([0.0; 4]));
    }

    struct ClosedOutput;

    impl RotorCommandSink for ClosedOutput {
        fn publish(&mut self, _: &RotorSpeedCommand) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn stopped_writer_reports_broken_pipe() {
        let mut sink = ChannelSink::spawn(ClosedOutput, 8).unwrap();
        let command = RotorSpeedCommand([1.0; 4]);

        let mut last = Ok(());
        for _ in 0..1000 {
            last = sink.publish(&command);
            if matches!(&last, Err(e) if e.kind() == io::ErrorKind::BrokenPipe) {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(last.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(sink.finish().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn channel_sink_delivers_json_lines_on_finish() {
        let output = Arc::new(Mutex::new(Vec::new()));
        let mut sink = ChannelSink::spawn(
            JsonLinesSink::new(SharedBuffer(Arc::clone(&output))),
            DEFAULT_QUEUE_CAPACITY,
        )
        .unwrap();
        for _ in 0..3 {
            sink.publish(&RotorSpeedCommand([2.0; 4])).unwrap();
        }
        assert_eq!(sink.finish().unwrap(), 3);

        let text = String::from_utf8(output.lock().unwrap().clone()).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
