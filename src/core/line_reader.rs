// src/core/line_reader.rs

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Held,
    Open,
    Closed,
}

/// Decides whether a reader may hand lines to its callback.
///
/// A `Held` gate parks the reader until it is opened or closed. The lock is
/// kept for the whole callback, so once `close` returns no delivery is in
/// flight and none will follow.
#[derive(Debug, Clone)]
struct DeliveryGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl DeliveryGate {
    fn new(state: GateState) -> Self {
        Self {
            inner: Arc::new((Mutex::new(state), Condvar::new())),
        }
    }

    fn deliver(&self, f: impl FnOnce()) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while *state == GateState::Held {
            state = cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        if *state == GateState::Open {
            f();
            true
        } else {
            false
        }
    }

    fn set(&self, next: GateState) {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Closed is final.
        if *state != GateState::Closed {
            *state = next;
        }
        cvar.notify_all();
    }
}

/// Turns a byte stream into lines and hands them, one at a time and in
/// stream order, to a callback running on a dedicated thread.
///
/// `\n` and `\r\n` terminators are stripped, a trailing unterminated line is
/// still delivered, and invalid UTF-8 is replaced lossily. A read error ends
/// the stream exactly like end-of-file does.
#[derive(Debug, Clone)]
pub struct LineReader {
    name: String,
    log_lines: bool,
    held: bool,
}

impl LineReader {
    /// Creates a reader whose thread will be called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log_lines: true,
            held: false,
        }
    }

    /// Also echo every line to the `debug` log. On by default.
    pub fn log_lines(mut self, log_lines: bool) -> Self {
        self.log_lines = log_lines;
        self
    }

    /// Start without delivering anything until [`ReaderHandle::release`] is called.
    /// Lines read in the meantime wait, in order.
    pub fn held(mut self, held: bool) -> Self {
        self.held = held;
        self
    }

    /// Spawns the reader thread.
    ///
    /// # Errors
    /// Returns the OS error if the thread could not be created.
    pub fn start<R, F>(self, source: R, mut on_line: F) -> io::Result<ReaderHandle>
    where
        R: Read + Send + 'static,
        F: FnMut(&str) + Send + 'static,
    {
        let gate = DeliveryGate::new(if self.held {
            GateState::Held
        } else {
            GateState::Open
        });
        let thread_gate = gate.clone();
        let name = self.name.clone();
        let log_lines = self.log_lines;

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || pump(&name, source, log_lines, &thread_gate, &mut on_line))?;

        Ok(ReaderHandle {
            name: self.name,
            handle,
            gate,
        })
    }
}

fn pump<R: Read>(
    name: &str,
    source: R,
    log_lines: bool,
    gate: &DeliveryGate,
    on_line: &mut dyn FnMut(&str),
) {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                log::debug!("[{}] end of stream", name);
                break;
            }
            Ok(_) => {
                let line = decode_line(&buf);
                if log_lines {
                    log::debug!("[{}] {}", name, line);
                }
                if !gate.deliver(|| on_line(&line)) {
                    log::debug!("[{}] detached, dropping remaining output", name);
                    break;
                }
            }
            Err(e) => {
                log::debug!("[{}] read error, closing stream: {}", name, e);
                break;
            }
        }
    }
}

fn decode_line(buf: &[u8]) -> Cow<'_, str> {
    let line = buf.strip_suffix(b"\n").unwrap_or(buf);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line)
}

/// The running side of a [`LineReader`].
#[derive(Debug)]
pub struct ReaderHandle {
    name: String,
    handle: JoinHandle<()>,
    gate: DeliveryGate,
}

impl ReaderHandle {
    /// The reader's thread name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once the stream has ended and the thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Lets a held reader start delivering.
    pub fn release(&self) {
        self.gate.set(GateState::Open);
    }

    /// Blocks until the stream has ended and every line has been delivered.
    ///
    /// # Errors
    /// Returns the panic payload if the callback panicked.
    pub fn join(self) -> thread::Result<()> {
        self.release();
        self.handle.join()
    }

    /// Stops all further deliveries and abandons the thread.
    ///
    /// Waits for a delivery that is already running; after that the callback
    /// is never called again, even if the stream produces more lines.
    pub fn detach(self) {
        self.gate.set(GateState::Closed);
        log::debug!("[{}] reader detached", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{FailingReader, channel_reader};
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::time::Duration;

    fn collect(source: impl Read + Send + 'static) -> Vec<String> {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        LineReader::new("test-reader")
            .start(source, move |line| sink.lock().unwrap().push(line.to_string()))
            .unwrap()
            .join()
            .unwrap();
        let collected = lines.lock().unwrap().clone();
        collected
    }

    #[test]
    fn test_splits_and_strips_terminators() {
        let lines = collect(Cursor::new(b"first\nsecond\r\n\nlast".to_vec()));
        assert_eq!(lines, vec!["first", "second", "", "last"]);
    }

    #[test]
    fn test_empty_stream_delivers_nothing() {
        assert!(collect(Cursor::new(Vec::new())).is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let lines = collect(Cursor::new(b"ok\n\xff\xfe\n".to_vec()));
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ok");
        assert!(lines[1].contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_error_ends_stream_quietly() {
        let lines = collect(FailingReader::new(b"one\ntwo\npartial"));
        // The unterminated tail is lost with the error; everything before it arrives.
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn test_thread_is_named() {
        let (tx, rx) = mpsc::channel();
        LineReader::new("probe-stdout")
            .start(Cursor::new(b"x\n".to_vec()), move |_| {
                tx.send(thread::current().name().map(str::to_string)).unwrap();
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(rx.recv().unwrap().as_deref(), Some("probe-stdout"));
    }

    #[test]
    fn test_held_reader_waits_for_release() {
        let (tx, rx) = mpsc::channel();
        let handle = LineReader::new("held")
            .held(true)
            .start(Cursor::new(b"a\nb\n".to_vec()), move |line| {
                tx.send(line.to_string()).unwrap();
            })
            .unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        handle.release();
        assert_eq!(rx.recv().unwrap(), "a");
        assert_eq!(rx.recv().unwrap(), "b");
        handle.join().unwrap();
    }

    #[test]
    fn test_detach_stops_deliveries() {
        let (writer, source) = channel_reader();
        let (tx, rx) = mpsc::channel();
        let handle = LineReader::new("detachable")
            .start(source, move |line| {
                tx.send(line.to_string()).ok();
            })
            .unwrap();

        writer.send(b"before\n".to_vec()).unwrap();
        assert_eq!(rx.recv().unwrap(), "before");

        handle.detach();
        writer.send(b"after\n".to_vec()).unwrap();
        drop(writer);

        // The thread ends without delivering, which drops its sender.
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_detach_waits_for_running_delivery() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (finish_tx, finish_rx) = mpsc::channel::<()>();
        let handle = LineReader::new("slow-hook")
            .start(Cursor::new(b"slow\n".to_vec()), move |_| {
                entered_tx.send(()).ok();
                finish_rx.recv().ok();
            })
            .unwrap();
        entered_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let detacher = thread::spawn(move || {
            handle.detach();
            done_tx.send(()).ok();
        });

        // Still inside the callback, so detach cannot return yet.
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        finish_tx.send(()).unwrap();
        done_rx.recv().unwrap();
        detacher.join().unwrap();
    }

    #[test]
    fn test_callback_panic_surfaces_on_join() {
        let handle = LineReader::new("panicky")
            .log_lines(false)
            .start(Cursor::new(b"boom\n".to_vec()), |_| {
                std::panic::panic_any("callback failed");
            })
            .unwrap();
        assert!(handle.join().is_err());
    }
}
