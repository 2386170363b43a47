// src/core/test_support.rs
//
// In-memory stand-ins for interpreter processes.

use crate::system::launcher::{ChildHandle, ExitOutcome, LaunchedProcess, Launcher, ShellError};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// A `Read` fed through a channel; end-of-stream once every sender is gone.
pub(crate) struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: Cursor<Vec<u8>>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.pending.read(buf)?;
            if n > 0 || buf.is_empty() {
                return Ok(n);
            }
            match self.rx.recv() {
                Ok(chunk) => self.pending = Cursor::new(chunk),
                Err(_) => return Ok(0),
            }
        }
    }
}

pub(crate) fn channel_reader() -> (Sender<Vec<u8>>, ChannelReader) {
    let (tx, rx) = mpsc::channel();
    (
        tx,
        ChannelReader {
            rx,
            pending: Cursor::new(Vec::new()),
        },
    )
}

/// Yields `data`, then fails.
pub(crate) struct FailingReader {
    data: Cursor<Vec<u8>>,
}

impl FailingReader {
    pub(crate) fn new(data: &[u8]) -> Self {
        Self {
            data: Cursor::new(data.to_vec()),
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::other("stream broke")),
            n => Ok(n),
        }
    }
}

/// Stdin of an echoing interpreter: whatever is written comes out on its stdout.
pub(crate) struct EchoWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for EchoWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Everything written to a recording stdin, and whether it was closed.
#[derive(Debug, Default)]
pub(crate) struct StdinRecord {
    pub(crate) bytes: Mutex<Vec<u8>>,
    pub(crate) closed: AtomicBool,
}

pub(crate) struct RecordingWriter {
    record: Arc<StdinRecord>,
    fail_writes: bool,
}

impl RecordingWriter {
    pub(crate) fn new(record: Arc<StdinRecord>, fail_writes: bool) -> Self {
        Self {
            record,
            fail_writes,
        }
    }
}

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.record.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RecordingWriter {
    fn drop(&mut self) {
        self.record.closed.store(true, Ordering::SeqCst);
    }
}

/// A child that reports a fixed outcome, or never exits when `exit` is `None`.
pub(crate) struct StubChild {
    pub(crate) exit: Option<ExitOutcome>,
    pub(crate) killed: Arc<AtomicBool>,
}

impl ChildHandle for StubChild {
    fn id(&self) -> Option<u32> {
        None
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitOutcome>> {
        if self.killed.load(Ordering::SeqCst) {
            return Ok(Some(ExitOutcome::Signaled(9)));
        }
        Ok(self.exit)
    }

    fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn wait(&mut self) -> io::Result<ExitOutcome> {
        loop {
            if let Some(outcome) = self.try_wait()? {
                return Ok(outcome);
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}

/// Hands out one prepared process, or fails every launch.
pub(crate) struct StubLauncher {
    process: Mutex<Option<LaunchedProcess>>,
    pub(crate) launched: Mutex<Vec<PathBuf>>,
}

impl StubLauncher {
    pub(crate) fn with(process: LaunchedProcess) -> Self {
        Self {
            process: Mutex::new(Some(process)),
            launched: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            process: Mutex::new(None),
            launched: Mutex::new(Vec::new()),
        }
    }
}

impl Launcher for StubLauncher {
    fn launch(&self, program: &Path) -> Result<LaunchedProcess, ShellError> {
        self.launched.lock().unwrap().push(program.to_path_buf());
        self.process
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ShellError::Spawn {
                program: program.display().to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            })
    }
}

/// An interpreter that echoes its input to stdout and exits with `exit`.
pub(crate) fn echo_process(exit: ExitOutcome) -> LaunchedProcess {
    let (tx, stdout) = channel_reader();
    LaunchedProcess {
        stdin: Box::new(EchoWriter { tx }),
        stdout: Box::new(stdout),
        stderr: Box::new(io::empty()),
        child: Box::new(StubChild {
            exit: Some(exit),
            killed: Arc::new(AtomicBool::new(false)),
        }),
    }
}

/// An interpreter with canned output on both channels.
pub(crate) fn scripted_process(
    stdout: &str,
    stderr: &str,
    exit: ExitOutcome,
    stdin: Arc<StdinRecord>,
) -> LaunchedProcess {
    LaunchedProcess {
        stdin: Box::new(RecordingWriter::new(stdin, false)),
        stdout: Box::new(Cursor::new(stdout.as_bytes().to_vec())),
        stderr: Box::new(Cursor::new(stderr.as_bytes().to_vec())),
        child: Box::new(StubChild {
            exit: Some(exit),
            killed: Arc::new(AtomicBool::new(false)),
        }),
    }
}
