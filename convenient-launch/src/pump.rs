//! Stream pumps that keep a child's pipes drained while it runs
//!
//! Every child gets three dedicated threads: stdout and stderr are copied to
//! their sinks until EOF, and the parent's stdin is forwarded to the child.
//! Stdin itself is read by one process-wide reader, so a read blocked on
//! the parent's terminal never holds a finished child's pump. All pumps are
//! joined once the child exits.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

const PUMP_BUFFER: usize = 8192;

/// In-memory sink shared between a pump thread and the caller
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Contents decoded lossily as UTF-8
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Destination of a child's output stream
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    /// The matching stream of this process
    #[default]
    Parent,
    /// Collected in memory
    Buffer(SharedBuffer),
    /// Drained and dropped
    Discard,
}

#[derive(Debug, Clone, Copy)]
enum ParentStream {
    Stdout,
    Stderr,
}

impl OutputSink {
    fn writer(&self, parent: ParentStream) -> Box<dyn Write + Send> {
        match (self, parent) {
            (Self::Parent, ParentStream::Stdout) => Box::new(io::stdout()),
            (Self::Parent, ParentStream::Stderr) => Box::new(io::stderr()),
            (Self::Buffer(buffer), _) => Box::new(buffer.clone()),
            (Self::Discard, _) => Box::new(io::sink()),
        }
    }
}

fn copy_until_eof(mut reader: impl Read, mut writer: impl Write) -> io::Result<u64> {
    let mut buf = [0u8; PUMP_BUFFER];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        writer.flush()?;
        total += n as u64;
    }
    Ok(total)
}

fn spawn_output<R>(name: &str, reader: R, writer: Box<dyn Write + Send>) -> io::Result<JoinHandle<io::Result<u64>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || copy_until_eof(reader, writer))
}

/// Process-wide owner of this process's stdin
///
/// One reader thread reads stdin for the whole process lifetime. Chunks go
/// to the attached child, or wait in `pending` until the next child
/// attaches. Attaching replaces any earlier subscriber.
#[derive(Debug, Default)]
pub(crate) struct StdinHub {
    state: Mutex<HubState>,
}

#[derive(Debug, Default)]
struct HubState {
    subscriber: Option<(u64, Sender<Vec<u8>>)>,
    next_id: u64,
    pending: Vec<Vec<u8>>,
    closed: bool,
}

impl StdinHub {
    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// New subscription; buffered input is delivered first
    pub(crate) fn attach(&self) -> (u64, Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        for chunk in state.pending.drain(..) {
            let _ = tx.send(chunk);
        }
        // after EOF the sender is dropped so the receiver ends once drained
        if !state.closed {
            state.subscriber = Some((id, tx));
        }
        (id, rx)
    }

    /// End subscription `id`; a later subscriber is left alone
    pub(crate) fn detach(&self, id: u64) {
        let mut state = self.lock();
        if state.subscriber.as_ref().is_some_and(|(current, _)| *current == id) {
            state.subscriber = None;
        }
    }

    /// Hand one chunk read from stdin to the subscriber
    pub(crate) fn deliver(&self, chunk: Vec<u8>) {
        let mut state = self.lock();
        let undelivered = match &state.subscriber {
            Some((_, tx)) => tx.send(chunk).err().map(|e| e.0),
            None => Some(chunk),
        };
        if let Some(chunk) = undelivered {
            state.subscriber = None;
            state.pending.push(chunk);
        }
    }

    /// Stdin reached EOF or failed
    pub(crate) fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.subscriber = None;
    }
}

static STDIN_HUB: OnceLock<StdinHub> = OnceLock::new();
static STDIN_READER: Mutex<bool> = Mutex::new(false);

/// The shared hub, starting the stdin reader on first use
fn stdin_hub() -> io::Result<&'static StdinHub> {
    let hub = STDIN_HUB.get_or_init(StdinHub::default);
    let mut started = STDIN_READER.lock().unwrap_or_else(PoisonError::into_inner);
    if !*started {
        let _ = thread::Builder::new()
            .name("stdin-reader".to_string())
            .spawn(move || {
                let mut buf = [0u8; PUMP_BUFFER];
                let stdin = io::stdin();
                loop {
                    match stdin.lock().read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => hub.deliver(buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            debug!("Reading stdin failed: {e}");
                            break;
                        }
                    }
                }
                hub.close();
            })?;
        *started = true;
    }
    Ok(hub)
}

struct StdinPump {
    hub: &'static StdinHub,
    id: u64,
    handle: JoinHandle<()>,
}

impl StdinPump {
    fn spawn(mut child_in: ChildStdin) -> io::Result<Self> {
        let hub = stdin_hub()?;
        let (id, chunks) = hub.attach();
        let handle = match thread::Builder::new()
            .name("pump-stdin".to_string())
            .spawn(move || {
                for chunk in chunks {
                    if child_in.write_all(&chunk).and_then(|()| child_in.flush()).is_err() {
                        break;
                    }
                }
            }) {
            Ok(handle) => handle,
            Err(e) => {
                hub.detach(id);
                return Err(e);
            }
        };
        Ok(Self { hub, id, handle })
    }

    /// Detach from the hub, which ends the pump, and join it
    fn stop(self) {
        self.hub.detach(self.id);
        if self.handle.join().is_err() {
            warn!("The child stdin pump panicked");
        }
    }
}

/// The running pumps of one child process
pub(crate) struct PumpSet {
    stdout: Option<JoinHandle<io::Result<u64>>>,
    stderr: Option<JoinHandle<io::Result<u64>>>,
    stdin: Option<StdinPump>,
}

impl PumpSet {
    /// Take the child's piped streams and start pumping them
    pub(crate) fn start(child: &mut Child, stdout: &OutputSink, stderr: &OutputSink) -> io::Result<Self> {
        let mut set = Self {
            stdout: None,
            stderr: None,
            stdin: None,
        };
        if let Some(out) = child.stdout.take() {
            set.stdout = Some(spawn_output("pump-stdout", out, stdout.writer(ParentStream::Stdout))?);
        }
        if let Some(err) = child.stderr.take() {
            set.stderr = Some(spawn_output("pump-stderr", err, stderr.writer(ParentStream::Stderr))?);
        }
        if let Some(input) = child.stdin.take() {
            set.stdin = Some(StdinPump::spawn(input)?);
        }
        Ok(set)
    }

    /// Join the output pumps, then detach and join the input pump
    pub(crate) fn finish(self) {
        for (name, handle) in [("stdout", self.stdout), ("stderr", self.stderr)] {
            let Some(handle) = handle else { continue };
            match handle.join() {
                Ok(Ok(bytes)) => debug!("Pumped {bytes} bytes from child {name}"),
                Ok(Err(e)) => warn!("Forwarding child {name} failed: {e}"),
                Err(_) => warn!("The child {name} pump panicked"),
            }
        }
        if let Some(stdin) = self.stdin {
            stdin.stop();
        }
    }
}
