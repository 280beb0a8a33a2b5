//! I/O multiplexer bridging socket connections and the child's stdio.
//!
//! Five cooperating threads communicate through three channels:
//!
//! ```text
//! accept ──────── socket → write_ch, read_ch → socket
//! stdin-fanin ─── write_ch → child stdin
//! stdin-forward ─ own stdin → write_ch            (optional)
//! stdout-fanout ─ child stdout → own stdout + read_ch
//! idle-drain ──── read_ch → discard               (only while no request holds
//!                                                  the block slot)
//! ```
//!
//! All three channels are rendezvous channels. A request handler sends
//! `true` on `block_ch` on entry and `false` on exit; the sends complete only
//! when the idle-drain thread takes them, so after entry the drain is
//! guaranteed to be deferring and the handler sees exactly the stdout lines
//! emitted while it holds the slot. Requests themselves are serialized on
//! the accept thread.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};

use crate::error::SockError;
use crate::header::Header;
use crate::socket::{Conn, Listener, SockAddr};

/// Default inter-line timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: i64 = 1000;

/// Buffer size in bytes for incoming connections.
pub const CONN_BUFFER_SIZE: usize = 2048;

/// Poll interval for the non-blocking accept loop.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The socket-to-stdio multiplexer.
///
/// Owns the listener and the child's pipes from construction until
/// [`start`](Handler::start) moves them onto the worker threads. [`close`]
/// (Handler::close) stops the accept loop and begins channel teardown.
pub struct Handler {
    listener: Option<Box<dyn Listener>>,
    stdin: Option<Box<dyn Write + Send>>,
    stdout: Option<Box<dyn Read + Send>>,
    addr: SockAddr,
    forward_stdin: bool,

    write_tx: Option<Sender<String>>,
    shutdown: Arc<AtomicBool>,
}

impl Handler {
    /// Create a multiplexer for the given listener and child pipes.
    pub fn new(
        listener: Box<dyn Listener>,
        stdin: Box<dyn Write + Send>,
        stdout: Box<dyn Read + Send>,
    ) -> Self {
        let addr = listener.local_addr();
        Self {
            listener: Some(listener),
            stdin: Some(stdin),
            stdout: Some(stdout),
            addr,
            forward_stdin: false,
            write_tx: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Also forward lines from this process's stdin to the child, so an
    /// operator can drive the wrapped process interactively.
    pub fn forward_stdin(&mut self, enabled: bool) {
        self.forward_stdin = enabled;
    }

    /// Address of the underlying listener.
    pub fn addr(&self) -> &SockAddr {
        &self.addr
    }

    /// Spawn the worker threads. Subsequent calls are no-ops.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let stdin = self.stdin.take().expect("stdin pipe present before start");
        let stdout = self.stdout.take().expect("stdout pipe present before start");

        let (write_tx, write_rx) = bounded::<String>(0);
        let (read_tx, read_rx) = bounded::<String>(0);
        let (block_tx, block_rx) = bounded::<bool>(0);

        let accept_write_tx = write_tx.clone();
        let accept_read_rx = read_rx.clone();
        let shutdown = self.shutdown.clone();
        thread::spawn(move || accept_loop(listener, shutdown, accept_write_tx, accept_read_rx, block_tx));

        thread::spawn(move || stdin_fanin(write_rx, stdin));
        thread::spawn(move || stdout_fanout(stdout, read_tx));
        thread::spawn(move || idle_drain(read_rx, block_rx));

        if self.forward_stdin {
            let forward_tx = write_tx.clone();
            thread::spawn(move || stdin_forward(forward_tx));
        }

        self.write_tx = Some(write_tx);
    }

    /// Stop accepting connections and release the write channel.
    ///
    /// The accept thread observes the flag within one poll interval; the
    /// remaining threads unwind as the channels close behind it.
    pub fn close(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.write_tx = None;
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        self.close();
    }
}

/// Releases the block slot when the request handler returns.
struct BlockGuard<'a> {
    tx: &'a Sender<bool>,
}

impl<'a> BlockGuard<'a> {
    fn acquire(tx: &'a Sender<bool>) -> Self {
        let _ = tx.send(true);
        Self { tx }
    }
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        let _ = self.tx.send(false);
    }
}

/// Accept thread: poll for connections and handle each inline.
fn accept_loop(
    listener: Box<dyn Listener>,
    shutdown: Arc<AtomicBool>,
    write_tx: Sender<String>,
    read_rx: Receiver<String>,
    block_tx: Sender<bool>,
) {
    if let Err(err) = listener.set_nonblocking(true) {
        eprintln!("socketcmd: cannot poll listener: {}", err);
        return;
    }

    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok(mut conn) => {
                if let Err(err) = handle_connection(&mut *conn, &write_tx, &read_rx, &block_tx) {
                    eprintln!("socketcmd: connection error: {}", err);
                }
            }
            Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                eprintln!("socketcmd: accept error: {}", err);
                thread::sleep(ACCEPT_POLL_INTERVAL * 10);
            }
        }
    }
}

/// Serve one request: `HEADER SP ARGS` in, zero or more lines out.
fn handle_connection(
    conn: &mut dyn Conn,
    write_tx: &Sender<String>,
    read_rx: &Receiver<String>,
    block_tx: &Sender<bool>,
) -> Result<(), SockError> {
    // Clients send the whole command in one write
    let mut buf = [0u8; CONN_BUFFER_SIZE];
    let n = conn.read(&mut buf)?;
    if n == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before sending a request",
        )
        .into());
    }
    let request = String::from_utf8_lossy(&buf[..n]).into_owned();

    // [lines]:[timeout] args...
    let (token, args) = request.split_once(' ').unwrap_or((request.as_str(), ""));
    let header = match Header::parse(token) {
        Ok(header) => header,
        Err(err) => {
            conn.write_all(err.to_string().as_bytes())?;
            return Ok(());
        }
    };

    // Take the block slot; the send rendezvouses with idle-drain, which
    // defers to this request until the guard releases the slot.
    let _guard = BlockGuard::acquire(block_tx);

    eprintln!("socketcmd: ({})-> {}", conn.peer_addr(), args);
    if write_tx.send(args.to_string()).is_err() {
        // Multiplexer is tearing down; nothing to forward to.
        return Ok(());
    }

    send_response(conn, read_rx, header)?;
    Ok(())
}

/// Response collector: copy child output lines to the connection until the
/// line budget, the inter-line timeout, or child exit ends the response.
///
/// The timer restarts on every line; there is no overall deadline. Running
/// out of lines is a normal completion, not an error.
fn send_response<W: Write + ?Sized>(
    conn: &mut W,
    resp: &Receiver<String>,
    header: Header,
) -> io::Result<()> {
    let timeout = if header.timeout_ms <= 0 {
        DEFAULT_TIMEOUT_MS
    } else {
        header.timeout_ms
    };
    let timeout = Duration::from_millis(timeout as u64);

    let mut count = 0i64;
    loop {
        if header.line_budget_reached(count) {
            return Ok(());
        }
        match resp.recv_timeout(timeout) {
            Ok(line) => {
                conn.write_all(line.as_bytes())?;
                conn.write_all(b"\n")?;
                if header.lines >= 0 {
                    count += 1;
                }
            }
            // Timeout elapsed before the next line, or the child exited:
            // the response is whatever was collected.
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

/// Stdin-fanin thread: forward queued lines to the child's stdin.
///
/// Write failures are logged but do not stop the thread; the child's exit is
/// surfaced through the wrapper's `wait`, not here.
fn stdin_fanin(write_rx: Receiver<String>, mut stdin: Box<dyn Write + Send>) {
    for line in write_rx {
        if let Err(err) = writeln!(stdin, "{}", line).and_then(|_| stdin.flush()) {
            eprintln!("socketcmd: child stdin write failed: {}", err);
        }
    }
}

/// Stdin-forward thread: let the operator type directly to the child.
fn stdin_forward(write_tx: Sender<String>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => {
                if write_tx.send(line).is_err() {
                    return;
                }
            }
            Err(err) => {
                eprintln!("socketcmd: stdin read failed: {}", err);
                return;
            }
        }
    }
}

/// Stdout-fanout thread: echo each child stdout line to our own stdout and
/// offer it to the response channel. Dropping the sender on child exit is
/// what closes `read_ch`.
fn stdout_fanout(stdout: Box<dyn Read + Send>, read_tx: Sender<String>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        match line {
            Ok(line) => {
                println!("{}", line);
                if read_tx.send(line).is_err() {
                    return;
                }
            }
            Err(err) => {
                eprintln!("socketcmd: child stdout read failed: {}", err);
                break;
            }
        }
    }
}

/// Idle-drain thread: keep `read_ch` flowing while no request is in flight.
///
/// On a `true` block signal the drain defers until the matching `false`, so
/// every line in between goes to the active request's collector. Once the
/// read channel closes (child exit) the slot no longer guards anything and
/// signals are consumed unconditionally, so a late request can never block
/// on the slot.
fn idle_drain(read_rx: Receiver<String>, block_rx: Receiver<bool>) {
    loop {
        select! {
            recv(read_rx) -> line => {
                if line.is_err() {
                    break;
                }
            }
            recv(block_rx) -> sig => {
                match sig {
                    Ok(true) => loop {
                        match block_rx.recv() {
                            Ok(false) => break,
                            Ok(true) => continue,
                            Err(_) => return,
                        }
                    },
                    Ok(false) => {}
                    Err(_) => return,
                }
            }
        }
    }
    while block_rx.recv().is_ok() {}
}
