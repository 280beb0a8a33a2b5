//! Socket transport abstraction for the multiplexer.
//!
//! The multiplexer and client are generic over the listening transport: a
//! UNIX domain socket for local use, TCP for remote callers. Access control
//! on the UNIX transport is file-system permissions on the socket file.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

/// Address of a listening socket, in a form a [`crate::client::Client`] can
/// dial back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockAddr {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl fmt::Display for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SockAddr::Unix(path) => write!(f, "{}", path.display()),
            SockAddr::Tcp(addr) => write!(f, "{}", addr),
        }
    }
}

/// A bidirectional byte stream accepted from a [`Listener`].
pub trait Conn: Read + Write + Send {
    /// Peer address for diagnostics.
    fn peer_addr(&self) -> String;
}

impl Conn for UnixStream {
    fn peer_addr(&self) -> String {
        match UnixStream::peer_addr(self) {
            Ok(addr) => match addr.as_pathname() {
                Some(path) => path.display().to_string(),
                None => "unix".to_string(),
            },
            Err(_) => "unix".to_string(),
        }
    }
}

impl Conn for TcpStream {
    fn peer_addr(&self) -> String {
        match TcpStream::peer_addr(self) {
            Ok(addr) => addr.to_string(),
            Err(_) => "tcp".to_string(),
        }
    }
}

/// A listening socket the multiplexer accepts connections from.
pub trait Listener: Send {
    fn accept(&self) -> io::Result<Box<dyn Conn>>;

    /// The accept task polls with a non-blocking listener so it can observe
    /// the shutdown flag between connections.
    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()>;

    /// Public address of the listener (socket path or host:port).
    fn local_addr(&self) -> SockAddr;
}

impl Listener for UnixListener {
    fn accept(&self) -> io::Result<Box<dyn Conn>> {
        let (stream, _addr) = UnixListener::accept(self)?;
        // The listener polls non-blocking; the connection itself must not
        stream.set_nonblocking(false)?;
        Ok(Box::new(stream))
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        UnixListener::set_nonblocking(self, nonblocking)
    }

    fn local_addr(&self) -> SockAddr {
        let path = UnixListener::local_addr(self)
            .ok()
            .and_then(|addr| addr.as_pathname().map(Path::to_path_buf))
            .unwrap_or_default();
        SockAddr::Unix(path)
    }
}

impl Listener for TcpListener {
    fn accept(&self) -> io::Result<Box<dyn Conn>> {
        let (stream, _addr) = TcpListener::accept(self)?;
        stream.set_nonblocking(false)?;
        Ok(Box::new(stream))
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        TcpListener::set_nonblocking(self, nonblocking)
    }

    fn local_addr(&self) -> SockAddr {
        let addr = TcpListener::local_addr(self)
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        SockAddr::Tcp(addr)
    }
}

/// Bind a UNIX listener at the given path, replacing any stale socket file
/// and restricting the new one to the owner.
pub fn bind_unix(path: &Path) -> io::Result<UnixListener> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;

    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }

    Ok(listener)
}
