//! Wrapper facade: a child process behind a socket multiplexer.
//!
//! Input to the wrapper's socket is forwarded to the child process, with the
//! resulting lines of stdout returned to the socket client.

use std::path::Path;
use std::process::{Child, Command, Stdio};

use crate::args::ParseFn;
use crate::client::Client;
use crate::error::SockError;
use crate::handler::Handler;
use crate::socket::{bind_unix, Listener, SockAddr};

/// A child process wrapped behind a listening socket.
///
/// The child is spawned at construction with piped stdin and stdout, since
/// the pipes only exist once it runs; [`run`](Wrapper::run) or
/// [`start`](Wrapper::start) then bring up the multiplexer threads.
pub struct Wrapper {
    child: Child,
    handler: Handler,
}

impl std::fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrapper").finish_non_exhaustive()
    }
}

impl Wrapper {
    /// Wrap the given command behind a new UNIX socket at `socket`,
    /// replacing any stale socket file.
    pub fn new_unix(socket: impl AsRef<Path>, cmd: Command) -> Result<Self, SockError> {
        let listener = bind_unix(socket.as_ref())?;
        Self::new(Box::new(listener), cmd)
    }

    /// Wrap the given command behind the given listener.
    pub fn new(listener: Box<dyn Listener>, mut cmd: Command) -> Result<Self, SockError> {
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        let mut child = cmd.spawn().map_err(SockError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or(SockError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SockError::MissingPipe("stdout"))?;

        let mut handler = Handler::new(listener, Box::new(stdin), Box::new(stdout));
        handler.forward_stdin(true);
        Ok(Self { child, handler })
    }

    /// Address of the wrapper's listener.
    pub fn addr(&self) -> &SockAddr {
        self.handler.addr()
    }

    /// Whether lines typed on this process's stdin are forwarded to the
    /// child (enabled by default).
    pub fn forward_stdin(&mut self, enabled: bool) {
        self.handler.forward_stdin(enabled);
    }

    /// Run the wrapped process to completion: start the multiplexer, wait
    /// for the child to exit, stop the multiplexer.
    pub fn run(&mut self) -> Result<(), SockError> {
        self.start();
        self.wait()
    }

    /// Start the multiplexer threads and return immediately; the child is
    /// already running.
    pub fn start(&mut self) {
        self.handler.start();
    }

    /// Wait for the wrapped process to exit, then stop the multiplexer.
    /// A non-zero exit status is an error.
    pub fn wait(&mut self) -> Result<(), SockError> {
        let status = self.child.wait();
        self.handler.close();
        let status = status?;
        if !status.success() {
            return Err(SockError::ChildFailed(status));
        }
        Ok(())
    }

    /// A client dialing this wrapper's listener with the given parse
    /// function.
    pub fn client(&self, parse: Option<ParseFn>) -> Client {
        Client::new(self.addr().clone(), parse)
    }
}

impl Drop for Wrapper {
    fn drop(&mut self) {
        // Reap the child if the caller never waited
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_unix_spawns_child_and_binds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wrap.sock");

        let mut wrapper = Wrapper::new_unix(&path, Command::new("cat")).unwrap();
        wrapper.forward_stdin(false);
        assert_eq!(wrapper.addr(), &SockAddr::Unix(path.clone()));
        assert!(path.exists());
    }

    #[test]
    fn test_spawn_failure_surfaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.sock");

        let err = Wrapper::new_unix(&path, Command::new("/no/such/binary")).unwrap_err();
        assert!(matches!(err, SockError::SpawnFailed(_)));
    }

    #[test]
    fn test_run_reports_nonzero_exit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("false.sock");

        let mut wrapper = Wrapper::new_unix(&path, Command::new("false")).unwrap();
        wrapper.forward_stdin(false);
        let err = wrapper.run().unwrap_err();
        assert!(matches!(err, SockError::ChildFailed(_)));
    }

    #[test]
    fn test_run_success_for_clean_exit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("true.sock");

        let mut wrapper = Wrapper::new_unix(&path, Command::new("true")).unwrap();
        wrapper.forward_stdin(false);
        wrapper.run().unwrap();
    }
}
