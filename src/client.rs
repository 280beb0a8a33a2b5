//! Client for a wrapper's socket.
//!
//! A client composes `HEADER SP ARGS`, writes it in one shot, and reads
//! response lines until the server closes the connection. The configured
//! parse function supplies the header whenever the caller did not, and may
//! reject a command outright before any network I/O happens.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use crate::args::{default_parse_fn, ParseFn};
use crate::error::SockError;
use crate::header::{is_header_token, FORBIDDEN_HEADER};
use crate::socket::{Conn, SockAddr};

/// A client for a socket wrapper.
pub struct Client {
    parse: ParseFn,
    addr: SockAddr,
    connect_timeout: Option<Duration>,
}

impl Client {
    /// Create a client for the given address. With no parse function, every
    /// command gets the default header.
    pub fn new(addr: SockAddr, parse: Option<ParseFn>) -> Self {
        Self {
            parse: parse.unwrap_or_else(default_parse_fn),
            addr,
            connect_timeout: None,
        }
    }

    /// Client for a UNIX socket path.
    pub fn unix(path: impl AsRef<Path>, parse: Option<ParseFn>) -> Self {
        Self::new(SockAddr::Unix(path.as_ref().to_path_buf()), parse)
    }

    /// Client for a TCP address.
    pub fn tcp(addr: std::net::SocketAddr, parse: Option<ParseFn>) -> Self {
        Self::new(SockAddr::Tcp(addr), parse)
    }

    /// Bound the time spent dialing. Applies to the TCP transport; UNIX
    /// socket connects do not block on a remote peer.
    pub fn connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = Some(timeout);
    }

    /// Send the given arguments to the wrapper and collect the response
    /// lines.
    ///
    /// If the first argument is not a well-formed header token, the parse
    /// function computes one from the full argument list and it is
    /// prepended. A forbidden header fails with
    /// [`SockError::CommandForbidden`] before dialing.
    pub fn send(&self, args: &[String]) -> Result<Vec<String>, SockError> {
        let request = self.compose_request(args)?;
        let mut conn = self.dial()?;
        conn.write_all(request.as_bytes())?;

        // The server closes the connection when the response is complete
        let mut lines = Vec::new();
        let reader = BufReader::new(conn);
        for line in reader.lines() {
            lines.push(line?);
        }
        Ok(lines)
    }

    /// Build the wire request for the given arguments.
    fn compose_request(&self, args: &[String]) -> Result<String, SockError> {
        let explicit = args.first().is_some_and(|arg| is_header_token(arg));
        let header = if explicit {
            args[0].clone()
        } else {
            (self.parse)(args)
        };
        if header == FORBIDDEN_HEADER {
            return Err(SockError::CommandForbidden);
        }

        let mut words: Vec<&str> = Vec::with_capacity(args.len() + 1);
        if !explicit {
            words.push(&header);
        }
        words.extend(args.iter().map(String::as_str));
        Ok(words.join(" "))
    }

    fn dial(&self) -> Result<Box<dyn Conn>, SockError> {
        match &self.addr {
            SockAddr::Unix(path) => {
                let stream = UnixStream::connect(path)?;
                Ok(Box::new(stream))
            }
            SockAddr::Tcp(addr) => {
                let stream = match self.connect_timeout {
                    Some(timeout) => TcpStream::connect_timeout(addr, timeout)?,
                    None => TcpStream::connect(addr)?,
                };
                Ok(Box::new(stream))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::whitelist;
    use crate::header::{Header, DEFAULT_HEADER};
    use std::collections::HashMap;

    fn vec_args(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compose_prepends_parsed_header() {
        let client = Client::unix("/nonexistent.sock", None);
        let request = client.compose_request(&vec_args(&["hello", "world"])).unwrap();
        assert_eq!(request, format!("{} hello world", DEFAULT_HEADER));
    }

    #[test]
    fn test_compose_keeps_explicit_header() {
        let client = Client::unix("/nonexistent.sock", None);
        let request = client.compose_request(&vec_args(&["2:500", "go"])).unwrap();
        assert_eq!(request, "2:500 go");
    }

    #[test]
    fn test_compose_empty_args_still_get_header() {
        let client = Client::unix("/nonexistent.sock", None);
        let request = client.compose_request(&[]).unwrap();
        assert_eq!(request, DEFAULT_HEADER);
    }

    #[test]
    fn test_forbidden_short_circuits_before_dialing() {
        let table = HashMap::from([
            ("base".to_string(), DEFAULT_HEADER.to_string()),
            ("cmd".to_string(), Header::new(2, 0).encode()),
        ]);
        let parse = whitelist(table).into_parse_fn();
        // The path does not exist; only the forbidden check can fail first
        let client = Client::unix("/nonexistent.sock", Some(parse));

        let err = client.send(&vec_args(&["unknown"])).unwrap_err();
        assert!(matches!(err, SockError::CommandForbidden));
    }

    #[test]
    fn test_explicit_forbidden_header_is_rejected() {
        let client = Client::unix("/nonexistent.sock", None);
        let err = client
            .compose_request(&vec_args(&["-:", "anything"]))
            .unwrap_err();
        assert!(matches!(err, SockError::CommandForbidden));
    }
}
