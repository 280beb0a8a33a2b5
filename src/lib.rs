// Library interface for socketcmd
// Wraps a line-oriented child process behind a listening socket

pub mod api;
pub mod args;
pub mod client;
pub mod error;
pub mod handler;
pub mod header;
pub mod socket;
pub mod wrapper;

pub use api::ApiServer;
pub use args::{blacklist, default_parse_fn, whitelist, Argument, ParseFn};
pub use client::Client;
pub use error::SockError;
pub use handler::{Handler, CONN_BUFFER_SIZE, DEFAULT_TIMEOUT_MS};
pub use header::{is_header_token, Header, DEFAULT_HEADER, EMPTY_HEADER, FORBIDDEN_HEADER};
pub use socket::{bind_unix, Conn, Listener, SockAddr};
pub use wrapper::Wrapper;
