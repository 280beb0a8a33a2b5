//! socketcmd client binary
//!
//! Sends its command-line arguments to a wrapper's UNIX socket and prints
//! the response lines.

use anyhow::Result;
use socketcmd::Client;
use std::env;

const ENV_SOCKET_PATH: &str = "SOCKET_PATH";
const DEFAULT_SOCKET_PATH: &str = "example.sock";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let socket_path =
        env::var(ENV_SOCKET_PATH).unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());

    let client = Client::unix(&socket_path, None);
    for line in client.send(&args)? {
        println!("{}", line);
    }
    Ok(())
}
