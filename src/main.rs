//! socketcmd server binary
//!
//! Wraps `COMMAND [ARGS…]` behind a UNIX socket. Remote callers send
//! header-prefixed commands to the socket; this process's own stdin and
//! stdout stay connected to the wrapped command.

use anyhow::{anyhow, Result};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use socketcmd::Wrapper;
use std::env;
use std::fs;
use std::process::{self, Command};
use std::thread;

const ENV_SOCKET_PATH: &str = "SOCKET_PATH";
const DEFAULT_SOCKET_PATH: &str = "example.sock";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(2);
    }

    let socket_path =
        env::var(ENV_SOCKET_PATH).unwrap_or_else(|_| DEFAULT_SOCKET_PATH.to_string());

    let mut cmd = Command::new(&args[1]);
    cmd.args(&args[2..]);

    let mut wrapper = Wrapper::new_unix(&socket_path, cmd)
        .map_err(|err| anyhow!("failed to wrap '{}': {}", args[1], err))?;

    // Remove the socket file if we are interrupted
    {
        let socket_path = socket_path.clone();
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                let _ = fs::remove_file(&socket_path);
                process::exit(128 + sig);
            }
        });
    }

    eprintln!("socketcmd: serving '{}' at {}", args[1], wrapper.addr());
    let result = wrapper.run();
    let _ = fs::remove_file(&socket_path);
    result?;
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: socketcmd COMMAND [ARGS...]");
    eprintln!();
    eprintln!(
        "Wraps COMMAND behind a UNIX socket. The socket path is taken from"
    );
    eprintln!(
        "the {} environment variable (default: {}).",
        ENV_SOCKET_PATH, DEFAULT_SOCKET_PATH
    );
}
