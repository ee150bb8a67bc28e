use std::io;
use std::process;

use nix::errno::Errno;

pub fn print_usage() {
    println!("Usage: smallsh");
    println!("   smallsh takes no arguments; it reads commands from standard input.");
    process::exit(1);
}

/// System error text the way `perror` prints it, without Rust's
/// `(os error N)` suffix.
pub fn describe(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => Errno::from_i32(code).desc().to_string(),
        None => err.to_string(),
    }
}
