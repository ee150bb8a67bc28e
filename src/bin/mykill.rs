/*
 * mykill.rs - A handy routine for testing signal reporting in smallsh
 *
 * usage: mykill <n> <signo>
 * Sleeps for <n> seconds and sends signal <signo> to itself.
 */

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::env;
use std::process;
use std::thread;
use std::time::Duration;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: {} <n> <signo>", args[0]);
        process::exit(0);
    }

    let secs = args[1].parse::<u64>().unwrap_or_else(|_| {
        eprintln!("Error: <n> must be a non-negative integer");
        process::exit(1);
    });

    let sig = args[2]
        .parse::<i32>()
        .ok()
        .and_then(|n| Signal::try_from(n).ok())
        .unwrap_or_else(|| {
            eprintln!("Error: <signo> must be a signal number");
            process::exit(1);
        });

    thread::sleep(Duration::from_secs(secs));

    let pid = Pid::from_raw(process::id() as i32);

    if let Err(err) = signal::kill(pid, sig) {
        eprintln!("kill error: {}", err);
    }

    // Only reached when the signal did not end the process.
    process::exit(0);
}
