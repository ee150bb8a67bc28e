use std::fmt;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
}

impl Termination {
    /// Translates a wait status; `None` for anything other than termination.
    pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Termination::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(Termination::Signaled(signal as i32)),
            _ => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exit value {}", code),
            Termination::Signaled(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

/// Background processes still running, in launch order.
#[derive(Debug, Default)]
pub struct JobTable {
    pids: Vec<Pid>,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable::default()
    }

    /// Starts tracking `pid`. A pid already tracked is not added twice.
    pub fn add(&mut self, pid: Pid) -> bool {
        if pid.as_raw() < 1 || self.contains(pid) {
            return false;
        }
        self.pids.push(pid);
        true
    }

    pub fn remove(&mut self, pid: Pid) -> bool {
        let before = self.pids.len();
        self.pids.retain(|&p| p != pid);
        self.pids.len() != before
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.pids.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn pids(&self) -> &[Pid] {
        &self.pids
    }

    /// Polls every tracked pid without blocking and drops the ones that have
    /// terminated, returning how each ended in launch order.
    pub fn reap_all(&mut self) -> Vec<(Pid, Termination)> {
        let mut done = Vec::new();
        // Walk a snapshot so removals cannot skip the next entry.
        for pid in self.pids().to_vec() {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(status) => {
                    if let Some(termination) = Termination::from_wait_status(status) {
                        debug!(pid = pid.as_raw(), %termination, "reaped background job");
                        self.remove(pid);
                        done.push((pid, termination));
                    }
                }
                Err(Errno::ECHILD) => {
                    warn!(pid = pid.as_raw(), "background job vanished before it was reaped");
                    self.remove(pid);
                }
                Err(err) => warn!(pid = pid.as_raw(), "waitpid failed: {}", err),
            }
        }
        done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    fn spawn(program: &str, args: &[&str]) -> Pid {
        let child = Command::new(program).args(args).spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    fn reap_until(jobs: &mut JobTable, count: usize) -> Vec<(Pid, Termination)> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut done = Vec::new();
        while done.len() < count && Instant::now() < deadline {
            done.extend(jobs.reap_all());
            thread::sleep(Duration::from_millis(20));
        }
        done
    }

    #[test]
    fn test_add_and_remove() {
        let mut jobs = JobTable::new();
        assert!(jobs.add(Pid::from_raw(100)));
        assert!(!jobs.add(Pid::from_raw(100)));
        assert!(!jobs.add(Pid::from_raw(0)));
        assert!(jobs.add(Pid::from_raw(200)));
        assert_eq!(jobs.pids(), &[Pid::from_raw(100), Pid::from_raw(200)]);
        assert!(jobs.remove(Pid::from_raw(100)));
        assert!(!jobs.remove(Pid::from_raw(100)));
        assert_eq!(jobs.pids(), &[Pid::from_raw(200)]);
    }

    #[test]
    fn test_reap_running_job_is_idempotent() {
        let mut jobs = JobTable::new();
        let pid = spawn("sleep", &["5"]);
        jobs.add(pid);
        assert!(jobs.reap_all().is_empty());
        assert!(jobs.reap_all().is_empty());
        assert_eq!(jobs.pids(), &[pid]);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL).unwrap();
        let done = reap_until(&mut jobs, 1);
        assert_eq!(done, vec![(pid, Termination::Signaled(9))]);
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_reap_keeps_order_and_survivors() {
        let mut jobs = JobTable::new();
        let first = spawn("true", &[]);
        let sleeper = spawn("sleep", &["5"]);
        let last = spawn("false", &[]);
        jobs.add(first);
        jobs.add(sleeper);
        jobs.add(last);

        thread::sleep(Duration::from_millis(500));
        let done = jobs.reap_all();
        assert_eq!(
            done,
            vec![(first, Termination::Exited(0)), (last, Termination::Exited(1))]
        );
        assert_eq!(jobs.pids(), &[sleeper]);

        nix::sys::signal::kill(sleeper, nix::sys::signal::Signal::SIGTERM).unwrap();
        assert_eq!(
            reap_until(&mut jobs, 1),
            vec![(sleeper, Termination::Signaled(15))]
        );
    }

    #[test]
    fn test_termination_messages() {
        assert_eq!(Termination::Exited(0).to_string(), "exit value 0");
        assert_eq!(
            Termination::Signaled(2).to_string(),
            "terminated by signal 2"
        );
    }
}
