//! Tracking of child processes and of the status parameters they feed.

use crate::command::ExitCode;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::collections::BTreeMap;
use std::fmt;

/// Status parameters shared by the whole interpreter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShellState {
    /// Outcome of the last foreground command, reported by `$?`.
    pub last_status: ExitCode,
    /// Pid of the most recent background command, reported by `$!`.
    pub last_background_pid: Option<i32>,
}

/// Lifecycle state of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Exited(ExitCode),
    Signaled(i32),
}

impl JobState {
    /// Whether the process is gone for good.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Exited(_) | Self::Signaled(_))
    }
}

/// A state change observed for a tracked child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobEvent {
    pub pid: i32,
    pub state: JobState,
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            JobState::Exited(code) => {
                write!(f, "Child process {} done. Exit status {}.", self.pid, code)
            }
            JobState::Signaled(sig) => {
                write!(f, "Child process {} done. Signaled {}.", self.pid, sig)
            }
            JobState::Stopped => write!(f, "Child process {} stopped. Continuing.", self.pid),
            JobState::Running => write!(f, "Child process {} running.", self.pid),
        }
    }
}

/// Status reported for a command killed by `signum`.
pub fn signal_status(signum: i32) -> ExitCode {
    128 + signum
}

/// Owner of [`ShellState`] and of every background child still alive.
#[derive(Debug, Default)]
pub struct JobTracker {
    state: ShellState,
    jobs: BTreeMap<i32, JobState>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// Background children that have not been reported as finished yet.
    pub fn jobs(&self) -> impl Iterator<Item = (i32, JobState)> + '_ {
        self.jobs.iter().map(|(pid, state)| (*pid, *state))
    }

    /// Record the status of a foreground command that never got to run.
    pub fn record_status(&mut self, status: ExitCode) {
        self.state.last_status = status;
    }

    /// Remember a freshly spawned background child; it becomes `$!`.
    pub fn track_background(&mut self, pid: Pid) {
        tracing::debug!(pid = pid.as_raw(), "tracking background child");
        self.jobs.insert(pid.as_raw(), JobState::Running);
        self.state.last_background_pid = Some(pid.as_raw());
    }

    /// Block until the foreground child `pid` exits, dies or stops.
    ///
    /// An exit or a signal death updates `last_status`. A stopped child is
    /// continued and tracked as a background job instead of being waited on.
    pub fn wait_foreground(&mut self, pid: Pid) -> nix::Result<JobState> {
        let mut stop_signal = Signal::SIGTSTP;
        let state = loop {
            match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Exited(_, code)) => break JobState::Exited(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => break JobState::Signaled(sig as i32),
                Ok(WaitStatus::Stopped(_, sig)) => {
                    stop_signal = sig;
                    break JobState::Stopped;
                }
                Ok(other) => {
                    tracing::trace!(?other, "ignoring wait status");
                }
                Err(Errno::EINTR) => {}
                Err(e) => return Err(e),
            }
        };
        tracing::debug!(pid = pid.as_raw(), ?state, "foreground child changed state");

        match state {
            JobState::Exited(code) => self.state.last_status = code,
            JobState::Signaled(sig) => self.state.last_status = signal_status(sig),
            JobState::Stopped => {
                eprintln!("{}", JobEvent { pid: pid.as_raw(), state });
                self.state.last_status = signal_status(stop_signal as i32);
                self.track_background(pid);
                continue_process(pid);
            }
            JobState::Running => {}
        }
        Ok(state)
    }

    /// Poll every tracked background child without blocking.
    ///
    /// Each exit, signal death or stop is returned once. Finished children are
    /// forgotten; stopped ones are sent `SIGCONT` and stay tracked.
    pub fn reap(&mut self) -> Vec<JobEvent> {
        let mut events = Vec::new();
        let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
        let pids: Vec<i32> = self.jobs.keys().copied().collect();

        for raw in pids {
            let pid = Pid::from_raw(raw);
            let state = match waitpid(pid, Some(flags)) {
                Ok(WaitStatus::Exited(_, code)) => JobState::Exited(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => JobState::Signaled(sig as i32),
                Ok(WaitStatus::Stopped(_, _)) => JobState::Stopped,
                Ok(WaitStatus::Continued(_)) => {
                    self.jobs.insert(raw, JobState::Running);
                    continue;
                }
                Ok(_) => continue,
                Err(Errno::ECHILD) => {
                    tracing::warn!(pid = raw, "background child vanished");
                    self.jobs.remove(&raw);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(pid = raw, error = %e, "failed to poll background child");
                    continue;
                }
            };

            if state.is_finished() {
                self.jobs.remove(&raw);
            } else {
                continue_process(pid);
                self.jobs.insert(raw, JobState::Running);
            }
            events.push(JobEvent { pid: raw, state });
        }
        events
    }
}

fn continue_process(pid: Pid) {
    if let Err(e) = signal::kill(pid, Signal::SIGCONT) {
        tracing::warn!(pid = pid.as_raw(), error = %e, "failed to continue child");
    }
}
