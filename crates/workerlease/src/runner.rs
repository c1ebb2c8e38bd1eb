//! Runner - binds a child process's lifetime to one leased worker id.
//!
//! Flow:
//! 1. Acquire a worker id from the generator
//! 2. Spawn the command with the placeholder argument replaced by the id
//! 3. Event loop: renew on every tick, forward HUP/INT/TERM/QUIT to the child,
//!    wait for the child to exit
//! 4. On exit, release the id if the lease is still believed valid
//!
//! If the lease cannot outlive the next tick, the child is sent SIGTERM and the
//! lease is treated as lost. A child still alive `kill_grace` later gets SIGKILL.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Instant, MissedTickBehavior};

use crate::generator::Generator;
use crate::lease::LeaseError;

/// Argument replaced by the leased id unless configured otherwise.
pub const DEFAULT_PLACEHOLDER: &str = "worker-id";

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Time between renewals, non-zero. Also the safety margin before expiry.
    pub interval: Duration,
    pub placeholder: String,
    /// Delay between proactive SIGTERM and SIGKILL. `None` never escalates.
    pub kill_grace: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            kill_grace: Some(Duration::from_secs(10)),
        }
    }
}

impl RunnerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_kill_grace(mut self, kill_grace: Option<Duration>) -> Self {
        self.kill_grace = kill_grace;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to acquire worker id: {0}")]
    Acquire(#[source] LeaseError),
    #[error("no command given")]
    EmptyCommand,
    #[error("invalid renewal interval {0:?}")]
    InvalidInterval(Duration),
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
    #[error("failed to start command: {0}")]
    Spawn(#[source] io::Error),
    #[error("failed to wait for command: {0}")]
    Wait(#[source] io::Error),
}

/// Replace every argument equal to `placeholder` with the decimal id.
pub fn substitute_args(args: &[String], placeholder: &str, id: u16) -> Vec<String> {
    args.iter()
        .map(|arg| {
            if arg == placeholder {
                id.to_string()
            } else {
                arg.clone()
            }
        })
        .collect()
}

/// Process-control signals passed through to the child.
struct ForwardedSignals {
    hangup: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

impl ForwardedSignals {
    fn install() -> io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    async fn recv(&mut self) -> Signal {
        tokio::select! {
            _ = self.hangup.recv() => Signal::SIGHUP,
            _ = self.interrupt.recv() => Signal::SIGINT,
            _ = self.terminate.recv() => Signal::SIGTERM,
            _ = self.quit.recv() => Signal::SIGQUIT,
        }
    }
}

fn send_signal(pid: Option<Pid>, sig: Signal) {
    let Some(pid) = pid else {
        tracing::warn!(signal = ?sig, "Command has no pid - cannot signal");
        return;
    };
    if let Err(e) = kill(pid, sig) {
        tracing::warn!(%pid, signal = ?sig, error = %e, "Failed to signal command");
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn past(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_signed(TimeDelta::nanoseconds(1))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Runs one command under one worker-id lease.
pub struct Runner<G> {
    generator: G,
    config: RunnerConfig,
    command: Vec<String>,
}

impl<G: Generator> Runner<G> {
    /// `command` is the program followed by its arguments.
    pub fn new(generator: G, config: RunnerConfig, command: Vec<String>) -> Self {
        Self {
            generator,
            config,
            command,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the command to completion and return its exit status.
    ///
    /// Errors are only returned for failures before the command starts, or if
    /// waiting on it fails. Renewal failures are logged and retried on the next tick.
    pub async fn run(self) -> Result<ExitStatus, RunnerError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(RunnerError::EmptyCommand)?;

        let interval = self.config.interval;
        let first_tick = Instant::now()
            .checked_add(interval)
            .filter(|_| !interval.is_zero())
            .ok_or(RunnerError::InvalidInterval(interval))?;

        let mut lease = self
            .generator
            .acquire()
            .await
            .map_err(RunnerError::Acquire)?;
        let id = lease.id;
        tracing::info!(id, expire_at = %lease.expire_at, "Acquired worker id");

        // Handlers go in before the spawn so nothing aimed at the child is lost.
        let mut signals = ForwardedSignals::install().map_err(RunnerError::Signal)?;

        let mut child = Command::new(program)
            .args(substitute_args(args, &self.config.placeholder, id))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(RunnerError::Spawn)?;
        let pid = child
            .id()
            .and_then(|raw| i32::try_from(raw).ok())
            .map(Pid::from_raw);
        tracing::info!(id, pid = ?pid, program = %program, "Started command");

        let margin = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
        let mut ticker = tokio::time::interval_at(first_tick, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut terminating = false;
        let mut kill_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                status = child.wait() => {
                    let status = status.map_err(RunnerError::Wait)?;
                    tracing::info!(id, %status, "Command exited");

                    if lease.is_valid_at(Utc::now()) {
                        match self.generator.release(id.into()).await {
                            Ok(()) => tracing::info!(id, "Released worker id"),
                            Err(e) => tracing::warn!(id, error = %e, "Failed to release worker id"),
                        }
                    }
                    return Ok(status);
                }
                _ = ticker.tick() => {
                    match self.generator.renew(id.into()).await {
                        Ok(renewed) => {
                            lease = renewed;
                            tracing::debug!(id, expire_at = %lease.expire_at, "Extended lease");
                        }
                        Err(e) => tracing::warn!(id, error = %e, "Failed to renew lease"),
                    }

                    let now = Utc::now();
                    let next_tick = now.checked_add_signed(margin).unwrap_or(DateTime::<Utc>::MAX_UTC);
                    if lease.expire_at < next_tick {
                        lease.expire_at = past(now);
                        if !terminating {
                            terminating = true;
                            tracing::warn!(id, "Lease cannot outlive the next renewal - terminating command");
                            send_signal(pid, Signal::SIGTERM);
                            // A grace too large to represent never escalates.
                            kill_deadline = self
                                .config
                                .kill_grace
                                .and_then(|grace| Instant::now().checked_add(grace));
                        }
                    }
                }
                sig = signals.recv() => {
                    tracing::debug!(signal = ?sig, "Forwarding signal to command");
                    send_signal(pid, sig);
                }
                _ = sleep_until_opt(kill_deadline) => {
                    tracing::warn!(id, "Command ignored SIGTERM - killing");
                    send_signal(pid, Signal::SIGKILL);
                    kill_deadline = None;
                }
            }
        }
    }
}
