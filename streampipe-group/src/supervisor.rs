use flume::{bounded, Receiver, Sender};
use std::{fmt::Display, time::Instant};

use streampipe_types::{IdleMode, RelayOptions};

use crate::{EX_IOERR, EX_OK, EX_SOFTWARE};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Lifecycle of the relay loop.
pub enum State {
    /// Waiting for the session to be established.
    Starting,
    /// Relaying records.
    Running,
    /// A shutdown cause is set; committing offsets and closing the session.
    Draining,
    /// The session is closed.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Why the relay loop stopped. Set once.
pub enum ShutdownCause {
    IdleTimeout,
    Signal,
    Fatal(FatalError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Origin of an unrecoverable error.
pub enum FatalError {
    /// The client classified an error as fatal, or its record stream ended.
    Client(String),
    /// Writing to the output sink failed.
    Sink(String),
}

#[derive(Debug, Clone)]
/// Request the relay loop to stop. Only the first request is honoured.
pub struct ShutdownSwitch {
    sender: Sender<ShutdownCause>,
}

#[derive(Debug)]
/// Decides when the relay loop must stop: on the idle deadline, or on a request through
/// the [`ShutdownSwitch`].
pub struct Supervisor {
    options: RelayOptions,
    deadline: Option<Instant>,
    switch: ShutdownSwitch,
    receiver: Receiver<ShutdownCause>,
}

impl ShutdownCause {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::IdleTimeout | Self::Signal => EX_OK,
            Self::Fatal(FatalError::Client(_)) => EX_SOFTWARE,
            Self::Fatal(FatalError::Sink(_)) => EX_IOERR,
        }
    }

    pub fn is_graceful(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

impl Display for ShutdownCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Signal => write!(f, "signal"),
            Self::Fatal(FatalError::Client(e)) => write!(f, "fatal client error: {e}"),
            Self::Fatal(FatalError::Sink(e)) => write!(f, "output sink error: {e}"),
        }
    }
}

impl ShutdownSwitch {
    /// Returns false if a shutdown has already been requested.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        match self.sender.try_send(cause) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(cause)) => {
                log::debug!("Shutdown already requested, ignoring {cause}");
                false
            }
            // the loop is gone
            Err(flume::TrySendError::Disconnected(_)) => false,
        }
    }
}

impl Supervisor {
    pub fn new(options: RelayOptions) -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            options,
            deadline: None,
            switch: ShutdownSwitch { sender },
            receiver,
        }
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// A handle for signal listeners and drain tasks.
    pub fn switch(&self) -> ShutdownSwitch {
        self.switch.clone()
    }

    pub(crate) fn receiver(&self) -> &Receiver<ShutdownCause> {
        &self.receiver
    }

    /// Start the idle window. Called once the session is established.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.options.idle_timeout());
    }

    /// Something happened. In [`IdleMode::Activity`] this pushes the deadline back;
    /// in [`IdleMode::Fixed`] it does nothing.
    pub fn on_activity(&mut self, now: Instant) {
        if self.options.idle_mode() == IdleMode::Activity && self.deadline.is_some() {
            self.arm(now);
        }
    }

    /// `None` before the supervisor is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }
}
