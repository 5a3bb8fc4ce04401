use flume::Receiver;
use futures::{select, FutureExt};
use std::marker::PhantomData;

use streampipe_types::{GroupSession, Severity};

use crate::{FatalError, ShutdownCause, ShutdownSwitch};

#[derive(Debug)]
/// Drains the client's error channel away from the hot path.
///
/// Retryable errors are logged and left to the client. A fatal error trips the shutdown switch.
pub struct ErrorSink<S: GroupSession> {
    switch: ShutdownSwitch,
    retryable: u64,
    fatal: u64,
    session: PhantomData<fn() -> S>,
}

impl<S: GroupSession> ErrorSink<S> {
    pub fn new(switch: ShutdownSwitch) -> Self {
        Self {
            switch,
            retryable: 0,
            fatal: 0,
            session: PhantomData,
        }
    }

    pub fn handle(&mut self, err: &S::Error) -> Severity {
        let severity = S::classify(err);
        match severity {
            Severity::Retryable => {
                self.retryable += 1;
                log::warn!("Client error, retrying: {err}");
            }
            Severity::Fatal => {
                self.fatal += 1;
                log::error!("Fatal client error: {err}");
                self.switch
                    .trigger(ShutdownCause::Fatal(FatalError::Client(err.to_string())));
            }
        }
        severity
    }

    /// Number of (retryable, fatal) errors seen.
    pub fn counts(&self) -> (u64, u64) {
        (self.retryable, self.fatal)
    }

    /// Runs until the client closes the error channel, or `stop` is disconnected.
    pub async fn run(mut self, errors: Receiver<S::Error>, stop: Receiver<()>) {
        loop {
            let err = select! {
                err = errors.recv_async().fuse() => err,
                _ = stop.recv_async().fuse() => break,
            };
            match err {
                Ok(err) => {
                    self.handle(&err);
                }
                Err(_) => break,
            }
        }
        log::debug!(
            "Error sink exit: {} retryable, {} fatal",
            self.retryable,
            self.fatal
        );
    }
}
