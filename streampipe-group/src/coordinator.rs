use flume::{bounded, unbounded, Receiver, RecvError};
use futures::{future::pending, select, FutureExt};
use std::{collections::BTreeMap, io::Write, sync::Arc, time::Instant};

use streampipe_runtime::{sleep_until, spawn_task};
use streampipe_types::{GroupSession, Offset, PipeResult, Record, SessionConfig, TopicPartition};

use crate::{
    observer::display_list, ErrorSink, FatalError, GroupNotice, OffsetLedger, RebalanceObserver,
    Relay, ShutdownCause, State, Supervisor,
};

/// The relay loop. Owns the session from the moment it is established until it is closed.
///
/// ```ignore
/// let supervisor = Supervisor::new(options);
/// let switch = supervisor.switch(); // hand this to a signal listener
/// let coordinator = Coordinator::<KafkaSession, _>::open(&config, std::io::stdout(), supervisor).await?;
/// let report = coordinator.run().await;
/// std::process::exit(report.exit_code());
/// ```
#[derive(Debug)]
pub struct Coordinator<S: GroupSession, W: Write> {
    session: Arc<S>,
    ledger: Arc<OffsetLedger<S>>,
    relay: Relay<W>,
    supervisor: Supervisor,
    state: State,
}

#[derive(Debug, Clone)]
/// Outcome of [`Coordinator::run`].
pub struct RelayReport {
    pub cause: ShutdownCause,
    pub relayed: u64,
    pub committed: BTreeMap<TopicPartition, Offset>,
}

enum Event {
    Record(Result<Record, RecvError>),
    Notice(Option<GroupNotice>),
    Shutdown(ShutdownCause),
    Idle,
}

impl<S: GroupSession, W: Write> Coordinator<S, W> {
    /// Join the group. Failing here means the session could not be established.
    pub async fn open(
        config: &SessionConfig,
        sink: W,
        supervisor: Supervisor,
    ) -> PipeResult<Self, S::Error> {
        log::info!(
            "{:?}: joining group `{}` on [{}] for [{}], offset policy {}",
            State::Starting,
            config.group(),
            config.broker_list(),
            config
                .topics()
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", "),
            config.offset_policy().as_str(),
        );
        let session = S::open(config).await?;
        Ok(Self::new(session, sink, supervisor))
    }

    /// Drive an already established session.
    pub fn new(session: S, sink: W, supervisor: Supervisor) -> Self {
        let session = Arc::new(session);
        let mut coordinator = Self {
            ledger: Arc::new(OffsetLedger::new(session.clone())),
            session,
            relay: Relay::new(sink),
            supervisor,
            state: State::Starting,
        };
        coordinator.transit(State::Running);
        coordinator
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Relay until a shutdown cause is set, then commit and close the session.
    ///
    /// Exactly one event is handled per iteration; when several are ready, one is picked at random.
    /// The idle deadline is only looked at between iterations, never while a record is being
    /// relayed and marked.
    pub async fn run(mut self) -> RelayReport {
        let records = self.session.records();
        let (notice_sender, notices) = unbounded();
        // the drain tasks exit once `stop` is dropped
        let (stop, stopped) = bounded::<()>(1);
        spawn_task(
            ErrorSink::<S>::new(self.supervisor.switch()).run(self.session.errors(), stopped.clone()),
        );
        spawn_task(
            RebalanceObserver::new(self.ledger.clone(), notice_sender)
                .run(self.session.rebalances(), stopped),
        );

        self.supervisor.arm(Instant::now());
        let mut notices_open = true;

        let cause = loop {
            let event = {
                let deadline = self.supervisor.deadline();
                let shutdown = self.supervisor.receiver();
                select! {
                    record = records.recv_async().fuse() => Event::Record(record),
                    notice = next_notice(&notices, notices_open).fuse() => Event::Notice(notice),
                    // the supervisor keeps a sender, so this can not disconnect
                    cause = shutdown.recv_async().fuse() => Event::Shutdown(cause.unwrap_or(ShutdownCause::Signal)),
                    _ = idle(deadline).fuse() => Event::Idle,
                }
            };
            match event {
                Event::Record(Ok(record)) => match self.on_record(record).await {
                    Ok(true) => self.supervisor.on_activity(Instant::now()),
                    Ok(false) => (),
                    Err(cause) => break cause,
                },
                Event::Record(Err(_)) => {
                    break ShutdownCause::Fatal(FatalError::Client(
                        "record stream closed".to_owned(),
                    ))
                }
                Event::Notice(Some(GroupNotice::Assigned(tpl))) => {
                    log::debug!("Assignment of [{}] observed", display_list(&tpl));
                    self.supervisor.on_activity(Instant::now());
                }
                Event::Notice(Some(GroupNotice::Revoked(tpl))) => {
                    log::debug!("Revocation of [{}] observed", display_list(&tpl));
                }
                Event::Notice(None) => notices_open = false,
                Event::Shutdown(cause) => break cause,
                Event::Idle => break ShutdownCause::IdleTimeout,
            }
        };

        self.transit(State::Draining);
        if cause.is_graceful() {
            log::info!("Shutting down on {cause}");
        } else {
            log::error!("Shutting down on {cause}");
        }
        match self.ledger.flush_all().await {
            Ok(flushed) => log::debug!("Committed offsets of {flushed} partitions"),
            Err(err) => log::error!("Failed to commit offsets on exit: {err}"),
        }
        if let Err(err) = self.session.close().await {
            log::error!("Failed to close consumer: {err}");
        }
        // the observer stays up until here, closing may revoke partitions
        drop(stop);
        self.transit(State::Stopped);

        let committed = self.ledger.committed_offsets().await;
        log::info!(
            "Relayed {} records; committed offsets: {:?}",
            self.relay.relayed(),
            committed
                .iter()
                .map(|(tp, o)| format!("{tp}@{o}"))
                .collect::<Vec<_>>()
        );
        RelayReport {
            cause,
            relayed: self.relay.relayed(),
            committed,
        }
    }

    /// Returns whether the record was relayed. Err if the loop must stop.
    async fn on_record(&mut self, record: Record) -> Result<bool, ShutdownCause> {
        let tp = record.topic_partition();
        let offset = record.offset();
        if !self.ledger.is_assigned(&tp).await {
            log::debug!("Dropping {tp}@{offset}: partition is not assigned to us");
            return Ok(false);
        }
        if let Err(err) = self.relay.relay(&record) {
            log::error!("Failed to write {tp}@{offset}: {err}");
            return Err(ShutdownCause::Fatal(FatalError::Sink(err.to_string())));
        }
        match self.ledger.advance(&tp, offset).await {
            Ok(Some(_)) => (),
            Ok(None) => log::debug!("{tp} was revoked while relaying offset {offset}"),
            Err(err) => log::warn!("Failed to mark {tp}@{offset}: {err}"),
        }
        Ok(true)
    }

    fn transit(&mut self, to: State) {
        log::info!("{:?} -> {:?}", self.state, to);
        self.state = to;
    }
}

impl RelayReport {
    pub fn exit_code(&self) -> i32 {
        self.cause.exit_code()
    }

    pub fn committed(&self, tp: &TopicPartition) -> Option<Offset> {
        self.committed.get(tp).copied()
    }
}

async fn next_notice(notices: &Receiver<GroupNotice>, open: bool) -> Option<GroupNotice> {
    if open {
        notices.recv_async().await.ok()
    } else {
        pending().await
    }
}

async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
