use flume::{Receiver, Sender};
use futures::Future;

use crate::{Offset, PipeResult, Record, SessionConfig, TopicPartition};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// How an asynchronous client error should be treated.
pub enum Severity {
    /// Connection and broker errors. The client library retries these internally,
    /// so they are only logged.
    Retryable,
    /// Malformed responses and protocol violations. The relay loop must shut down.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A group membership change, as announced by the client.
pub enum Rebalance {
    /// These partitions are now owned by this member.
    Assign(Vec<TopicPartition>),
    /// These partitions are being taken away. Offsets must be flushed before acknowledging.
    Revoke(Vec<TopicPartition>),
    /// The rebalance failed on the client side.
    Error(String),
}

#[derive(Debug)]
/// A rebalance notification. The client blocks the handoff until it is acknowledged
/// (or dropped).
pub struct RebalanceEvent {
    rebalance: Rebalance,
    ack: Sender<()>,
}

/// Common interface of consumer group clients, to be implemented by all backends.
///
/// A session is shared between the relay loop and its drain tasks, hence every method takes `&self`.
pub trait GroupSession: Sized + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Join the consumer group and subscribe to the topics.
    fn open(config: &SessionConfig) -> impl Future<Output = PipeResult<Self, Self::Error>> + Send;

    /// Records in delivery order. Within one partition, offsets are strictly increasing.
    fn records(&self) -> Receiver<Record>;

    /// Asynchronous errors that are not tied to a particular call.
    fn errors(&self) -> Receiver<Self::Error>;

    /// Membership changes. Each event must be acknowledged once the revoked offsets are flushed.
    fn rebalances(&self) -> Receiver<RebalanceEvent>;

    /// Note that `offset` has been relayed. This is cheap and does not wait for the broker,
    /// the client persists marked offsets on its own schedule.
    fn mark(&self, tp: &TopicPartition, offset: Offset) -> PipeResult<(), Self::Error>;

    /// Durably commit `offset` as the last processed record of `tp`; returns once the broker
    /// has acknowledged.
    fn commit(
        &self,
        tp: &TopicPartition,
        offset: Offset,
    ) -> impl Future<Output = PipeResult<(), Self::Error>> + Send;

    /// Leave the group. Marked but uncommitted offsets are committed by the client on the way out.
    fn close(&self) -> impl Future<Output = PipeResult<(), Self::Error>> + Send;

    /// Decide whether an error from [`GroupSession::errors`] is fatal.
    fn classify(err: &Self::Error) -> Severity;
}

impl RebalanceEvent {
    /// Returns the event and the receiver the client should wait on.
    pub fn new(rebalance: Rebalance) -> (Self, Receiver<()>) {
        let (ack, waiter) = flume::bounded(1);
        (Self { rebalance, ack }, waiter)
    }

    pub fn rebalance(&self) -> &Rebalance {
        &self.rebalance
    }

    /// Let the client proceed with the handoff.
    pub fn acknowledge(self) {
        // the client may have given up waiting
        self.ack.send(()).ok();
    }
}
