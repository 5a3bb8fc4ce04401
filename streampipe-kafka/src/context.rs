use flume::{Receiver, RecvTimeoutError, Sender};
use rdkafka::{
    client::ClientContext,
    consumer::{ConsumerContext, Rebalance as RawRebalance},
    error::KafkaResult as RawResult,
    TopicPartitionList,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::runtime::{Handle, RuntimeFlavor};

use streampipe_types::{Partition, Rebalance, RebalanceEvent, Topic, TopicPartition};

use crate::KafkaErr;

/// Hooks into librdkafka's callbacks and forwards them to the relay loop.
///
/// The callbacks run on whichever thread polls the consumer. `pre_rebalance` blocks that
/// thread until the rebalance has been acknowledged, so the handoff waits for revoked offsets
/// to be committed. On a tokio worker the wait goes through `block_in_place`, so the observer
/// task can make progress on another thread; a current-thread runtime can only time out.
#[derive(Debug)]
pub struct PipeContext {
    errors: Sender<KafkaErr>,
    rebalances: Sender<RebalanceEvent>,
    ack_timeout: Duration,
    closing: AtomicBool,
}

impl PipeContext {
    pub fn new(
        errors: Sender<KafkaErr>,
        rebalances: Sender<RebalanceEvent>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            errors,
            rebalances,
            ack_timeout,
            closing: AtomicBool::new(false),
        }
    }

    /// Stop forwarding rebalances. The final revoke on consumer close has nobody to
    /// acknowledge it.
    pub fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    fn forward(&self, rebalance: Rebalance) {
        if self.is_closing() {
            log::debug!("Closing, not forwarding {rebalance:?}");
            return;
        }
        let (event, ack) = RebalanceEvent::new(rebalance);
        if self.rebalances.send(event).is_err() {
            return;
        }
        match wait_for_ack(&ack, self.ack_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => (),
            Err(RecvTimeoutError::Timeout) => log::warn!(
                "Rebalance not acknowledged within {:?}, proceeding anyway",
                self.ack_timeout
            ),
        }
    }
}

fn wait_for_ack(ack: &Receiver<()>, timeout: Duration) -> Result<(), RecvTimeoutError> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| ack.recv_timeout(timeout))
        }
        _ => ack.recv_timeout(timeout),
    }
}

impl ClientContext for PipeContext {
    fn error(&self, error: KafkaErr, reason: &str) {
        log::debug!("librdkafka: {error} ({reason})");
        if self.errors.try_send(error).is_err() {
            log::error!("Client error dropped: {reason}");
        }
    }
}

impl ConsumerContext for PipeContext {
    fn pre_rebalance<'a>(&self, rebalance: &RawRebalance<'a>) {
        let rebalance = match rebalance {
            RawRebalance::Assign(tpl) => Rebalance::Assign(partitions(tpl)),
            RawRebalance::Revoke(tpl) => Rebalance::Revoke(partitions(tpl)),
            RawRebalance::Error(err) => Rebalance::Error(err.to_string()),
        };
        self.forward(rebalance);
    }

    fn commit_callback(&self, result: RawResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => log::trace!("Committed {:?}", offsets.to_topic_map()),
            Err(err) => log::warn!("Commit failed: {err}"),
        }
    }
}

pub(crate) fn partitions(tpl: &TopicPartitionList) -> Vec<TopicPartition> {
    tpl.elements()
        .iter()
        .filter_map(|elem| match Topic::new(elem.topic()) {
            Ok(topic) => Some(TopicPartition::new(topic, Partition::new(elem.partition()))),
            Err(err) => {
                log::warn!("Ignoring partition {}: {err}", elem.partition());
                None
            }
        })
        .collect()
}
