use flume::{Receiver, Sender};
use futures::{select, FutureExt};
use std::sync::Arc;

use streampipe_types::{GroupSession, Rebalance, RebalanceEvent, TopicPartition};

use crate::OffsetLedger;

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the relay loop is told after a rebalance has been handled.
pub enum GroupNotice {
    Assigned(Vec<TopicPartition>),
    Revoked(Vec<TopicPartition>),
}

#[derive(Debug)]
/// Drains rebalance notifications from the client.
///
/// Offsets of revoked partitions are flushed *before* the event is acknowledged, so the
/// client can not hand a partition over with an uncommitted offset. A failed flush is not
/// retried: the new owner will then receive again the records after the last commit.
pub struct RebalanceObserver<S: GroupSession> {
    ledger: Arc<OffsetLedger<S>>,
    notices: Sender<GroupNotice>,
    rebalances: u64,
}

impl<S: GroupSession> RebalanceObserver<S> {
    pub fn new(ledger: Arc<OffsetLedger<S>>, notices: Sender<GroupNotice>) -> Self {
        Self {
            ledger,
            notices,
            rebalances: 0,
        }
    }

    /// Number of rebalance events handled.
    pub fn rebalances(&self) -> u64 {
        self.rebalances
    }

    pub async fn handle(&mut self, event: RebalanceEvent) {
        self.rebalances += 1;
        match event.rebalance() {
            Rebalance::Assign(tpl) => {
                let owned = self.ledger.assign(tpl).await;
                log::info!(
                    "Rebalanced: assigned [{}], now own [{}]",
                    display_list(tpl),
                    display_list(&owned)
                );
                self.notices.send(GroupNotice::Assigned(tpl.clone())).ok();
            }
            Rebalance::Revoke(tpl) => {
                if let Err(err) = self.ledger.revoke(tpl).await {
                    log::warn!(
                        "Revoking [{}] without committing all offsets, the next owner may see duplicates: {err}",
                        display_list(tpl)
                    );
                }
                log::info!("Rebalanced: revoked [{}]", display_list(tpl));
                self.notices.send(GroupNotice::Revoked(tpl.clone())).ok();
            }
            Rebalance::Error(err) => {
                log::warn!("Rebalance error: {err}");
            }
        }
        event.acknowledge();
    }

    /// Runs until the client closes the rebalance channel, or `stop` is disconnected.
    pub async fn run(mut self, events: Receiver<RebalanceEvent>, stop: Receiver<()>) {
        loop {
            let event = select! {
                event = events.recv_async().fuse() => event,
                _ = stop.recv_async().fuse() => break,
            };
            match event {
                Ok(event) => self.handle(event).await,
                Err(_) => break,
            }
        }
        log::debug!("Rebalance observer exit after {} rebalances", self.rebalances);
    }
}

pub(crate) fn display_list(tpl: &[TopicPartition]) -> String {
    tpl.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
