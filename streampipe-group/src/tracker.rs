use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use streampipe_runtime::AsyncMutex;
use streampipe_types::{GroupSession, Offset, PipeResult, TopicPartition};

#[derive(Debug, Default, Clone)]
/// Per-partition cursor bookkeeping. This is pure state, it never talks to the broker.
///
/// `tracked` is the last relayed offset; `committed` is the last offset acknowledged by the
/// broker through an explicit commit. Both only ever move forward.
pub struct OffsetTracker {
    tracked: HashMap<TopicPartition, Offset>,
    committed: HashMap<TopicPartition, Offset>,
}

#[derive(Debug, Default, Clone)]
/// The partitions currently owned by this member.
pub struct Assignment {
    partitions: BTreeSet<TopicPartition>,
}

#[derive(Debug)]
/// The Committed Offset Map and the Partition Assignment, shared by the relay loop and the
/// rebalance observer.
///
/// Everything goes through one async mutex, which is held across the broker round trip of a
/// commit. Two commits for the same partition therefore can not interleave.
pub struct OffsetLedger<S: GroupSession> {
    session: Arc<S>,
    inner: AsyncMutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    tracker: OffsetTracker,
    assignment: Assignment,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Record that `offset` has been fully relayed. Returns the tracked value, which is the
    /// highest offset ever advanced to for this partition.
    pub fn advance(&mut self, tp: &TopicPartition, offset: Offset) -> Offset {
        let tracked = self.tracked.entry(tp.clone()).or_insert(offset);
        if offset > *tracked {
            *tracked = offset;
        }
        *tracked
    }

    pub fn tracked(&self, tp: &TopicPartition) -> Option<Offset> {
        self.tracked.get(tp).copied()
    }

    pub fn committed(&self, tp: &TopicPartition) -> Option<Offset> {
        self.committed.get(tp).copied()
    }

    /// The offset a flush should commit, if it is ahead of what has been committed.
    pub fn pending(&self, tp: &TopicPartition) -> Option<Offset> {
        let tracked = self.tracked(tp)?;
        match self.committed(tp) {
            Some(committed) if committed >= tracked => None,
            _ => Some(tracked),
        }
    }

    /// Every partition with a pending offset, in a stable order.
    pub fn pending_all(&self) -> Vec<(TopicPartition, Offset)> {
        let mut pending: Vec<_> = self
            .tracked
            .keys()
            .filter_map(|tp| self.pending(tp).map(|o| (tp.clone(), o)))
            .collect();
        pending.sort();
        pending
    }

    /// Record that the broker acknowledged a commit of `offset`. A lower value never overwrites
    /// a higher one.
    pub fn confirm(&mut self, tp: &TopicPartition, offset: Offset) {
        let committed = self.committed.entry(tp.clone()).or_insert(offset);
        if offset > *committed {
            *committed = offset;
        }
    }

    /// Drop the cursor of a partition that is no longer ours. The committed value is kept,
    /// so a later reassignment still can not commit below it.
    pub fn forget(&mut self, tp: &TopicPartition) -> Option<Offset> {
        self.tracked.remove(tp)
    }

    /// Snapshot of the Committed Offset Map.
    pub fn committed_offsets(&self) -> BTreeMap<TopicPartition, Offset> {
        self.committed
            .iter()
            .map(|(tp, o)| (tp.clone(), *o))
            .collect()
    }
}

impl Assignment {
    pub fn assign<'a, I: IntoIterator<Item = &'a TopicPartition>>(&mut self, tpl: I) {
        self.partitions.extend(tpl.into_iter().cloned());
    }

    pub fn revoke<'a, I: IntoIterator<Item = &'a TopicPartition>>(&mut self, tpl: I) {
        for tp in tpl {
            self.partitions.remove(tp);
        }
    }

    pub fn contains(&self, tp: &TopicPartition) -> bool {
        self.partitions.contains(tp)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicPartition> {
        self.partitions.iter()
    }
}

impl<S: GroupSession> OffsetLedger<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self {
            session,
            inner: AsyncMutex::new(Default::default()),
        }
    }

    pub async fn is_assigned(&self, tp: &TopicPartition) -> bool {
        self.inner.lock().await.assignment.contains(tp)
    }

    /// Add partitions to the assignment. Returns the full assignment afterwards.
    pub async fn assign(&self, tpl: &[TopicPartition]) -> Vec<TopicPartition> {
        let mut inner = self.inner.lock().await;
        inner.assignment.assign(tpl);
        inner.assignment.iter().cloned().collect()
    }

    /// Advance the tracker and mark the offset with the client.
    ///
    /// Returns `None` if the partition was revoked while the record was being written;
    /// the offset is then left for the new owner.
    pub async fn advance(
        &self,
        tp: &TopicPartition,
        offset: Offset,
    ) -> PipeResult<Option<Offset>, S::Error> {
        let mut inner = self.inner.lock().await;
        if !inner.assignment.contains(tp) {
            return Ok(None);
        }
        let tracked = inner.tracker.advance(tp, offset);
        self.session.mark(tp, tracked)?;
        Ok(Some(tracked))
    }

    /// Commit the tracked offset of `tp`, if there is anything new. Returns the offset committed.
    pub async fn flush(&self, tp: &TopicPartition) -> PipeResult<Option<Offset>, S::Error> {
        let mut inner = self.inner.lock().await;
        Self::flush_inner(&self.session, &mut inner, tp).await
    }

    /// Drop the partitions from the assignment and flush their tracked offsets.
    /// Every partition is attempted; the first failure is returned.
    pub async fn revoke(&self, tpl: &[TopicPartition]) -> PipeResult<(), S::Error> {
        let mut inner = self.inner.lock().await;
        // records still queued for these partitions are no longer ours
        inner.assignment.revoke(tpl);
        let mut result = Ok(());
        for tp in tpl {
            match Self::flush_inner(&self.session, &mut inner, tp).await {
                Ok(Some(offset)) => log::debug!("Flushed {tp} up to {offset} before revoke"),
                Ok(None) => (),
                Err(err) => {
                    log::error!("Failed to flush {tp} before revoke: {err}");
                    if result.is_ok() {
                        result = Err(err);
                    }
                }
            }
            inner.tracker.forget(tp);
        }
        result
    }

    /// Flush every assigned partition with a pending offset. Every partition is attempted;
    /// the first failure is returned.
    pub async fn flush_all(&self) -> PipeResult<usize, S::Error> {
        let mut inner = self.inner.lock().await;
        let pending: Vec<_> = inner
            .tracker
            .pending_all()
            .into_iter()
            .filter(|(tp, _)| inner.assignment.contains(tp))
            .collect();
        let mut flushed = 0;
        let mut first_err = None;
        for (tp, _) in pending {
            match Self::flush_inner(&self.session, &mut inner, &tp).await {
                Ok(Some(_)) => flushed += 1,
                Ok(None) => (),
                Err(err) => {
                    log::error!("Failed to flush {tp}: {err}");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(flushed),
        }
    }

    pub async fn tracked(&self, tp: &TopicPartition) -> Option<Offset> {
        self.inner.lock().await.tracker.tracked(tp)
    }

    pub async fn committed(&self, tp: &TopicPartition) -> Option<Offset> {
        self.inner.lock().await.tracker.committed(tp)
    }

    pub async fn committed_offsets(&self) -> BTreeMap<TopicPartition, Offset> {
        self.inner.lock().await.tracker.committed_offsets()
    }

    async fn flush_inner(
        session: &S,
        inner: &mut LedgerState,
        tp: &TopicPartition,
    ) -> PipeResult<Option<Offset>, S::Error> {
        let offset = match inner.tracker.pending(tp) {
            Some(offset) => offset,
            None => return Ok(None),
        };
        session.commit(tp, offset).await?;
        inner.tracker.confirm(tp, offset);
        Ok(Some(offset))
    }
}
