#![allow(dead_code)]
use flume::{unbounded, Receiver, Sender};
use std::{
    collections::HashMap,
    fmt::Display,
    io::Write,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use streampipe_types::{
    ConsumerGroup, GroupSession, IdleMode, Offset, Partition, PipeErr, PipeResult, Rebalance,
    RebalanceEvent, Record, RelayOptions, SessionConfig, Severity, Topic, TopicPartition,
};

lazy_static::lazy_static! {
    static ref GROUPS: Mutex<HashMap<String, MemorySession>> = Mutex::new(Default::default());
}

pub const TOPIC: &str = "t";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Everything observable that happened, in order.
pub enum Trace {
    Output(String),
    Mark(TopicPartition, Offset),
    Commit(TopicPartition, Offset),
    Ack(Rebalance),
    Close,
}

pub type TraceLog = Arc<Mutex<Vec<Trace>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryErr {
    Transport(String),
    Protocol(String),
    CommitRejected,
    CloseFailed,
}

/// An in-memory consumer group session. Records are fed by the matching [`MemoryBroker`].
#[derive(Debug)]
pub struct MemorySession {
    records: Receiver<Record>,
    errors: Receiver<MemoryErr>,
    rebalances: Receiver<RebalanceEvent>,
    trace: TraceLog,
    fail_commit: Arc<AtomicBool>,
    fail_close: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
pub struct MemoryBroker {
    records: Sender<Record>,
    errors: Sender<MemoryErr>,
    rebalances: Sender<RebalanceEvent>,
    trace: TraceLog,
    fail_commit: Arc<AtomicBool>,
    fail_close: Arc<AtomicBool>,
}

/// Writes complete lines into the trace on flush. Fails on any write containing `poison`.
#[derive(Debug)]
pub struct TraceSink {
    trace: TraceLog,
    buffer: Vec<u8>,
    poison: Option<String>,
}

impl Display for MemoryErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for MemoryErr {}

pub fn memory_session() -> (MemorySession, MemoryBroker) {
    let (records, record_receiver) = unbounded();
    let (errors, error_receiver) = unbounded();
    let (rebalances, rebalance_receiver) = unbounded();
    let trace = TraceLog::default();
    let fail_commit = Arc::new(AtomicBool::new(false));
    let fail_close = Arc::new(AtomicBool::new(false));
    (
        MemorySession {
            records: record_receiver,
            errors: error_receiver,
            rebalances: rebalance_receiver,
            trace: trace.clone(),
            fail_commit: fail_commit.clone(),
            fail_close: fail_close.clone(),
        },
        MemoryBroker {
            records,
            errors,
            rebalances,
            trace,
            fail_commit,
            fail_close,
        },
    )
}

/// Make a session available to `GroupSession::open` under this group name.
pub fn register(group: &str) -> MemoryBroker {
    let (session, broker) = memory_session();
    GROUPS
        .lock()
        .unwrap()
        .insert(group.to_owned(), session);
    broker
}

pub fn config(group: &str) -> SessionConfig {
    SessionConfig::new(
        ConsumerGroup::new(group),
        ["localhost:9092"],
        vec![Topic::new(TOPIC).unwrap()],
    )
    .unwrap()
}

pub fn options(idle_ms: u64, mode: IdleMode) -> RelayOptions {
    let mut options = RelayOptions::default();
    options
        .set_idle_timeout(Duration::from_millis(idle_ms))
        .unwrap()
        .set_idle_mode(mode);
    options
}

pub fn tp(partition: i32) -> TopicPartition {
    TopicPartition::new(Topic::new(TOPIC).unwrap(), Partition::new(partition))
}

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `cond` until it holds, for at most 5 seconds.
pub async fn wait_until<F: Fn() -> bool>(cond: F) -> anyhow::Result<()> {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("condition not met in time"))
}

impl GroupSession for MemorySession {
    type Error = MemoryErr;

    async fn open(config: &SessionConfig) -> PipeResult<Self, MemoryErr> {
        let group = config.group().name();
        GROUPS
            .lock()
            .unwrap()
            .remove(group)
            .ok_or_else(|| PipeErr::Connect(format!("no broker serves group `{group}`")))
    }

    fn records(&self) -> Receiver<Record> {
        self.records.clone()
    }

    fn errors(&self) -> Receiver<MemoryErr> {
        self.errors.clone()
    }

    fn rebalances(&self) -> Receiver<RebalanceEvent> {
        self.rebalances.clone()
    }

    fn mark(&self, tp: &TopicPartition, offset: Offset) -> PipeResult<(), MemoryErr> {
        self.trace
            .lock()
            .unwrap()
            .push(Trace::Mark(tp.clone(), offset));
        Ok(())
    }

    async fn commit(&self, tp: &TopicPartition, offset: Offset) -> PipeResult<(), MemoryErr> {
        tokio::task::yield_now().await;
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(PipeErr::Backend(MemoryErr::CommitRejected));
        }
        self.trace
            .lock()
            .unwrap()
            .push(Trace::Commit(tp.clone(), offset));
        Ok(())
    }

    async fn close(&self) -> PipeResult<(), MemoryErr> {
        self.trace.lock().unwrap().push(Trace::Close);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(PipeErr::Backend(MemoryErr::CloseFailed));
        }
        Ok(())
    }

    fn classify(err: &MemoryErr) -> Severity {
        match err {
            MemoryErr::Protocol(_) => Severity::Fatal,
            _ => Severity::Retryable,
        }
    }
}

impl MemoryBroker {
    pub fn deliver(&self, partition: i32, offset: Offset, payload: &str) {
        self.records
            .send(Record::new(
                Topic::new(TOPIC).unwrap(),
                Partition::new(partition),
                offset,
                payload.as_bytes().to_vec(),
            ))
            .unwrap();
    }

    /// Returns once the event has been acknowledged, like a client blocked in its rebalance callback.
    pub async fn rebalance(&self, rebalance: Rebalance) {
        let (event, waiter) = RebalanceEvent::new(rebalance.clone());
        self.rebalances.send_async(event).await.unwrap();
        waiter.recv_async().await.ok();
        self.trace.lock().unwrap().push(Trace::Ack(rebalance));
    }

    pub async fn assign(&self, partitions: &[i32]) {
        self.rebalance(Rebalance::Assign(partitions.iter().map(|p| tp(*p)).collect()))
            .await
    }

    pub async fn revoke(&self, partitions: &[i32]) {
        self.rebalance(Rebalance::Revoke(partitions.iter().map(|p| tp(*p)).collect()))
            .await
    }

    pub fn error(&self, err: MemoryErr) {
        self.errors.send(err).unwrap();
    }

    pub fn fail_commit(&self, v: bool) {
        self.fail_commit.store(v, Ordering::SeqCst);
    }

    pub fn fail_close(&self, v: bool) {
        self.fail_close.store(v, Ordering::SeqCst);
    }

    pub fn sink(&self) -> TraceSink {
        TraceSink {
            trace: self.trace.clone(),
            buffer: Vec::new(),
            poison: None,
        }
    }

    pub fn poisoned_sink(&self, poison: &str) -> TraceSink {
        TraceSink {
            poison: Some(poison.to_owned()),
            ..self.sink()
        }
    }

    pub fn trace(&self) -> Vec<Trace> {
        self.trace.lock().unwrap().clone()
    }

    pub fn outputs(&self) -> Vec<String> {
        self.trace()
            .into_iter()
            .filter_map(|t| match t {
                Trace::Output(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn marks(&self, partition: i32) -> Vec<Offset> {
        let tp = tp(partition);
        self.trace()
            .into_iter()
            .filter_map(|t| match t {
                Trace::Mark(p, o) if p == tp => Some(o),
                _ => None,
            })
            .collect()
    }

    pub fn commits(&self, partition: i32) -> Vec<Offset> {
        let tp = tp(partition);
        self.trace()
            .into_iter()
            .filter_map(|t| match t {
                Trace::Commit(p, o) if p == tp => Some(o),
                _ => None,
            })
            .collect()
    }

    /// Index of the first trace entry matching `f`.
    pub fn position<F: Fn(&Trace) -> bool>(&self, f: F) -> Option<usize> {
        self.trace().iter().position(f)
    }
}

impl Write for TraceSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(poison) = &self.poison {
            if String::from_utf8_lossy(buf).contains(poison.as_str()) {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.trace.lock().unwrap().push(Trace::Output(line));
        }
        Ok(())
    }
}
