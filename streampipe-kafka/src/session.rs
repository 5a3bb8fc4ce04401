use flume::{bounded, unbounded, Receiver, Sender};
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::BorrowedMessage,
    util::Timeout,
    Message as KafkaMessageTrait, Offset as RawOffset, TopicPartitionList,
};
use std::{sync::Arc, time::Duration};

use streampipe_runtime::{spawn_blocking, spawn_task};
use streampipe_types::{
    export::futures::{select, FutureExt},
    runtime_error, GroupSession, Offset, OffsetPolicy, Partition, PipeErr, Record,
    RebalanceEvent, SessionConfig, Severity, Topic, TopicPartition,
};

use crate::{classify, client_id, impl_into_string, stream_err, KafkaErr, KafkaResult, PipeContext};

type RawConsumer = StreamConsumer<PipeContext>;

/// A consumer group membership backed by librdkafka.
///
/// A background task pumps records and consumption errors off the `StreamConsumer` into
/// channels; rebalances and client errors are forwarded by [`PipeContext`].
pub struct KafkaSession {
    consumer: Arc<RawConsumer>,
    records: Receiver<Record>,
    errors: Receiver<KafkaErr>,
    rebalances: Receiver<RebalanceEvent>,
    kill_switch: Sender<()>,
}

#[derive(Debug, Clone)]
pub struct KafkaSessionOptions {
    /// https://kafka.apache.org/documentation/#consumerconfigs_client.id
    client_id: Option<String>,
    /// https://kafka.apache.org/documentation/#consumerconfigs_session.timeout.ms
    session_timeout: Option<Duration>,
    /// https://kafka.apache.org/documentation/#consumerconfigs_auto.commit.interval.ms
    auto_commit_interval: Option<Duration>,
    /// https://github.com/confluentinc/librdkafka/blob/master/CONFIGURATION.md
    socket_timeout: Option<Duration>,
    probe_timeout: Duration,
    rebalance_timeout: Duration,
    buffer_size: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KafkaSessionOptionKey {
    BootstrapServers,
    GroupId,
    ClientId,
    SessionTimeout,
    AutoOffsetReset,
    EnableAutoCommit,
    AutoCommitInterval,
    EnableAutoOffsetStore,
    EnablePartitionEof,
    SocketTimeout,
    Debug,
}

type OptionKey = KafkaSessionOptionKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AutoOffsetReset {
    /// automatically reset the offset to the earliest offset
    Earliest,
    /// automatically reset the offset to the latest offset
    Latest,
}

/// librdkafka debug contexts turned on by `-verbose`
pub const VERBOSE_CONTEXTS: &str = "consumer,cgrp,topic,fetch";

impl Default for KafkaSessionOptions {
    fn default() -> Self {
        Self {
            client_id: None,
            session_timeout: None,
            auto_commit_interval: None,
            socket_timeout: None,
            probe_timeout: Duration::from_secs(10),
            rebalance_timeout: crate::DEFAULT_TIMEOUT,
            buffer_size: 256,
        }
    }
}

impl KafkaSessionOptions {
    /// An id string to pass to the server when making requests.
    ///
    /// If unset, defaults to `streampipe-<host id>-<pid>`.
    pub fn set_client_id(&mut self, v: String) -> &mut Self {
        self.client_id = Some(v);
        self
    }
    pub fn client_id(&self) -> Option<&String> {
        self.client_id.as_ref()
    }

    /// The timeout used to detect worker failures. The worker sends periodic heartbeats
    /// to indicate its liveness to the broker. If no heartbeats are received by the broker
    /// before the expiration of this session timeout, then the broker will remove the worker
    /// from the group and initiate a rebalance.
    pub fn set_session_timeout(&mut self, v: Duration) -> &mut Self {
        self.session_timeout = Some(v);
        self
    }
    pub fn session_timeout(&self) -> Option<&Duration> {
        self.session_timeout.as_ref()
    }

    /// The interval for marked offsets to be committed in the background.
    pub fn set_auto_commit_interval(&mut self, v: Duration) -> &mut Self {
        self.auto_commit_interval = Some(v);
        self
    }
    pub fn auto_commit_interval(&self) -> Option<&Duration> {
        self.auto_commit_interval.as_ref()
    }

    /// Timeout for network requests. Default is 1 min (as of librdkafka 2.3)
    pub fn set_socket_timeout(&mut self, v: Duration) -> &mut Self {
        self.socket_timeout = Some(v);
        self
    }
    pub fn socket_timeout(&self) -> Option<&Duration> {
        self.socket_timeout.as_ref()
    }

    /// How long to wait for cluster metadata when the session opens. If no broker answers
    /// in time, the session fails to open.
    pub fn set_probe_timeout(&mut self, v: Duration) -> &mut Self {
        self.probe_timeout = v;
        self
    }
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// How long a rebalance callback waits for the relay loop to acknowledge. After that
    /// librdkafka proceeds with the handoff, at the risk of duplicates.
    pub fn set_rebalance_timeout(&mut self, v: Duration) -> &mut Self {
        self.rebalance_timeout = v;
        self
    }
    pub fn rebalance_timeout(&self) -> Duration {
        self.rebalance_timeout
    }

    /// Number of records buffered between the client and the relay loop.
    pub fn set_buffer_size(&mut self, v: usize) -> &mut Self {
        self.buffer_size = v.max(1);
        self
    }
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub(crate) fn make_client_config(&self, config: &SessionConfig, client_config: &mut ClientConfig) {
        client_config.set(OptionKey::BootstrapServers, config.broker_list());
        client_config.set(OptionKey::GroupId, config.group().name());
        client_config.set(
            OptionKey::ClientId,
            match &self.client_id {
                Some(id) => id.to_owned(),
                None => client_id("streampipe"),
            },
        );
        client_config.set(
            OptionKey::AutoOffsetReset,
            AutoOffsetReset::from(config.offset_policy()),
        );
        // offsets are stored only after the record has been written, and committed in the
        // background from there
        client_config.set(OptionKey::EnableAutoCommit, "true");
        client_config.set(OptionKey::EnableAutoOffsetStore, "false");
        client_config.set(OptionKey::EnablePartitionEof, "false");
        if let Some(v) = self.session_timeout {
            client_config.set(OptionKey::SessionTimeout, format!("{}", v.as_millis()));
        }
        if let Some(v) = self.auto_commit_interval {
            client_config.set(OptionKey::AutoCommitInterval, format!("{}", v.as_millis()));
        }
        if let Some(v) = self.socket_timeout {
            client_config.set(OptionKey::SocketTimeout, format!("{}", v.as_millis()));
        }
        if config.verbose() {
            client_config.set(OptionKey::Debug, VERBOSE_CONTEXTS);
        }
    }
}

impl OptionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BootstrapServers => "bootstrap.servers",
            Self::GroupId => "group.id",
            Self::ClientId => "client.id",
            Self::SessionTimeout => "session.timeout.ms",
            Self::AutoOffsetReset => "auto.offset.reset",
            Self::EnableAutoCommit => "enable.auto.commit",
            Self::AutoCommitInterval => "auto.commit.interval.ms",
            Self::EnableAutoOffsetStore => "enable.auto.offset.store",
            Self::EnablePartitionEof => "enable.partition.eof",
            Self::SocketTimeout => "socket.timeout.ms",
            Self::Debug => "debug",
        }
    }
}

impl AutoOffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl From<OffsetPolicy> for AutoOffsetReset {
    fn from(policy: OffsetPolicy) -> Self {
        match policy {
            OffsetPolicy::Oldest => Self::Earliest,
            OffsetPolicy::Newest => Self::Latest,
        }
    }
}

impl_into_string!(OptionKey);
impl_into_string!(AutoOffsetReset);

impl std::fmt::Debug for KafkaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSession").finish()
    }
}

impl KafkaSession {
    /// Create the consumer, make sure the cluster answers, then subscribe.
    ///
    /// Any failure here is reported as [`PipeErr::Connect`].
    pub async fn open_with(
        config: &SessionConfig,
        options: &KafkaSessionOptions,
    ) -> KafkaResult<Self> {
        let (error_sender, errors) = unbounded();
        let (rebalance_sender, rebalances) = unbounded();
        let context = PipeContext::new(
            error_sender.clone(),
            rebalance_sender,
            options.rebalance_timeout(),
        );

        let mut client_config = ClientConfig::new();
        options.make_client_config(config, &mut client_config);
        let consumer: RawConsumer = client_config
            .create_with_context(context)
            .map_err(connect_err)?;
        let consumer = Arc::new(consumer);

        let brokers = probe(consumer.clone(), options.probe_timeout()).await?;
        log::debug!("{brokers} brokers in cluster");

        let topics: Vec<&str> = config.topics().iter().map(|t| t.name()).collect();
        consumer.subscribe(&topics).map_err(connect_err)?;

        let (record_sender, records) = bounded(options.buffer_size());
        let (kill_switch, killed) = bounded(1);
        spawn_task(pump(consumer.clone(), record_sender, error_sender, killed));

        Ok(Self {
            consumer,
            records,
            errors,
            rebalances,
            kill_switch,
        })
    }

    fn stop(&self) {
        self.consumer.context().close();
        self.kill_switch.try_send(()).ok();
    }
}

impl GroupSession for KafkaSession {
    type Error = KafkaErr;

    async fn open(config: &SessionConfig) -> KafkaResult<Self> {
        Self::open_with(config, &KafkaSessionOptions::default()).await
    }

    fn records(&self) -> Receiver<Record> {
        self.records.clone()
    }

    fn errors(&self) -> Receiver<KafkaErr> {
        self.errors.clone()
    }

    fn rebalances(&self) -> Receiver<RebalanceEvent> {
        self.rebalances.clone()
    }

    /// The client commits stored offsets every `auto.commit.interval.ms`. Those background
    /// commits are not reported back, so the committed offsets of the relay loop only reflect
    /// explicit calls to `commit`.
    fn mark(&self, tp: &TopicPartition, offset: Offset) -> KafkaResult<()> {
        let tpl = next_offset(tp, offset)?;
        self.consumer.store_offsets(&tpl).map_err(stream_err)
    }

    async fn commit(&self, tp: &TopicPartition, offset: Offset) -> KafkaResult<()> {
        let tpl = next_offset(tp, offset)?;
        // `commit` is sync. The consumer is shared, so the blocking thread just holds a reference
        let client = self.consumer.clone();
        spawn_blocking(move || client.commit(&tpl, CommitMode::Sync))
            .await
            .map_err(runtime_error)?
            .map_err(stream_err)
    }

    /// Leaves the group once the last reference to the consumer is dropped; librdkafka then
    /// commits whatever has been stored.
    async fn close(&self) -> KafkaResult<()> {
        self.stop();
        self.consumer.unsubscribe();
        Ok(())
    }

    fn classify(err: &KafkaErr) -> Severity {
        classify(err)
    }
}

impl Drop for KafkaSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The broker expects the offset of the next record to read.
fn next_offset(tp: &TopicPartition, offset: Offset) -> KafkaResult<TopicPartitionList> {
    let mut tpl = TopicPartitionList::new();
    tpl.add_partition_offset(
        tp.topic().name(),
        tp.partition().id(),
        RawOffset::Offset(offset + 1),
    )
    .map_err(stream_err)?;
    Ok(tpl)
}

fn connect_err(err: KafkaErr) -> PipeErr<KafkaErr> {
    PipeErr::Connect(err.to_string())
}

async fn probe(consumer: Arc<RawConsumer>, timeout: Duration) -> KafkaResult<usize> {
    spawn_blocking(move || {
        consumer
            .fetch_metadata(None, Timeout::After(timeout))
            .map(|metadata| metadata.brokers().len())
    })
    .await
    .map_err(runtime_error)?
    .map_err(|err| PipeErr::Connect(format!("no broker answered within {timeout:?}: {err}")))
}

async fn pump(
    consumer: Arc<RawConsumer>,
    records: Sender<Record>,
    errors: Sender<KafkaErr>,
    killed: Receiver<()>,
) {
    log::debug!("Record pump spawned");
    loop {
        let res = select! {
            res = consumer.recv().fuse() => res.map(|mess| to_record(&mess)),
            _ = killed.recv_async().fuse() => break,
        };
        match res {
            Ok(Some(record)) => {
                let sent = select! {
                    res = records.send_async(record).fuse() => res.is_ok(),
                    _ = killed.recv_async().fuse() => false,
                };
                if !sent {
                    break;
                }
            }
            Ok(None) => (),
            Err(err) => {
                if errors.send_async(err).await.is_err() {
                    break;
                }
            }
        }
    }
    log::debug!("Record pump exit");
}

fn to_record(mess: &BorrowedMessage<'_>) -> Option<Record> {
    match Topic::new(mess.topic()) {
        Ok(topic) => Some(Record::new(
            topic,
            Partition::new(mess.partition()),
            mess.offset(),
            mess.payload().unwrap_or_default().to_vec(),
        )),
        Err(err) => {
            log::warn!("Skipping {}@{}: {err}", mess.partition(), mess.offset());
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use streampipe_types::ConsumerGroup;

    fn config() -> SessionConfig {
        let mut config = SessionConfig::new(
            ConsumerGroup::new("g1"),
            ["localhost:9092", "localhost:9093"],
            vec![Topic::new("t").unwrap()],
        )
        .unwrap();
        config.set_offset_policy(OffsetPolicy::Oldest);
        config
    }

    #[test]
    fn test_client_config() {
        let mut options = KafkaSessionOptions::default();
        options
            .set_client_id("me".to_owned())
            .set_session_timeout(Duration::from_secs(6));
        let mut client_config = ClientConfig::new();
        options.make_client_config(&config(), &mut client_config);

        assert_eq!(
            client_config.get("bootstrap.servers"),
            Some("localhost:9092,localhost:9093")
        );
        assert_eq!(client_config.get("group.id"), Some("g1"));
        assert_eq!(client_config.get("client.id"), Some("me"));
        assert_eq!(client_config.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(client_config.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(client_config.get("session.timeout.ms"), Some("6000"));
        assert_eq!(client_config.get("debug"), None);

        let mut verbose = config();
        verbose
            .set_verbose(true)
            .set_offset_policy(OffsetPolicy::Newest);
        options.make_client_config(&verbose, &mut client_config);
        assert_eq!(client_config.get("debug"), Some(VERBOSE_CONTEXTS));
        assert_eq!(client_config.get("auto.offset.reset"), Some("latest"));
    }

    #[test]
    fn test_next_offset() {
        let tp = TopicPartition::new(Topic::new("t").unwrap(), Partition::new(2));
        let tpl = next_offset(&tp, 41).unwrap();
        let elem = tpl.find_partition("t", 2).unwrap();
        assert_eq!(elem.offset(), RawOffset::Offset(42));
    }
}
