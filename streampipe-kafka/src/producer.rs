use flume::{unbounded, Receiver};
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord, Producer as ProducerTrait},
    util::Timeout,
};
use std::{io::BufRead, time::Duration};

use streampipe_runtime::spawn_blocking;
use streampipe_types::{runtime_error, Offset, Partition, PipeErr, Topic};

use crate::{client_id, stream_err, KafkaResult, DEFAULT_TIMEOUT};

/// Sends one record per line to a single topic. Records carry no key, so librdkafka spreads
/// them over the partitions.
#[derive(Clone)]
pub struct KafkaProducer {
    inner: FutureProducer,
    topic: Topic,
    timeout: Duration,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Pause for a while after every `size` lines.
pub struct Batcher {
    size: usize,
    pause: Duration,
    count: usize,
}

/// Default number of lines per batch
pub const DEFAULT_BATCH_SIZE: usize = 5000;

/// Default pause between batches
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(5);

impl std::fmt::Debug for KafkaProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducer")
            .field("topic", &self.topic)
            .finish()
    }
}

impl KafkaProducer {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Resolves once the broker acknowledged the record. The payload is sent as is.
    pub async fn send<P: AsRef<[u8]> + ?Sized>(
        &self,
        payload: &P,
    ) -> KafkaResult<(Partition, Offset)> {
        self.inner
            .send(
                FutureRecord::<(), [u8]>::to(self.topic.name()).payload(payload.as_ref()),
                Timeout::After(self.timeout),
            )
            .await
            .map(|(partition, offset)| (Partition::new(partition), offset))
            .map_err(|(err, _)| stream_err(err))
    }

    /// Wait until all in-flight records are delivered.
    pub async fn flush(&self) -> KafkaResult<()> {
        let inner = self.inner.clone();
        let timeout = self.timeout;
        spawn_blocking(move || inner.flush(Timeout::After(timeout)))
            .await
            .map_err(runtime_error)?
            .map_err(stream_err)
    }
}

/// Connection failures only surface on the first send; creation fails on bad configuration.
pub fn create_producer(brokers: &str, topic: Topic, verbose: bool) -> KafkaResult<KafkaProducer> {
    let mut client_config = ClientConfig::new();
    client_config.set("bootstrap.servers", brokers);
    client_config.set("client.id", client_id("streampipe-producer"));
    if verbose {
        client_config.set("debug", "broker,topic,msg");
    }
    let inner: FutureProducer = client_config
        .create()
        .map_err(|err| PipeErr::Connect(err.to_string()))?;
    Ok(KafkaProducer {
        inner,
        topic,
        timeout: DEFAULT_TIMEOUT,
    })
}

impl Batcher {
    pub fn new(size: usize, pause: Duration) -> Self {
        Self {
            size: size.max(1),
            pause,
            count: 0,
        }
    }

    /// Count one line. Returns the pause to take if it completed a batch.
    pub fn tick(&mut self) -> Option<Duration> {
        self.count += 1;
        if self.count % self.size == 0 && !self.pause.is_zero() {
            Some(self.pause)
        } else {
            None
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Read lines on a dedicated thread, as raw bytes without the trailing `\n` or `\r\n`.
/// Lines need not be UTF-8. The channel closes on EOF; an I/O error is logged and treated
/// as EOF.
pub fn read_lines<R: BufRead + Send + 'static>(reader: R) -> Receiver<Vec<u8>> {
    let (sender, receiver) = unbounded();
    let spawned = std::thread::Builder::new()
        .name("streampipe-stdin".into())
        .spawn(move || {
            log::debug!("[{pid}] stdin thread spawned", pid = std::process::id());
            for line in reader.split(b'\n') {
                match line {
                    Ok(mut line) => {
                        if line.last() == Some(&b'\r') {
                            line.pop();
                        }
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        log::error!("Failed to read input: {err}");
                        break;
                    }
                }
            }
            log::debug!("[{pid}] stdin thread exit", pid = std::process::id());
        });
    if let Err(err) = spawned {
        log::error!("Failed to spawn stdin thread: {err}");
    }
    receiver
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_batcher() {
        let mut batcher = Batcher::new(3, Duration::from_secs(5));
        let pauses: Vec<_> = (0..7).map(|_| batcher.tick()).collect();
        assert_eq!(
            pauses,
            [
                None,
                None,
                Some(Duration::from_secs(5)),
                None,
                None,
                Some(Duration::from_secs(5)),
                None
            ]
        );
        assert_eq!(batcher.count(), 7);

        let mut no_pause = Batcher::new(1, Duration::ZERO);
        assert_eq!(no_pause.tick(), None);
    }

    #[test]
    fn test_read_lines() {
        let lines = read_lines(Cursor::new(b"a,1\nb,2\r\n\nlast".to_vec()));
        let lines: Vec<Vec<u8>> = lines.iter().collect();
        assert_eq!(lines, [&b"a,1"[..], b"b,2", b"", b"last"]);
    }

    #[test]
    fn test_read_lines_not_utf8() {
        let lines = read_lines(Cursor::new(b"a\n\xff\xfe latin1\nb\nc\n".to_vec()));
        let lines: Vec<Vec<u8>> = lines.iter().collect();
        assert_eq!(lines, [&b"a"[..], b"\xff\xfe latin1", b"b", b"c"]);
    }
}
