//! ### `streampipe-kafka`: Kafka / Redpanda Backend
//!
//! This is the Kafka / Redpanda backend of StreamPipe: a [`GroupSession`] on top of
//! [`rdkafka`](https://docs.rs/rdkafka), plus the two command line bridges built on it.
//!
//! `KafkaSession` joins a consumer group with a `StreamConsumer`. Records, client errors and
//! rebalance notifications are pumped into three independent channels. Rebalance callbacks
//! block librdkafka until the relay loop has flushed the revoked partitions.
//!
//! Offsets are marked with `store_offset` (with `enable.auto.offset.store` turned off) and
//! committed explicitly on revoke and on shutdown. Committed values follow the Kafka
//! convention of "next offset to read", i.e. the last relayed offset plus one.
//!
//! `KafkaProducer` is a thin wrapper of `FutureProducer` that sends one record per line.
//!
//! Binaries:
//!
//! + `streampipe-consumer -group g1 -brokers localhost:9092 -topics t -offset oldest` writes
//!   one line per record to stdout, until idle or signalled.
//! + `streampipe-producer -brokers localhost:9092 -topic t` sends one record per stdin line.
//!
//! This crate depends on [`rdkafka`](https://docs.rs/rdkafka),
//! which in turn depends on [librdkafka-sys](https://docs.rs/librdkafka-sys), which itself is a wrapper of
//! [librdkafka](https://docs.confluent.io/platform/current/clients/librdkafka/html/index.html).
//!
//! Configuration Reference: <https://kafka.apache.org/documentation/#configuration>
//!
//! [`GroupSession`]: streampipe_types::GroupSession

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

/// The default timeout, if needed but unspecified
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Environment variable consulted when `-brokers` is not given
pub const BROKERS_ENV: &str = "KAFKA_PEERS";

#[cfg(feature = "executables")]
mod args;
mod context;
mod error;
mod host;
mod producer;
mod session;
mod signal;

#[cfg(feature = "executables")]
pub use args::*;
pub use context::*;
pub use error::*;
pub use host::*;
pub use producer::*;
pub use session::*;
pub use signal::*;

/// Re-export types from `rdkafka`
pub mod export {
    pub use rdkafka;
}

macro_rules! impl_into_string {
    ($name:ident) => {
        impl From<$name> for String {
            fn from(o: $name) -> Self {
                o.as_str().to_owned()
            }
        }
    };
}

pub(crate) use impl_into_string;
