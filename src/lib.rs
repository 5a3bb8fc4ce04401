//! <div align="center">
//!
//!   <h1>StreamPipe</h1>
//!
//!   <p>
//!     <strong>🚰 Pipe Kafka consumer groups into stdout, and stdin into Kafka</strong>
//!   </p>
//!
//! </div>
//!
//! StreamPipe lets a bulk loader treat a Kafka topic as a plain unix pipe. Every instance of
//! `streampipe-consumer` joins a consumer group, writes the records of the partitions it is
//! assigned to stdout, one line each, and exits once the topic has gone quiet.
//! `streampipe-producer` goes the other way.
//!
//! ## Guarantees
//!
//! 1. At-least-once
//!
//! An offset is marked only after its record has been written and flushed to the sink. If the
//! sink fails, the process stops with that record uncommitted, and the next member to own the
//! partition receives it again.
//!
//! 2. No regression across rebalances
//!
//! Revoked partitions are committed before the group is allowed to hand them over, and the
//! committed offset of a partition never moves backwards.
//!
//! 3. One exit path
//!
//! Idle timeout, SIGINT / SIGTERM / SIGHUP and fatal errors all drain through the same
//! commit-then-close sequence, and map to a sysexits status code.
//!
//! ## Architecture
//!
//! `streampipe` is the facade crate re-exporting implementation from a number of sub-crates:
//!
//! + `streampipe-types`: records, configuration, errors and the `GroupSession` trait
//! + `streampipe-runtime`: async runtime abstraction
//! + `streampipe-group`: the relay loop, generic over `GroupSession`
//! + `streampipe-kafka`: the `rdkafka` backend and the two binaries

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use streampipe_types::*;

#[cfg(feature = "streampipe-group")]
#[cfg_attr(docsrs, doc(cfg(feature = "group")))]
pub use streampipe_group::*;

#[cfg(feature = "streampipe-kafka")]
#[cfg_attr(docsrs, doc(cfg(feature = "kafka")))]
pub use streampipe_kafka as kafka;

#[cfg(feature = "streampipe-runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
pub use streampipe_runtime as runtime;
