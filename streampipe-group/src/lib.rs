//! ### `streampipe-group`: the consumer group relay loop
//!
//! This crate moves records from a consumer group session to a line-oriented sink (usually stdout),
//! so that a data loader can treat the process as a pipe.
//!
//! It is generic over [`GroupSession`](streampipe_types::GroupSession), the broker client is
//! provided by a backend crate such as `streampipe-kafka`.
//!
//! The moving parts:
//!
//! + [`Coordinator`] multiplexes records, rebalance notices, shutdown requests and the idle timer
//!   in one `select!` loop, and owns the session until it is closed.
//! + [`Relay`] writes each payload followed by `\n`, and flushes before returning.
//! + [`OffsetLedger`] tracks the last relayed offset per partition and serializes commits,
//!   so a committed offset never goes backwards.
//! + [`RebalanceObserver`] flushes offsets of revoked partitions before the handoff is acknowledged.
//! + [`ErrorSink`] drains client errors, and trips the [`ShutdownSwitch`] on fatal ones.
//! + [`Supervisor`] keeps the idle deadline and the shutdown switch.
//!
//! Delivery is at-least-once: an offset is only marked after its payload reached the sink,
//! a record that could not be written is never marked.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

mod coordinator;
mod error_sink;
mod exit;
mod observer;
mod relay;
mod supervisor;
mod tracker;

pub use coordinator::*;
pub use error_sink::*;
pub use exit::*;
pub use observer::*;
pub use relay::*;
pub use supervisor::*;
pub use tracker::*;
