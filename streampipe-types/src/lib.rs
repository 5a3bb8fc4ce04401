//! # 🚰 StreamPipe Types
//!
//! This crate defines the types shared by every StreamPipe crate: records, topic and partition
//! identifiers, session configuration, the error taxonomy, and the [`GroupSession`] trait
//! that a broker client has to implement to be driven by `streampipe-group`.
//!
//! It does not provide any implementation.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_debug_implementations)]

mod error;
mod message;
mod options;
mod session;
mod stream;

pub use error::*;
pub use message::*;
pub use options::*;
pub use session::*;
pub use stream::*;

pub mod export;
