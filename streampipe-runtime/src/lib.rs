//! ### `streampipe-runtime`: Async runtime abstraction
//!
//! A handful of functions with the same signatures on `tokio` and `async-std`, so that the relay
//! loop does not care which runtime drives it. Without a runtime feature everything compiles,
//! but panics or errors on use.

#[cfg(all(feature = "runtime-async-std", feature = "runtime-tokio"))]
compile_error!("'runtime-async-std' and 'runtime-tokio' cannot be enabled at the same time");

mod mutex;
mod sleep;
mod task;

pub use mutex::*;
pub use sleep::*;
pub use task::*;
