pub use flume;
pub use futures;
