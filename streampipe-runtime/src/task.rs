#[cfg(feature = "runtime-tokio")]
pub use tokio::task::{spawn as spawn_task, spawn_blocking, JoinError, JoinHandle as TaskHandle};

#[cfg(feature = "runtime-async-std")]
pub use async_std_task::*;

#[cfg(not(any(feature = "runtime-tokio", feature = "runtime-async-std")))]
pub use no_rt_task::*;

#[cfg(feature = "runtime-async-std")]
mod async_std_task {
    use futures::future::{Future, FutureExt};

    /// async-std tasks cannot fail to join; the `Result` only aligns the signature with tokio.
    pub type TaskHandle<T> =
        futures::future::Map<async_std::task::JoinHandle<T>, fn(T) -> Result<T, JoinError>>;

    #[derive(Debug)]
    pub struct JoinError;

    pub fn spawn_task<F, T>(future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        async_std::task::spawn(future).map(Result::Ok)
    }

    pub fn spawn_blocking<F, T>(f: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        async_std::task::spawn_blocking(f).map(Result::Ok)
    }

    impl std::fmt::Display for JoinError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "JoinError")
        }
    }

    impl std::error::Error for JoinError {}
}

#[cfg(not(any(feature = "runtime-tokio", feature = "runtime-async-std")))]
mod no_rt_task {
    use futures::future::{ready, Ready};
    use std::future::Future;

    pub type TaskHandle<T> = Ready<Result<T, JoinError>>;

    #[derive(Debug)]
    pub struct JoinError;

    pub fn spawn_task<F, T>(_: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        ready(Err(JoinError))
    }

    pub fn spawn_blocking<F, T>(_: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        ready(Err(JoinError))
    }

    impl std::fmt::Display for JoinError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Please enable a runtime")
        }
    }

    impl std::error::Error for JoinError {}
}
