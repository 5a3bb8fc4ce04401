#[cfg(feature = "runtime-tokio")]
pub use tokio::sync::Mutex as AsyncMutex;

#[cfg(feature = "runtime-async-std")]
pub use async_std::sync::Mutex as AsyncMutex;

#[cfg(not(any(feature = "runtime-tokio", feature = "runtime-async-std")))]
pub use no_rt_mutex::AsyncMutex;

#[cfg(not(any(feature = "runtime-tokio", feature = "runtime-async-std")))]
mod no_rt_mutex {
    use std::{
        marker::PhantomData,
        ops::{Deref, DerefMut},
    };

    #[derive(Debug, Default)]
    pub struct AsyncMutex<T> {
        m: PhantomData<T>,
    }

    #[derive(Debug)]
    pub struct Guard<'a, T> {
        m: PhantomData<&'a mut T>,
    }

    impl<T> AsyncMutex<T> {
        pub fn new(_: T) -> Self {
            Self { m: PhantomData }
        }

        pub async fn lock(&self) -> Guard<'_, T> {
            Guard { m: PhantomData }
        }
    }

    impl<T> Deref for Guard<'_, T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            unimplemented!("Please enable a runtime")
        }
    }

    impl<T> DerefMut for Guard<'_, T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            unimplemented!("Please enable a runtime")
        }
    }
}
