#[cfg(all(not(feature = "async-io"), not(feature = "tokio")))]
compile_error!(r#"Either "tokio" (default) or "async-io" must be enabled."#);

#[cfg(feature = "tokio")]
mod tokio {
    use std::future::Future;
    use std::time::Duration;

    pub use tokio::sync::Mutex;

    use crate::Error;

    pub async fn timeout<F: Future>(duration: Duration, future: F) -> Result<F::Output, Error> {
        tokio::time::timeout(duration, future)
            .await
            .map_err(|_| Error::Timeout(duration))
    }

    // The exported object is served by tasks on this runtime, they must keep running between
    // two `block_on` calls, hence a worker thread instead of a current_thread runtime
    #[cfg(feature = "blocking")]
    pub fn block_on<T>(future: impl Future<Output = T>) -> T {
        use once_cell::sync::OnceCell;
        use tokio::runtime::Runtime;
        static RUNTIME: OnceCell<Runtime> = OnceCell::new();

        RUNTIME
            .get_or_init(|| {
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .thread_name("libvesktop-dbus")
                    .enable_all()
                    .build()
                    .expect("tokio runtime should be buildable")
            })
            .block_on(future)
    }
}
#[cfg(feature = "tokio")]
pub use self::tokio::*;

#[cfg(all(feature = "async-io", not(feature = "tokio")))]
mod async_io {
    use std::future::Future;
    use std::time::Duration;

    // zbus runs its own executor thread with async-io, nothing else to drive here
    #[cfg(feature = "blocking")]
    pub use async_io::block_on;
    pub use async_lock::Mutex;

    use crate::Error;

    pub async fn timeout<F: Future>(duration: Duration, future: F) -> Result<F::Output, Error> {
        futures_lite::future::or(async { Ok(future.await) }, async {
            async_io::Timer::after(duration).await;
            Err(Error::Timeout(duration))
        })
        .await
    }
}
#[cfg(all(feature = "async-io", not(feature = "tokio")))]
pub use self::async_io::*;
