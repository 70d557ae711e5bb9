use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::{
    atomic::{AtomicBool, Ordering::Relaxed},
    Arc,
};
use std::time::Instant;
use tokio::sync::Notify;

/// Drives a [`TickWorkerTick`] on a background task
///
/// Each tick reports when it next wants to run. The worker sleeps until then, or until it is
/// woken by [`TickWorker::tick`]. Dropping the worker stops the task.
pub struct TickWorker<T: TickWorkerTick> {
    shared: Arc<Shared>,
    _marker: PhantomData<T>,
}

struct Shared {
    shutdown: AtomicBool,
    wake: Notify,
}

#[async_trait]
pub trait TickWorkerTick: Send + Sync + 'static {
    /// Do one unit of work, returning the next deadline (if any)
    async fn tick(&self) -> Option<Instant>;
}

impl<T: TickWorkerTick> Drop for TickWorker<T> {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}

impl<T: TickWorkerTick> TickWorker<T> {
    #[must_use]
    pub fn new() -> Self {
        TickWorker {
            shared: Arc::new(Shared {
                shutdown: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            _marker: PhantomData,
        }
    }

    /// Spawn the background task
    pub fn run(&self, ticker: T) -> tokio::task::JoinHandle<()> {
        tokio::spawn(background_worker(Arc::clone(&self.shared), ticker))
    }

    /// Force a tick now
    pub fn tick(&self) {
        self.shared.wake.notify_one();
    }

    /// Stop the background task after its current tick
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

impl<T: TickWorkerTick> Default for TickWorker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn shutdown(&self) {
        self.shutdown.store(true, Relaxed);
        self.wake.notify_one();
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Relaxed)
    }
}

async fn background_worker<T: TickWorkerTick>(shared: Arc<Shared>, ticker: T) {
    while !shared.is_shutdown() {
        match ticker.tick().await {
            Some(when) => {
                let sleep_for = when.saturating_duration_since(Instant::now());

                tokio::select! {
                    () = tokio::time::sleep(sleep_for) => {}
                    () = shared.wake.notified() => {}
                }
            }
            None => shared.wake.notified().await,
        }
    }

    tracing::debug!("tick worker stopped");
}
