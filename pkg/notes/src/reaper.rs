use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use primitives::TickWorkerTick;
use tracing::error;

use crate::{NoteRepository, NoteStore};

/// Returns lapsed reservations to the unspent pool, on a [`TickWorker`](primitives::TickWorker)
///
/// Each tick expires what has lapsed and sleeps until the next lease is due. With no
/// reservations outstanding it sleeps until woken, so whoever reserves notes must call
/// [`TickWorker::tick`](primitives::TickWorker::tick) afterwards. The client wallet starts one
/// on request and ticks it after each reservation.
pub struct LeaseReaper<R> {
    store: Arc<NoteStore<R>>,
}

impl<R> LeaseReaper<R> {
    pub fn new(store: Arc<NoteStore<R>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<R: NoteRepository> TickWorkerTick for LeaseReaper<R> {
    async fn tick(&self) -> Option<Instant> {
        let now = Utc::now();

        match self.store.expire_leases(now) {
            Ok(next) => {
                let wait = (next? - now).to_std().unwrap_or_default();
                Some(Instant::now() + wait)
            }
            Err(err) => {
                error!(?err, "failed to expire note reservations");
                None
            }
        }
    }
}
