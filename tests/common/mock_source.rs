//! Snapshot source whose result is released by the test.
//!
//! Lets a test hold the snapshot back while change events flow, which is
//! exactly the race the reconciler exists for.

use live_table::{BoxFuture, Filter, SnapshotSource, SourceError, SourceResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Releases a [`GatedSnapshot`].
pub type SnapshotGate<R> = oneshot::Sender<SourceResult<Vec<R>>>;

/// Snapshot source that resolves when the paired gate is sent to.
///
/// # Example
/// ```rust,ignore
/// let (source, gate) = GatedSnapshot::new();
/// // ... start the driver, send events ...
/// gate.send(Ok(rows)).unwrap();
/// ```
pub struct GatedSnapshot<R> {
    gate: Mutex<Option<oneshot::Receiver<SourceResult<Vec<R>>>>>,
    fetches: AtomicUsize,
    last_filter: Mutex<Option<Filter>>,
}

impl<R: Send + 'static> GatedSnapshot<R> {
    pub fn new() -> (Arc<Self>, SnapshotGate<R>) {
        let (tx, rx) = oneshot::channel();
        let source = Arc::new(Self {
            gate: Mutex::new(Some(rx)),
            fetches: AtomicUsize::new(0),
            last_filter: Mutex::new(None),
        });
        (source, tx)
    }

    /// Number of fetch() calls.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Filter passed to the last fetch() call.
    pub fn last_filter(&self) -> Option<Filter> {
        self.last_filter.lock().unwrap().clone()
    }
}

impl<R: Send + 'static> SnapshotSource<R> for GatedSnapshot<R> {
    fn fetch(&self, filter: &Filter) -> BoxFuture<'_, Vec<R>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_filter.lock().unwrap() = Some(filter.clone());
        let gate = self.gate.lock().unwrap().take();

        Box::pin(async move {
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(SourceError("snapshot gate dropped".to_string()))),
                None => Err(SourceError("snapshot already fetched".to_string())),
            }
        })
    }
}
