//! Load-state tracking for cached query results.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::{Backend, StoreError};

/// Lifecycle of a cached value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

impl LoadState {
    /// `Idle -> Loading`. Returns `false` in any other state so that a
    /// second caller skips the fetch.
    pub fn loading(&mut self) -> bool {
        if *self == LoadState::Idle {
            *self = LoadState::Loading;
            true
        } else {
            false
        }
    }

    /// `Ready | Error -> Loading`, taking ownership of the value so it can be
    /// cleared or patched before [`LoadState::unloaded`] or
    /// [`LoadState::loaded`].
    pub fn unloading(&mut self) -> bool {
        match self {
            LoadState::Ready | LoadState::Error => {
                *self = LoadState::Loading;
                true
            }
            _ => false,
        }
    }

    /// `Idle | Error -> Loading`, so a failed load can be retried.
    pub fn retrying(&mut self) -> bool {
        match self {
            LoadState::Idle | LoadState::Error => {
                *self = LoadState::Loading;
                true
            }
            _ => false,
        }
    }

    /// Any state except `Loading` -> `Loading`.
    pub fn reloading(&mut self) -> bool {
        if *self == LoadState::Loading {
            false
        } else {
            *self = LoadState::Loading;
            true
        }
    }

    /// `Loading -> Ready | Error`.
    pub fn loaded(&mut self, ok: bool) {
        if *self != LoadState::Loading {
            warn!(state = ?self, "loaded() outside of loading");
            return;
        }
        *self = if ok { LoadState::Ready } else { LoadState::Error };
    }

    pub fn unloaded(&mut self) {
        *self = LoadState::Idle;
    }

    /// `Ready | Error -> Idle`.
    pub fn unload(&mut self) -> bool {
        if self.unloading() {
            self.unloaded();
            true
        } else {
            false
        }
    }

    pub fn is_ready(self) -> bool {
        self == LoadState::Ready
    }
}

/// Function that reads one value from the backend.
pub type Fetch<V> = fn(&dyn Backend) -> Result<V, StoreError>;

/// A cached value with its load state.
///
/// The value matches the backend only while the state is
/// [`LoadState::Ready`]. A failed fetch keeps the previous value.
#[derive(Debug, Clone)]
pub struct Load<V> {
    name: String,
    pub(crate) state: LoadState,
    pub(crate) value: V,
    fetch: Option<Fetch<V>>,
}

impl<V: Default> Load<V> {
    /// A value read from the backend.
    pub fn fetched(name: impl Into<String>, fetch: Fetch<V>) -> Self {
        Self {
            name: name.into(),
            state: LoadState::Idle,
            value: V::default(),
            fetch: Some(fetch),
        }
    }

    /// A value computed on the owner from other loads.
    pub fn evaluated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: LoadState::Idle,
            value: V::default(),
            fetch: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn ready_value(&self) -> Option<&V> {
        self.state.is_ready().then_some(&self.value)
    }

    /// Resets the value to its empty default.
    pub fn unload(&mut self) -> bool {
        if !self.state.unloading() {
            return false;
        }
        self.value = V::default();
        self.state.unloaded();
        true
    }

    /// Stores a fetch result; `None` marks the load as failed.
    pub fn deliver(&mut self, result: Option<V>) {
        let ok = result.is_some();
        if let Some(value) = result {
            self.value = value;
        }
        self.state.loaded(ok);
    }

    /// Edits a ready value in place. A value that is not ready is unloaded
    /// instead, so the next load fetches it again.
    pub fn patch(&mut self, f: impl FnOnce(&mut V)) -> bool {
        if !self.state.is_ready() {
            self.unload();
            return false;
        }
        self.state.unloading();
        f(&mut self.value);
        self.state.loaded(true);
        true
    }

    /// Computes the value with `f` unless it is ready or in progress.
    /// Returns whether it is ready.
    pub fn evaluate(&mut self, f: impl FnOnce() -> Option<V>) -> bool {
        if !self.state.retrying() {
            return self.state.is_ready();
        }
        let result = f();
        if result.is_none() {
            debug!(load = %self.name, "Evaluation skipped, inputs not ready");
        }
        self.deliver(result);
        self.state.is_ready()
    }
}

type Pending<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Runs the fetches of several loads concurrently.
///
/// Each fetch runs on the blocking pool; its result is stored back into the
/// borrowed [`Load`] when [`Fanout::finish`] is awaited.
pub(crate) struct Fanout<'a> {
    backend: &'a Arc<dyn Backend>,
    pending: Vec<Pending<'a>>,
    ok: bool,
}

impl<'a> Fanout<'a> {
    pub(crate) fn new(backend: &'a Arc<dyn Backend>) -> Self {
        Self {
            backend,
            pending: Vec::new(),
            ok: true,
        }
    }

    /// Starts the fetch of `load` if it is idle or failed before. A load
    /// that is already ready counts as a success.
    pub(crate) fn load<V>(&mut self, load: &'a mut Load<V>)
    where
        V: Default + Send + 'static,
    {
        if !load.state.retrying() {
            self.ok &= load.state.is_ready();
            return;
        }
        let Some(fetch) = load.fetch else {
            warn!(load = %load.name, "Load has no fetch function");
            load.state.loaded(false);
            self.ok = false;
            return;
        };
        let backend = Arc::clone(self.backend);
        let handle = tokio::task::spawn_blocking(move || fetch(backend.as_ref()));
        self.pending.push(Box::pin(async move {
            let result = match handle.await {
                Ok(Ok(value)) => Some(value),
                Ok(Err(error)) => {
                    warn!(load = %load.name, %error, "Fetch failed");
                    None
                }
                Err(error) => {
                    warn!(load = %load.name, %error, "Fetch task failed");
                    None
                }
            };
            load.deliver(result);
            load.state.is_ready()
        }));
    }

    /// Waits for every started fetch. Succeeds only if all of them did.
    pub(crate) async fn finish(self) -> bool {
        let mut ok = self.ok;
        for pending in self.pending {
            ok &= pending.await;
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn loading_only_from_idle() {
        for start in [LoadState::Loading, LoadState::Ready, LoadState::Error] {
            let mut state = start;
            assert!(!state.loading());
            assert_eq!(state, start);
        }
        let mut state = LoadState::Idle;
        assert!(state.loading());
        assert!(!state.loading());
        assert_eq!(state, LoadState::Loading);
    }

    #[test]
    fn loaded_sets_ready_or_error() {
        let mut state = LoadState::Idle;
        state.loading();
        state.loaded(true);
        assert_eq!(state, LoadState::Ready);

        let mut state = LoadState::Idle;
        state.loading();
        state.loaded(false);
        assert_eq!(state, LoadState::Error);
    }

    #[test]
    fn unloaded_always_idles() {
        for start in [
            LoadState::Idle,
            LoadState::Loading,
            LoadState::Ready,
            LoadState::Error,
        ] {
            let mut state = start;
            state.unloaded();
            assert_eq!(state, LoadState::Idle);
        }
    }

    #[test]
    fn unloading_requires_a_finished_load() {
        let mut state = LoadState::Loading;
        assert!(!state.unloading());
        assert!(!state.unload());
        let mut state = LoadState::Error;
        assert!(state.unload());
        assert_eq!(state, LoadState::Idle);
        let mut state = LoadState::Ready;
        assert!(state.reloading());
        assert!(!state.reloading());
    }

    #[test]
    fn retrying_restarts_failed_loads_only() {
        let mut state = LoadState::Error;
        assert!(state.retrying());
        assert_eq!(state, LoadState::Loading);
        let mut state = LoadState::Ready;
        assert!(!state.retrying());
    }

    #[test]
    fn failed_delivery_keeps_previous_value() {
        let mut load: Load<Vec<u32>> = Load::evaluated("numbers");
        assert!(load.evaluate(|| Some(vec![1, 2])));
        load.state.unloading();
        load.deliver(None);
        assert_eq!(load.state(), LoadState::Error);
        assert_eq!(load.value(), &vec![1, 2]);
        assert_eq!(load.ready_value(), None);
    }

    #[test]
    fn patch_of_unready_value_unloads_it() {
        let mut load: Load<Vec<u32>> = Load::evaluated("numbers");
        assert!(load.evaluate(|| Some(vec![1])));
        assert!(load.patch(|v| v.push(2)));
        assert_eq!(load.ready_value(), Some(&vec![1, 2]));

        load.state.unloading();
        load.deliver(None);
        assert!(!load.patch(|v| v.push(3)));
        assert_eq!(load.state(), LoadState::Idle);
        assert!(load.value().is_empty());
    }

    fn fetch_seven(_backend: &dyn Backend) -> Result<u32, StoreError> {
        Ok(7)
    }

    fn fetch_broken(_backend: &dyn Backend) -> Result<u32, StoreError> {
        Err(StoreError::Poisoned)
    }

    #[tokio::test]
    async fn fanout_fails_if_any_member_fails() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryStore::new());
        let mut good = Load::fetched("good", fetch_seven);
        let mut bad = Load::fetched("bad", fetch_broken);

        let mut fanout = Fanout::new(&backend);
        fanout.load(&mut good);
        fanout.load(&mut bad);
        assert!(!fanout.finish().await);

        assert_eq!(good.ready_value(), Some(&7));
        assert_eq!(bad.state(), LoadState::Error);
    }

    #[tokio::test]
    async fn fanout_skips_ready_members() {
        let backend: Arc<dyn Backend> = Arc::new(MemoryStore::new());
        let mut ready = Load::fetched("ready", fetch_broken);
        ready.deliver_after_loading(3);

        let mut fanout = Fanout::new(&backend);
        fanout.load(&mut ready);
        assert!(fanout.finish().await);
        assert_eq!(ready.ready_value(), Some(&3));
    }

    impl<V: Default> Load<V> {
        fn deliver_after_loading(&mut self, value: V) {
            self.state.loading();
            self.deliver(Some(value));
        }
    }
}
