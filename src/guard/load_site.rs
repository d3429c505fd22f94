use parking_lot::RwLock;
use std::future::Future;
use tracing::debug;

use crate::error::HttpResult;
use crate::guard::{SequenceToken, StaleResponseGuard};

/// What a load-site currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState<T> {
    #[default]
    Idle,
    Loading,
    Loaded(T),
    NotFound,
    /// Retryable failure with a message for the user
    Failed(String),
}

impl<T> LoadState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Controller for one load-site: a guard plus the state it protects
///
/// `begin` and `commit` take the state lock, so the currency check and
/// the write it protects happen as one step.
#[derive(Debug)]
pub struct LoadSite<T> {
    name: String,
    guard: StaleResponseGuard,
    state: RwLock<LoadState<T>>,
}

impl<T> LoadSite<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guard: StaleResponseGuard::new(),
            state: RwLock::new(LoadState::Idle),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a load and reset the state to `Loading`
    pub fn begin(&self) -> SequenceToken {
        let mut state = self.state.write();
        let token = self.guard.begin();
        if !self.guard.is_torn_down() {
            *state = LoadState::Loading;
        }
        token
    }

    pub fn is_current(&self, token: SequenceToken) -> bool {
        self.guard.is_current(token)
    }

    /// Apply a load outcome if `token` is still current
    ///
    /// Returns whether the outcome was applied.
    pub fn commit(&self, token: SequenceToken, result: HttpResult<T>) -> bool {
        self.update(token, |state| {
            *state = match result {
                Ok(data) => LoadState::Loaded(data),
                Err(e) if e.is_not_found() => LoadState::NotFound,
                Err(e) => LoadState::Failed(e.user_message()),
            };
        })
    }

    /// Apply an arbitrary mutation if `token` is still current
    pub fn update<F>(&self, token: SequenceToken, f: F) -> bool
    where
        F: FnOnce(&mut LoadState<T>),
    {
        let mut state = self.state.write();
        if !self.guard.is_current(token) {
            debug!(site = %self.name, token = %token, "Discarding stale completion");
            return false;
        }
        f(&mut state);
        true
    }

    /// Begin now, then run the fetch and commit its outcome
    ///
    /// The token is taken when `load` is called, not when the returned
    /// future is first polled, so creation order decides which load wins.
    pub fn load<'a, F, Fut>(&'a self, fetch: F) -> impl Future<Output = bool> + 'a
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HttpResult<T>> + 'a,
    {
        let token = self.begin();
        let pending = fetch();
        async move {
            let result = pending.await;
            self.commit(token, result)
        }
    }

    /// Inspect the state without cloning it
    pub fn with_state<R>(&self, f: impl FnOnce(&LoadState<T>) -> R) -> R {
        f(&self.state.read())
    }

    pub fn teardown(&self) {
        let _state = self.state.write();
        self.guard.teardown();
        debug!(site = %self.name, "Load-site torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.guard.is_torn_down()
    }
}

impl<T: Clone> LoadSite<T> {
    pub fn state(&self) -> LoadState<T> {
        self.state.read().clone()
    }
}
