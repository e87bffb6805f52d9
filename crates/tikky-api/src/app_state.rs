//! Shared application state for the tikky API.
//!
//! Holds the one long-lived store handle. Handlers are otherwise stateless,
//! so cloning the state per request is just an `Arc` bump.

use std::sync::Arc;

use crate::store::CounterStore;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn CounterStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn CounterStore {
        self.store.as_ref()
    }
}
