use std::sync::Arc;

use crate::tally::{Tally, TallyStore};

/// Read path for observers that poll instead of holding a live subscription.
pub struct QuerySurface {
    store: Arc<TallyStore>,
}

impl QuerySurface {
    pub fn new(store: Arc<TallyStore>) -> Self {
        Self { store }
    }

    pub fn get_tally(&self) -> Tally {
        self.store.current_snapshot()
    }
}
