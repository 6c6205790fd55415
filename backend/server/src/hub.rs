//! # Broadcast Hub
//!
//! Fan-out of tally changes to live observers.
//!
//! ## Delivery
//!
//! - One `watch` slot per observer, holding only the newest tally it has not read yet
//! - Publishing never waits on an observer, a slow one simply skips intermediate tallies
//! - A slot only accepts a tally with a larger total than the one it holds, so publishes
//!   racing outside the store lock cannot reorder what an observer sees
//! - Subscribing reads the store while holding the registry lock, so a commit is either in
//!   the initial snapshot or published to the new slot afterwards
use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::tally::{Tally, TallyStore};

pub type ObserverId = Uuid;

pub struct BroadcastHub {
    store: Arc<TallyStore>,
    observers: Mutex<HashMap<ObserverId, watch::Sender<Tally>>>,
}

pub struct ObserverHandle {
    id: ObserverId,
    receiver: watch::Receiver<Tally>,
    delivered_initial: bool,
}

impl BroadcastHub {
    pub fn new(store: Arc<TallyStore>) -> Self {
        Self {
            store,
            observers: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self) -> ObserverHandle {
        let id = Uuid::new_v4();
        let (sender, receiver) = watch::channel(Tally::default());

        let mut observers = self.observers.lock();
        let current = self.store.current_snapshot();
        offer(&sender, current);
        observers.insert(id, sender);
        drop(observers);

        debug!("Observer {id} subscribed at {} votes", current.total());

        ObserverHandle {
            id,
            receiver,
            delivered_initial: false,
        }
    }

    pub fn publish(&self, tally: Tally) {
        self.observers.lock().retain(|id, sender| {
            if sender.is_closed() {
                debug!("Observer {id} went away, dropping it");
                return false;
            }

            offer(sender, tally);
            true
        });
    }

    pub fn unsubscribe(&self, handle: ObserverHandle) {
        if self.observers.lock().remove(&handle.id).is_some() {
            debug!("Observer {} unsubscribed", handle.id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }
}

fn offer(sender: &watch::Sender<Tally>, tally: Tally) {
    sender.send_if_modified(|held| {
        if tally.total() > held.total() {
            *held = tally;
            true
        } else {
            false
        }
    });
}

impl ObserverHandle {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// First call yields the subscribe-time snapshot right away. Later calls wait for a newer
    /// tally and return `None` once the observer is unsubscribed or the hub is gone.
    pub async fn next(&mut self) -> Option<Tally> {
        if !self.delivered_initial {
            self.delivered_initial = true;
            return Some(*self.receiver.borrow_and_update());
        }

        self.receiver.changed().await.ok()?;

        Some(*self.receiver.borrow_and_update())
    }
}
