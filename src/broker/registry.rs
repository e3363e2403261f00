//! # Listener Registry
//!
//! Ordered fan-out of status updates to the listeners of one broker client.
//!
//! ## Overview
//!
//! - Listeners are appended in registration order; there is no deduplication
//!   and no removal. They live as long as the owning client.
//! - Every update is delivered to every listener exactly once, in registration
//!   order, and updates are delivered in the order the broker produced them.
//! - The registry is sealed by the first publish on its client. Registration
//!   after that point is rejected, so no listener can miss early updates.

use super::{BrokerClient, QueryStatusListener, QueryStatusUpdate};
use crate::constants::BrokerType;
use crate::error::{BrokerError, BrokerResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ListenerRegistry {
    broker_type: BrokerType,
    listeners: RwLock<Vec<Arc<dyn QueryStatusListener>>>,
    sealed: AtomicBool,
    updates_delivered: AtomicU64,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("broker_type", &self.broker_type)
            .field("listeners", &self.listener_count())
            .field("sealed", &self.is_sealed())
            .field("updates_delivered", &self.updates_delivered())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new(broker_type: BrokerType) -> Self {
        Self {
            broker_type,
            listeners: RwLock::new(Vec::new()),
            sealed: AtomicBool::new(false),
            updates_delivered: AtomicU64::new(0),
        }
    }

    /// Append a listener; fails once the registry has been sealed
    pub fn add_listener(&self, listener: Arc<dyn QueryStatusListener>) -> BrokerResult<()> {
        let mut listeners = self.listeners.write();
        // checked under the write lock so a concurrent seal cannot slip between
        if self.sealed.load(Ordering::Acquire) {
            return Err(BrokerError::LateListenerRegistration {
                broker_type: self.broker_type,
            });
        }
        listeners.push(listener);

        info!(
            broker_type = %self.broker_type,
            listeners = listeners.len(),
            "Registered query status listener"
        );
        Ok(())
    }

    /// Close registration. Idempotent.
    pub fn seal(&self) {
        let _guard = self.listeners.write();
        if !self.sealed.swap(true, Ordering::AcqRel) {
            debug!(broker_type = %self.broker_type, "Listener registration sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Total listener invocations so far
    pub fn updates_delivered(&self) -> u64 {
        self.updates_delivered.load(Ordering::Relaxed)
    }

    /// Deliver an update to every listener, in registration order
    pub async fn notify(&self, client: &dyn BrokerClient, update: &QueryStatusUpdate) {
        // snapshot, the lock must not be held across the listener awaits
        let listeners: Vec<Arc<dyn QueryStatusListener>> = self.listeners.read().clone();

        if listeners.is_empty() {
            debug!(
                broker_type = %self.broker_type,
                broker_query_id = %update.broker_query_id,
                site_id = %update.site_id,
                "No listeners registered for status update"
            );
            return;
        }

        for listener in listeners {
            listener.on_client_update(client, update).await;
            self.updates_delivered.fetch_add(1, Ordering::Relaxed);
        }
    }
}
