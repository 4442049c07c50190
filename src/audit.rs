//! Audit event fan-out
//!
//! Every analyzed query produces one [`AuditEvent`] that is handed to all
//! currently registered listeners.
//!
//! The listener list is copy-on-write: `register`/`unregister` swap in a new
//! `Arc<Vec<..>>` under a short write lock, and `notify` clones the current
//! snapshot and iterates it without holding any lock. A listener added during
//! a notification does not see that event, and one removed mid-notification
//! is called at most once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::policy::Mode;
use crate::verdict::EventType;

/// One audited query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: String,
    pub sql_query: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub mode: Mode,
    pub properties: BTreeMap<String, String>,
}

impl AuditEvent {
    pub fn new(
        user_id: impl Into<String>,
        sql_query: impl Into<String>,
        event_type: EventType,
        mode: Mode,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            sql_query: sql_query.into(),
            timestamp: Utc::now(),
            event_type,
            mode,
            properties,
        }
    }
}

/// Receives audit events.
pub trait AuditListener: Send + Sync {
    fn on_event(&self, event: &AuditEvent);
}

/// Handle returned by [`AuditLog::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Registration {
    id: ListenerId,
    listener: Arc<dyn AuditListener>,
}

/// Registry of audit listeners.
pub struct AuditLog {
    listeners: RwLock<Arc<Vec<Registration>>>,
    next_id: AtomicU64,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn register(&self, listener: Arc<dyn AuditListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(Registration { id, listener });
        *guard = Arc::new(next);
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        if !guard.iter().any(|r| r.id == id) {
            return false;
        }
        let next: Vec<Registration> = guard.iter().filter(|r| r.id != id).cloned().collect();
        *guard = Arc::new(next);
        true
    }

    pub fn listener_count(&self) -> usize {
        self.snapshot().len()
    }

    fn snapshot(&self) -> Arc<Vec<Registration>> {
        Arc::clone(&self.listeners.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Deliver `event` to every listener registered when the call started.
    /// Returns the number of listeners notified.
    pub fn notify(&self, event: &AuditEvent) -> usize {
        let snapshot = self.snapshot();
        for registration in snapshot.iter() {
            registration.listener.on_event(event);
        }
        snapshot.len()
    }
}

/// Writes each event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl AuditListener for TracingListener {
    fn on_event(&self, event: &AuditEvent) {
        info!(
            target: "querygraph::audit",
            id = %event.id,
            user = %event.user_id,
            event_type = %event.event_type,
            mode = %event.mode,
            properties = ?event.properties,
            "{}",
            event.sql_query
        );
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryListener {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditListener for MemoryListener {
    fn on_event(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
