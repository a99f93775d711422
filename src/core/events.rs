//! Typed publish/subscribe channels
//! One [`Topic`] per event kind. Publishing enqueues the delivery on a
//! dedicated dispatcher thread and returns immediately; listeners run one
//! at a time, in registration order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use anyhow::Result;
use log::{debug, error};
use tokio::sync::mpsc;

use crate::core::bluetooth::types::DeviceDescriptor;
use crate::core::thermometer::Reading;

/// Receives payloads published on a topic
pub trait EventListener<T>: Send + Sync {
    fn on_event(&self, payload: &T);
}

impl<T, F> EventListener<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn on_event(&self, payload: &T) {
        self(payload)
    }
}

/// Shared handle to a listener. Identity is the allocation, so registering
/// the same `Arc` twice is a no-op.
pub type ListenerRef<T> = Arc<dyn EventListener<T>>;

type Job = Box<dyn FnOnce() + Send>;

/// A clonable handle that sends delivery jobs to the dispatcher thread.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    /// Spawns the dispatcher thread. It exits once every handle is dropped.
    pub fn spawn() -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        thread::Builder::new()
            .name("event-dispatch".into())
            .spawn(move || {
                debug!("Event dispatcher thread started.");
                while let Some(job) = rx.blocking_recv() {
                    job();
                }
                debug!("Event dispatcher thread stopped.");
            })?;
        Ok(Self { tx })
    }

    fn enqueue(&self, job: Job) {
        if self.tx.send(job).is_err() {
            error!("Event dispatcher is gone, dropping delivery");
        }
    }

    /// Blocks until every job queued before this call has run.
    /// Must not be called from a listener.
    pub fn flush(&self) {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        self.enqueue(Box::new(move || {
            let _ = done_tx.send(());
        }));
        let _ = done_rx.recv();
    }
}

/// A statically-typed topic
pub struct Topic<T> {
    name: &'static str,
    listeners: Arc<Mutex<Vec<ListenerRef<T>>>>,
    dispatcher: Dispatcher,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            listeners: self.listeners.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

fn same_listener<T>(a: &ListenerRef<T>, b: &ListenerRef<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl<T: Clone + Send + 'static> Topic<T> {
    pub fn new(name: &'static str, dispatcher: Dispatcher) -> Self {
        Self {
            name,
            listeners: Arc::new(Mutex::new(Vec::new())),
            dispatcher,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ListenerRef<T>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a listener. Returns false if it was already registered.
    pub fn register(&self, listener: &ListenerRef<T>) -> bool {
        let mut listeners = self.lock();
        if listeners.iter().any(|known| same_listener(known, listener)) {
            return false;
        }
        listeners.push(listener.clone());
        true
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unregister(&self, listener: &ListenerRef<T>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|known| !same_listener(known, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Queues delivery of `payload` to the listeners registered right now.
    pub fn publish(&self, payload: T) {
        let listeners = self.lock().clone();
        if listeners.is_empty() {
            return;
        }
        let name = self.name;
        self.dispatcher.enqueue(Box::new(move || {
            for listener in listeners {
                let delivered =
                    panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&payload)));
                if delivered.is_err() {
                    error!("Listener on '{}' panicked while handling an event", name);
                }
            }
        }));
    }
}

/// The topics used by the thermometer core and its UI
#[derive(Clone)]
pub struct EventBus {
    /// A device was discovered or lost
    pub device_state_changed: Topic<DeviceDescriptor>,
    /// A reading was decoded
    pub reading_received: Topic<Reading>,
    /// The UI picked a device to connect to
    pub device_selected: Topic<DeviceDescriptor>,
    dispatcher: Dispatcher,
}

impl EventBus {
    pub fn new() -> Result<Self> {
        let dispatcher = Dispatcher::spawn()?;
        Ok(Self {
            device_state_changed: Topic::new("device-state-changed", dispatcher.clone()),
            reading_received: Topic::new("reading-received", dispatcher.clone()),
            device_selected: Topic::new("device-selected", dispatcher.clone()),
            dispatcher,
        })
    }

    /// Blocks until every queued delivery has run.
    pub fn flush(&self) {
        self.dispatcher.flush();
    }
}
