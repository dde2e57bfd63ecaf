use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Identifies one registered listener for idempotent `add_listener` and
/// `remove_listener`. Derived from the listener `Arc`'s address rather
/// than a caller-supplied name string, so identity is the callback
/// itself and there's nothing the caller has to keep unique.
pub type ListenerId = u64;

fn listener_id(listener: &Arc<dyn Listener>) -> ListenerId {
    Arc::as_ptr(listener) as *const () as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High,
    Normal,
    Low,
}

/// One published event. `data` is type-erased so the bus doesn't need
/// to depend on every crate that produces or consumes events;
/// listeners downcast with `event.data::<T>()`.
pub struct Event {
    pub topic: String,
    pub kind: String,
    pub data: Arc<dyn Any + Send + Sync>,
    /// -1 means unbounded.
    pub max_responders: i64,
    pub allow_busy_trigger: bool,
}

impl Event {
    pub fn new(topic: impl Into<String>, kind: impl Into<String>, data: impl Any + Send + Sync) -> Self {
        Self {
            topic: topic.into(),
            kind: kind.into(),
            data: Arc::new(data),
            max_responders: -1,
            allow_busy_trigger: false,
        }
    }

    pub fn with_max_responders(mut self, max_responders: i64) -> Self {
        self.max_responders = max_responders;
        self
    }

    pub fn with_allow_busy_trigger(mut self, allow: bool) -> Self {
        self.allow_busy_trigger = allow;
        self
    }

    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

/// A registered callback. Implementors are invoked for both
/// synchronous and asynchronous dispatch; the dispatch mode only
/// changes whether the bus awaits them one at a time or concurrently.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

struct Registration {
    id: ListenerId,
    priority: Priority,
    listener: Arc<dyn Listener>,
}

enum DispatchTask {
    Sync(Event),
    Async(Event),
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Bound on the internal dispatch-task queue.
    pub queue_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { queue_capacity: 1024 }
    }
}

#[derive(Debug, Clone)]
pub struct EventBusStats {
    pub topics: usize,
    pub listeners: usize,
    pub is_running: bool,
    pub queue_capacity: usize,
}

/// Central event bus: named topics, priority-ordered listener lists,
/// a bounded queue drained by a dedicated worker task.
pub struct EventBus {
    config: EventBusConfig,
    topics: Arc<RwLock<HashMap<String, Vec<Registration>>>>,
    busy: Arc<Mutex<std::collections::HashSet<ListenerId>>>,
    disabled: Arc<AtomicBool>,
    queue_tx: Mutex<Option<mpsc::Sender<DispatchTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            config,
            topics: Arc::new(RwLock::new(HashMap::new())),
            busy: Arc::new(Mutex::new(std::collections::HashSet::new())),
            disabled: Arc::new(AtomicBool::new(false)),
            queue_tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Idempotent: re-registering the same listener for the same topic
    /// is a no-op. Keeps the topic's listener list sorted by priority
    /// (HIGH first), stable within equal priority.
    pub async fn add_listener(&self, topic: &str, listener: Arc<dyn Listener>, priority: Priority) {
        let id = listener_id(&listener);
        let mut topics = self.topics.write().await;
        let entry = topics.entry(topic.to_string()).or_default();

        if entry.iter().any(|r| r.id == id) {
            return;
        }

        entry.push(Registration { id, priority, listener });
        entry.sort_by_key(|r| r.priority);
    }

    /// Removes the first occurrence of `listener` registered on `topic`.
    pub async fn remove_listener(&self, topic: &str, listener: &Arc<dyn Listener>) {
        let id = listener_id(listener);
        let mut topics = self.topics.write().await;
        if let Some(entry) = topics.get_mut(topic) {
            if let Some(pos) = entry.iter().position(|r| r.id == id) {
                entry.remove(pos);
            }
        }
    }

    /// Enqueues a synchronous dispatch task. Fails loudly if the bus
    /// hasn't been `start`ed.
    pub async fn trigger(&self, event: Event) -> anyhow::Result<()> {
        self.enqueue(DispatchTask::Sync(event)).await
    }

    /// Enqueues an asynchronous dispatch task.
    pub async fn async_trigger(&self, event: Event) -> anyhow::Result<()> {
        self.enqueue(DispatchTask::Async(event)).await
    }

    async fn enqueue(&self, task: DispatchTask) -> anyhow::Result<()> {
        let tx = self.queue_tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("event bus queue closed")),
            None => Err(anyhow::anyhow!("event bus trigger called before start")),
        }
    }

    /// Drains the internal queue on a dedicated worker task.
    pub async fn start(&self) {
        if self.worker.lock().unwrap().is_some() {
            return;
        }

        let (tx, mut rx) = mpsc::channel(self.config.queue_capacity);
        *self.queue_tx.lock().unwrap() = Some(tx);

        let topics = self.topics.clone();
        let busy = self.busy.clone();
        let disabled = self.disabled.clone();

        let handle = tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                if disabled.load(Ordering::Relaxed) {
                    continue;
                }

                match task {
                    DispatchTask::Sync(event) => dispatch_sync(&topics, event).await,
                    DispatchTask::Async(event) => dispatch_async(&topics, &busy, event).await,
                }
            }
        });

        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Waits for the queue to drain and for in-flight dispatches to
    /// finish.
    pub async fn close(&self) {
        self.queue_tx.lock().unwrap().take();
        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn disable_all_events(&self) {
        self.disabled.store(true, Ordering::Relaxed);
    }

    pub fn enable_all_events(&self) {
        self.disabled.store(false, Ordering::Relaxed);
    }

    pub async fn get_stats(&self) -> EventBusStats {
        let topics = self.topics.read().await;
        EventBusStats {
            topics: topics.len(),
            listeners: topics.values().map(|v| v.len()).sum(),
            is_running: self.worker.lock().unwrap().is_some(),
            queue_capacity: self.config.queue_capacity,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn eligible<'a>(registrations: &'a [Registration], max_responders: i64) -> &'a [Registration] {
    if max_responders < 0 {
        registrations
    } else {
        let n = (max_responders as usize).min(registrations.len());
        &registrations[..n]
    }
}

async fn dispatch_sync(topics: &Arc<RwLock<HashMap<String, Vec<Registration>>>>, event: Event) {
    let listeners: Vec<Arc<dyn Listener>> = {
        let topics = topics.read().await;
        match topics.get(&event.topic) {
            Some(regs) => eligible(regs, event.max_responders)
                .iter()
                .map(|r| r.listener.clone())
                .collect(),
            None => return,
        }
    };

    for listener in listeners {
        if let Err(err) = listener.handle(&event).await {
            error!(topic = %event.topic, kind = %event.kind, error = %err, "listener failed during sync dispatch");
        }
    }
}

async fn dispatch_async(
    topics: &Arc<RwLock<HashMap<String, Vec<Registration>>>>,
    busy: &Arc<Mutex<std::collections::HashSet<ListenerId>>>,
    event: Event,
) {
    let registrations: Vec<(ListenerId, Arc<dyn Listener>)> = {
        let topics = topics.read().await;
        match topics.get(&event.topic) {
            Some(regs) => eligible(regs, event.max_responders)
                .iter()
                .map(|r| (r.id, r.listener.clone()))
                .collect(),
            None => return,
        }
    };

    let event = Arc::new(event);
    let mut handles = Vec::with_capacity(registrations.len());

    for (id, listener) in registrations {
        let allow_busy = event.allow_busy_trigger;
        {
            let mut busy = busy.lock().unwrap();
            if busy.contains(&id) {
                if !allow_busy {
                    debug!(listener_id = id, "dropped async trigger: listener busy");
                    continue;
                }
            } else {
                busy.insert(id);
            }
        }

        let busy = busy.clone();
        let event = event.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = listener.handle(&event).await {
                warn!(topic = %event.topic, kind = %event.kind, error = %err, "listener failed during async dispatch");
            }
            busy.lock().unwrap().remove(&id);
        });
        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.await;
    }
}
