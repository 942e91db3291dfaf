//! # Resource Management
//!
//! Resource table plus a background loader.
//!
//! ## Resource Table
//!
//! Resources get ids from a counter that never repeats. The table holds one
//! shared reference per resource; `release` only drops that reference, so a
//! resource still held elsewhere lives on until its last user lets go.
//!
//! ## Loader
//!
//! [`ResourcePipe`]s queued with [`ResourceManager::exec`] run on a single
//! processor thread in submission order. When a pipe reaches a context
//! task, the processor parks it in a shared slot and waits; the main thread
//! picks it up in [`ResourceManager::update_context`], runs it and hands the
//! result back. The graphics device is therefore only touched from the main
//! thread.
//!
//! [`ResourceManager::exec_as_dependency`] runs a pipe inline, and is only
//! available until the first asynchronous `exec`. After that the table may
//! be in use by queued pipes, so the latch stays closed for good.

pub mod pipe;

pub use pipe::{ResourcePipe, ResourceTask, TaskFn, TaskKind};

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::core::config::LoaderConfig;

/// Resource table key; never reused within one manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to a resource of unknown type
pub type AnyResource = Arc<dyn Any + Send + Sync>;

/// What the processor thread is doing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessorState {
    /// Waiting for pipes
    #[default]
    Idle,
    /// Running the named pipe
    Loading(String),
}

#[derive(Default)]
struct ContextSlot {
    task: Option<TaskFn>,
    result: Option<bool>,
}

struct Shared {
    state: Mutex<ProcessorState>,
    context: Mutex<ContextSlot>,
    context_done: Condvar,
    queued: AtomicU32,
    running: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(ProcessorState::Idle),
            context: Mutex::new(ContextSlot::default()),
            context_done: Condvar::new(),
            queued: AtomicU32::new(0),
            running: AtomicBool::new(true),
        }
    }

    /// Hand `func` to the context thread and block until it ran
    ///
    /// Returns `false` without running it when the manager shuts down.
    fn run_on_context(&self, func: TaskFn) -> bool {
        let mut slot = self.context.lock();
        slot.task = Some(func);
        slot.result = None;
        while slot.result.is_none() && self.running.load(Ordering::Acquire) {
            self.context_done.wait(&mut slot);
        }
        slot.task = None;
        slot.result.take().unwrap_or(false)
    }

    fn process(&self, pipe: ResourcePipe) -> bool {
        let (name, tasks) = pipe.into_parts();
        *self.state.lock() = ProcessorState::Loading(name.clone());
        debug!("Loading '{name}'");

        let mut ok = true;
        for (index, task) in tasks.into_iter().enumerate() {
            if !self.running.load(Ordering::Acquire) {
                ok = false;
                break;
            }
            let (kind, func) = task.into_parts();
            let succeeded = match kind {
                TaskKind::Async => func(),
                TaskKind::Context => self.run_on_context(func),
            };
            if !succeeded {
                warn!("Resource pipe '{name}' failed at task {index}");
                ok = false;
                break;
            }
        }

        *self.state.lock() = ProcessorState::Idle;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        ok
    }
}

fn processor_loop(shared: &Shared, pipes: &Receiver<ResourcePipe>) {
    trace!("Resource processor started");
    for pipe in pipes {
        if !shared.running.load(Ordering::Acquire) {
            shared.queued.fetch_sub(1, Ordering::AcqRel);
            continue;
        }
        shared.process(pipe);
    }
    trace!("Resource processor stopped");
}

struct Entry {
    name: String,
    value: AnyResource,
}

/// Resource table and pipe processor
pub struct ResourceManager {
    next_id: u32,
    resources: HashMap<ResourceId, Entry>,
    shared: Arc<Shared>,
    sender: Option<Sender<ResourcePipe>>,
    processor: Option<JoinHandle<()>>,
    async_started: bool,
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("resources", &self.resources.len())
            .field("queued", &self.queued_pipes())
            .field("state", &self.processor_state())
            .field("async_started", &self.async_started)
            .finish()
    }
}

impl ResourceManager {
    /// Manager with a processor thread unless `config` disables it
    ///
    /// Without a processor thread (or if spawning it fails) `exec` runs
    /// pipes inline.
    pub fn new(config: &LoaderConfig) -> Self {
        let shared = Arc::new(Shared::new());
        let (sender, processor) = if config.async_enabled {
            let (sender, receiver) = unbounded::<ResourcePipe>();
            let worker_shared = Arc::clone(&shared);
            match std::thread::Builder::new()
                .name("resource-processor".into())
                .spawn(move || processor_loop(&worker_shared, &receiver))
            {
                Ok(handle) => (Some(sender), Some(handle)),
                Err(e) => {
                    warn!("Could not start resource processor, loading inline: {e}");
                    (None, None)
                }
            }
        } else {
            (None, None)
        };
        info!(
            "Resource manager ready ({})",
            if processor.is_some() { "async" } else { "inline" }
        );

        Self {
            next_id: 0,
            resources: HashMap::new(),
            shared,
            sender,
            processor,
            async_started: false,
        }
    }

    /// Run one pending context task, if any; call once per frame from the
    /// main thread
    ///
    /// Returns whether a task ran.
    pub fn update_context(&self) -> bool {
        let Some(task) = self.shared.context.lock().task.take() else {
            return false;
        };
        let result = task();
        let mut slot = self.shared.context.lock();
        slot.result = Some(result);
        self.shared.context_done.notify_all();
        true
    }

    /// Queue `pipe` for the processor thread
    ///
    /// Closes the dependency latch when a processor thread runs. Returns
    /// `false` if the pipe could not be queued; in inline mode returns the
    /// pipe's result.
    pub fn exec(&mut self, pipe: ResourcePipe) -> bool {
        let Some(sender) = &self.sender else {
            return pipe.run_inline();
        };
        self.async_started = true;
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        match sender.send(pipe) {
            Ok(()) => true,
            Err(e) => {
                self.shared.queued.fetch_sub(1, Ordering::AcqRel);
                warn!("Could not queue resource pipe '{}'", e.0.name());
                false
            }
        }
    }

    /// Run `pipe` inline on the calling thread
    ///
    /// Refused once any pipe was queued asynchronously.
    pub fn exec_as_dependency(&mut self, pipe: ResourcePipe) -> bool {
        if self.async_started {
            warn!(
                "Resource pipe '{}' cannot run as a dependency after asynchronous loading started",
                pipe.name()
            );
            return false;
        }
        pipe.run_inline()
    }

    /// Whether `exec_as_dependency` is still available
    pub const fn accepts_dependencies(&self) -> bool {
        !self.async_started
    }

    /// Register `value` under a fresh id
    pub fn create<T: Any + Send + Sync>(&mut self, name: &str, value: T) -> (ResourceId, Arc<T>) {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        let value = Arc::new(value);
        self.resources.insert(
            id,
            Entry {
                name: name.to_string(),
                value: Arc::clone(&value) as AnyResource,
            },
        );
        trace!("Created resource {id} '{name}'");
        (id, value)
    }

    /// Resource by id, type-erased
    pub fn get(&self, id: ResourceId) -> Option<AnyResource> {
        self.resources.get(&id).map(|e| Arc::clone(&e.value))
    }

    /// Resource by id as `T`; `None` if absent or of another type
    pub fn get_as<T: Any + Send + Sync>(&self, id: ResourceId) -> Option<Arc<T>> {
        self.get(id)?.downcast::<T>().ok()
    }

    /// Name a resource was created with
    pub fn name(&self, id: ResourceId) -> Option<&str> {
        self.resources.get(&id).map(|e| e.name.as_str())
    }

    /// Drop the table's reference to `id`
    pub fn release(&mut self, id: ResourceId) -> bool {
        match self.resources.remove(&id) {
            Some(entry) => {
                trace!("Released resource {id} '{}'", entry.name);
                true
            }
            None => {
                debug!("release: no resource {id}");
                false
            }
        }
    }

    /// Number of registered resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources are registered
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Current processor state
    pub fn processor_state(&self) -> ProcessorState {
        self.shared.state.lock().clone()
    }

    /// Pipes queued or running
    pub fn queued_pipes(&self) -> u32 {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Whether pipes run on a processor thread
    pub const fn is_async(&self) -> bool {
        self.sender.is_some()
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.sender = None;
        {
            let _slot = self.shared.context.lock();
            self.shared.context_done.notify_all();
        }
        if let Some(handle) = self.processor.take() {
            if handle.join().is_err() {
                warn!("Resource processor panicked");
            }
        }
    }
}
