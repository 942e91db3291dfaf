//! Resource pipes
//!
//! A pipe is a named, ordered list of tasks that together load one
//! resource. Each task either runs on the loader thread (CPU work such as
//! decoding) or must run on the context thread (anything touching the
//! graphics device). The pipe stops at the first task returning `false`.

use std::fmt;

/// Boxed task body; returns whether the task succeeded
pub type TaskFn = Box<dyn FnOnce() -> bool + Send + 'static>;

/// Where a task must run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Any thread, normally the loader thread
    Async,
    /// The thread owning the graphics context
    Context,
}

/// One step of a pipe
pub struct ResourceTask {
    kind: TaskKind,
    func: TaskFn,
}

impl ResourceTask {
    /// Task runnable on the loader thread
    pub fn background(func: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self {
            kind: TaskKind::Async,
            func: Box::new(func),
        }
    }

    /// Task that must run on the context thread
    pub fn context(func: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self {
            kind: TaskKind::Context,
            func: Box::new(func),
        }
    }

    /// Where this task runs
    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    pub(crate) fn into_parts(self) -> (TaskKind, TaskFn) {
        (self.kind, self.func)
    }
}

impl fmt::Debug for ResourceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTask").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Named sequence of tasks
#[derive(Debug)]
pub struct ResourcePipe {
    name: String,
    tasks: Vec<ResourceTask>,
}

impl ResourcePipe {
    /// Empty pipe
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
        }
    }

    /// Builder pattern: append a loader-thread task
    #[must_use]
    pub fn then(mut self, func: impl FnOnce() -> bool + Send + 'static) -> Self {
        self.tasks.push(ResourceTask::background(func));
        self
    }

    /// Builder pattern: append a context-thread task
    #[must_use]
    pub fn then_on_context(mut self, func: impl FnOnce() -> bool + Send + 'static) -> Self {
        self.tasks.push(ResourceTask::context(func));
        self
    }

    /// Builder pattern: append a prepared task
    #[must_use]
    pub fn with_task(mut self, task: ResourceTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Display name, reported by the processor state while loading
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the pipe has no tasks
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<ResourceTask>) {
        (self.name, self.tasks)
    }

    /// Run every task on the calling thread, stopping at the first failure
    pub(crate) fn run_inline(self) -> bool {
        let (name, tasks) = self.into_parts();
        for (index, task) in tasks.into_iter().enumerate() {
            let (_, func) = task.into_parts();
            if !func() {
                log::warn!("Resource pipe '{name}' failed at task {index}");
                return false;
            }
        }
        true
    }
}
