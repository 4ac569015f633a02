use std::{
    collections::HashMap,
    io::{self, Write},
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    channel::{Registry, TieBreak},
    error::RuntimeError,
    interpreter::{Globals, TaskState},
    node::Node,
    value::{TaskId, Value},
};

/// What each task ended with, keyed by formatted task name.
pub type TaskResults = HashMap<String, Result<Value, RuntimeError>>;

/// The task scheduler: owns the registry, spawns one thread per task
/// instance, and collects every task's outcome.
pub struct Runtime {
    globals: Globals,
    tasks: Vec<(TaskState, Node)>,
    registry: Arc<Registry>,

    next_task_id: TaskId,
    started_count: usize,
    handles: Vec<JoinHandle<()>>,

    result_sender: Sender<(String, Result<Value, RuntimeError>)>,
    result_receiver: Receiver<(String, Result<Value, RuntimeError>)>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// A runtime whose `$out` writes somewhere other than stdout. Tests use
    /// this to capture emissions.
    pub fn with_output(output: Box<dyn Write + Send>) -> Self {
        let (result_sender, result_receiver) = crossbeam_channel::unbounded();

        Self {
            globals: Globals {
                tasks: HashMap::new(),
            },
            tasks: vec![],
            registry: Arc::new(Registry::new(TieBreak::from_env(), output)),

            next_task_id: TaskId(1),
            started_count: 0,
            handles: vec![],

            result_sender,
            result_receiver,
        }
    }

    pub fn set_tie_break(&self, tie_break: TieBreak) {
        self.registry.set_tie_break(tie_break);
    }

    /// Register a task definition. A multiplicity of `Some(n)` expands to
    /// instances `0..n-1`, and the bare name resolves to the whole group.
    pub fn add_task(&mut self, name: &str, body: Node, instances: Option<usize>) {
        let global_value = if let Some(instance_count) = instances {
            let mut ids = vec![];
            for index in 0..instance_count {
                ids.push(self.add_one_task(name, body.clone(), Some(index)));
            }
            Value::TaskGroup(ids)
        } else {
            Value::Task(self.add_one_task(name, body, None))
        };

        self.globals.tasks.insert(name.to_string(), global_value);
    }

    fn take_task_id(&mut self) -> TaskId {
        let id = self.next_task_id;
        self.next_task_id = TaskId(id.0 + 1);
        id
    }

    fn add_one_task(&mut self, name: &str, body: Node, index: Option<usize>) -> TaskId {
        let id = self.take_task_id();
        let state = TaskState::new(name, id, index, Arc::clone(&self.registry));
        self.tasks.push((state, body));
        id
    }

    /// Spawn every task instance on its own thread.
    pub fn start(&mut self) {
        self.started_count = self.tasks.len();
        self.registry.begin(self.started_count);

        for (mut task, body) in self.tasks.drain(..) {
            let globals = self.globals.clone();
            let registry = Arc::clone(&self.registry);
            let sender = self.result_sender.clone();

            self.handles.push(thread::spawn(move || {
                let name = task.formatted_name();
                tracing::debug!(task = %name, "task started");

                let result = task.evaluate(&body, &globals);
                match &result {
                    Ok(value) => tracing::debug!(task = %name, ?value, "task finished"),
                    Err(e) if e.is_exit() => tracing::debug!(task = %name, "task stopped"),
                    Err(RuntimeError::Deadlock) => {}
                    Err(e) => {
                        tracing::debug!(task = %name, error = %e, "task failed");
                        registry.fault();
                    }
                }

                registry.task_finished();
                let _ = sender.send((name, result));
            }));
        }
    }

    /// Wait for every task to report, then reclaim the threads.
    pub fn join(&mut self) -> TaskResults {
        let mut results = HashMap::new();

        for _ in 0..self.started_count {
            let Ok((name, result)) = self.result_receiver.recv() else {
                break;
            };
            results.insert(name, result);
        }

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }

        results
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
