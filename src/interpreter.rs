use std::{collections::HashMap, sync::Arc};

use crate::{
    channel::Registry,
    error::RuntimeError,
    node::{ChannelSpec, Node, NodeKind},
    value::{apply_binary, ChannelId, MagicChannel, TaskId, Value},
};

/// State shared read-only by every task: the name -> task-reference table
/// built from the program's definitions.
#[derive(Debug, Clone)]
pub struct Globals {
    pub tasks: HashMap<String, Value>,
}

/// One task instance's evaluator state.
pub struct TaskState {
    pub name: String,
    pub id: TaskId,
    pub index: Option<usize>,

    pub locals: HashMap<String, Value>,

    registry: Arc<Registry>,
}

/// Where a resolved send is headed.
enum SendTarget {
    Channel(ChannelId),
    Magic(MagicChannel),
}

impl TaskState {
    pub fn new(name: &str, id: TaskId, index: Option<usize>, registry: Arc<Registry>) -> Self {
        let mut locals = HashMap::new();
        // `$index` is a read-only local, present only in multi-task instances
        if let Some(index) = index {
            locals.insert("$index".to_string(), Value::Integer(index as i64));
        }

        Self {
            name: name.to_string(),
            id,
            index,
            locals,
            registry,
        }
    }

    pub fn evaluate(&mut self, node: &Node, globals: &Globals) -> Result<Value, RuntimeError> {
        match &node.kind {
            NodeKind::Body(statements) => {
                let mut result = Value::Null;
                for statement in statements {
                    self.registry.check_shutdown()?;
                    result = self.evaluate(statement, globals)?;
                }
                Ok(result)
            }

            NodeKind::IntegerLiteral(i) => Ok(Value::Integer(*i)),
            NodeKind::BooleanLiteral(b) => Ok(Value::Boolean(*b)),
            NodeKind::NullLiteral => Ok(Value::Null),

            NodeKind::Identifier(name) => self.resolve(name, globals),

            NodeKind::BinaryOperation { left, op, right } => {
                let left = self.evaluate(left, globals)?;
                let right = self.evaluate(right, globals)?;
                apply_binary(*op, &left, &right)
            }

            NodeKind::Index { value, index } => {
                let value = self.evaluate(value, globals)?;
                let index = self.evaluate(index, globals)?.as_integer()?;

                let Value::TaskGroup(ref instances) = value else {
                    return Err(RuntimeError::Type(format!(
                        "cannot index {}",
                        value.type_name()
                    )));
                };

                match usize::try_from(index).ok().and_then(|i| instances.get(i)) {
                    Some(id) => Ok(Value::Task(*id)),
                    None => Err(RuntimeError::Channel(format!(
                        "task index {index} is out of range (instances run 0..{})",
                        instances.len() - 1
                    ))),
                }
            }

            NodeKind::Assign { target, value } => {
                if target.starts_with('$') {
                    return Err(RuntimeError::Name(format!(
                        "cannot assign to magic name `{target}`"
                    )));
                }
                let value = self.evaluate(value, globals)?;
                self.create_or_assign_local(target, value);
                Ok(Value::Null)
            }

            NodeKind::If {
                condition,
                if_true,
                if_false,
            } => {
                let condition = self.evaluate(condition, globals)?;

                if condition.is_truthy() {
                    self.evaluate(if_true, globals)
                } else if let Some(if_false) = if_false {
                    self.evaluate(if_false, globals)
                } else {
                    Ok(Value::Null)
                }
            }

            NodeKind::While { condition, body } => {
                let mut result = Value::Null;
                loop {
                    self.registry.check_shutdown()?;
                    let condition = self.evaluate(condition, globals)?;
                    if !condition.is_truthy() {
                        break;
                    }

                    result = self.evaluate(body, globals)?;
                }
                Ok(result)
            }

            NodeKind::Loop { body } => loop {
                self.registry.check_shutdown()?;
                self.evaluate(body, globals)?;
            },

            NodeKind::Exit => {
                self.registry.request_exit();
                Err(RuntimeError::ExitRequested)
            }

            NodeKind::Send { value, channel } => {
                let value = self.evaluate(value, globals)?;
                let channel = self.evaluate(channel, globals)?;

                match self.send_target(&channel)? {
                    SendTarget::Magic(magic) => self.registry.send_magic(magic, &value),
                    SendTarget::Channel(id) => self.registry.send(id, value)?,
                }

                Ok(Value::Null)
            }

            NodeKind::Receive { target, channel } => {
                let received = match channel {
                    ChannelSpec::Binding(bind_name) => {
                        let (value, channel) = self.registry.receive_any(self.id)?;
                        self.create_or_assign_local(bind_name, Value::Channel(channel));
                        value
                    }
                    ChannelSpec::Explicit(expression) => {
                        let channel = self.evaluate(expression, globals)?;
                        let channel = self.receive_channel(&channel)?;
                        self.registry.receive(channel)?
                    }
                };

                if let Some(target) = target {
                    self.create_or_assign_local(target, received);
                }

                Ok(Value::Null)
            }
        }
    }

    /// A send addresses the channel from this task towards the peer the
    /// channel expression names.
    fn send_target(&self, channel: &Value) -> Result<SendTarget, RuntimeError> {
        match channel {
            Value::Magic(magic) => Ok(SendTarget::Magic(*magic)),
            Value::Task(peer) => Ok(SendTarget::Channel(
                self.registry.channel_between(self.id, *peer),
            )),
            Value::Channel(id) => {
                let peer = self.peer_of(*id)?;
                Ok(SendTarget::Channel(
                    self.registry.channel_between(self.id, peer),
                ))
            }
            Value::TaskGroup(_) => Err(RuntimeError::Channel(
                "cannot send to a multi-task without an instance index".into(),
            )),
            other => Err(RuntimeError::Channel(format!(
                "cannot send to {}",
                other.type_name()
            ))),
        }
    }

    /// A receive addresses the channel from the named peer towards this
    /// task.
    fn receive_channel(&self, channel: &Value) -> Result<ChannelId, RuntimeError> {
        match channel {
            Value::Task(peer) => Ok(self.registry.channel_between(*peer, self.id)),
            Value::Channel(id) => {
                let peer = self.peer_of(*id)?;
                Ok(self.registry.channel_between(peer, self.id))
            }
            Value::TaskGroup(_) => Err(RuntimeError::Channel(
                "cannot receive from a multi-task without an instance index".into(),
            )),
            other => Err(RuntimeError::Channel(format!(
                "cannot receive from {}",
                other.type_name()
            ))),
        }
    }

    /// The other endpoint of a channel this task holds a reference to.
    fn peer_of(&self, id: ChannelId) -> Result<TaskId, RuntimeError> {
        let (from, to) = self.registry.channel_endpoints(id);
        if from == self.id {
            Ok(to)
        } else if to == self.id {
            Ok(from)
        } else {
            Err(RuntimeError::Channel(
                "this task is not an endpoint of that channel".into(),
            ))
        }
    }

    fn resolve(&self, name: &str, globals: &Globals) -> Result<Value, RuntimeError> {
        // Locals first ($index lives here), then task names, then magic
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }

        if let Some(value) = globals.tasks.get(name) {
            return Ok(value.clone());
        }

        if name == "$out" {
            return Ok(Value::Magic(MagicChannel::Out));
        }

        Err(RuntimeError::Name(name.to_string()))
    }

    fn create_or_assign_local(&mut self, name: &str, value: Value) {
        if let Some(local) = self.locals.get_mut(name) {
            *local = value;
        } else {
            self.locals.insert(name.to_string(), value);
        }
    }

    pub fn formatted_name(&self) -> String {
        if let Some(index) = self.index {
            format!("{}[{}]", self.name, index)
        } else {
            self.name.clone()
        }
    }
}
