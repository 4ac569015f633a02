use std::fmt::Display;

use crate::error::RuntimeError;
use crate::node::BinaryOperator;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to a channel identity in the registry. Two handles are the
/// same channel exactly when they compare equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub(crate) u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MagicChannel {
    Out,
}

impl MagicChannel {
    pub fn name(&self) -> &'static str {
        match self {
            MagicChannel::Out => "$out",
        }
    }
}

/// A dynamically-typed runtime value. Values are immutable and cheaply
/// cloned; channel and task references are identities, not state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i64),
    Boolean(bool),
    Task(TaskId),
    TaskGroup(Vec<TaskId>),
    Channel(ChannelId),
    Magic(MagicChannel),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Task(_) | Value::TaskGroup(_) | Value::Channel(_) | Value::Magic(_) => true,
        }
    }

    pub fn as_integer(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(RuntimeError::Type(format!(
                "expected an integer, found {}",
                other.type_name()
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "an integer",
            Value::Boolean(_) => "a boolean",
            Value::Task(_) => "a task",
            Value::TaskGroup(_) => "a multi-task",
            Value::Channel(_) => "a channel",
            Value::Magic(_) => "a magic channel",
        }
    }
}

/// The textual rendering `$out` emits, one value per line.
impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Task(id) => write!(f, "<task {id}>"),
            Value::TaskGroup(ids) => write!(f, "<task group of {}>", ids.len()),
            Value::Channel(id) => write!(f, "<channel {}>", id.0),
            Value::Magic(m) => write!(f, "<task (magic) {}>", m.name()),
        }
    }
}

/// Apply a binary operator to two values.
///
/// Arithmetic and ordering comparisons are defined on integers only;
/// equality is defined on everything and never fails.
pub fn apply_binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOperator::Equals => Ok(Value::Boolean(left == right)),
        BinaryOperator::NotEquals => Ok(Value::Boolean(left != right)),

        BinaryOperator::Add => arithmetic(left, right, i64::checked_add),
        BinaryOperator::Subtract => arithmetic(left, right, i64::checked_sub),
        BinaryOperator::Multiply => arithmetic(left, right, i64::checked_mul),
        BinaryOperator::Divide => {
            let (l, r) = (left.as_integer()?, right.as_integer()?);
            if r == 0 {
                return Err(RuntimeError::Arithmetic("division by zero".into()));
            }
            // Truncated division; the only remaining failure is MIN / -1
            l.checked_div(r)
                .map(Value::Integer)
                .ok_or_else(|| RuntimeError::Arithmetic("integer overflow".into()))
        }

        BinaryOperator::LessThan => comparison(left, right, |l, r| l < r),
        BinaryOperator::GreaterThan => comparison(left, right, |l, r| l > r),
        BinaryOperator::LessEqual => comparison(left, right, |l, r| l <= r),
        BinaryOperator::GreaterEqual => comparison(left, right, |l, r| l >= r),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    op: impl FnOnce(i64, i64) -> Option<i64>,
) -> Result<Value, RuntimeError> {
    let (l, r) = (left.as_integer()?, right.as_integer()?);
    op(l, r)
        .map(Value::Integer)
        .ok_or_else(|| RuntimeError::Arithmetic("integer overflow".into()))
}

fn comparison(
    left: &Value,
    right: &Value,
    op: impl FnOnce(i64, i64) -> bool,
) -> Result<Value, RuntimeError> {
    let (l, r) = (left.as_integer()?, right.as_integer()?);
    Ok(Value::Boolean(op(l, r)))
}
