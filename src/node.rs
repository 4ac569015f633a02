#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Body(Vec<Node>),

    IntegerLiteral(i64),
    BooleanLiteral(bool),
    NullLiteral,
    Identifier(String),

    BinaryOperation {
        left: Box<Node>,
        op: BinaryOperator,
        right: Box<Node>,
    },

    Index {
        value: Box<Node>,
        index: Box<Node>,
    },

    Assign {
        target: String,
        value: Box<Node>,
    },

    If {
        condition: Box<Node>,
        if_true: Box<Node>,
        if_false: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },
    Loop {
        body: Box<Node>,
    },
    Exit,

    Send {
        value: Box<Node>,
        channel: Box<Node>,
    },
    Receive {
        /// `None` for the `_` discard target.
        target: Option<String>,
        channel: ChannelSpec,
    },
}

/// The channel half of a receive: either an expression naming a channel or
/// task, or `?name`, which binds `name` to whichever channel the receive
/// ends up matching on.
#[derive(Debug, Clone)]
pub enum ChannelSpec {
    Explicit(Box<Node>),
    Binding(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,

    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
}

#[derive(Debug, Clone)]
pub struct Item {
    pub kind: ItemKind,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone)]
pub enum ItemKind {
    TaskDefinition {
        name: String,
        /// `Some(n)` for a multi-task `task Name[n]`.
        instances: Option<usize>,
        body: Node,
    },
}
