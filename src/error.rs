use thiserror::Error;

/// Everything that can go wrong while a program is running.
///
/// Any of these (except `ExitRequested`) terminates the whole program, not
/// just the task that hit it. Conker code cannot catch them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("type error: {0}")]
    Type(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    #[error("name error: `{0}` is not bound")]
    Name(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("deadlock: every task is suspended and no rendezvous is possible")]
    Deadlock,

    /// Cooperative shutdown signal, raised by `exit` and observed by every
    /// other task at its next suspension point or statement boundary.
    /// Not an error from the program's point of view.
    #[error("exit requested")]
    ExitRequested,
}

impl RuntimeError {
    pub fn is_exit(&self) -> bool {
        matches!(self, RuntimeError::ExitRequested)
    }
}
