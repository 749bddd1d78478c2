use thiserror::Error;

/// Reasons a dispatch request is refused before anything goes on the wire.
///
/// None of these produce a [`crate::CommandOutcome`]: a refused dispatch
/// leaves the dispatcher exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("a command is already in flight")]
    Busy,
    #[error("command text is empty")]
    EmptyCommand,
    #[error("unknown preset key '{0}'")]
    UnknownPreset(String),
    #[error("engine has been shut down")]
    Terminated,
}
