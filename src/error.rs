use crate::exit_codes::exit;
use crate::tasks::TaskFailure;

/// An error that carries the process exit code it should end the command with.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
    pub exit_code: i32,
}

impl CommandError {
    pub fn new(message: impl Into<String>, exit_code: i32) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Bad manifest, bad path, bad flag combination.
    pub fn invalid_input(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string(), exit::INVALID_INPUT)
    }
}

/// Exit code for an error that reached the top level.
///
/// The first [`CommandError`] in the chain decides; anything else maps to
/// [`exit::FAILURE`]. A failed task is judged by its own error.
pub fn exit_code_of(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| {
            if let Some(failure) = cause.downcast_ref::<TaskFailure>() {
                return Some(exit_code_of(&failure.error));
            }
            cause.downcast_ref::<CommandError>().map(|e| e.exit_code)
        })
        .unwrap_or(exit::FAILURE)
}
