//! Error taxonomy for the renderer core.
//!
//! Mirrors the severities and outcome categories of the original engine's
//! `Logger`/`Outcome` types: most renderer operations return a typed
//! `Result<T, EngineError>`, but a handful of conditions (device loss,
//! pipeline compilation failure) are treated as unrecoverable and are
//! logged then turned into a process exit via [`fatal`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("runtime error: {0}")]
    RuntimeError(String),

    #[error("runtime error ({code}): {message}")]
    RuntimeErrorCode { code: i32, message: String },

    #[error("device error: {0}")]
    DeviceError(String),

    #[error("swapchain image acquire timed out after {0:?}")]
    AcquireTimeout(std::time::Duration),

    #[error("command buffer submission failed: {0}")]
    SubmitFailure(String),

    #[error("invalid layout transition: {from:?} -> {to:?}")]
    InvalidLayoutTransition { from: String, to: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Logs `message` at error level and terminates the process.
///
/// Used for conditions the original engine's `Logger::fatal` treats as
/// unrecoverable: device loss, shader compilation failure, out-of-memory
/// during a frame that cannot be safely unwound.
pub fn fatal(message: impl AsRef<str>) -> ! {
    log::error!("{}", message.as_ref());
    std::process::exit(1);
}
