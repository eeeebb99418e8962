use thiserror::Error;

/// Errors surfaced by the runtime API.
///
/// `OutOfMemory` and `ContextFailure` inside [`init`] are fatal to the
/// runtime; inside [`spawn`] they are returned to the caller and the
/// partially constructed task is released. A `TimerFailure` while arming a
/// preemption slice is logged and the runtime continues cooperatively until
/// the next successful arm.
///
/// [`init`]: crate::task_manager::TaskManager::init
/// [`spawn`]: crate::task_manager::TaskManager::spawn
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// A task record or stack allocation failed.
    #[error("out of memory")]
    OutOfMemory,
    /// The platform refused to construct, save or restore a machine context.
    #[error("context operation failed")]
    ContextFailure,
    /// The preemption timer could not be armed.
    #[error("preemption timer failure")]
    TimerFailure,
    /// A mutex operation was handed an absent reference.
    #[error("null argument")]
    NullArgument,
    /// The platform semaphore primitive failed.
    #[error("semaphore operation failed")]
    SemaphoreFailure,
}
