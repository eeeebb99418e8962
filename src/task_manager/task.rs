use crate::ports::posix::context::Context;

#[cfg(not(feature = "c-library"))]
/// Type of task entry function. Runs once; the task ends when it returns or
/// calls `done`.
pub type TaskEntryFunctionType = fn();
#[cfg(feature = "c-library")]
/// Type of task entry function. Runs once; the task ends when it returns or
/// calls `done`.
pub type TaskEntryFunctionType = extern "C" fn();

/// Type of task identifiers. Assigned sequentially from 0 within one
/// runtime lifecycle.
pub type TaskIdType = usize;

/// Lifecycle state of a task as tracked by the scheduler.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum TaskStatusType {
    /// Linked into the ready queue, eligible to run.
    Ready,
    /// Currently executing. At most one task at a time.
    Running,
    /// Suspended awaiting a join target or a cooperative lock.
    Waiting,
    /// Finished; record and stack are reclaimed at the next dispatch.
    Terminated,
}

/// One user task owned by the scheduler arena.
pub(crate) struct Task {
    /// Identifier unique within the current runtime lifecycle.
    pub(crate) id: TaskIdType,
    /// User entry function, called once by the entry trampoline.
    pub(crate) entry: TaskEntryFunctionType,
    /// Saved machine context. The record is boxed so this address is stable
    /// for the lifetime of the task.
    pub(crate) context: Context,
    /// Exclusively owned execution stack, released only by the scheduler,
    /// never on this stack itself.
    pub(crate) stack: Box<[u8]>,
    /// Current lifecycle state.
    pub(crate) status: TaskStatusType,
    /// Id awaited while parked in the join queue.
    pub(crate) join_target: Option<TaskIdType>,
    /// Arena index of the next task in whatever queue holds this one.
    pub(crate) link: Option<usize>,
}
