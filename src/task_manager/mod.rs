//! Task management for the strand runtime.
//!
//! This module provides the task abstraction and the preemptive scheduler
//! that multiplexes every task onto the single OS thread that initialized
//! the runtime.
//!
//! # Core Components
//!
//! ## TaskManager
//! Type alias resolving to the active scheduler implementation. All task
//! operations are associated functions on this type.
//!
//! ## TASK_MANAGER
//! Static singleton instance of the scheduler, used internally by the
//! runtime. Its lifecycle is bounded by [`TaskManager::init`] and
//! [`TaskManager::deinit`].
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use strand::task_manager::TaskManager;
//!
//! fn numbers() {
//!     for n in 0..3 {
//!         println!("n = {}", n);
//!         TaskManager::yield_now();
//!     }
//! }
//!
//! TaskManager::init().expect("runtime init failed");
//! TaskManager::spawn(numbers).expect("spawn failed");
//! TaskManager::deinit();
//! ```
//!
//! # See Also
//!
//! - [`task`] - task record, id and status definitions
//! - [`preemptive`] - the scheduler implementation
//! - [`crate::sync`] - mutexes usable from tasks

mod queue;
pub mod task;

pub(crate) mod preemptive;

pub use task::{TaskEntryFunctionType, TaskIdType, TaskStatusType};

/// The active scheduler implementation.
pub type TaskManager = preemptive::PreemptiveTaskManager;

/// Global task manager instance used by the runtime.
///
/// # Safety
///
/// All access must be wrapped in `unsafe` blocks. Consistency is achieved
/// without locks because every task shares one OS thread and every critical
/// section first disarms the preemption timer; see the scheduling notes in
/// [`preemptive`].
static mut TASK_MANAGER: TaskManager = TaskManager::new();
