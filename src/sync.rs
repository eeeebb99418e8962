//! Mutual exclusion primitives for tasks.
//!
//! [`Mutex`] keeps the original semantics of a binary lock over the
//! platform semaphore: contention blocks the whole runtime thread.
//! [`CooperativeMutex`] is the scheduler-aware alternative: contention
//! parks only the calling task.

use std::cell::UnsafeCell;
use std::collections::VecDeque;

use crate::errors::RuntimeError;
use crate::ports::posix::semaphore::Semaphore;
use crate::task_manager::TaskManager;
use crate::timer::Timer;

/// Binary mutex over the platform counting semaphore, initial value 1.
///
/// `lock` blocks at the OS level: the runtime thread, and with it every
/// user task, stops until the lock is granted. That is acceptable for the
/// intended single-consumer contention pattern and is the documented
/// trade-off of this primitive; use [`CooperativeMutex`] when other tasks
/// must keep running while one waits.
pub struct Mutex {
    sem: Semaphore,
}

impl Mutex {
    /// Create an unlocked mutex.
    pub fn new() -> Result<Mutex, RuntimeError> {
        Ok(Mutex {
            sem: Semaphore::new(1)?,
        })
    }

    /// Acquire the lock, blocking the OS thread while another holder
    /// exists.
    pub fn lock(&self) -> Result<(), RuntimeError> {
        self.sem.wait()
    }

    /// Release the lock.
    pub fn unlock(&self) -> Result<(), RuntimeError> {
        self.sem.post()
    }
}

struct CoopMutexState {
    locked: bool,
    /// Arena slots of parked tasks, in arrival order.
    waiters: VecDeque<usize>,
}

/// Scheduler-aware binary mutex.
///
/// A contended `lock` parks the calling task on the mutex's own wait queue
/// and hands the processor to the scheduler; `unlock` transfers ownership
/// to the first waiter, promoting it to the tail of the ready queue. Only
/// running tasks may block on it, and it must not outlive the runtime
/// lifecycle in which tasks parked on it.
pub struct CooperativeMutex {
    state: UnsafeCell<CoopMutexState>,
}

// Guarded by the runtime's preemption-disarm regime; every task shares one
// OS thread.
unsafe impl Send for CooperativeMutex {}
unsafe impl Sync for CooperativeMutex {}

impl CooperativeMutex {
    /// Create an unlocked mutex. Usable in statics.
    pub const fn new() -> CooperativeMutex {
        CooperativeMutex {
            state: UnsafeCell::new(CoopMutexState {
                locked: false,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Acquire the lock, parking the calling task while another holds it.
    pub fn lock(&self) {
        Timer::disarm();
        unsafe {
            let state = self.state.get();
            if !(*state).locked {
                (*state).locked = true;
                if TaskManager::has_current() {
                    TaskManager::rearm_slice();
                }
                return;
            }
            // The unlocking task hands the lock over before waking us, so
            // ownership is already ours when the park returns.
            TaskManager::park_current(&mut (*state).waiters);
        }
    }

    /// Release the lock, or hand it directly to the first waiter.
    pub fn unlock(&self) {
        Timer::disarm();
        unsafe {
            let state = self.state.get();
            match (*state).waiters.pop_front() {
                Some(slot) => TaskManager::unpark(slot),
                None => (*state).locked = false,
            }
        }
        if TaskManager::has_current() {
            TaskManager::rearm_slice();
        }
    }
}

impl Default for CooperativeMutex {
    fn default() -> CooperativeMutex {
        CooperativeMutex::new()
    }
}
