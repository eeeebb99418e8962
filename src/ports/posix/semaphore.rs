use std::cell::UnsafeCell;
use std::mem;

use crate::errors::RuntimeError;

/// Counting semaphore over the platform's unnamed POSIX semaphore.
pub struct Semaphore {
    // sem_t carries no self-references on the supported platforms; moving
    // an uncontended semaphore out of new() is sound.
    inner: UnsafeCell<libc::sem_t>,
}

// The runtime multiplexes every task onto one OS thread; the semaphore is a
// process-level primitive shared through statics.
unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Create a semaphore with the given initial value.
    pub fn new(initial: u32) -> Result<Semaphore, RuntimeError> {
        let sem = Semaphore {
            inner: UnsafeCell::new(unsafe { mem::zeroed() }),
        };
        if unsafe { libc::sem_init(sem.inner.get(), 0, initial as libc::c_uint) } < 0 {
            return Err(RuntimeError::SemaphoreFailure);
        }
        Ok(sem)
    }

    /// Decrement, blocking the whole OS thread while the count is zero.
    pub fn wait(&self) -> Result<(), RuntimeError> {
        if unsafe { libc::sem_wait(self.inner.get()) } < 0 {
            return Err(RuntimeError::SemaphoreFailure);
        }
        Ok(())
    }

    /// Increment, releasing one blocked waiter if any.
    pub fn post(&self) -> Result<(), RuntimeError> {
        if unsafe { libc::sem_post(self.inner.get()) } < 0 {
            return Err(RuntimeError::SemaphoreFailure);
        }
        Ok(())
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_destroy(self.inner.get()) };
    }
}
