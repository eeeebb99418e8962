use std::mem;

use crate::errors::RuntimeError;

/// Execution stack size for each task: 100x the platform's default signal
/// stack.
pub const TASK_STACK_SIZE: usize = 100 * libc::SIGSTKSZ;

/// The dispatch routine is shallow; a few signal stacks are plenty.
pub const SCHEDULER_STACK_SIZE: usize = 4 * libc::SIGSTKSZ;

/// Saved machine context: callee-saved registers, stack pointer and signal
/// mask, wrapped over the platform `ucontext_t`.
///
/// A captured context may contain pointers into itself and must not move
/// between being saved and being resumed; records holding one are kept
/// boxed for their whole lifetime.
#[repr(C)]
pub struct Context {
    inner: libc::ucontext_t,
}

impl Context {
    /// A blank context. Call [`capture`](Context::capture) before first use,
    /// after the containing record has reached its final address.
    pub(crate) fn zeroed() -> Context {
        Context {
            inner: unsafe { mem::zeroed() },
        }
    }

    /// Save the calling environment into this context, with an empty signal
    /// mask.
    pub(crate) fn capture(&mut self) -> Result<(), RuntimeError> {
        if unsafe { libc::getcontext(&mut self.inner) } < 0 {
            return Err(RuntimeError::ContextFailure);
        }
        unsafe { libc::sigemptyset(&mut self.inner.uc_sigmask) };
        Ok(())
    }

    /// Rebuild a captured context to begin execution at `entry` on `stack`,
    /// falling through to `link` if `entry` ever returns.
    pub(crate) fn make(&mut self, entry: extern "C" fn(), stack: &mut [u8], link: *mut Context) {
        self.inner.uc_link = link as *mut libc::ucontext_t;
        self.inner.uc_stack.ss_sp = stack.as_mut_ptr() as *mut libc::c_void;
        self.inner.uc_stack.ss_size = stack.len();
        self.inner.uc_stack.ss_flags = 0;
        unsafe { libc::makecontext(&mut self.inner, entry, 0) };
    }

    /// Save the running environment into `from` and resume `to`. Returns
    /// (with `Ok`) once something resumes `from` again.
    ///
    /// # Safety
    ///
    /// Both pointers must refer to live contexts that stay pinned until
    /// resumed.
    pub(crate) unsafe fn swap(from: *mut Context, to: *const Context) -> Result<(), RuntimeError> {
        if libc::swapcontext(&mut (*from).inner, &(*to).inner) < 0 {
            return Err(RuntimeError::ContextFailure);
        }
        Ok(())
    }

    /// Resume `to` without saving the calling environment. Returns only if
    /// the platform refused the restore.
    ///
    /// # Safety
    ///
    /// `to` must refer to a live, pinned context.
    pub(crate) unsafe fn set(to: *const Context) -> RuntimeError {
        libc::setcontext(&(*to).inner);
        RuntimeError::ContextFailure
    }
}
