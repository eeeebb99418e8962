use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::RuntimeError;

/// Signature of the preemption tick callback.
pub type TickHandlerType = extern "C" fn(libc::c_int);

/// OS thread that owns the runtime. The interval timer signals the process,
/// not a thread, so stray deliveries are forwarded here.
static RUNTIME_THREAD: AtomicUsize = AtomicUsize::new(0);

/// Record the calling thread as the one that owns the runtime.
pub fn register_runtime_thread() {
    RUNTIME_THREAD.store(unsafe { libc::pthread_self() } as usize, Ordering::Release);
}

/// Whether the calling thread is the registered runtime thread.
pub fn on_runtime_thread() -> bool {
    unsafe { libc::pthread_self() as usize == RUNTIME_THREAD.load(Ordering::Acquire) }
}

/// Redirect a tick that landed on a foreign thread to the runtime thread.
pub fn forward_to_runtime_thread() {
    let thread = RUNTIME_THREAD.load(Ordering::Acquire) as libc::pthread_t;
    if thread != 0 {
        unsafe { libc::pthread_kill(thread, libc::SIGALRM) };
    }
}

/// Install `handler` for the alarm signal and arm a one-shot timer `ms`
/// milliseconds from now.
///
/// The action is installed restartable and non-deferring: the timer is
/// one-shot and re-armed only from the scheduler, so the handler cannot
/// re-enter itself, and a task resumed after being saved mid-handler keeps
/// a clean signal mask.
pub fn arm_timer(ms: u64, handler: TickHandlerType) -> Result<(), RuntimeError> {
    unsafe {
        let mut sa: libc::sigaction = mem::zeroed();
        sa.sa_sigaction = handler as usize;
        sa.sa_flags = libc::SA_RESTART | libc::SA_NODEFER;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(libc::SIGALRM, &sa, ptr::null_mut()) < 0 {
            return Err(RuntimeError::TimerFailure);
        }

        let mut slice: libc::itimerval = mem::zeroed();
        slice.it_value.tv_sec = (ms / 1000) as libc::time_t;
        slice.it_value.tv_usec = ((ms % 1000) * 1000) as libc::suseconds_t;
        if libc::setitimer(libc::ITIMER_REAL, &slice, ptr::null_mut()) < 0 {
            return Err(RuntimeError::TimerFailure);
        }
    }
    Ok(())
}

/// Cancel a pending tick, leaving the handler installed.
pub fn disarm_timer() {
    unsafe {
        let slice: libc::itimerval = mem::zeroed();
        libc::setitimer(libc::ITIMER_REAL, &slice, ptr::null_mut());
    }
}

/// Cancel a pending tick and drop the handler. The alarm is ignored, not
/// defaulted: a stray tick after shutdown must not terminate the process.
pub fn uninstall_timer_handler() {
    disarm_timer();
    unsafe {
        let mut sa: libc::sigaction = mem::zeroed();
        sa.sa_sigaction = libc::SIG_IGN;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGALRM, &sa, ptr::null_mut());
    }
}
