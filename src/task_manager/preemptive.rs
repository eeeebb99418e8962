//! # Preemptive Task Scheduler
//!
//! This module implements the strand scheduler: a round-robin dispatcher
//! over stackful tasks, preempted by a wall-clock timer signal. Each task
//! owns a heap-allocated execution stack and a saved machine context; the
//! scheduler switches between tasks through the platform context facility.
//!
//! # Architecture Overview
//!
//! Task records live in an arena of boxed slots. Two index-linked FIFO
//! queues order them: the ready queue of runnable tasks and the blocked
//! queue of tasks suspended in [`join`]. A single `current` slot names the
//! task executing right now, and a single `pending_free` slot holds a
//! terminated task whose stack is reclaimed at the next dispatch, because
//! a task cannot free the stack it is running on.
//!
//! ## Task State Machine
//!
//! ```text
//! [Ready] --dispatch--> [Running] --yield / preempt tick--> [Ready]
//!                          |    \
//!                       join()   done() or entry returns
//!                          |          \
//!                          v           v
//!                      [Waiting] --wake_joiners--> [Ready]
//!                                      [Terminated] --next dispatch--> freed
//! ```
//!
//! ## Control Transfer
//!
//! The scheduler context always restarts the dispatch routine from the top
//! of its dedicated stack; dispatch never returns normally. Control reaches
//! it four ways: the spawn/deinit swap from the caller, a cooperative
//! yield/join swap, the `done` restore, and the preemption tick. Dispatch
//! arms a one-shot preemption slice before resuming a task; the slice is
//! re-armed nowhere else.
//!
//! # Safety Considerations
//!
//! Every mutation of scheduler state happens either inside dispatch (the
//! timer is armed only on the way out) or inside an API call that disarms
//! the timer as its first action. The tick handler itself only runs while
//! a task runs, when the queues are quiescent. One in-flight tick can
//! survive a disarm; the handler's no-current branch restores the scheduler
//! context without saving anything, matching the race window documented for
//! the preemption handler.
//!
//! # See Also
//!
//! - [`crate::task_manager::task`] - the task record
//! - [`crate::timer`] - the preemption slice
//! - [`crate::sync::CooperativeMutex`] - parks tasks through this scheduler
//!
//! [`join`]: PreemptiveTaskManager::join

use std::collections::VecDeque;

use crate::errors::RuntimeError;
use crate::ports::posix::context::{Context, SCHEDULER_STACK_SIZE, TASK_STACK_SIZE};
use crate::ports::posix::hardware_timer;
use crate::task_manager::queue::TaskQueue;
use crate::task_manager::task::{Task, TaskEntryFunctionType, TaskIdType, TaskStatusType};
use crate::task_manager::TASK_MANAGER;
use crate::timer::Timer;

/// Preemptive task manager: arena, queues, execution slots and the contexts
/// anchoring the scheduler and the initializing caller.
pub struct PreemptiveTaskManager {
    /// Arena owning every live task record; queues link records by index.
    pub(crate) tasks: Vec<Option<Box<Task>>>,
    /// Vacated arena slots available for reuse.
    free_slots: Vec<usize>,
    /// Tasks eligible to run, strict FIFO across all wake sources.
    ready_queue: TaskQueue,
    /// Tasks suspended in `join`, awaiting the termination of an id.
    blocked_queue: TaskQueue,
    /// Arena slot of the task presently executing, absent while control is
    /// inside the scheduler itself.
    current: Option<usize>,
    /// Terminated task whose stack is reclaimed at the next dispatch.
    pending_free: Option<usize>,
    /// Context whose entry point is the dispatch routine.
    scheduler_ctx: Option<Box<Context>>,
    /// Owns the dispatch stack referenced by `scheduler_ctx`.
    _scheduler_stack: Option<Box<[u8]>>,
    /// Context of the code that called `init`; the final exit destination.
    caller_ctx: Option<Box<Context>>,
    /// Next id to assign; doubles as the created-count reported at deinit.
    next_task_id: TaskIdType,
}

/// First frame of every task: run the entry, then terminate the task if it
/// falls off the end.
extern "C" fn task_entry_trampoline() {
    let entry = unsafe {
        let slot = TASK_MANAGER
            .current
            .expect("Error: trampoline: no current task.");
        TASK_MANAGER.tasks[slot]
            .as_ref()
            .expect("Error: trampoline: vacant current slot.")
            .entry
    };
    entry();
    PreemptiveTaskManager::done();
}

/// Entry point of the scheduler context. Restarted from the top on every
/// entry; never returns normally.
extern "C" fn dispatch_entry() {
    unsafe {
        // Reclaim the stack a terminated task could not free itself.
        if let Some(slot) = TASK_MANAGER.pending_free.take() {
            PreemptiveTaskManager::destroy_task(slot);
        }

        // Nothing ready: hand control back to the init caller. A task
        // parked in `current` by a yield survives for the next dispatch.
        if TASK_MANAGER.ready_queue.is_empty() {
            log::debug!("dispatch: no ready tasks, resuming caller");
            let caller = TASK_MANAGER
                .caller_ctx
                .as_ref()
                .expect("Error: dispatch: missing caller context.");
            let err = Context::set(&**caller);
            panic!("Error: dispatch: {}", err);
        }

        let slot = TASK_MANAGER
            .ready_queue
            .pop(&mut TASK_MANAGER.tasks)
            .expect("Error: dispatch: empty ready queue.");

        // A yielding task leaves itself in `current`; requeue it at the
        // tail now that a successor exists.
        if let Some(prev) = TASK_MANAGER.current.take() {
            let prev_task = TASK_MANAGER.tasks[prev]
                .as_mut()
                .expect("Error: dispatch: vacant current slot.");
            prev_task.status = TaskStatusType::Ready;
            log::debug!("dispatch: task {} back to ready", prev_task.id);
            TASK_MANAGER.ready_queue.push(&mut TASK_MANAGER.tasks, prev);
        }

        let task = TASK_MANAGER.tasks[slot]
            .as_mut()
            .expect("Error: dispatch: vacant ready slot.");
        task.status = TaskStatusType::Running;
        log::debug!("dispatch: task {} is running", task.id);
        let ctx = &task.context as *const Context;
        TASK_MANAGER.current = Some(slot);

        // One-shot preemption slice; re-armed only here.
        Timer::arm_slice(preempt_tick);

        let err = Context::set(ctx);
        panic!("Error: dispatch: {}", err);
    }
}

/// Preemption tick. Runs on the stack of whatever task was executing.
extern "C" fn preempt_tick(_sig: i32) {
    unsafe {
        // Stray tick after deinit: nothing to do.
        if TASK_MANAGER.scheduler_ctx.is_none() {
            return;
        }

        // The interval timer signals the process, not a thread; task stacks
        // live on the thread that called init.
        if !hardware_timer::on_runtime_thread() {
            hardware_timer::forward_to_runtime_thread();
            return;
        }

        let sched = TASK_MANAGER
            .scheduler_ctx
            .as_mut()
            .expect("Error: preempt: missing scheduler context.")
            .as_mut() as *mut Context;

        match TASK_MANAGER.current.take() {
            Some(slot) => {
                let task = TASK_MANAGER.tasks[slot]
                    .as_mut()
                    .expect("Error: preempt: vacant current slot.");
                log::debug!("preempt: task {} back to ready", task.id);
                task.status = TaskStatusType::Ready;
                let ctx = &mut task.context as *mut Context;
                TASK_MANAGER.ready_queue.push(&mut TASK_MANAGER.tasks, slot);
                // Saves the task mid-handler; dispatch resumes it later and
                // execution falls out of the handler back into the task.
                let _ = Context::swap(ctx, sched);
            }
            None => {
                // Tick raced a scheduler-side transition; restart dispatch
                // without saving anywhere.
                let _ = Context::set(sched);
            }
        }
    }
}

fn alloc_stack(size: usize) -> Result<Box<[u8]>, RuntimeError> {
    let mut stack = Vec::new();
    stack
        .try_reserve_exact(size)
        .map_err(|_| RuntimeError::OutOfMemory)?;
    stack.resize(size, 0);
    Ok(stack.into_boxed_slice())
}

impl PreemptiveTaskManager {
    /// Create a new, uninitialized task manager.
    pub(crate) const fn new() -> PreemptiveTaskManager {
        PreemptiveTaskManager {
            tasks: Vec::new(),
            free_slots: Vec::new(),
            ready_queue: TaskQueue::new(),
            blocked_queue: TaskQueue::new(),
            current: None,
            pending_free: None,
            scheduler_ctx: None,
            _scheduler_stack: None,
            caller_ctx: None,
            next_task_id: 0,
        }
    }

    /// Initialize the runtime on the calling OS thread, starting a fresh
    /// lifecycle: empty arena, id counter at 0.
    ///
    /// Must precede any other call. Allocation or context failures leave
    /// the runtime unusable.
    pub fn init() -> Result<(), RuntimeError> {
        crate::logger::init();
        hardware_timer::register_runtime_thread();
        unsafe {
            TASK_MANAGER = PreemptiveTaskManager::new();

            let mut stack = alloc_stack(SCHEDULER_STACK_SIZE)?;
            let mut ctx = Box::new(Context::zeroed());
            ctx.capture()?;
            ctx.make(dispatch_entry, &mut stack, std::ptr::null_mut());

            let mut caller = Box::new(Context::zeroed());
            caller.capture()?;

            TASK_MANAGER.scheduler_ctx = Some(ctx);
            TASK_MANAGER._scheduler_stack = Some(stack);
            TASK_MANAGER.caller_ctx = Some(caller);
        }
        log::debug!("init: runtime ready");
        Ok(())
    }

    /// Run every ready task to completion, then shut the runtime down.
    ///
    /// Tasks still parked in `join` or on a cooperative lock when the ready
    /// queue drains are reclaimed with a warning; every record created
    /// since `init` is released by the time this returns. The runtime may
    /// be initialized again afterwards.
    pub fn deinit() {
        unsafe {
            // Run all ready tasks before exit.
            while !TASK_MANAGER.ready_queue.is_empty() {
                Timer::disarm();
                let caller = TASK_MANAGER
                    .caller_ctx
                    .as_mut()
                    .expect("Error: deinit: runtime is not initialized.")
                    .as_mut() as *mut Context;
                let sched = TASK_MANAGER
                    .scheduler_ctx
                    .as_ref()
                    .expect("Error: deinit: missing scheduler context.")
                    .as_ref() as *const Context;
                let _ = Context::swap(caller, sched);
            }

            // No task will run again; stop the tick before tearing down.
            Timer::uninstall();

            // Reclaim stragglers still parked in join or lock queues.
            TASK_MANAGER.current = None;
            for slot in 0..TASK_MANAGER.tasks.len() {
                if let Some(task) = TASK_MANAGER.tasks[slot].as_ref() {
                    log::warn!(
                        "deinit: task {} never terminated (status {:?}), reclaiming",
                        task.id,
                        task.status
                    );
                    Self::destroy_task(slot);
                }
            }
            TASK_MANAGER.blocked_queue = TaskQueue::new();

            log::info!(
                "deinit: total of {} tasks created",
                TASK_MANAGER.next_task_id
            );

            TASK_MANAGER.scheduler_ctx = None;
            TASK_MANAGER._scheduler_stack = None;
            TASK_MANAGER.caller_ctx = None;
        }
    }

    /// Create a task around `entry` and let the runtime run it (and others)
    /// before returning the new task's id.
    ///
    /// Called from the code that invoked `init`, never from a running task.
    /// The spawned task may run to completion before the caller observes
    /// the id; a parent that wants to capture the id before the child
    /// terminates should have the child yield first.
    pub fn spawn(entry: TaskEntryFunctionType) -> Result<TaskIdType, RuntimeError> {
        Timer::disarm();
        unsafe {
            let slot = Self::create_task(entry)?;
            let id = TASK_MANAGER.tasks[slot]
                .as_ref()
                .expect("Error: spawn: vacant new slot.")
                .id;
            TASK_MANAGER.ready_queue.push(&mut TASK_MANAGER.tasks, slot);

            let sched = TASK_MANAGER
                .scheduler_ctx
                .as_ref()
                .expect("Error: spawn: runtime is not initialized.")
                .as_ref() as *const Context;
            // Unconditionally the init caller's context: a task yielded
            // into `current` keeps its own saved state untouched and is
            // requeued by dispatch.
            let caller = TASK_MANAGER
                .caller_ctx
                .as_mut()
                .expect("Error: spawn: runtime is not initialized.")
                .as_mut() as *mut Context;
            Context::swap(caller, sched)?;
            Ok(id)
        }
    }

    /// Surrender the processor; the caller re-enters the ready queue at the
    /// tail and resumes after every task ahead of it has had a turn.
    pub fn yield_now() {
        Timer::disarm();
        unsafe {
            let Some(cur) = TASK_MANAGER.current else {
                panic!("Error: yield: no running task.");
            };
            let task = TASK_MANAGER.tasks[cur]
                .as_mut()
                .expect("Error: yield: vacant current slot.");
            log::debug!("yield: task {} gives up the processor", task.id);
            let from = &mut task.context as *mut Context;
            let sched = TASK_MANAGER
                .scheduler_ctx
                .as_ref()
                .expect("Error: yield: runtime is not initialized.")
                .as_ref() as *const Context;
            // `current` stays set; dispatch requeues it at the ready tail.
            let _ = Context::swap(from, sched);
        }
    }

    /// Terminate the calling task. Its stack is reclaimed at the next
    /// dispatch and every task joined on it is promoted to ready.
    pub fn done() -> ! {
        Timer::disarm();
        unsafe {
            let Some(cur) = TASK_MANAGER.current.take() else {
                panic!("Error: done: no running task.");
            };
            let task = TASK_MANAGER.tasks[cur]
                .as_mut()
                .expect("Error: done: vacant current slot.");
            task.status = TaskStatusType::Terminated;
            let done_id = task.id;
            log::debug!("done: task {} terminated", done_id);

            // The dying task cannot free the stack it is running on.
            TASK_MANAGER.pending_free = Some(cur);

            Self::wake_joiners(done_id);

            let sched = TASK_MANAGER
                .scheduler_ctx
                .as_ref()
                .expect("Error: done: runtime is not initialized.")
                .as_ref() as *const Context;
            // Restore, not swap: nothing may be saved onto this stack.
            let err = Context::set(sched);
            panic!("Error: done: {}", err);
        }
    }

    /// Block until the task with id `target_id` terminates, then return
    /// that id.
    ///
    /// No check is made that the target ever existed; joining an id that
    /// was never spawned blocks forever.
    pub fn join(target_id: TaskIdType) -> TaskIdType {
        Timer::disarm();
        unsafe {
            let Some(cur) = TASK_MANAGER.current.take() else {
                panic!("Error: join: no running task.");
            };
            let task = TASK_MANAGER.tasks[cur]
                .as_mut()
                .expect("Error: join: vacant current slot.");
            task.join_target = Some(target_id);
            task.status = TaskStatusType::Waiting;
            log::debug!("block: task {} waits for {}", task.id, target_id);
            let from = &mut task.context as *mut Context;
            TASK_MANAGER.blocked_queue.push(&mut TASK_MANAGER.tasks, cur);

            let sched = TASK_MANAGER
                .scheduler_ctx
                .as_ref()
                .expect("Error: join: runtime is not initialized.")
                .as_ref() as *const Context;
            let _ = Context::swap(from, sched);

            // Resumed after some task called done() with the awaited id.
            let slot = TASK_MANAGER
                .current
                .expect("Error: join: resumed with no current task.");
            let task = TASK_MANAGER.tasks[slot]
                .as_mut()
                .expect("Error: join: vacant resumed slot.");
            task.join_target = None;
            log::debug!("join: task {} joined with {}", task.id, target_id);
            target_id
        }
    }

    /// Number of tasks created since `init`, as reported by the `deinit`
    /// summary line.
    pub fn total_tasks_created() -> TaskIdType {
        unsafe { TASK_MANAGER.next_task_id }
    }

    /// Whether a task is executing right now (as opposed to the init
    /// caller).
    pub(crate) fn has_current() -> bool {
        unsafe { TASK_MANAGER.current.is_some() }
    }

    /// Park the running task on an external wait queue (cooperative lock).
    /// The caller must have disarmed preemption. Returns when the task is
    /// unparked.
    pub(crate) fn park_current(waiters: &mut VecDeque<usize>) {
        unsafe {
            let Some(cur) = TASK_MANAGER.current.take() else {
                panic!("Error: lock: no running task.");
            };
            let task = TASK_MANAGER.tasks[cur]
                .as_mut()
                .expect("Error: lock: vacant current slot.");
            task.status = TaskStatusType::Waiting;
            log::debug!("block: task {} waits for a lock", task.id);
            let from = &mut task.context as *mut Context;
            waiters.push_back(cur);

            let sched = TASK_MANAGER
                .scheduler_ctx
                .as_ref()
                .expect("Error: lock: runtime is not initialized.")
                .as_ref() as *const Context;
            let _ = Context::swap(from, sched);
        }
    }

    /// Promote a parked task to the tail of the ready queue.
    pub(crate) fn unpark(slot: usize) {
        unsafe {
            let task = TASK_MANAGER.tasks[slot]
                .as_mut()
                .expect("Error: unlock: vacant waiter slot.");
            task.status = TaskStatusType::Ready;
            log::debug!("unblock: task {} unblocked by unlock", task.id);
            TASK_MANAGER.ready_queue.push(&mut TASK_MANAGER.tasks, slot);
        }
    }

    /// Re-arm a fresh preemption slice (cooperative-lock fast paths, which
    /// disarm without passing through dispatch).
    pub(crate) fn rearm_slice() {
        Timer::arm_slice(preempt_tick);
    }

    /// Walk the blocked queue once, promoting every task that awaited
    /// `done_id` and re-parking the rest.
    fn wake_joiners(done_id: TaskIdType) {
        unsafe {
            // Bounded walk: pop exactly the entries present at the start,
            // so re-parked non-matches are not revisited.
            let parked = TASK_MANAGER.blocked_queue.len();
            for _ in 0..parked {
                let slot = TASK_MANAGER
                    .blocked_queue
                    .pop(&mut TASK_MANAGER.tasks)
                    .expect("Error: unblock: blocked queue shrank mid-walk.");
                let task = TASK_MANAGER.tasks[slot]
                    .as_mut()
                    .expect("Error: unblock: vacant blocked slot.");
                if task.join_target == Some(done_id) {
                    task.status = TaskStatusType::Ready;
                    log::debug!(
                        "unblock: task {} unblocked after {} exited",
                        task.id,
                        done_id
                    );
                    TASK_MANAGER.ready_queue.push(&mut TASK_MANAGER.tasks, slot);
                } else {
                    TASK_MANAGER
                        .blocked_queue
                        .push(&mut TASK_MANAGER.tasks, slot);
                }
            }
        }
    }

    /// Allocate a record and stack for `entry` and place it in the arena.
    fn create_task(entry: TaskEntryFunctionType) -> Result<usize, RuntimeError> {
        unsafe {
            let stack = alloc_stack(TASK_STACK_SIZE)?;
            let id = TASK_MANAGER.next_task_id;
            let mut task = Box::new(Task {
                id,
                entry,
                context: Context::zeroed(),
                stack,
                status: TaskStatusType::Ready,
                join_target: None,
                link: None,
            });

            let sched = TASK_MANAGER
                .scheduler_ctx
                .as_mut()
                .expect("Error: spawn: runtime is not initialized.")
                .as_mut() as *mut Context;
            {
                // The record has its final address; capture in place.
                let Task { context, stack, .. } = &mut *task;
                context.capture()?;
                context.make(task_entry_trampoline, stack, sched);
            }

            TASK_MANAGER.next_task_id += 1;
            let slot = match TASK_MANAGER.free_slots.pop() {
                Some(slot) => {
                    TASK_MANAGER.tasks[slot] = Some(task);
                    slot
                }
                None => {
                    TASK_MANAGER.tasks.push(Some(task));
                    TASK_MANAGER.tasks.len() - 1
                }
            };
            log::debug!("spawn: task {} created", id);
            Ok(slot)
        }
    }

    /// Release a task's stack and record, returning its slot to the free
    /// list. Never called on the running task.
    fn destroy_task(slot: usize) {
        unsafe {
            let task = TASK_MANAGER.tasks[slot]
                .take()
                .expect("Error: destroy_task: vacant arena slot.");
            log::debug!("free: task {} released", task.id);
            drop(task);
            TASK_MANAGER.free_slots.push(slot);
        }
    }
}
