mod task_manager_tests {
    use sequential_test::sequential;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strand::task_manager::TaskManager;

    // Task entries are plain `fn()`, so observations go through statics.
    // The recorder is lock-free: a task can be preempted at any instruction
    // and must never park on a host mutex another task still needs.
    const MAX_EVENTS: usize = 32;
    static EVENTS: [AtomicUsize; MAX_EVENTS] = [const { AtomicUsize::new(0) }; MAX_EVENTS];
    static EVENT_COUNT: AtomicUsize = AtomicUsize::new(0);

    fn record(tag: usize) {
        let index = EVENT_COUNT.fetch_add(1, Ordering::SeqCst);
        EVENTS[index].store(tag, Ordering::SeqCst);
    }

    fn reset_events() {
        EVENT_COUNT.store(0, Ordering::SeqCst);
    }

    fn events() -> Vec<usize> {
        let count = EVENT_COUNT.load(Ordering::SeqCst);
        EVENTS[..count]
            .iter()
            .map(|event| event.load(Ordering::SeqCst))
            .collect()
    }

    const TAG_A: usize = 1;
    const TAG_B: usize = 2;

    fn alternating_a() {
        record(TAG_A);
        TaskManager::yield_now();
        record(TAG_A);
        TaskManager::done();
    }

    fn alternating_b() {
        record(TAG_B);
        TaskManager::yield_now();
        record(TAG_B);
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_cooperative_alternation() {
        reset_events();
        TaskManager::init().expect("init failed");
        TaskManager::spawn(alternating_a).expect("spawn failed");
        TaskManager::spawn(alternating_b).expect("spawn failed");
        TaskManager::deinit();
        assert_eq!(events(), vec![TAG_A, TAG_B, TAG_A, TAG_B]);
    }

    const TAG_TARGET_DONE: usize = 10;
    const TAG_JOINED: usize = 20;
    static JOIN_RESULT: AtomicUsize = AtomicUsize::new(usize::MAX);

    fn join_target() {
        // Yield first so the parent captures the id before we terminate.
        TaskManager::yield_now();
        record(TAG_TARGET_DONE);
        TaskManager::done();
    }

    fn joiner() {
        let joined = TaskManager::join(0);
        JOIN_RESULT.store(joined, Ordering::SeqCst);
        record(TAG_JOINED);
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_join_returns_after_target_done() {
        reset_events();
        JOIN_RESULT.store(usize::MAX, Ordering::SeqCst);
        TaskManager::init().expect("init failed");
        let target_id = TaskManager::spawn(join_target).expect("spawn failed");
        let joiner_id = TaskManager::spawn(joiner).expect("spawn failed");
        TaskManager::deinit();

        assert_eq!(target_id, 0);
        assert_eq!(joiner_id, 1);
        assert_eq!(JOIN_RESULT.load(Ordering::SeqCst), 0);
        // The joiner runs strictly after the target terminated.
        assert_eq!(events(), vec![TAG_TARGET_DONE, TAG_JOINED]);
    }

    fn first_run_1() {
        record(1);
        TaskManager::yield_now();
        TaskManager::done();
    }

    fn first_run_2() {
        record(2);
        TaskManager::yield_now();
        TaskManager::done();
    }

    fn first_run_3() {
        record(3);
        TaskManager::yield_now();
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_tasks_first_run_in_spawn_order() {
        reset_events();
        TaskManager::init().expect("init failed");
        let id1 = TaskManager::spawn(first_run_1).expect("spawn failed");
        let id2 = TaskManager::spawn(first_run_2).expect("spawn failed");
        let id3 = TaskManager::spawn(first_run_3).expect("spawn failed");
        TaskManager::deinit();

        // Ids are assigned monotonically from 0 in spawn order.
        assert_eq!((id1, id2, id3), (0, 1, 2));
        assert_eq!(events(), vec![1, 2, 3]);
    }

    const TAG_LONE_FIRST: usize = 31;
    const TAG_LONE_RESUMED: usize = 32;
    const TAG_SECOND: usize = 33;

    fn lone_yielder() {
        record(TAG_LONE_FIRST);
        // With no other task ready, this yield hands control back to the
        // caller while we stay parked in the scheduler's current slot.
        TaskManager::yield_now();
        record(TAG_LONE_RESUMED);
        TaskManager::done();
    }

    fn second_task() {
        record(TAG_SECOND);
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_task_yielded_into_empty_ready_resumes_after_next_spawn() {
        reset_events();
        TaskManager::init().expect("init failed");
        TaskManager::spawn(lone_yielder).expect("spawn failed");
        // This spawn must not disturb the yielded task's saved context;
        // the dispatcher requeues it and it resumes where it stopped.
        TaskManager::spawn(second_task).expect("spawn failed");
        TaskManager::deinit();
        assert_eq!(events(), vec![TAG_LONE_FIRST, TAG_SECOND, TAG_LONE_RESUMED]);
        assert_eq!(TaskManager::total_tasks_created(), 2);
    }

    fn immediate_done() {
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_immediate_done_frees_safely() {
        TaskManager::init().expect("init failed");
        let id = TaskManager::spawn(immediate_done).expect("spawn failed");
        TaskManager::deinit();
        assert_eq!(id, 0);
        assert_eq!(TaskManager::total_tasks_created(), 1);
    }

    fn natural_return() {
        record(7);
        // No done(): falling off the end must terminate the task too.
    }

    #[test]
    #[sequential]
    fn test_entry_return_terminates_task() {
        reset_events();
        TaskManager::init().expect("init failed");
        TaskManager::spawn(natural_return).expect("spawn failed");
        TaskManager::deinit();
        assert_eq!(events(), vec![7]);
        assert_eq!(TaskManager::total_tasks_created(), 1);
    }

    static TERMINATED: AtomicUsize = AtomicUsize::new(0);

    fn yield_three_times() {
        for _ in 0..3 {
            TaskManager::yield_now();
        }
        TERMINATED.fetch_add(1, Ordering::SeqCst);
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_deinit_drains_all_tasks() {
        TERMINATED.store(0, Ordering::SeqCst);
        TaskManager::init().expect("init failed");
        for _ in 0..5 {
            TaskManager::spawn(yield_three_times).expect("spawn failed");
        }
        TaskManager::deinit();
        assert_eq!(TERMINATED.load(Ordering::SeqCst), 5);
        assert_eq!(TaskManager::total_tasks_created(), 5);
    }

    const TAG_BEFORE_LOST_JOIN: usize = 5;
    const TAG_AFTER_LOST_JOIN: usize = 6;

    fn waits_forever() {
        record(TAG_BEFORE_LOST_JOIN);
        TaskManager::join(999);
        record(TAG_AFTER_LOST_JOIN);
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_deinit_reclaims_blocked_stragglers() {
        reset_events();
        TaskManager::init().expect("init failed");
        TaskManager::spawn(waits_forever).expect("spawn failed");
        TaskManager::spawn(immediate_done).expect("spawn failed");
        // The waiter can never wake; deinit must still return and reclaim
        // its record.
        TaskManager::deinit();
        assert_eq!(events(), vec![TAG_BEFORE_LOST_JOIN]);
        assert_eq!(TaskManager::total_tasks_created(), 2);
    }

    #[test]
    #[sequential]
    fn test_runtime_restarts_after_deinit() {
        TaskManager::init().expect("init failed");
        assert_eq!(TaskManager::spawn(immediate_done).expect("spawn failed"), 0);
        TaskManager::deinit();

        // A fresh lifecycle assigns ids from 0 again.
        TaskManager::init().expect("init failed");
        assert_eq!(TaskManager::spawn(immediate_done).expect("spawn failed"), 0);
        TaskManager::deinit();
        assert_eq!(TaskManager::total_tasks_created(), 1);
    }
}
