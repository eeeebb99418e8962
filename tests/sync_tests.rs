mod sync_tests {
    use lazy_static::lazy_static;
    use sequential_test::sequential;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strand::sync::{CooperativeMutex, Mutex};
    use strand::task_manager::TaskManager;

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

    lazy_static! {
        static ref COUNTER_LOCK: Mutex = Mutex::new().expect("semaphore init failed");
    }
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn increment_under_lock() {
        COUNTER_LOCK.lock().expect("lock failed");
        let value = COUNTER.load(Ordering::SeqCst);
        record(value);
        COUNTER.store(value + 1, Ordering::SeqCst);
        COUNTER_LOCK.unlock().expect("unlock failed");
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_mutex_counter_each_value_once() {
        reset_events();
        COUNTER.store(0, Ordering::SeqCst);
        TaskManager::init().expect("init failed");
        for _ in 0..3 {
            TaskManager::spawn(increment_under_lock).expect("spawn failed");
        }
        TaskManager::deinit();

        let mut seen = events();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(COUNTER.load(Ordering::SeqCst), 3);
    }

    static HANDOFF_LOCK: CooperativeMutex = CooperativeMutex::new();

    const TAG_HOLDER_LOCKED: usize = 10;
    const TAG_HOLDER_RESUMED: usize = 11;
    const TAG_HOLDER_UNLOCKED: usize = 12;
    const TAG_CONTENDER_STARTED: usize = 20;
    const TAG_CONTENDER_LOCKED: usize = 21;
    const TAG_CONTENDER_UNLOCKED: usize = 22;

    fn holder() {
        HANDOFF_LOCK.lock();
        record(TAG_HOLDER_LOCKED);
        // Yield while holding: the contender must park, not deadlock.
        TaskManager::yield_now();
        record(TAG_HOLDER_RESUMED);
        HANDOFF_LOCK.unlock();
        record(TAG_HOLDER_UNLOCKED);
        TaskManager::done();
    }

    fn contender() {
        record(TAG_CONTENDER_STARTED);
        HANDOFF_LOCK.lock();
        record(TAG_CONTENDER_LOCKED);
        HANDOFF_LOCK.unlock();
        record(TAG_CONTENDER_UNLOCKED);
        TaskManager::done();
    }

    #[test]
    #[sequential]
    fn test_cooperative_mutex_parks_and_hands_off() {
        reset_events();
        TaskManager::init().expect("init failed");
        TaskManager::spawn(holder).expect("spawn failed");
        TaskManager::spawn(contender).expect("spawn failed");
        TaskManager::deinit();

        assert_eq!(
            events(),
            vec![
                TAG_HOLDER_LOCKED,
                TAG_CONTENDER_STARTED,
                TAG_HOLDER_RESUMED,
                TAG_HOLDER_UNLOCKED,
                TAG_CONTENDER_LOCKED,
                TAG_CONTENDER_UNLOCKED,
            ]
        );
    }

    static UNCONTENDED_LOCK: CooperativeMutex = CooperativeMutex::new();

    #[test]
    #[sequential]
    fn test_cooperative_mutex_uncontended_outside_tasks() {
        // The fast path takes and releases the lock without a scheduler,
        // so init-caller code can use it around spawn batches.
        UNCONTENDED_LOCK.lock();
        UNCONTENDED_LOCK.unlock();
        UNCONTENDED_LOCK.lock();
        UNCONTENDED_LOCK.unlock();
    }
}
