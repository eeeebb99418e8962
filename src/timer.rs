use crate::ports::posix::hardware_timer::{
    arm_timer, disarm_timer, uninstall_timer_handler, TickHandlerType,
};

/// Maximum wall-clock interval a task runs before preemption, in
/// milliseconds.
pub const SLICE_MS: u64 = 15;

/// The preemption timer driving the scheduler tick.
pub struct Timer;

impl Timer {
    /// Arm a one-shot tick one slice from now. A refused arm is logged and
    /// the runtime continues cooperatively until the next successful arm.
    pub(crate) fn arm_slice(handler: TickHandlerType) {
        if let Err(err) = arm_timer(SLICE_MS, handler) {
            log::warn!("timer: failed to arm preemption slice: {}", err);
        }
    }

    /// Cancel a pending tick.
    pub(crate) fn disarm() {
        disarm_timer();
    }

    /// Cancel a pending tick and drop the signal-handler installation.
    pub(crate) fn uninstall() {
        uninstall_timer_handler();
    }
}
