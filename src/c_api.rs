use std::os::raw::{c_int, c_longlong};

use crate::errors::RuntimeError;
use crate::sync::Mutex;
use crate::task_manager::{TaskEntryFunctionType, TaskIdType, TaskManager};

#[no_mangle]
pub extern "C" fn init() -> c_int {
    match TaskManager::init() {
        Ok(()) => 1,
        Err(_) => -1,
    }
}

#[no_mangle]
pub extern "C" fn deinit() {
    TaskManager::deinit()
}

#[no_mangle]
pub extern "C" fn spawn(entry: TaskEntryFunctionType) -> c_longlong {
    match TaskManager::spawn(entry) {
        Ok(id) => id as c_longlong,
        Err(_) => -1,
    }
}

#[export_name = "yield"]
pub extern "C" fn yield_task() {
    TaskManager::yield_now()
}

#[no_mangle]
pub extern "C" fn done() -> ! {
    TaskManager::done()
}

#[no_mangle]
pub extern "C" fn join(target_id: c_longlong) -> c_longlong {
    TaskManager::join(target_id as TaskIdType) as c_longlong
}

#[no_mangle]
pub extern "C" fn lock_init(l: *mut Mutex) -> c_int {
    if l.is_null() {
        log::error!("lock_init: {}", RuntimeError::NullArgument);
        return -1;
    }
    match Mutex::new() {
        Ok(mutex) => {
            unsafe { l.write(mutex) };
            0
        }
        Err(_) => -1,
    }
}

#[no_mangle]
pub extern "C" fn lock_deinit(l: *mut Mutex) -> c_int {
    if l.is_null() {
        log::error!("lock_deinit: {}", RuntimeError::NullArgument);
        return -1;
    }
    unsafe { std::ptr::drop_in_place(l) };
    0
}

#[no_mangle]
pub extern "C" fn lock(l: *mut Mutex) -> c_int {
    if l.is_null() {
        log::error!("lock: {}", RuntimeError::NullArgument);
        return -1;
    }
    match unsafe { &*l }.lock() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

#[no_mangle]
pub extern "C" fn unlock(l: *mut Mutex) -> c_int {
    if l.is_null() {
        log::error!("unlock: {}", RuntimeError::NullArgument);
        return -1;
    }
    match unsafe { &*l }.unlock() {
        Ok(()) => 0,
        Err(_) => -1,
    }
}
