//! FFI bindings for Study Sentinel
//!
//! This module exposes the distraction monitor through C-compatible functions so
//! an external capture loop (OpenCV, a mobile camera pipeline) can drive it.
//! Returned strings are allocated here and must be freed with `sentinel_free_string`.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use crate::config::MonitorConfig;
use crate::monitor::DistractionMonitor;
use crate::types::Timestamp;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn to_json_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Opaque handle to a DistractionMonitor
pub struct SentinelMonitorHandle {
    monitor: DistractionMonitor,
}

/// Create a monitor with the given threshold in seconds.
///
/// # Safety
/// - Returns a pointer that must be freed with `sentinel_monitor_free`.
/// - Returns NULL for a non-positive or non-finite threshold; call
///   `sentinel_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn sentinel_monitor_new(threshold_secs: f64) -> *mut SentinelMonitorHandle {
    clear_last_error();

    match DistractionMonitor::new(&MonitorConfig::with_threshold_secs(threshold_secs)) {
        Ok(monitor) => Box::into_raw(Box::new(SentinelMonitorHandle { monitor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a monitor.
///
/// # Safety
/// - `handle` must be NULL or a pointer returned by `sentinel_monitor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn sentinel_monitor_free(handle: *mut SentinelMonitorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Feed one frame's signal and return the Observation as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `sentinel_monitor_new`.
/// - `now_secs` is seconds since the session started, from a monotonic clock.
/// - Returns a newly allocated string that must be freed with `sentinel_free_string`.
/// - Returns NULL on error; call `sentinel_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn sentinel_monitor_observe(
    handle: *mut SentinelMonitorHandle,
    studying: bool,
    now_secs: f64,
) -> *mut c_char {
    clear_last_error();

    let Some(handle) = handle.as_mut() else {
        set_last_error("Invalid monitor handle");
        return ptr::null_mut();
    };

    let now = match Timestamp::try_from_secs_f64(now_secs) {
        Ok(now) => now,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let observation = handle.monitor.observe(studying, now);
    to_json_cstr(&observation)
}

/// Return the monitor's current state as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `sentinel_monitor_new`.
/// - Returns a newly allocated string that must be freed with `sentinel_free_string`.
#[no_mangle]
pub unsafe extern "C" fn sentinel_monitor_state(handle: *const SentinelMonitorHandle) -> *mut c_char {
    clear_last_error();

    let Some(handle) = handle.as_ref() else {
        set_last_error("Invalid monitor handle");
        return ptr::null_mut();
    };

    to_json_cstr(&handle.monitor.state())
}

/// Drop any distraction run in progress.
///
/// # Safety
/// - `handle` must be NULL or a valid pointer returned by `sentinel_monitor_new`.
#[no_mangle]
pub unsafe extern "C" fn sentinel_monitor_reset(handle: *mut SentinelMonitorHandle) {
    if let Some(handle) = handle.as_mut() {
        handle.monitor.reset();
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// - `s` must be NULL or a pointer returned by one of this library's functions.
#[no_mangle]
pub unsafe extern "C" fn sentinel_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Get the last error message, or NULL if the last call succeeded.
///
/// # Safety
/// - The returned pointer is owned by the library and valid until the next call
///   on the same thread. Do not free it.
#[no_mangle]
pub unsafe extern "C" fn sentinel_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}
