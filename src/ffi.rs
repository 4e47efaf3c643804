//! FFI bindings for Markerscope
//!
//! This module provides C-compatible functions for driving an analysis session
//! from a host player. The host owns the object detector: on every clock update
//! it passes the detections for the current frame as JSON.
//!
//! All strings are null-terminated. Returned strings are allocated and must be
//! freed by the caller using `mscope_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::adapters::{FrameSnapshot, ObjectDetector};
use crate::config::AnalysisConfig;
use crate::error::{CaptureError, DetectorError};
use crate::markers::visible_markers;
use crate::pipeline::analyze_trace;
use crate::session::{AnalysisSession, TickOutcome};
use crate::types::{Detection, Marker};

/// Clock update did nothing
pub const MSCOPE_IGNORED: i32 = 0;
/// A frame was sampled and scored
pub const MSCOPE_SAMPLED: i32 = 1;
/// The session completed; fetch the report with `mscope_session_report`
pub const MSCOPE_COMPLETED: i32 = 2;
/// A sample was due but the host had no frame
pub const MSCOPE_SKIPPED: i32 = 3;
/// Call failed; see `mscope_last_error`
pub const MSCOPE_ERROR: i32 = -1;

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

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn status_code(outcome: &TickOutcome) -> i32 {
    match outcome {
        TickOutcome::Sampled(_) => MSCOPE_SAMPLED,
        TickOutcome::Completed(_) => MSCOPE_COMPLETED,
        TickOutcome::Skipped => MSCOPE_SKIPPED,
        TickOutcome::Ignored | TickOutcome::Dropped | TickOutcome::SampleDue(_) => MSCOPE_IGNORED,
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Replay a detection trace (NDJSON or JSON array) and return the report JSON.
///
/// # Safety
/// - `trace` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `mscope_free_string`.
/// - Returns NULL on error; call `mscope_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mscope_analyze_trace(trace: *const c_char) -> *mut c_char {
    clear_last_error();

    let trace_str = match cstr_to_string(trace) {
        Some(s) => s,
        None => {
            set_last_error("Invalid trace string pointer");
            return ptr::null_mut();
        }
    };

    match analyze_trace(&trace_str) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Session API
// ============================================================================

/// Opaque handle to an AnalysisSession
pub struct SessionHandle {
    session: AnalysisSession,
}

/// Create a session. `config_json` may be NULL for the defaults.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `mscope_session_free`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_new(config_json: *const c_char) -> *mut SessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        AnalysisConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match AnalysisConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match AnalysisSession::new(config) {
        Ok(session) => Box::into_raw(Box::new(SessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_free(session: *mut SessionHandle) {
    if !session.is_null() {
        drop(Box::from_raw(session));
    }
}

/// Report the outcome of the host's detector load.
///
/// `loaded` non-zero arms the session normally; zero arms it degraded with
/// `reason` (may be NULL) as the explanation.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`.
/// - `reason` must be NULL or a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_detector_loaded(
    session: *mut SessionHandle,
    loaded: i32,
    reason: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return MSCOPE_ERROR;
    }
    let handle = &mut *session;

    let result: Result<Box<dyn ObjectDetector>, DetectorError> = if loaded != 0 {
        // Detections arrive with each clock update instead
        Ok(Box::new(
            |_: &FrameSnapshot| -> Result<Vec<Detection>, DetectorError> { Ok(Vec::new()) },
        ))
    } else {
        let reason = cstr_to_string(reason).unwrap_or_else(|| "detector failed to load".to_string());
        Err(DetectorError::LoadFailed(reason))
    };

    match handle.session.load_detector(move || result) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            MSCOPE_ERROR
        }
    }
}

/// Player started playing.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_play(session: *mut SessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return MSCOPE_ERROR;
    }

    match (*session).session.play() {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            MSCOPE_ERROR
        }
    }
}

/// Player paused.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_pause(session: *mut SessionHandle) {
    if !session.is_null() {
        (*session).session.pause();
    }
}

/// Player reached the end. Returns `MSCOPE_COMPLETED` if this produced the report.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_ended(session: *mut SessionHandle) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return MSCOPE_ERROR;
    }

    match (*session).session.ended() {
        Some(_) => MSCOPE_COMPLETED,
        None => MSCOPE_IGNORED,
    }
}

/// A new video was selected; the session resets to idle.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_select_video(session: *mut SessionHandle) {
    if !session.is_null() {
        (*session).session.select_video();
    }
}

/// Playback clock update with the detections for the frame on screen.
///
/// `detections_json` is a JSON array of detections, or NULL when the host
/// could not capture the frame. Returns one of the `MSCOPE_*` status codes.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`.
/// - `detections_json` must be NULL or a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_time_update(
    session: *mut SessionHandle,
    current_time: f64,
    duration: f64,
    detections_json: *const c_char,
) -> i32 {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return MSCOPE_ERROR;
    }
    let handle = &mut *session;

    let ticket = match handle.session.on_time_update(current_time, duration) {
        TickOutcome::SampleDue(ticket) => ticket,
        other => return status_code(&other),
    };

    let frame = if detections_json.is_null() {
        Err(CaptureError::Unavailable("host supplied no frame".to_string()))
    } else {
        let parsed = cstr_to_string(detections_json)
            .ok_or_else(|| "Invalid detections string pointer".to_string())
            .and_then(|json| {
                serde_json::from_str::<Vec<Detection>>(&json).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(detections) if handle.session.is_degraded() => {
                log::debug!("degraded session, ignoring {} host detections", detections.len());
                Ok(Vec::new())
            }
            Ok(detections) => Ok(detections),
            Err(msg) => {
                // The ticket must still be returned to clear the in-flight flag
                handle.session.complete_sample(
                    ticket,
                    Err(CaptureError::Unavailable(msg.clone())),
                );
                set_last_error(&msg);
                return MSCOPE_ERROR;
            }
        }
    };

    status_code(&handle.session.complete_sample(ticket, frame))
}

/// Markers visible at the last clock update, as a JSON array.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`.
/// - Returns a newly allocated string that must be freed with `mscope_free_string`.
/// - Returns NULL on error.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_visible_markers(session: *mut SessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    match serde_json::to_string((*session).session.visible_markers()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// The final report as JSON, or NULL if the session has not completed.
///
/// # Safety
/// - `session` must be a valid pointer returned by `mscope_session_new`.
/// - Returns a newly allocated string that must be freed with `mscope_free_string`.
/// - NULL with no last error means the report is not ready yet.
#[no_mangle]
pub unsafe extern "C" fn mscope_session_report(session: *mut SessionHandle) -> *mut c_char {
    clear_last_error();

    if session.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let Some(report) = (*session).session.report() else {
        return ptr::null_mut();
    };
    match serde_json::to_string(report) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Filter a JSON array of markers down to those visible at `current_time`.
///
/// # Safety
/// - `markers_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `mscope_free_string`.
/// - Returns NULL on error; call `mscope_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn mscope_visible_markers(
    markers_json: *const c_char,
    current_time: f64,
) -> *mut c_char {
    clear_last_error();

    let json = match cstr_to_string(markers_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid markers string pointer");
            return ptr::null_mut();
        }
    };

    let result = serde_json::from_str(&json)
        .and_then(|markers: Vec<Marker>| {
        serde_json::to_string(&visible_markers(&markers, current_time))
    });
    match result {
        Ok(out) => string_to_cstr(&out),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Markerscope functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Markerscope function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn mscope_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Markerscope call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn mscope_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Markerscope library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn mscope_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn centered_face_json() -> CString {
        CString::new(
            r#"[{"label": "face", "score": 0.95, "box": {"xmin": 270, "ymin": 190, "xmax": 370, "ymax": 290}}]"#,
        )
        .unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        mscope_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let session = mscope_session_new(ptr::null());
            assert!(!session.is_null());

            assert_eq!(mscope_session_detector_loaded(session, 1, ptr::null()), 0);
            assert_eq!(mscope_session_play(session), 0);

            let dets = centered_face_json();
            assert_eq!(
                mscope_session_time_update(session, 1.0, 10.0, dets.as_ptr()),
                MSCOPE_SAMPLED
            );
            assert!(mscope_session_report(session).is_null());
            assert!(mscope_last_error().is_null());

            let visible = take_string(mscope_session_visible_markers(session));
            assert!(visible.contains("eye-contact"));

            assert_eq!(
                mscope_session_time_update(session, 9.2, 10.0, dets.as_ptr()),
                MSCOPE_COMPLETED
            );
            let report: serde_json::Value =
                serde_json::from_str(&take_string(mscope_session_report(session))).unwrap();
            assert_eq!(report["eye_contact"]["score"], 100.0);
            assert_eq!(report["samples_analyzed"], 1);

            mscope_session_free(session);
        }
    }

    #[test]
    fn test_ffi_null_detections_skip_sample() {
        unsafe {
            let session = mscope_session_new(ptr::null());
            mscope_session_detector_loaded(session, 1, ptr::null());
            mscope_session_play(session);

            assert_eq!(
                mscope_session_time_update(session, 1.0, 10.0, ptr::null()),
                MSCOPE_SKIPPED
            );
            assert_eq!(mscope_session_ended(session), MSCOPE_IGNORED);

            mscope_session_free(session);
        }
    }

    #[test]
    fn test_ffi_degraded_session_ignores_detections() {
        unsafe {
            let session = mscope_session_new(ptr::null());
            let reason = CString::new("webgl unavailable").unwrap();
            assert_eq!(mscope_session_detector_loaded(session, 0, reason.as_ptr()), 0);
            mscope_session_play(session);

            let dets = centered_face_json();
            mscope_session_time_update(session, 1.0, 10.0, dets.as_ptr());
            assert_eq!(mscope_session_ended(session), MSCOPE_COMPLETED);

            let report: serde_json::Value =
                serde_json::from_str(&take_string(mscope_session_report(session))).unwrap();
            assert_eq!(report["eye_contact"]["score"], 0.0);
            assert_eq!(report["overall_risk"], "high");

            mscope_session_free(session);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let bad_config = CString::new(r#"{"sampling_interval_sec": 0}"#).unwrap();
            assert!(mscope_session_new(bad_config.as_ptr()).is_null());
            let error = CStr::from_ptr(mscope_last_error()).to_str().unwrap();
            assert!(error.contains("sampling_interval_sec"));

            let session = mscope_session_new(ptr::null());
            assert_eq!(mscope_session_play(session), MSCOPE_ERROR);
            assert!(!mscope_last_error().is_null());

            mscope_session_detector_loaded(session, 1, ptr::null());
            mscope_session_play(session);
            let garbage = CString::new("not json").unwrap();
            assert_eq!(
                mscope_session_time_update(session, 1.0, 10.0, garbage.as_ptr()),
                MSCOPE_ERROR
            );
            // The in-flight flag was released
            let dets = centered_face_json();
            assert_eq!(
                mscope_session_time_update(session, 2.0, 10.0, dets.as_ptr()),
                MSCOPE_SAMPLED
            );

            mscope_session_free(session);
        }
    }

    #[test]
    fn test_ffi_analyze_trace_and_marker_filter() {
        unsafe {
            let trace = CString::new(
                "{\"time\": 1.0, \"duration\": 10.0, \"detections\": [{\"label\": \"face\", \"score\": 0.95, \"box\": {\"xmin\": 270, \"ymin\": 190, \"xmax\": 370, \"ymax\": 290}}]}\n{\"time\": 9.5, \"duration\": 10.0}",
            )
            .unwrap();
            let report: serde_json::Value =
                serde_json::from_str(&take_string(mscope_analyze_trace(trace.as_ptr()))).unwrap();
            let markers = CString::new(report["detected_markers"].to_string()).unwrap();

            let at_2 = take_string(mscope_visible_markers(markers.as_ptr(), 2.0));
            assert!(at_2.contains("eye-contact"));
            let at_5 = take_string(mscope_visible_markers(markers.as_ptr(), 5.0));
            assert_eq!(at_5, "[]");
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = mscope_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
