//! Windows Raw Input capture backend.
//!
//! Registers a message-only window for the mouse usage page with
//! `RIDEV_INPUTSINK | RIDEV_DEVNOTIFY`, so `WM_INPUT` arrives even while the
//! process is unfocused and `WM_INPUT_DEVICE_CHANGE` reports hotplug. The
//! window and its message loop live on a dedicated thread; the window
//! procedure packs each notification into a wire record, stamps it with the
//! session clock, and sends it down the channel. Nothing heavier than that
//! runs inside the window procedure.
//!
//! Unlike the legacy `WM_MOUSEMOVE` stream, Raw Input keys every event by
//! the originating device handle, which is what makes per-device tracks
//! possible at all.
//!
//! # Safety
//!
//! `unsafe` here is exclusively Windows API FFI. All `unsafe` blocks carry
//! `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{
    GetLastError, ERROR_CLASS_ALREADY_EXISTS, HMODULE, HWND, LPARAM, LRESULT, WPARAM,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::{
    GetRawInputData, RegisterRawInputDevices, HRAWINPUT, RAWINPUT, RAWINPUTDEVICE,
    RAWINPUTHEADER, RID_INPUT, RIDEV_DEVNOTIFY, RIDEV_INPUTSINK, RIM_TYPEMOUSE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    PostThreadMessageW, RegisterClassExW, UnregisterClassW, HWND_MESSAGE, MSG, WINDOW_EX_STYLE,
    WINDOW_STYLE, WM_INPUT, WM_INPUT_DEVICE_CHANGE, WM_QUIT, WNDCLASSEXW,
};

use mousetrace_core::wire::{self, TAG_CONNECT, TAG_DISCONNECT, TAG_MOTION};
use mousetrace_core::DeviceHandle;

use super::{CaptureError, InputSource, StampedRecord};

// HID usage page/id for mice (usagePage 0x01, usage 0x02).
const HID_USAGE_PAGE_GENERIC: u16 = 0x01;
const HID_USAGE_GENERIC_MOUSE: u16 = 0x02;

// WM_INPUT_DEVICE_CHANGE wParam values.
const GIDC_ARRIVAL: usize = 1;
const GIDC_REMOVAL: usize = 2;

// RAWMOUSE::usButtonFlags masks (winuser.h).
const RI_MOUSE_LEFT_BUTTON_DOWN: u16 = 0x0001;
const RI_MOUSE_LEFT_BUTTON_UP: u16 = 0x0002;
const RI_MOUSE_RIGHT_BUTTON_DOWN: u16 = 0x0004;
const RI_MOUSE_RIGHT_BUTTON_UP: u16 = 0x0008;
const RI_MOUSE_MIDDLE_BUTTON_DOWN: u16 = 0x0010;
const RI_MOUSE_MIDDLE_BUTTON_UP: u16 = 0x0020;
const RI_MOUSE_WHEEL: u16 = 0x0400;

// Button numbers on the wire, matching the record format: 1 left, 2 right,
// 3 middle, 0 none.
const BUTTON_LEFT: u8 = 1;
const BUTTON_RIGHT: u8 = 2;
const BUTTON_MIDDLE: u8 = 3;

/// Global sender used by the window procedure. Set by
/// [`WindowsRawInputSource::start`], cleared by `stop()` so the channel
/// disconnects and consumers can finish draining.
static EVENT_SENDER: Mutex<Option<Sender<StampedRecord>>> = Mutex::new(None);

/// Session clock epoch; all record timestamps are milliseconds since this.
static EPOCH: Mutex<Option<Instant>> = Mutex::new(None);

/// Thread id of the message loop, used by `stop()` to post `WM_QUIT`.
static LOOP_THREAD_ID: AtomicU32 = AtomicU32::new(0);

/// Join handle of the message loop thread. `stop()` joins it so the window
/// and class teardown has finished before another `start()` registers anew.
static LOOP_THREAD: Mutex<Option<thread::JoinHandle<()>>> = Mutex::new(None);

/// One-shot flag so a closed channel during shutdown is logged once, not
/// once per in-flight event.
static CHANNEL_CLOSED_LOGGED: AtomicBool = AtomicBool::new(false);

/// Raw Input capture service backed by a dedicated message loop thread.
pub struct WindowsRawInputSource;

impl WindowsRawInputSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsRawInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for WindowsRawInputSource {
    fn start(&self) -> Result<mpsc::Receiver<StampedRecord>, CaptureError> {
        let (tx, rx) = mpsc::channel::<StampedRecord>();
        {
            let mut sender = EVENT_SENDER.lock().expect("lock poisoned");
            if sender.is_some() {
                return Err(CaptureError::AlreadyStarted);
            }
            *sender = Some(tx);
        }
        *EPOCH.lock().expect("lock poisoned") = Some(Instant::now());
        CHANNEL_CLOSED_LOGGED.store(false, Ordering::Relaxed);

        // The message loop thread reports registration success or failure
        // through this one-shot channel, so a platform refusal is surfaced
        // to the caller instead of dying silently on the background thread.
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let spawned = thread::Builder::new()
            .name("mousetrace-rawinput".to_string())
            .spawn(move || run_message_loop(ready_tx));

        let outcome = match spawned {
            Err(e) => Err(CaptureError::RegistrationFailed(e.to_string())),
            Ok(handle) => {
                *LOOP_THREAD.lock().expect("lock poisoned") = Some(handle);
                match ready_rx.recv() {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(reason)) => Err(CaptureError::RegistrationFailed(reason)),
                    Err(_) => Err(CaptureError::RegistrationFailed(
                        "message loop thread exited before registering".to_string(),
                    )),
                }
            }
        };

        match outcome {
            Ok(()) => {
                info!("raw input registration complete");
                Ok(rx)
            }
            Err(e) => {
                // Leave the source restartable after a refused registration.
                join_loop_thread();
                LOOP_THREAD_ID.store(0, Ordering::SeqCst);
                *EVENT_SENDER.lock().expect("lock poisoned") = None;
                Err(e)
            }
        }
    }

    fn stop(&self) {
        let thread_id = LOOP_THREAD_ID.swap(0, Ordering::SeqCst);
        if thread_id != 0 {
            // SAFETY: Posting WM_QUIT to a live message loop thread is the
            // documented way to end GetMessageW; no pointers are involved.
            unsafe {
                if let Err(e) = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) {
                    warn!("failed to post WM_QUIT to capture thread: {e}");
                }
            }
        }
        // The loop thread destroys the window and unregisters the class on
        // its way out; joining it guarantees the teardown has completed, so
        // a later start() can register the class again.
        join_loop_thread();
        // Dropping the sender closes the channel; consumers drain what is
        // already buffered and then observe disconnection.
        *EVENT_SENDER.lock().expect("lock poisoned") = None;
        info!("raw input capture stopped");
    }
}

fn join_loop_thread() {
    let handle = LOOP_THREAD.lock().expect("lock poisoned").take();
    if let Some(handle) = handle {
        if handle.join().is_err() {
            warn!("raw input message loop thread panicked");
        }
    }
}

/// Entry point of the dedicated message loop thread: creates the
/// message-only window, registers for mouse raw input, and pumps messages
/// until `WM_QUIT`.
fn run_message_loop(ready_tx: Sender<Result<(), String>>) {
    LOOP_THREAD_ID.store(
        // SAFETY: Plain TEB read, no arguments.
        unsafe { GetCurrentThreadId() },
        Ordering::SeqCst,
    );

    let class_name = w!("MOUSETRACE_RAWINPUT");

    // SAFETY: GetModuleHandleW(None) returns the current module.
    let instance = match unsafe { GetModuleHandleW(None) } {
        Ok(instance) => instance,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("GetModuleHandleW failed: {e}")));
            return;
        }
    };

    // SAFETY: The class struct points at live statics for the duration of
    // the call. A class left over from an earlier session is reused.
    let class_ok = unsafe {
        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(raw_input_wndproc),
            hInstance: instance.into(),
            lpszClassName: class_name,
            ..Default::default()
        };
        RegisterClassExW(&class) != 0 || GetLastError() == ERROR_CLASS_ALREADY_EXISTS
    };
    if !class_ok {
        let _ = ready_tx.send(Err("RegisterClassExW failed".to_string()));
        return;
    }

    // SAFETY: HWND_MESSAGE parents a window that receives messages but
    // never renders; exactly what a capture sink needs.
    let hwnd = match unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            class_name,
            w!("mousetrace raw input sink"),
            WINDOW_STYLE(0),
            0,
            0,
            0,
            0,
            Some(HWND_MESSAGE),
            None,
            Some(instance.into()),
            None,
        )
    } {
        Ok(hwnd) => hwnd,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("CreateWindowExW failed: {e}")));
            // SAFETY: Class registered above, no window refers to it.
            unsafe { teardown(None, class_name, instance) };
            return;
        }
    };

    let device = RAWINPUTDEVICE {
        usUsagePage: HID_USAGE_PAGE_GENERIC,
        usUsage: HID_USAGE_GENERIC_MOUSE,
        dwFlags: RIDEV_INPUTSINK | RIDEV_DEVNOTIFY,
        hwndTarget: hwnd,
    };

    // SAFETY: `device` is a valid RAWINPUTDEVICE array of length 1.
    let registered = unsafe {
        RegisterRawInputDevices(&[device], std::mem::size_of::<RAWINPUTDEVICE>() as u32)
    };
    if let Err(e) = registered {
        let _ = ready_tx.send(Err(format!("RegisterRawInputDevices failed: {e}")));
        // SAFETY: Window and class were created on this thread just above.
        unsafe { teardown(Some(hwnd), class_name, instance) };
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // SAFETY: Standard GetMessage/DispatchMessage pump; exits when WM_QUIT
    // is posted by stop().
    unsafe {
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).as_bool() {
            DispatchMessageW(&msg);
        }
    }

    // SAFETY: This thread created the window, so it may destroy it; with
    // the window gone the class can be unregistered, which is what lets a
    // later start() register it again.
    unsafe { teardown(Some(hwnd), class_name, instance) };
    debug!("raw input message loop exited");
}

/// Undoes window and class creation, in that order. Must run on the thread
/// that created the window.
unsafe fn teardown(hwnd: Option<HWND>, class_name: PCWSTR, instance: HMODULE) {
    if let Some(hwnd) = hwnd {
        if let Err(e) = DestroyWindow(hwnd) {
            warn!("DestroyWindow failed: {e}");
        }
    }
    if let Err(e) = UnregisterClassW(class_name, Some(instance.into())) {
        warn!("UnregisterClassW failed: {e}");
    }
}

/// Window procedure for the capture sink.
///
/// # Safety
///
/// Called by Windows on the message loop thread. `WM_INPUT`'s `lParam` is a
/// valid `HRAWINPUT` for the duration of the call.
unsafe extern "system" fn raw_input_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_INPUT => on_raw_input(HRAWINPUT(lparam.0 as _)),
        WM_INPUT_DEVICE_CHANGE => {
            let tag = match wparam.0 {
                GIDC_ARRIVAL => Some(TAG_CONNECT),
                GIDC_REMOVAL => Some(TAG_DISCONNECT),
                _ => None,
            };
            if let Some(tag) = tag {
                let handle = DeviceHandle(lparam.0 as i32);
                debug!(device = %handle, tag, "device change notification");
                send_record(wire::encode_record(handle, tag, 0, 0, 0, 0, 0));
            }
        }
        _ => {}
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Reads one `WM_INPUT` payload and forwards it as motion/button records.
unsafe fn on_raw_input(handle: HRAWINPUT) {
    let mut size = 0u32;
    // SAFETY: First call with a null buffer queries the required size.
    GetRawInputData(
        handle,
        RID_INPUT,
        None,
        &mut size,
        std::mem::size_of::<RAWINPUTHEADER>() as u32,
    );
    if size == 0 || size as usize > std::mem::size_of::<RAWINPUT>() {
        return;
    }

    let mut raw = RAWINPUT::default();
    // SAFETY: `raw` is at least `size` bytes; the second call fills it.
    let copied = GetRawInputData(
        handle,
        RID_INPUT,
        Some(&mut raw as *mut RAWINPUT as *mut _),
        &mut size,
        std::mem::size_of::<RAWINPUTHEADER>() as u32,
    );
    if copied == u32::MAX {
        warn!("GetRawInputData failed, record dropped");
        return;
    }
    if raw.header.dwType != RIM_TYPEMOUSE.0 {
        return;
    }

    let device = DeviceHandle(raw.header.hDevice.0 as i32);
    // SAFETY: dwType == RIM_TYPEMOUSE guarantees the mouse arm of the union.
    let mouse = raw.data.mouse;
    let flags = mouse.Anonymous.Anonymous.usButtonFlags;
    let wheel = if flags & RI_MOUSE_WHEEL != 0 {
        i32::from(mouse.Anonymous.Anonymous.usButtonData as i16)
    } else {
        0
    };

    let (pressed, released) = decode_buttons(flags);
    send_record(wire::encode_record(
        device,
        TAG_MOTION,
        mouse.lLastX,
        mouse.lLastY,
        wheel,
        pressed,
        released,
    ));
}

/// Maps RAWMOUSE button flags onto the wire's single pressed/released pair.
fn decode_buttons(flags: u16) -> (u8, u8) {
    let pressed = if flags & RI_MOUSE_LEFT_BUTTON_DOWN != 0 {
        BUTTON_LEFT
    } else if flags & RI_MOUSE_RIGHT_BUTTON_DOWN != 0 {
        BUTTON_RIGHT
    } else if flags & RI_MOUSE_MIDDLE_BUTTON_DOWN != 0 {
        BUTTON_MIDDLE
    } else {
        0
    };
    let released = if flags & RI_MOUSE_LEFT_BUTTON_UP != 0 {
        BUTTON_LEFT
    } else if flags & RI_MOUSE_RIGHT_BUTTON_UP != 0 {
        BUTTON_RIGHT
    } else if flags & RI_MOUSE_MIDDLE_BUTTON_UP != 0 {
        BUTTON_MIDDLE
    } else {
        0
    };
    (pressed, released)
}

/// Stamps a record with the session clock and sends it to the consumer.
fn send_record(bytes: Vec<u8>) {
    let timestamp_ms = EPOCH
        .lock()
        .expect("lock poisoned")
        .map(|epoch| epoch.elapsed().as_secs_f64() * 1000.0)
        .unwrap_or(0.0);
    if let Some(sender) = EVENT_SENDER.lock().expect("lock poisoned").as_ref() {
        // Send errors mean the consumer is gone (shutdown in progress);
        // each in-flight event would hit this, so it is logged once.
        if sender
            .send(StampedRecord {
                bytes,
                timestamp_ms,
            })
            .is_err()
            && !CHANNEL_CLOSED_LOGGED.swap(true, Ordering::Relaxed)
        {
            debug!("record channel closed; remaining events dropped");
        }
    }
}
