/// Windows watcher backend — `ReadDirectoryChangesW` with overlapped
/// (async) I/O so the thread can be cancelled cleanly without blocking.
///
/// Subscribes to file- and directory-name changes on the volume root
/// (recursive through the OS's own notification scope) and forwards only
/// *created* names to the arrival processor; renames, deletes, and writes
/// are not copy-ins and are discarded at this layer.
///
/// The notification queue lives on the directory handle, so changes that
/// occur while an arrival is being processed are reported on the next
/// re-arm rather than lost. An overflowed buffer is the exception: it is
/// logged and skipped — delivery is best-effort, not exactly-once.
use crate::arrival::ArrivalProcessor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, ReadDirectoryChangesW, FILE_ACTION_ADDED, FILE_FLAGS_AND_ATTRIBUTES,
    FILE_FLAG_BACKUP_SEMANTICS, FILE_FLAG_OVERLAPPED, FILE_LIST_DIRECTORY,
    FILE_NOTIFY_CHANGE_DIR_NAME, FILE_NOTIFY_CHANGE_FILE_NAME, FILE_NOTIFY_INFORMATION,
    FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Threading::{CreateEventW, ResetEvent, WaitForSingleObject};
use windows::Win32::System::IO::{CancelIoEx, GetOverlappedResult, OVERLAPPED};

/// Open the volume handle and issue `ReadDirectoryChangesW` in a loop until
/// the cancel flag is set or the handle fails.
pub fn run_watcher(root: PathBuf, cancel: Arc<AtomicBool>, mut processor: ArrivalProcessor) {
    debug!("watcher: starting on {}", root.display());

    // Build a null-terminated UTF-16 path.
    let wide_path: Vec<u16> = root
        .to_string_lossy()
        .encode_utf16()
        .chain(std::iter::once(0u16))
        .collect();

    // Open the volume root with FILE_FLAG_OVERLAPPED so IO can be cancelled.
    let dir_handle: HANDLE = unsafe {
        match CreateFileW(
            windows::core::PCWSTR(wide_path.as_ptr()),
            FILE_LIST_DIRECTORY.0,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            None,
            OPEN_EXISTING,
            FILE_FLAGS_AND_ATTRIBUTES(FILE_FLAG_BACKUP_SEMANTICS.0 | FILE_FLAG_OVERLAPPED.0),
            None,
        ) {
            Ok(h) => h,
            Err(e) => {
                warn!("watcher: failed to open {}: {e}", root.display());
                return;
            }
        }
    };

    // Manual-reset event for the OVERLAPPED structure.
    let io_event: HANDLE = unsafe {
        match CreateEventW(None, true, false, None) {
            Ok(h) => h,
            Err(e) => {
                warn!("watcher: failed to create event: {e}");
                let _ = CloseHandle(dir_handle);
                return;
            }
        }
    };

    // Name changes cover both file and directory creation; write/size
    // notifications would only add noise for a copy-in monitor.
    let filter = FILE_NOTIFY_CHANGE_FILE_NAME | FILE_NOTIFY_CHANGE_DIR_NAME;

    let mut buffer = vec![0u8; 65536];

    'outer: loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        // Fresh OVERLAPPED each iteration. The kernel event lives for the
        // lifetime of the outer loop, so the OVERLAPPED only needs to
        // survive until the operation completes (or is cancelled) below.
        let mut overlapped = OVERLAPPED::default();
        overlapped.hEvent = io_event;

        unsafe {
            let _ = ResetEvent(io_event);
        }

        // Issue asynchronous directory-change notification.
        // ERROR_IO_PENDING is the expected "success" return for overlapped
        // I/O; the Result from windows-rs is intentionally discarded here.
        let _ = unsafe {
            ReadDirectoryChangesW(
                dir_handle,
                buffer.as_mut_ptr() as *mut core::ffi::c_void,
                buffer.len() as u32,
                true, // watch subdirectories recursively
                filter,
                None,
                Some(&mut overlapped),
                None,
            )
        };

        // Poll for completion, checking the cancel flag every 200 ms.
        let mut bytes_transferred: u32 = 0;
        loop {
            if cancel.load(Ordering::Relaxed) {
                // Cancel the outstanding IO and drain the event before
                // exiting so the kernel no longer references OVERLAPPED.
                unsafe {
                    let _ = CancelIoEx(dir_handle, Some(&overlapped));
                    WaitForSingleObject(io_event, 5000);
                    let _ = CloseHandle(io_event);
                    let _ = CloseHandle(dir_handle);
                }
                debug!("watcher: cancelled for {}", root.display());
                return;
            }

            let wait = unsafe { WaitForSingleObject(io_event, 200) };

            if wait.0 == 0 {
                // WAIT_OBJECT_0 — IO completed.
                let result = unsafe {
                    GetOverlappedResult(dir_handle, &mut overlapped, &mut bytes_transferred, false)
                };
                if result.is_err() {
                    // Notification buffer overflowed — arrivals in this
                    // window may be missed.
                    warn!("watcher: notification overflow on {}", root.display());
                    bytes_transferred = 0;
                }
                break;
            } else if wait.0 == 0x102 {
                // WAIT_TIMEOUT — re-check the cancel flag.
                continue;
            } else {
                warn!("watcher: WaitForSingleObject returned unexpected value");
                break 'outer;
            }
        }

        if bytes_transferred == 0 {
            // Overflow or spurious wakeup — re-arm the subscription.
            continue;
        }

        drain_created(&buffer, bytes_transferred as usize, &mut processor);
    }

    // Normal exit — clean up handles.
    unsafe {
        let _ = CloseHandle(io_event);
        let _ = CloseHandle(dir_handle);
    }

    debug!("watcher: stopped for {}", root.display());
}

/// Walk the `FILE_NOTIFY_INFORMATION` chain in `buffer` and forward each
/// *created* name to the processor. Names are passed through verbatim;
/// the processor rejects anything below the top level.
fn drain_created(buffer: &[u8], total_bytes: usize, processor: &mut ArrivalProcessor) {
    let mut offset = 0usize;

    loop {
        // Bounds check before casting.
        let record_min = std::mem::size_of::<FILE_NOTIFY_INFORMATION>();
        if offset + record_min > total_bytes {
            break;
        }

        // SAFETY: `buffer` is a valid byte slice of at least `total_bytes`
        // bytes filled by the kernel with correctly aligned
        // FILE_NOTIFY_INFORMATION records.
        let fni = unsafe { &*(buffer.as_ptr().add(offset) as *const FILE_NOTIFY_INFORMATION) };

        // Extract the variable-length UTF-16 filename that follows the struct.
        let name_chars = fni.FileNameLength as usize / 2;
        // SAFETY: `FileName` is immediately followed by (name_chars - 1)
        // additional u16 code units in the same kernel-filled buffer.
        let name_slice =
            unsafe { std::slice::from_raw_parts(&fni.FileName as *const u16, name_chars) };
        let relative_name = String::from_utf16_lossy(name_slice);

        if fni.Action == FILE_ACTION_ADDED {
            processor.handle_created(&relative_name);
        }

        if fni.NextEntryOffset == 0 {
            break;
        }
        offset += fni.NextEntryOffset as usize;
    }
}
