/// Removable-volume discovery using the Windows API.
///
/// Classification ladder for each mounted letter:
///
/// 1. `GetDriveTypeW` says removable media — a USB stick.
/// 2. A fixed disk whose storage descriptor reports a USB bus or removable
///    media — an external hard drive.
/// 3. A fixed disk the probe could not vouch for, whose letter is outside
///    the configured system-letter allowlist — treated as removable. The
///    heuristic deliberately favors false positives over missed devices.
///
/// Any query error classifies the letter as not removable, so a flaky
/// volume is simply not monitored rather than monitored incorrectly.
use std::path::PathBuf;

/// How a volume came to be classified as removable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeKind {
    /// Reported as removable media by the OS drive-type query.
    Removable,
    /// Fixed disk admitted by the letter heuristic.
    FixedHeuristic,
}

/// One removable volume observed during an enumeration pass.
#[derive(Clone, Debug)]
pub struct RemovableVolume {
    /// Upper-case drive letter, e.g. `'E'`.
    pub letter: char,
    /// Mount root the watcher binds to, e.g. `E:\`.
    pub root: PathBuf,
    pub kind: VolumeKind,
}

/// Source of removable-volume snapshots for the lifecycle monitor.
///
/// The production implementation is [`SystemVolumes`]; tests drive the
/// monitor with simulated volumes backed by ordinary directories.
pub trait VolumeEnumerator: Send + Sync {
    /// One enumeration pass: every currently-mounted removable volume.
    fn removable_volumes(&self) -> Vec<RemovableVolume>;
}

/// Enumerates the host's logical drives and classifies each one.
pub struct SystemVolumes {
    system_letters: Vec<char>,
}

impl SystemVolumes {
    /// `system_letters` is the fixed-disk allowlist for the classification
    /// heuristic; letters are matched case-insensitively.
    pub fn new(system_letters: Vec<char>) -> Self {
        Self {
            system_letters: system_letters
                .into_iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        }
    }
}

impl VolumeEnumerator for SystemVolumes {
    #[cfg(windows)]
    fn removable_volumes(&self) -> Vec<RemovableVolume> {
        win::logical_letters()
            .into_iter()
            .filter_map(|letter| {
                win::classify(letter, &self.system_letters).map(|kind| RemovableVolume {
                    letter,
                    root: PathBuf::from(format!("{letter}:\\")),
                    kind,
                })
            })
            .collect()
    }

    #[cfg(not(windows))]
    fn removable_volumes(&self) -> Vec<RemovableVolume> {
        tracing::debug!("drive enumeration is only implemented on Windows");
        Vec::new()
    }
}

#[cfg(windows)]
pub use win::classify;

#[cfg(windows)]
mod win {
    use super::VolumeKind;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, GetDriveTypeW, GetLogicalDriveStringsW, FILE_SHARE_READ, FILE_SHARE_WRITE,
        OPEN_EXISTING,
    };
    use windows::Win32::System::Ioctl::{
        PropertyStandardQuery, StorageDeviceProperty, BusTypeUsb, IOCTL_STORAGE_QUERY_PROPERTY,
        STORAGE_DEVICE_DESCRIPTOR, STORAGE_PROPERTY_QUERY,
    };
    use windows::Win32::System::IO::DeviceIoControl;

    // Drive type constants from the Windows API.
    const DRIVE_REMOVABLE_VAL: u32 = 2;
    const DRIVE_FIXED_VAL: u32 = 3;

    /// All currently-assigned drive letters, upper-cased.
    pub fn logical_letters() -> Vec<char> {
        // GetLogicalDriveStringsW returns null-separated drive root strings.
        let mut buffer = [0u16; 256];
        let len = unsafe { GetLogicalDriveStringsW(Some(&mut buffer)) };

        if len == 0 {
            tracing::warn!("GetLogicalDriveStringsW returned 0");
            return Vec::new();
        }

        let full = OsString::from_wide(&buffer[..len as usize]);
        let full_str = full.to_string_lossy();

        full_str
            .split('\0')
            .filter(|s| !s.is_empty())
            .filter_map(|root| root.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .collect()
    }

    /// Classify one drive letter; `None` means "do not monitor".
    pub fn classify(letter: char, system_letters: &[char]) -> Option<VolumeKind> {
        let root = format!("{letter}:\\");
        let root_wide: Vec<u16> = root.encode_utf16().chain(std::iter::once(0)).collect();

        let raw_type = unsafe { GetDriveTypeW(PCWSTR(root_wide.as_ptr())) };
        match raw_type {
            DRIVE_REMOVABLE_VAL => Some(VolumeKind::Removable),
            DRIVE_FIXED_VAL => classify_fixed(letter, system_letters),
            // Network, optical, RAM disks and unknowns are never monitored.
            _ => None,
        }
    }

    /// Fixed disks may still be external (USB hard drives). Probe the bus
    /// first; when the probe cannot vouch for USB, fall back to the letter
    /// heuristic.
    fn classify_fixed(letter: char, system_letters: &[char]) -> Option<VolumeKind> {
        if usb_bus_probe(letter).unwrap_or(false) {
            tracing::debug!("{letter}: fixed disk on USB bus — monitoring");
            return Some(VolumeKind::Removable);
        }
        if system_letters.contains(&letter) {
            None
        } else {
            tracing::debug!("{letter}: fixed non-system disk — monitoring heuristically");
            Some(VolumeKind::FixedHeuristic)
        }
    }

    /// Query the volume's storage descriptor for its bus type.
    ///
    /// `None` when the volume handle or the IOCTL fails (e.g. insufficient
    /// rights), which callers treat as an inconclusive probe.
    fn usb_bus_probe(letter: char) -> Option<bool> {
        let vol_path = format!("\\\\.\\{letter}:");
        let vol_wide: Vec<u16> = vol_path.encode_utf16().chain(std::iter::once(0)).collect();

        // Desired access 0: metadata queries do not need read or write.
        let handle = unsafe {
            CreateFileW(
                PCWSTR(vol_wide.as_ptr()),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                Default::default(),
                None,
            )
        }
        .ok()?;

        let query = STORAGE_PROPERTY_QUERY {
            PropertyId: StorageDeviceProperty,
            QueryType: PropertyStandardQuery,
            AdditionalParameters: [0],
        };
        let mut descriptor = STORAGE_DEVICE_DESCRIPTOR::default();
        let mut bytes_returned: u32 = 0;

        let result = unsafe {
            DeviceIoControl(
                handle,
                IOCTL_STORAGE_QUERY_PROPERTY,
                Some(&query as *const STORAGE_PROPERTY_QUERY as *const core::ffi::c_void),
                std::mem::size_of::<STORAGE_PROPERTY_QUERY>() as u32,
                Some(&mut descriptor as *mut STORAGE_DEVICE_DESCRIPTOR as *mut core::ffi::c_void),
                std::mem::size_of::<STORAGE_DEVICE_DESCRIPTOR>() as u32,
                Some(&mut bytes_returned),
                None,
            )
        };

        unsafe {
            let _ = CloseHandle(handle);
        }

        if result.is_err() || (bytes_returned as usize) < std::mem::size_of::<STORAGE_DEVICE_DESCRIPTOR>()
        {
            return None;
        }

        Some(descriptor.BusType == BusTypeUsb || descriptor.RemovableMedia.as_bool())
    }
}
