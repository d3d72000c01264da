/// Platform-specific functionality — Windows drive enumeration and
/// removable-volume classification.

pub mod drives;

#[cfg(windows)]
pub use drives::classify;
pub use drives::{RemovableVolume, SystemVolumes, VolumeEnumerator, VolumeKind};
