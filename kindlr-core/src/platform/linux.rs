use crate::device::Volume;
use std::path::Path;

pub const OS_DIR: &str = "linux";
pub const CONVERTER_NAME: &str = "kindlegen";

/// Returns true for mounts that belong to the running system rather than to
/// an attached drive: the root filesystem and the boot partitions.
fn is_system_mount(mount_point: &Path) -> bool {
    mount_point == Path::new("/") || mount_point.starts_with("/boot")
}

/// Lists mounted volumes on a Linux system, excluding the system drive.
///
/// Removable media is usually auto-mounted under `/media/<user>/` or
/// `/run/media/<user>/`, but any mount point is accepted so manually
/// mounted devices are found too.
pub fn mounted_volumes() -> Vec<Volume> {
    super::sysinfo_volumes()
        .into_iter()
        .filter(|v| !is_system_mount(&v.mount_point))
        .collect()
}
