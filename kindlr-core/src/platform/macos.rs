use crate::device::Volume;
use std::path::Path;

pub const OS_DIR: &str = "darwin";
pub const CONVERTER_NAME: &str = "kindlegen";

/// Lists mounted volumes on macOS.
///
/// External drives appear under `/Volumes`. The root volume and the sealed
/// APFS system volumes under `/System/Volumes` are skipped.
pub fn mounted_volumes() -> Vec<Volume> {
    super::sysinfo_volumes()
        .into_iter()
        .filter(|v| {
            v.mount_point != Path::new("/") && !v.mount_point.starts_with("/System/Volumes")
        })
        .collect()
}
