use crate::device::Volume;

pub const OS_DIR: &str = "windows";
pub const CONVERTER_NAME: &str = "kindlegen.exe";

/// Lists mounted volumes on Windows, one per drive letter.
///
/// The system drive is kept: marker detection alone decides whether a
/// volume is the reader, and `C:\system\version.txt` does not exist on a
/// normal install.
pub fn mounted_volumes() -> Vec<Volume> {
    super::sysinfo_volumes()
}
