//! Provides platform-specific functionality.
//!
//! This module selects, per host OS, where the bundled converter executable
//! lives and how mounted volumes are discovered.
//!
//! It uses conditional compilation (`#[cfg]`) to expose the correct implementation
//! for the target OS. Each submodule exposes the same public API: `OS_DIR`,
//! `CONVERTER_NAME`, and `mounted_volumes()`.
use crate::device::Volume;
use std::path::{Path, PathBuf};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::*;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use self::macos::*;

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use self::windows::*;

/// Path of the converter executable for this OS under `assets_dir`.
pub fn converter_in(assets_dir: &Path) -> PathBuf {
    assets_dir.join(OS_DIR).join(CONVERTER_NAME)
}

/// Every volume `sysinfo` reports, without filtering.
fn sysinfo_volumes() -> Vec<Volume> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .iter()
        .map(|disk| Volume {
            name: disk.name().to_string_lossy().to_string(),
            mount_point: disk.mount_point().to_path_buf(),
        })
        .collect()
}
