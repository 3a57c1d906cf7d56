//! Detection of a connected reader among the host's mounted volumes.
use crate::platform;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A mounted storage volume, as reported by a [`MountTable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Volume {
    /// The OS-provided name of the volume (e.g. "sdb1" or "Kindle").
    pub name: String,
    pub mount_point: PathBuf,
}

/// A connected reader, identified by the volume that carries the marker file.
///
/// This is a snapshot of one [`DeviceLocator::is_connected`] check. It is
/// replaced on the next check and should not be held across checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    /// The mount root of the device's volume (e.g. `/media/alice/Kindle`).
    pub mount_point: PathBuf,
}

impl Device {
    /// The directory converted books are copied into.
    pub fn content_dir(&self, content_dir: &Path) -> PathBuf {
        self.mount_point.join(content_dir)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [Mounted at {}]", self.name, self.mount_point.display())
    }
}

/// A source of currently mounted volumes.
pub trait MountTable {
    fn volumes(&self) -> io::Result<Vec<Volume>>;
}

/// The host's real mount table.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemMounts;

impl MountTable for SystemMounts {
    fn volumes(&self) -> io::Result<Vec<Volume>> {
        Ok(platform::mounted_volumes())
    }
}

/// A fixed list of mount roots, used instead of asking the OS.
#[derive(Clone, Debug, Default)]
pub struct FixedMounts(pub Vec<PathBuf>);

impl MountTable for FixedMounts {
    fn volumes(&self) -> io::Result<Vec<Volume>> {
        Ok(self
            .0
            .iter()
            .map(|mount_point| Volume {
                name: mount_point
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| mount_point.to_string_lossy().to_string()),
                mount_point: mount_point.clone(),
            })
            .collect())
    }
}

/// Finds the reader among mounted volumes by looking for a marker file.
pub struct DeviceLocator<M = SystemMounts> {
    mounts: M,
    marker: PathBuf,
    current: Option<Device>,
}

impl DeviceLocator<SystemMounts> {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self::with_mounts(SystemMounts, marker)
    }
}

impl<M: MountTable> DeviceLocator<M> {
    pub fn with_mounts(mounts: M, marker: impl Into<PathBuf>) -> Self {
        Self {
            mounts,
            marker: marker.into(),
            current: None,
        }
    }

    fn carries_marker(&self, mount_point: &Path) -> bool {
        mount_point.join(&self.marker).is_file()
    }

    /// Re-scans mounted volumes and records the first one carrying the marker.
    ///
    /// If several volumes carry the marker, whichever the mount table lists
    /// first wins. A failure to enumerate volumes is logged and treated as
    /// "not connected".
    pub fn is_connected(&mut self) -> bool {
        let volumes = match self.mounts.volumes() {
            Ok(volumes) => volumes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to enumerate mounted volumes; treating device as disconnected");
                Vec::new()
            }
        };

        let found = volumes
            .into_iter()
            .find(|v| self.carries_marker(&v.mount_point))
            .map(|v| Device {
                name: v.name,
                mount_point: v.mount_point,
            });

        match (&self.current, &found) {
            (None, Some(device)) => tracing::info!(device = %device, "Device connected"),
            (Some(old), None) => tracing::info!(mount = %old.mount_point.display(), "Device disconnected"),
            _ => (),
        }

        self.current = found;
        self.current.is_some()
    }

    /// The mount root recorded by the last check, if a device was found.
    pub fn mount_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|d| d.mount_point.as_path())
    }

    pub fn device(&self) -> Option<&Device> {
        self.current.as_ref()
    }

    /// Lists every volume with whether it carries the marker.
    ///
    /// Does not change the recorded device.
    pub fn volumes(&self) -> io::Result<Vec<(Volume, bool)>> {
        Ok(self
            .mounts
            .volumes()?
            .into_iter()
            .map(|v| {
                let is_device = self.carries_marker(&v.mount_point);
                (v, is_device)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MARKER;
    use std::fs;
    use tempfile::TempDir;

    struct BrokenMounts;

    impl MountTable for BrokenMounts {
        fn volumes(&self) -> io::Result<Vec<Volume>> {
            Err(io::Error::other("mount table unavailable"))
        }
    }

    fn make_kindle(root: &Path) {
        let system = root.join("system");
        fs::create_dir_all(&system).unwrap();
        fs::write(system.join("version.txt"), "Kindle 5.16.2").unwrap();
    }

    #[test]
    fn finds_volume_with_marker() {
        let usb = TempDir::new().unwrap();
        let kindle = TempDir::new().unwrap();
        make_kindle(kindle.path());

        let mounts = FixedMounts(vec![usb.path().to_path_buf(), kindle.path().to_path_buf()]);
        let mut locator = DeviceLocator::with_mounts(mounts, DEFAULT_MARKER);

        assert!(locator.is_connected());
        assert_eq!(locator.mount_path(), Some(kindle.path()));
    }

    #[test]
    fn no_marker_means_not_connected() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        // A directory at the marker path is not a marker file.
        fs::create_dir_all(b.path().join("system/version.txt")).unwrap();

        let mounts = FixedMounts(vec![a.path().to_path_buf(), b.path().to_path_buf()]);
        let mut locator = DeviceLocator::with_mounts(mounts, DEFAULT_MARKER);

        assert!(!locator.is_connected());
        assert_eq!(locator.mount_path(), None);
    }

    #[test]
    fn disconnect_clears_recorded_mount() {
        let kindle = TempDir::new().unwrap();
        make_kindle(kindle.path());

        let mounts = FixedMounts(vec![kindle.path().to_path_buf()]);
        let mut locator = DeviceLocator::with_mounts(mounts, DEFAULT_MARKER);
        assert!(locator.is_connected());

        fs::remove_file(kindle.path().join(DEFAULT_MARKER)).unwrap();
        assert!(!locator.is_connected());
        assert!(locator.device().is_none());
    }

    #[test]
    fn enumeration_errors_are_not_connected() {
        let mut locator = DeviceLocator::with_mounts(BrokenMounts, DEFAULT_MARKER);
        assert!(!locator.is_connected());
        assert_eq!(locator.mount_path(), None);
    }

    #[test]
    fn volumes_flags_the_device() {
        let usb = TempDir::new().unwrap();
        let kindle = TempDir::new().unwrap();
        make_kindle(kindle.path());

        let mounts = FixedMounts(vec![usb.path().to_path_buf(), kindle.path().to_path_buf()]);
        let locator = DeviceLocator::with_mounts(mounts, DEFAULT_MARKER);
        let flags: Vec<bool> = locator.volumes().unwrap().into_iter().map(|(_, d)| d).collect();

        assert_eq!(flags, vec![false, true]);
        assert!(locator.device().is_none());
    }

    #[test]
    fn content_dir_is_under_mount_point() {
        let device = Device {
            name: "Kindle".into(),
            mount_point: PathBuf::from("/media/alice/Kindle"),
        };
        assert_eq!(
            device.content_dir(Path::new("documents")),
            PathBuf::from("/media/alice/Kindle/documents")
        );
    }
}
