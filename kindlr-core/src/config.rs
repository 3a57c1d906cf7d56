//! Runtime settings for a transfer session.
//!
//! Nothing here is persisted. Front-ends build a [`Settings`] from their own
//! inputs (command-line flags, environment) and hand it to the core.
use crate::platform;
use std::path::PathBuf;
use std::time::Duration;

/// Relative path, under a volume's mount root, of the file that marks a Kindle.
pub const DEFAULT_MARKER: &str = "system/version.txt";
/// Directory on the device that holds readable documents.
pub const DEFAULT_CONTENT_DIR: &str = "documents";
pub const DEFAULT_SOURCE_EXTENSION: &str = "epub";
pub const DEFAULT_TARGET_EXTENSION: &str = "azw3";
/// `kindlegen` exits with 1 when a build succeeded with warnings, which is
/// what happens for most ordinary books.
pub const DEFAULT_WARNING_EXIT_CODE: i32 = 1;
pub const DEFAULT_DWELL: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct Settings {
    /// Directory holding the bundled, per-OS converter executables.
    pub assets_dir: PathBuf,
    /// Explicit converter path. Overrides the `assets_dir` lookup when set.
    pub converter: Option<PathBuf>,
    pub marker: PathBuf,
    pub content_dir: PathBuf,
    pub source_extension: String,
    pub target_extension: String,
    pub warning_exit_code: i32,
    /// How long a finished batch report stays up before the batch is cleared.
    pub dwell: Duration,
    /// Re-read each copied file and compare checksums before deleting the source.
    pub verify: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            converter: None,
            marker: PathBuf::from(DEFAULT_MARKER),
            content_dir: PathBuf::from(DEFAULT_CONTENT_DIR),
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            target_extension: DEFAULT_TARGET_EXTENSION.to_string(),
            warning_exit_code: DEFAULT_WARNING_EXIT_CODE,
            dwell: DEFAULT_DWELL,
            verify: false,
        }
    }
}

impl Settings {
    /// The converter executable to run on this host.
    ///
    /// Either the explicit override, or `<assets_dir>/<os>/<executable>`.
    pub fn converter_path(&self) -> PathBuf {
        match &self.converter {
            Some(path) => path.clone(),
            None => platform::converter_in(&self.assets_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_converter_wins_over_assets_dir() {
        let settings = Settings {
            converter: Some(PathBuf::from("/opt/kindlegen")),
            ..Settings::default()
        };
        assert_eq!(settings.converter_path(), PathBuf::from("/opt/kindlegen"));
    }

    #[test]
    fn default_converter_lives_under_os_directory() {
        let settings = Settings::default();
        let path = settings.converter_path();
        assert!(path.starts_with("assets"));
        assert_eq!(
            path.parent().and_then(|p| p.file_name()),
            Some(std::ffi::OsStr::new(platform::OS_DIR))
        );
    }
}
