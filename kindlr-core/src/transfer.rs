//! The per-file pipeline: convert a dropped file, then move the result onto
//! the device.
use crate::config::Settings;
use crate::convert::Converter;
use crate::error::TransferError;
use crate::relocate;
use std::path::{Path, PathBuf};

/// Work performed for each file of a batch.
///
/// Implementations are shared by every worker of a batch, so they must be
/// safe to call from many threads at once.
pub trait Transfer: Send + Sync + 'static {
    /// Processes `source` and returns where the result ended up.
    fn transfer(&self, source: &Path, dest_dir: &Path) -> Result<PathBuf, TransferError>;

    /// Where `transfer` would put `source`, if that is known up front.
    ///
    /// Used to refuse two files of one batch that would overwrite each other.
    fn destination(&self, _source: &Path, _dest_dir: &Path) -> Option<PathBuf> {
        None
    }
}

/// Converts with the external tool and relocates into `dest_dir`.
#[derive(Clone, Debug)]
pub struct Pipeline {
    converter: Converter,
    verify: bool,
}

impl Pipeline {
    pub fn new(converter: Converter, verify: bool) -> Self {
        Self { converter, verify }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(Converter::from_settings(settings), settings.verify)
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }
}

impl Transfer for Pipeline {
    fn transfer(&self, source: &Path, dest_dir: &Path) -> Result<PathBuf, TransferError> {
        let task = self.converter.task(source)?;
        self.converter.run(&task)?;

        let dest = dest_dir.join(&task.output_name);
        relocate::run(&task.output, &dest, self.verify)?;
        Ok(dest)
    }

    fn destination(&self, source: &Path, dest_dir: &Path) -> Option<PathBuf> {
        let task = self.converter.task(source).ok()?;
        Some(dest_dir.join(task.output_name))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::convert::fake;
    use crate::error::{FailureClass, RelocateErrorKind};
    use std::fs;
    use tempfile::TempDir;

    fn pipeline() -> Pipeline {
        Pipeline::new(Converter::new(fake::install(), "azw3", 1), true)
    }

    #[test]
    fn converted_file_lands_on_device() {
        let work = TempDir::new().unwrap();
        let device = TempDir::new().unwrap();
        let source = fake::book(work.path(), "Emma.epub", 1);

        let dest = pipeline().transfer(&source, device.path()).unwrap();

        assert_eq!(dest, device.path().join("Emma.azw3"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "converted:Emma.epub");
        assert!(!work.path().join("Emma.azw3").exists());
        assert!(source.exists(), "the dropped file itself is never touched");
    }

    #[test]
    fn book_dropped_from_the_device_stays_on_the_device() {
        let device = TempDir::new().unwrap();
        let source = fake::book(device.path(), "Emma.epub", 0);

        let dest = pipeline().transfer(&source, device.path()).unwrap();

        assert_eq!(dest, device.path().join("Emma.azw3"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "converted:Emma.epub");
    }

    #[test]
    fn missing_content_dir_is_a_relocation_failure() {
        let work = TempDir::new().unwrap();
        let device = TempDir::new().unwrap();
        let source = fake::book(work.path(), "Emma.epub", 0);

        let err = pipeline()
            .transfer(&source, &device.path().join("documents"))
            .unwrap_err();

        assert_eq!(err.class(), FailureClass::Relocation(RelocateErrorKind::OpenDest));
    }

    #[test]
    fn conversion_failure_is_classified() {
        let work = TempDir::new().unwrap();
        let device = TempDir::new().unwrap();
        let source = fake::book(work.path(), "Emma.epub", 2);

        let err = pipeline().transfer(&source, device.path()).unwrap_err();

        assert_eq!(err.class(), FailureClass::Conversion);
        assert_eq!(fs::read_dir(device.path()).unwrap().count(), 0);
    }
}
