//! Runs the external converter on a single source file.
//!
//! The converter is an opaque executable invoked as
//! `<program> <source> -o <output name>`. It writes its result next to the
//! source file, so that directory is the working location the output is
//! later relocated from. Only the exit status is consulted; anything the
//! tool prints is logged and otherwise ignored.
use crate::config::Settings;
use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// One file to convert and where its output will appear.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionTask {
    pub source: PathBuf,
    /// File name passed to the converter's `-o` flag.
    pub output_name: String,
    /// Where the converter leaves the result.
    pub output: PathBuf,
}

impl ConversionTask {
    /// Derives the output name by replacing the source's extension with
    /// `target_extension`.
    pub fn new(source: &Path, target_extension: &str) -> Result<Self, ConvertError> {
        let stem = source
            .file_stem()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConvertError::InvalidSource(source.to_path_buf()))?;
        let output_name = format!("{}.{}", stem.to_string_lossy(), target_extension);
        let output = source
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&output_name);

        Ok(Self {
            source: source.to_path_buf(),
            output_name,
            output,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Converter {
    program: PathBuf,
    target_extension: String,
    warning_exit_code: i32,
}

impl Converter {
    pub fn new(program: impl Into<PathBuf>, target_extension: impl Into<String>, warning_exit_code: i32) -> Self {
        Self {
            program: program.into(),
            target_extension: target_extension.into(),
            warning_exit_code,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.converter_path(),
            settings.target_extension.clone(),
            settings.warning_exit_code,
        )
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn task(&self, source: &Path) -> Result<ConversionTask, ConvertError> {
        ConversionTask::new(source, &self.target_extension)
    }

    /// Converts `source` and returns the path of the produced file.
    ///
    /// No retry is attempted, and nothing is cleaned up if the tool fails
    /// part way through.
    pub fn convert(&self, source: &Path) -> Result<PathBuf, ConvertError> {
        let task = self.task(source)?;
        self.run(&task)?;
        Ok(task.output)
    }

    pub fn run(&self, task: &ConversionTask) -> Result<(), ConvertError> {
        tracing::debug!(
            program = %self.program.display(),
            source = %task.source.display(),
            output = %task.output_name,
            "Launching converter"
        );

        let output = Command::new(&self.program)
            .arg(&task.source)
            .arg("-o")
            .arg(&task.output_name)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ConvertError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if !output.stdout.is_empty() {
            tracing::trace!(source = %task.source.display(), stdout = %String::from_utf8_lossy(&output.stdout), "Converter output");
        }
        if !output.stderr.is_empty() {
            tracing::debug!(source = %task.source.display(), stderr = %String::from_utf8_lossy(&output.stderr), "Converter diagnostics");
        }

        let code = output.status.code();
        if !output.status.success() && code != Some(self.warning_exit_code) {
            return Err(ConvertError::ExitStatus { code });
        }
        if code == Some(self.warning_exit_code) {
            tracing::debug!(source = %task.source.display(), code = self.warning_exit_code, "Converter finished with warnings");
        }

        if !task.output.is_file() {
            return Err(ConvertError::MissingOutput(task.output.clone()));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/home/alice/Books/Dune.epub", "Dune.azw3", "/home/alice/Books/Dune.azw3")]
    #[case("/tmp/war.and.peace.epub", "war.and.peace.azw3", "/tmp/war.and.peace.azw3")]
    #[case("notes", "notes.azw3", "notes.azw3")]
    fn derives_output_from_source(#[case] source: &str, #[case] name: &str, #[case] output: &str) {
        let task = ConversionTask::new(Path::new(source), "azw3").unwrap();
        assert_eq!(task.output_name, name);
        assert_eq!(task.output, PathBuf::from(output));
    }

    #[test]
    fn rejects_source_without_file_name() {
        let err = ConversionTask::new(Path::new("/"), "azw3").unwrap_err();
        assert!(matches!(err, ConvertError::InvalidSource(_)));
    }

    #[test]
    fn missing_program_is_launch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("book.epub");
        std::fs::write(&source, "0").unwrap();

        let converter = Converter::new(dir.path().join("no-such-kindlegen"), "azw3", 1);
        let err = converter.convert(&source).unwrap_err();
        assert!(matches!(err, ConvertError::Launch { .. }));
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::super::fake;
        use super::*;
        use tempfile::TempDir;

        #[rstest]
        #[case::clean(0)]
        #[case::with_warnings(1)]
        fn accepted_exit_codes_produce_output(#[case] code: i32) {
            let dir = TempDir::new().unwrap();
            let converter = Converter::new(fake::install(), "azw3", 1);
            let source = fake::book(dir.path(), "book1.epub", code);

            let output = converter.convert(&source).unwrap();

            assert_eq!(output, dir.path().join("book1.azw3"));
            assert_eq!(std::fs::read_to_string(&output).unwrap(), "converted:book1.epub");
        }

        #[test]
        fn other_exit_codes_fail() {
            let dir = TempDir::new().unwrap();
            let converter = Converter::new(fake::install(), "azw3", 1);
            let source = fake::book(dir.path(), "broken.epub", 2);

            let err = converter.convert(&source).unwrap_err();

            assert!(matches!(err, ConvertError::ExitStatus { code: Some(2) }));
        }

        #[test]
        fn warning_code_is_configurable() {
            let dir = TempDir::new().unwrap();
            let converter = Converter::new(fake::install(), "azw3", 3);
            let source = fake::book(dir.path(), "book.epub", 1);

            let err = converter.convert(&source).unwrap_err();

            assert!(matches!(err, ConvertError::ExitStatus { code: Some(1) }));
        }
    }
}
