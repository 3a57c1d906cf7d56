//! Moves a file onto another volume by copying it and deleting the original.
//!
//! A rename cannot cross filesystems, and the device is almost always a
//! different filesystem from the working directory. The move happens in
//! five steps, each with its own [`RelocateErrorKind`]:
//! 1.  Open the source for reading.
//! 2.  Create the destination.
//! 3.  Stream the bytes across.
//! 4.  Sync the destination to stable storage.
//! 5.  Remove the source.
//!
//! The source is only removed once the copy is durable, so an interruption
//! between steps 4 and 5 leaves two copies rather than none. Every handle is
//! owned by this function and closed on every return path.
//!
//! Moving a file onto itself is a no-op. If the copy or sync fails, the
//! partial destination is removed so the device is not left with a
//! truncated book.
use crate::error::{RelocateError, RelocateErrorKind};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

const BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

/// Moves `src` to `dst`, overwriting `dst` if it exists.
pub fn relocate(src: &Path, dst: &Path) -> Result<(), RelocateError> {
    run(src, dst, false)
}

/// Like [`relocate`], but reads the destination back after syncing and
/// compares its SHA-256 digest with what was copied. On a mismatch the
/// source is kept.
pub fn relocate_verified(src: &Path, dst: &Path) -> Result<(), RelocateError> {
    run(src, dst, true)
}

pub(crate) fn run(src: &Path, dst: &Path, verify: bool) -> Result<(), RelocateError> {
    use RelocateErrorKind as Kind;

    let mut input = File::open(src).map_err(|e| RelocateError::new(Kind::OpenSource, src, e))?;

    // Creating the destination would truncate the source.
    if is_same_file(src, dst) {
        tracing::debug!(path = %src.display(), "Source is already at its destination");
        return Ok(());
    }

    let mut output = File::create(dst).map_err(|e| RelocateError::new(Kind::OpenDest, dst, e))?;

    let mut hasher = verify.then(Sha256::default);
    let copied = match copy(&mut input, &mut output, hasher.as_mut()) {
        Ok(n) => n,
        Err(e) => {
            drop(output);
            discard_partial(dst);
            return Err(RelocateError::new(Kind::Copy, dst, e));
        }
    };
    drop(input);

    if let Err(e) = output.sync_all() {
        drop(output);
        discard_partial(dst);
        return Err(RelocateError::new(Kind::Sync, dst, e));
    }
    drop(output);

    if let Some(hasher) = hasher {
        let expected = hasher.finalize();
        let actual = digest_file(dst).map_err(|e| RelocateError::new(Kind::Verify, dst, e))?;
        if expected != actual {
            return Err(RelocateError::new(
                Kind::Verify,
                dst,
                io::Error::new(io::ErrorKind::InvalidData, "checksum of copy does not match source"),
            ));
        }
    }

    fs::remove_file(src).map_err(|e| RelocateError::new(Kind::RemoveSource, src, e))?;

    tracing::debug!(src = %src.display(), dst = %dst.display(), bytes = copied, verified = verify, "Relocated file");
    Ok(())
}

/// True if both paths name the same existing file.
fn is_same_file(src: &Path, dst: &Path) -> bool {
    if src == dst {
        return true;
    }
    match (fs::canonicalize(src), fs::canonicalize(dst)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Removes a half-written destination. Only regular files are touched, so a
/// device node given as `dst` is left alone.
fn discard_partial(dst: &Path) {
    if !fs::symlink_metadata(dst).is_ok_and(|m| m.is_file()) {
        return;
    }
    if let Err(e) = fs::remove_file(dst) {
        tracing::warn!(path = %dst.display(), error = %e, "Failed to remove partial copy");
    }
}

fn copy(input: &mut File, output: &mut File, mut hasher: Option<&mut Sha256>) -> io::Result<u64> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        output.write_all(&buffer[..n])?;
        if let Some(hasher) = hasher.as_deref_mut() {
            hasher.update(&buffer[..n]);
        }
        total += n as u64;
    }
    output.flush()?;
    Ok(total)
}

fn digest_file(path: &Path) -> io::Result<sha2::digest::Output<Sha256>> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case::empty(Vec::new())]
    #[case::small(b"A tale of two cities".to_vec())]
    #[case::larger_than_buffer((0..BUFFER_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect())]
    fn moves_bytes_exactly(#[case] content: Vec<u8>, #[values(false, true)] verify: bool) {
        let work = TempDir::new().unwrap();
        let device = TempDir::new().unwrap();
        let src = work.path().join("book.azw3");
        let dst = device.path().join("book.azw3");
        fs::write(&src, &content).unwrap();

        run(&src, &dst, verify).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), content);
        assert!(!src.exists());
    }

    #[test]
    fn overwrites_existing_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("new.azw3");
        let dst = dir.path().join("old.azw3");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"previous, longer contents").unwrap();

        relocate(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"new");
    }

    #[test]
    fn missing_source_is_open_source() {
        let dir = TempDir::new().unwrap();
        let err = relocate(&dir.path().join("missing.azw3"), &dir.path().join("out.azw3")).unwrap_err();

        assert_eq!(err.kind, RelocateErrorKind::OpenSource);
        assert!(!dir.path().join("out.azw3").exists());
    }

    #[test]
    fn missing_destination_dir_is_open_dest() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("book.azw3");
        fs::write(&src, b"data").unwrap();

        let err = relocate(&src, &dir.path().join("documents/book.azw3")).unwrap_err();

        assert_eq!(err.kind, RelocateErrorKind::OpenDest);
        assert!(src.exists(), "source must survive a failed move");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_source_is_copy_failure() {
        let dir = TempDir::new().unwrap();
        // Opening a directory succeeds on Unix, reading from it does not.
        let src = dir.path().join("not-a-file");
        fs::create_dir(&src).unwrap();

        let dst = dir.path().join("out.azw3");
        let err = relocate(&src, &dst).unwrap_err();

        assert_eq!(err.kind, RelocateErrorKind::Copy);
        assert!(src.exists());
        assert!(!dst.exists(), "partial copy must not be left behind");
    }

    #[rstest]
    fn moving_onto_itself_keeps_the_file(#[values(false, true)] verify: bool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.azw3");
        fs::write(&path, b"converted").unwrap();

        run(&path, &path, verify).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"converted");
    }

    #[test]
    fn moving_onto_itself_through_another_path_keeps_the_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("documents")).unwrap();
        let path = dir.path().join("documents/book.azw3");
        fs::write(&path, b"converted").unwrap();
        let alias = dir.path().join("documents/../documents/book.azw3");

        relocate(&path, &alias).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"converted");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unsyncable_destination_is_sync_failure() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("empty.azw3");
        fs::write(&src, b"").unwrap();

        // Character devices reject fsync with EINVAL.
        let err = relocate(&src, Path::new("/dev/null")).unwrap_err();

        assert_eq!(err.kind, RelocateErrorKind::Sync);
        assert!(src.exists());
        assert!(Path::new("/dev/null").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn undeletable_source_is_remove_source_failure() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("status");

        // procfs files can be read but never unlinked, even by root.
        let err = relocate(Path::new("/proc/self/status"), &dst).unwrap_err();

        assert_eq!(err.kind, RelocateErrorKind::RemoveSource);
        assert!(dst.is_file(), "the durable copy stays when the source can't be removed");
    }
}
