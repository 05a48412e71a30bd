//! Filesystem helpers shared by the actions
//!
//! These are blocking; async callers wrap them in
//! [`tokio::task::spawn_blocking`].

use crate::error::{ActionError, Result};
use std::fs::{self, DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::Path;
use walkdir::WalkDir;

/// Copy a regular file atomically
///
/// The content is written to a temporary file next to `dest` and renamed
/// over it, so `dest` never appears half-written. Mode is preserved;
/// ownership is preserved when the process is allowed to change it.
pub fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let metadata = fs::metadata(source)?;
    let dir = dest.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

    let mut input = fs::File::open(source)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".oic-copy-")
        .tempfile_in(dir)?;
    io::copy(&mut input, temp.as_file_mut())?;

    temp.as_file()
        .set_permissions(Permissions::from_mode(metadata.mode()))?;
    // Changing ownership needs privileges we may not have
    let _ = std::os::unix::fs::fchown(temp.as_file(), Some(metadata.uid()), Some(metadata.gid()));

    temp.persist(dest).map_err(|e| ActionError::Io(e.error))?;
    Ok(())
}

/// Copy the tree rooted at `source` into the existing directory `dest`
///
/// `exclude` lists paths relative to `source`; an excluded directory is
/// skipped with everything below it. Symbolic links are recreated as
/// links, not followed.
pub fn copy_tree(source: &Path, dest: &Path, exclude: &[String]) -> Result<()> {
    let mut walker = WalkDir::new(source).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| ActionError::Io(io::Error::other(e)))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ActionError::ExecutionFailed(e.to_string()))?;

        if !rel.as_os_str().is_empty() && exclude.iter().any(|ex| Path::new(ex) == rel) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            let mode = entry.metadata().map_err(|e| ActionError::Io(io::Error::other(e)))?.mode();
            match DirBuilder::new().mode(mode & 0o7777).create(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        } else if file_type.is_file() {
            copy_file(entry.path(), &target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            if fs::symlink_metadata(&target).is_ok() {
                fs::remove_file(&target)?;
            }
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            return Err(ActionError::UnsupportedFileType(entry.path().to_path_buf()));
        }
    }

    Ok(())
}

/// Estimate the space needed to hold the tree at `path`
///
/// Sums the sizes of every entry (without following links) and adds
/// `margin_percent` on top, plus one byte.
pub fn estimate_directory_size(path: &Path, margin_percent: u64) -> Result<u64> {
    let mut total: u64 = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|e| ActionError::Io(io::Error::other(e)))?;
        let metadata = entry.metadata().map_err(|e| ActionError::Io(io::Error::other(e)))?;
        total += metadata.len();
    }
    Ok(1 + total + total * margin_percent / 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_file_preserves_mode() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("tool.sh");
        fs::write(&src, "#!/bin/sh\necho hi\n").unwrap();
        fs::set_permissions(&src, Permissions::from_mode(0o750)).unwrap();

        let dest = temp.path().join("copy.sh");
        copy_file(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "#!/bin/sh\necho hi\n");
        assert_eq!(fs::metadata(&dest).unwrap().mode() & 0o777, 0o750);
    }

    #[test]
    fn test_copy_file_replaces_existing() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("new");
        let dest = temp.path().join("old");
        fs::write(&src, "new").unwrap();
        fs::write(&dest, "old content that is longer").unwrap();

        copy_file(&src, &dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
        // No temporary files left behind
        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_copy_tree_with_exclude_and_symlink() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::create_dir_all(src.join("skip/inner")).unwrap();
        fs::write(src.join("a/b/file"), "data").unwrap();
        fs::write(src.join("skip/inner/file"), "data").unwrap();
        fs::write(src.join("top"), "top").unwrap();
        fs::write(src.join("excluded.txt"), "no").unwrap();
        std::os::unix::fs::symlink("top", src.join("link")).unwrap();

        let dest = temp.path().join("dest");
        fs::create_dir(&dest).unwrap();

        let exclude = vec!["skip".to_string(), "excluded.txt".to_string()];
        copy_tree(&src, &dest, &exclude).unwrap();

        assert_eq!(fs::read_to_string(dest.join("a/b/file")).unwrap(), "data");
        assert_eq!(fs::read_to_string(dest.join("top")).unwrap(), "top");
        assert!(!dest.join("skip").exists());
        assert!(!dest.join("excluded.txt").exists());
        assert_eq!(fs::read_link(dest.join("link")).unwrap(), Path::new("top"));

        // Copying again over the same destination succeeds
        copy_tree(&src, &dest, &exclude).unwrap();
    }

    #[test]
    fn test_estimate_directory_size() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("tree");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("a"), vec![0u8; 1000]).unwrap();
        fs::write(dir.join("b"), vec![0u8; 3000]).unwrap();

        let dir_size = fs::metadata(&dir).unwrap().len();
        let total = 4000 + dir_size;

        assert_eq!(estimate_directory_size(&dir, 0).unwrap(), total + 1);
        assert_eq!(
            estimate_directory_size(&dir, 25).unwrap(),
            1 + total + total / 4
        );
    }
}
