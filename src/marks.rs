//! Marking files by symlinking them into a directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct MarkDirectory {
    dir: PathBuf,
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

impl MarkDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn link_for(&self, file: &Path) -> Result<(PathBuf, PathBuf)> {
        let target = fs::canonicalize(file).map_err(|e| Error::io(file, e))?;
        let name = target.file_name().ok_or_else(|| {
            Error::io(file, io::Error::new(io::ErrorKind::InvalidInput, "no file name"))
        })?;
        Ok((self.dir.join(name), target))
    }

    pub fn is_marked(&self, file: &Path) -> bool {
        match self.link_for(file) {
            Ok((link, target)) => fs::read_link(&link).is_ok_and(|current| current == target),
            Err(_) => false,
        }
    }

    pub fn mark(&self, file: &Path) -> Result<()> {
        let (link, target) = self.link_for(file)?;
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        match fs::read_link(&link) {
            Ok(current) if current == target => return Ok(()),
            // A different file with the same name was marked earlier
            Ok(_) => fs::remove_file(&link).map_err(|e| Error::io(&link, e))?,
            Err(_) => {}
        }

        symlink(&target, &link).map_err(|e| Error::io(&link, e))?;
        log::info!("Marked {}", target.display());
        Ok(())
    }

    pub fn unmark(&self, file: &Path) -> Result<()> {
        let (link, target) = self.link_for(file)?;
        match fs::read_link(&link) {
            Ok(current) if current == target => {
                fs::remove_file(&link).map_err(|e| Error::io(&link, e))?;
                log::info!("Unmarked {}", target.display());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns whether the file is marked afterwards.
    pub fn toggle(&self, file: &Path) -> Result<bool> {
        if self.is_marked(file) {
            self.unmark(file)?;
            Ok(false)
        } else {
            self.mark(file)?;
            Ok(true)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::write_png;

    #[test]
    fn mark_unmark_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_png(dir.path(), "a.png");
        let marks = MarkDirectory::new(dir.path().join("marked"));

        assert!(!marks.is_marked(&file));
        marks.mark(&file).unwrap();
        marks.mark(&file).unwrap();
        assert!(marks.is_marked(&file));

        let link = marks.path().join("a.png");
        assert_eq!(fs::read_link(&link).unwrap(), fs::canonicalize(&file).unwrap());

        assert!(!marks.toggle(&file).unwrap());
        assert!(!marks.is_marked(&file));
        assert!(!link.exists());
        assert!(marks.toggle(&file).unwrap());
        assert!(marks.is_marked(&file));
    }

    #[test]
    fn same_name_replaces_stale_link() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("one")).unwrap();
        fs::create_dir(dir.path().join("two")).unwrap();
        let first = write_png(&dir.path().join("one"), "x.png");
        let second = write_png(&dir.path().join("two"), "x.png");
        let marks = MarkDirectory::new(dir.path().join("marked"));

        marks.mark(&first).unwrap();
        marks.mark(&second).unwrap();
        assert!(!marks.is_marked(&first));
        assert!(marks.is_marked(&second));

        marks.unmark(&first).unwrap();
        assert!(marks.is_marked(&second));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let marks = MarkDirectory::new(dir.path());
        assert!(marks.mark(&dir.path().join("gone.png")).is_err());
        assert!(!marks.is_marked(&dir.path().join("gone.png")));
    }
}
