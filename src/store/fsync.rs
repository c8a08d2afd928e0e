//! Low-level fsync operations for the event journal.
//!
//! Both file and directory fsyncs are required for crash safety: renaming a
//! compacted journal into place updates the directory entry, which is only
//! durable once the directory itself is synced.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Syncs a file's contents and metadata to disk.
pub fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory so that entries created or renamed in it survive a crash.
pub fn fsync_dir(dir_path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(dir_path)?;
    dir.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn fsync_file_works() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut file = File::create(&path).unwrap();
        file.write_all(b"{}\n").unwrap();

        fsync_file(&file).unwrap();
    }

    #[test]
    fn fsync_dir_works() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("events.jsonl")).unwrap();

        fsync_dir(dir.path()).unwrap();
    }

    #[test]
    fn fsync_dir_fails_on_nonexistent() {
        let result = fsync_dir(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(result.is_err());
    }
}
