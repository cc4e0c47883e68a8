//! Filesystem helpers shared by exports and persisted configuration.

use std::io::Write;
use std::path::Path;

/// Write `data` to `path` through a sibling temp file and a rename, so readers
/// see either the old content or the new content.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("out.json");
        std::fs::write(&path, "old").expect("failed to seed file");

        atomic_write(&path, b"new").expect("atomic write failed");

        assert_eq!(std::fs::read_to_string(&path).expect("read back"), "new");
        let leftovers = std::fs::read_dir(dir.path()).expect("list dir").count();
        assert_eq!(leftovers, 1);
    }
}
