//! Uploaded files on disk, addressed by paths relative to the media root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::StoreError;

#[derive(Debug, Clone)]
pub struct Media {
    root: PathBuf,
}

impl Media {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an upload under `documents/YYYY/MM/DD/`. An existing file with
    /// the same name gets a numeric suffix. Returns the relative path and size.
    pub fn save_document(
        &self,
        file_name: &str,
        bytes: &[u8],
        day: NaiveDate,
    ) -> Result<(String, i64), StoreError> {
        let dir = format!("documents/{}", day.format("%Y/%m/%d"));
        fs::create_dir_all(self.root.join(&dir))?;

        let clean = sanitize_file_name(file_name);
        let (stem, ext) = match clean.rsplit_once('.') {
            Some((s, e)) if !s.is_empty() => (s.to_string(), format!(".{e}")),
            _ => (clean.clone(), String::new()),
        };
        let mut relative = format!("{dir}/{clean}");
        let mut n = 1;
        while self.root.join(&relative).exists() {
            relative = format!("{dir}/{stem}_{n}{ext}");
            n += 1;
        }

        fs::write(self.root.join(&relative), bytes)?;
        debug!(path = %relative, size = bytes.len(), "stored upload");
        Ok((relative, bytes.len() as i64))
    }

    /// Absolute path for a stored relative path. Rejects paths that would
    /// escape the media root.
    pub fn path(&self, relative: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(relative);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::InvalidValue(format!("unsafe media path: {relative}")));
        }
        Ok(self.root.join(rel))
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>, StoreError> {
        Ok(fs::read(self.path(relative)?)?)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).is_ok_and(|p| p.is_file())
    }

    /// Remove a stored file; a file that is already gone is not an error.
    pub fn remove(&self, relative: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(relative)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %relative, "stored file already missing");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Keep the last path component and replace anything outside
/// `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || "._-".contains(c) { c } else { '_' })
        .collect();
    let clean = clean.trim_start_matches('.').to_string();
    if clean.is_empty() { "upload".to_string() } else { clean }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn saves_under_dated_directory_with_suffix_on_collision() {
        let dir = TempDir::new().unwrap();
        let media = Media::new(dir.path());
        let (first, size) = media.save_document("deed.txt", b"hello", day()).unwrap();
        let (second, _) = media.save_document("deed.txt", b"again", day()).unwrap();
        assert_eq!(first, "documents/2024/03/09/deed.txt");
        assert_eq!(second, "documents/2024/03/09/deed_1.txt");
        assert_eq!(size, 5);
        assert_eq!(media.read(&second).unwrap(), b"again");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let media = Media::new(dir.path());
        let (rel, _) = media.save_document("a.txt", b"x", day()).unwrap();
        media.remove(&rel).unwrap();
        assert!(!media.exists(&rel));
        media.remove(&rel).unwrap();
    }

    #[test]
    fn rejects_traversal() {
        let media = Media::new("/tmp/media");
        assert!(media.path("../etc/passwd").is_err());
        assert!(media.path("/etc/passwd").is_err());
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_file_name("../../evil name.pdf"), "evil_name.pdf");
        assert_eq!(sanitize_file_name("C:\\docs\\deed.txt"), "deed.txt");
        assert_eq!(sanitize_file_name(".."), "upload");
    }
}
