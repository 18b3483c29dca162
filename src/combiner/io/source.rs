//! Discovery of candidate data files inside an input container.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::combiner::config::CombinerConfig;
use crate::combiner::error::{CombineError, FileError, Result};

/// A directory tree or a zip archive holding source files.
pub enum Container {
    Directory(PathBuf),
    Archive {
        path: PathBuf,
        archive: ZipArchive<File>,
    },
}

impl Container {
    /// Opens `path` as a directory, or as a zip archive when it is a file.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CombineError::MissingInput(path.to_path_buf()));
        }
        if path.is_dir() {
            return Ok(Container::Directory(path.to_path_buf()));
        }

        let unreadable = |reason: String| CombineError::ContainerUnreadable {
            path: path.to_path_buf(),
            reason,
        };
        let file = File::open(path).map_err(|error| unreadable(error.to_string()))?;
        let archive = ZipArchive::new(file).map_err(|error| unreadable(error.to_string()))?;
        Ok(Container::Archive {
            path: path.to_path_buf(),
            archive,
        })
    }

    pub fn path(&self) -> &Path {
        match self {
            Container::Directory(root) => root,
            Container::Archive { path, .. } => path,
        }
    }

    /// Lists every file in the container as a `/`-separated path relative to
    /// the container root. Directories are sorted by path; archives keep their
    /// stored order.
    ///
    /// Archive entries are listed from the central directory without being
    /// opened, so an encrypted or unsupported entry only fails when it is read.
    pub fn entries(&mut self) -> Result<Vec<String>> {
        match self {
            Container::Directory(root) => list_directory(root),
            Container::Archive { path, archive } => {
                let mut names = Vec::with_capacity(archive.len());
                for index in 0..archive.len() {
                    let name = archive.name_for_index(index).ok_or_else(|| {
                        CombineError::ContainerUnreadable {
                            path: path.clone(),
                            reason: format!("entry {index} has no name"),
                        }
                    })?;
                    if !name.ends_with('/') {
                        names.push(name.to_string());
                    }
                }
                Ok(names)
            }
        }
    }

    /// Reads the full content of one entry.
    pub fn read(&mut self, name: &str) -> std::result::Result<Vec<u8>, FileError> {
        let unreadable = |reason: String| FileError::Unreadable { reason };
        match self {
            Container::Directory(root) => {
                fs::read(root.join(name)).map_err(|error| unreadable(error.to_string()))
            }
            Container::Archive { archive, .. } => {
                let mut entry = archive
                    .by_name(name)
                    .map_err(|error| unreadable(error.to_string()))?;
                let mut bytes = Vec::new();
                entry
                    .read_to_end(&mut bytes)
                    .map_err(|error| unreadable(error.to_string()))?;
                Ok(bytes)
            }
        }
    }
}

fn list_directory(root: &Path) -> Result<Vec<String>> {
    let unreadable = |reason: String| CombineError::ContainerUnreadable {
        path: root.to_path_buf(),
        reason,
    };
    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    let paths = glob::glob(&pattern).map_err(|error| unreadable(error.to_string()))?;

    let mut names = Vec::new();
    for path in paths {
        let path = path.map_err(|error| unreadable(error.to_string()))?;
        if !path.is_file() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(&path);
        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Returns whether an entry name refers to a data file: the extension is one
/// of the configured ones, no path segment is platform metadata and the base
/// name is not hidden.
pub fn is_candidate(name: &str, config: &CombinerConfig) -> bool {
    let normalized = name.replace('\\', "/");
    let lowered = normalized.to_lowercase();

    let in_metadata = config
        .metadata_markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| lowered.contains(&marker.to_lowercase()));
    if in_metadata {
        return false;
    }

    let base = normalized.rsplit('/').next().unwrap_or_default();
    if config
        .hidden_prefixes
        .iter()
        .any(|prefix| base.starts_with(*prefix))
    {
        return false;
    }

    match Path::new(base).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => config
            .extensions
            .iter()
            .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Lists candidate data files in container order. An empty result is not an
/// error here; callers decide whether it is fatal.
pub fn locate(container: &mut Container, config: &CombinerConfig) -> Result<Vec<String>> {
    let entries = container.entries()?;
    let total = entries.len();
    let candidates: Vec<String> = entries
        .into_iter()
        .filter(|name| is_candidate(name, config))
        .collect();
    debug!(
        container = %container.path().display(),
        entries = total,
        candidates = candidates.len(),
        "listed container"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    #[test]
    fn extension_match_ignores_case() {
        let config = CombinerConfig::default();
        assert!(is_candidate("meters/site-a.XLSX", &config));
        assert!(is_candidate("B.csv", &config));
        assert!(!is_candidate("notes.txt", &config));
        assert!(!is_candidate("README", &config));
    }

    #[test]
    fn platform_metadata_and_hidden_files_are_excluded() {
        let config = CombinerConfig::default();
        assert!(!is_candidate("__MACOSX/site-a.xlsx", &config));
        assert!(!is_candidate("batch/__macosx/._site-a.xlsx", &config));
        assert!(!is_candidate("batch/._site-a.xlsx", &config));
        assert!(!is_candidate("~$site-a.xlsx", &config));
        assert!(is_candidate("batch/site.a.xlsx", &config));
    }

    #[test]
    fn directory_listing_is_sorted_and_recursive() {
        let dir = tempdir().expect("temporary directory");
        fs::create_dir(dir.path().join("nested")).expect("nested directory");
        fs::write(dir.path().join("b.csv"), "Timestamp\n").expect("b written");
        fs::write(dir.path().join("nested/a.csv"), "Timestamp\n").expect("a written");
        fs::write(dir.path().join(".hidden.csv"), "Timestamp\n").expect("hidden written");

        let mut container = Container::open(dir.path()).expect("directory opened");
        let candidates =
            locate(&mut container, &CombinerConfig::default()).expect("candidates listed");
        assert_eq!(candidates, vec!["b.csv".to_string(), "nested/a.csv".to_string()]);

        let bytes = container.read("nested/a.csv").expect("entry read");
        assert_eq!(bytes, b"Timestamp\n");
    }

    #[test]
    fn archive_entries_keep_stored_order() {
        let dir = tempdir().expect("temporary directory");
        let zip_path = dir.path().join("batch.zip");
        let mut writer = zip::ZipWriter::new(File::create(&zip_path).expect("zip created"));
        for name in ["z.csv", "__MACOSX/._z.csv", "a.csv"] {
            writer
                .start_file(name, SimpleFileOptions::default())
                .expect("entry started");
            writer.write_all(b"Timestamp\n").expect("entry written");
        }
        writer.finish().expect("zip finished");

        let mut container = Container::open(&zip_path).expect("archive opened");
        let candidates =
            locate(&mut container, &CombinerConfig::default()).expect("candidates listed");
        assert_eq!(candidates, vec!["z.csv".to_string(), "a.csv".to_string()]);
    }

    #[test]
    fn non_archive_file_is_unreadable() {
        let dir = tempdir().expect("temporary directory");
        let path = dir.path().join("plain.csv");
        fs::write(&path, "not a zip").expect("file written");
        assert!(matches!(
            Container::open(&path),
            Err(CombineError::ContainerUnreadable { .. })
        ));
    }

    #[test]
    fn missing_path_is_reported() {
        let dir = tempdir().expect("temporary directory");
        assert!(matches!(
            Container::open(&dir.path().join("absent")),
            Err(CombineError::MissingInput(_))
        ));
    }
}
