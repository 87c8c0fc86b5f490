//! Universal package container.
//!
//! A package is a zip archive with a `upack.json` metadata entry at the
//! root and content entries under `package/`. The writer owns the output
//! file handle for the duration of construction; a failure mid-stream
//! leaves the partial file in place for inspection.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::metadata::PackageMetadata;

/// Name of the metadata entry inside the container.
pub const METADATA_ENTRY: &str = "upack.json";

/// Prefix under which content entries are stored.
pub const CONTENT_PREFIX: &str = "package/";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invalid entry path in archive: {0}")]
    InvalidEntry(String),

    #[error("Archive has no {METADATA_ENTRY} metadata entry")]
    MissingMetadata,
}

/// Streams files into a new package archive.
pub struct PackageWriter {
    zip: ZipWriter<File>,
    options: SimpleFileOptions,
}

impl std::fmt::Debug for PackageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageWriter").finish_non_exhaustive()
    }
}

impl PackageWriter {
    /// Create the output file and write the metadata entry.
    pub fn create(path: &Path, metadata: &PackageMetadata) -> Result<Self, ArchiveError> {
        let file = File::create(path)?;
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut zip = ZipWriter::new(file);
        zip.start_file(METADATA_ENTRY, options)?;
        serde_json::to_writer_pretty(&mut zip, metadata)?;

        Ok(Self { zip, options })
    }

    /// Stream one file into the archive at the given relative path.
    pub fn add_file(&mut self, relative_path: &str, source: &Path) -> Result<(), ArchiveError> {
        self.zip
            .start_file(format!("{CONTENT_PREFIX}{relative_path}"), self.options)?;
        let mut reader = File::open(source)?;
        io::copy(&mut reader, &mut self.zip)?;
        Ok(())
    }

    /// Finalize the archive, flushing and closing the output file.
    pub fn finish(self) -> Result<(), ArchiveError> {
        let mut file = self.zip.finish()?;
        io::Write::flush(&mut file)?;
        Ok(())
    }
}

/// Reads a package archive from any seekable source.
pub struct PackageReader<R: Read + io::Seek> {
    zip: ZipArchive<R>,
}

impl<R: Read + io::Seek> std::fmt::Debug for PackageReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageReader").finish_non_exhaustive()
    }
}

impl<R: Read + io::Seek> PackageReader<R> {
    /// Open a package archive.
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        Ok(Self {
            zip: ZipArchive::new(reader)?,
        })
    }

    /// Read and parse the metadata entry.
    pub fn metadata(&mut self) -> Result<PackageMetadata, ArchiveError> {
        let mut text = String::new();
        match self.zip.by_name(METADATA_ENTRY) {
            Ok(mut entry) => {
                entry.read_to_string(&mut text)?;
            }
            Err(zip::result::ZipError::FileNotFound) => return Err(ArchiveError::MissingMetadata),
            Err(e) => return Err(e.into()),
        }
        Ok(PackageMetadata::from_json_str(&text)?)
    }

    /// Relative paths of all content entries, in archive order.
    pub fn content_paths(&self) -> Vec<String> {
        self.zip
            .file_names()
            .filter_map(|name| name.strip_prefix(CONTENT_PREFIX))
            .filter(|rest| !rest.is_empty() && !rest.ends_with('/'))
            .map(ToString::to_string)
            .collect()
    }

    /// Extract all content entries into `dest`, creating intermediate
    /// directories as needed.
    ///
    /// Extraction is best effort: a failure partway through leaves already
    /// extracted files on disk and surfaces the error.
    pub fn extract_into(&mut self, dest: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
        fs::create_dir_all(dest)?;
        let mut extracted = Vec::new();

        for index in 0..self.zip.len() {
            let mut entry = self.zip.by_index(index)?;
            let name = entry.name().to_string();

            let Some(content_path) = name.strip_prefix(CONTENT_PREFIX) else {
                continue;
            };
            if content_path.is_empty() {
                continue;
            }

            // Zip-slip guard: every component of the stripped path must be a
            // plain name, so `..` (or an absolute path) can never escape dest.
            let relative = Path::new(content_path);
            if relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(ArchiveError::InvalidEntry(name));
            }

            let target = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
            }

            extracted.push(target);
        }

        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::MetadataValue;
    use crate::types::PackageIdentity;
    use std::fs;
    use tempfile::tempdir;

    fn identity() -> PackageIdentity {
        PackageIdentity::new(Some("demo"), "pkg", "1.0.0").unwrap()
    }

    fn write_fixture(dir: &Path) -> PathBuf {
        let src = dir.join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();
        fs::write(src.join("sub").join("b.txt"), "beta").unwrap();

        let archive = dir.join("pkg-1.0.0.upack");
        let meta = PackageMetadata::for_identity(&identity());
        let mut writer = PackageWriter::create(&archive, &meta).unwrap();
        writer.add_file("a.txt", &src.join("a.txt")).unwrap();
        writer
            .add_file("sub/b.txt", &src.join("sub").join("b.txt"))
            .unwrap();
        writer.finish().unwrap();
        archive
    }

    #[test]
    fn test_write_then_read_metadata() {
        let dir = tempdir().unwrap();
        let archive = write_fixture(dir.path());

        let mut reader = PackageReader::new(File::open(&archive).unwrap()).unwrap();
        let meta = reader.metadata().unwrap();
        assert_eq!(
            meta.get("name").and_then(MetadataValue::as_text),
            Some("pkg")
        );
        assert_eq!(meta.identity().unwrap(), identity());
    }

    #[test]
    fn test_content_paths() {
        let dir = tempdir().unwrap();
        let archive = write_fixture(dir.path());

        let reader = PackageReader::new(File::open(&archive).unwrap()).unwrap();
        let mut paths = reader.content_paths();
        paths.sort_unstable();
        assert_eq!(paths, vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn test_extract_creates_tree() {
        let dir = tempdir().unwrap();
        let archive = write_fixture(dir.path());
        let target = dir.path().join("out");

        let mut reader = PackageReader::new(File::open(&archive).unwrap()).unwrap();
        let extracted = reader.extract_into(&target).unwrap();

        assert_eq!(extracted.len(), 2);
        assert_eq!(fs::read_to_string(target.join("a.txt")).unwrap(), "alpha");
        assert_eq!(
            fs::read_to_string(target.join("sub").join("b.txt")).unwrap(),
            "beta"
        );
    }

    #[test]
    fn test_missing_metadata_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bare.upack");
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("package/loose.txt", SimpleFileOptions::default())
            .unwrap();
        io::Write::write_all(&mut zip, b"x").unwrap();
        zip.finish().unwrap();

        let mut reader = PackageReader::new(File::open(&path).unwrap()).unwrap();
        assert!(matches!(
            reader.metadata(),
            Err(ArchiveError::MissingMetadata)
        ));
    }

    #[test]
    fn test_traversal_entry_rejected_and_earlier_files_retained() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evil.upack");
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("package/ok.txt", SimpleFileOptions::default())
            .unwrap();
        io::Write::write_all(&mut zip, b"fine").unwrap();
        zip.start_file("package/../escape.txt", SimpleFileOptions::default())
            .unwrap();
        io::Write::write_all(&mut zip, b"evil").unwrap();
        zip.finish().unwrap();

        let target = dir.path().join("out");
        let mut reader = PackageReader::new(File::open(&path).unwrap()).unwrap();
        let err = reader.extract_into(&target).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidEntry(_)));

        // Nothing escapes the target directory.
        assert!(!dir.path().join("escape.txt").exists());
        // Entries extracted before the failure are left in place.
        assert_eq!(fs::read_to_string(target.join("ok.txt")).unwrap(), "fine");
    }

    #[test]
    fn test_absolute_entry_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abs.upack");
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        zip.start_file("package//etc/evil.txt", SimpleFileOptions::default())
            .unwrap();
        io::Write::write_all(&mut zip, b"evil").unwrap();
        zip.finish().unwrap();

        let target = dir.path().join("out");
        let mut reader = PackageReader::new(File::open(&path).unwrap()).unwrap();
        assert!(matches!(
            reader.extract_into(&target),
            Err(ArchiveError::InvalidEntry(_))
        ));
    }

    #[test]
    fn test_failed_add_leaves_partial_archive() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "alpha").unwrap();

        let archive = dir.path().join("partial.upack");
        let meta = PackageMetadata::for_identity(&identity());
        let mut writer = PackageWriter::create(&archive, &meta).unwrap();
        writer.add_file("a.txt", &src.join("a.txt")).unwrap();
        // A vanished source file fails the stream mid-build.
        assert!(writer.add_file("gone.txt", &src.join("gone.txt")).is_err());
        drop(writer);

        // The partial file is retained for inspection, not deleted.
        assert!(archive.exists());
    }

    #[test]
    fn test_non_content_entries_ignored_on_extract() {
        let dir = tempdir().unwrap();
        let archive = write_fixture(dir.path());
        let target = dir.path().join("out");

        let mut reader = PackageReader::new(File::open(&archive).unwrap()).unwrap();
        reader.extract_into(&target).unwrap();
        assert!(!target.join(METADATA_ENTRY).exists());
    }
}
