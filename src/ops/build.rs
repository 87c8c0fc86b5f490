//! Package build operation.
//!
//! Walks a masked file set and streams it into a new package archive with
//! merged metadata. Several conditions are deliberately non-fatal skips
//! (output exists without overwrite, missing source directory, empty match
//! set): the operation logs and yields no result instead of failing, so
//! callers can treat them as "nothing to do".

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::UPACK_EXTENSION;
use crate::core::mask::{FileMask, enumerate_tree};
use crate::core::metadata::{MetadataValue, PackageMetadata};
use crate::io::archive::PackageWriter;
use crate::ops::error::BuildError;
use crate::types::PackageIdentity;

/// Inputs to [`build_package`].
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Directory whose contents are captured.
    pub source_dir: PathBuf,
    /// Include masks; empty means everything.
    pub include: Vec<String>,
    /// Exclude masks; take precedence over includes.
    pub exclude: Vec<String>,
    /// Optional package group.
    pub group: Option<String>,
    /// Package name.
    pub name: String,
    /// Package version string.
    pub version: String,
    /// Extra metadata entries; reserved identity keys are dropped with a
    /// warning.
    pub extra_metadata: Vec<(String, MetadataValue)>,
    /// Output file, or a directory in which `<name>-<version>.upack` is
    /// synthesized.
    pub output: PathBuf,
    /// Replace an existing archive instead of skipping.
    pub overwrite: bool,
}

/// Build a package archive.
///
/// Returns the validated identity on success, or `Ok(None)` when one of
/// the skip conditions applies. Identity validation happens before any
/// filesystem mutation; a validation failure never creates or truncates
/// the output. A failure mid-stream leaves the partial archive in place.
pub fn build_package(request: &BuildRequest) -> Result<Option<PackageIdentity>, BuildError> {
    // 1. Validate identity before any I/O.
    let identity =
        PackageIdentity::new(request.group.as_deref(), &request.name, &request.version)?;
    let mask = FileMask::new(&request.include, &request.exclude)?;

    // 2. Resolve the output path; nothing is created until step 7.
    let output = resolve_output_path(&request.output, &identity);

    // 3. Existing output without overwrite is a skip, not an error.
    if output.exists() && !request.overwrite {
        warn!(
            "{} already exists and overwrite is disabled; skipping build of {identity}",
            output.display()
        );
        return Ok(None);
    }

    // 4. A missing source directory means nothing to capture.
    if !request.source_dir.is_dir() {
        warn!(
            "source directory {} does not exist; nothing to package for {identity}",
            request.source_dir.display()
        );
        return Ok(None);
    }

    // 5. Enumerate the masked file set.
    let entries = enumerate_tree(&request.source_dir, &mask)?;
    if entries.is_empty() {
        warn!("mask matched no files under {}; skipping {identity}", request.source_dir.display());
        return Ok(None);
    }

    // 6. Merge caller metadata into the identity-seeded mapping.
    let mut metadata = PackageMetadata::for_identity(&identity);
    metadata.merge_extra(request.extra_metadata.iter().cloned());

    // 7. Stream the matched entries into the archive.
    info!(
        "packaging {} files from {} into {}",
        entries.len(),
        request.source_dir.display(),
        output.display()
    );
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = PackageWriter::create(&output, &metadata)?;
    for entry in &entries {
        writer.add_file(&entry.relative_path, &entry.absolute_path)?;
    }
    writer.finish()?;

    info!("built {identity} -> {}", output.display());
    Ok(Some(identity))
}

/// Treat the output as a directory when it already is one or lacks the
/// package extension, synthesizing `<name>-<version>.upack` inside it.
///
/// Pure path computation; directories are created only when the archive
/// is actually written.
fn resolve_output_path(output: &Path, identity: &PackageIdentity) -> PathBuf {
    let is_archive_name = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(UPACK_EXTENSION));

    if output.is_dir() || !is_archive_name {
        output.join(format!("{}.{UPACK_EXTENSION}", identity.file_stem()))
    } else {
        output.to_path_buf()
    }
}
