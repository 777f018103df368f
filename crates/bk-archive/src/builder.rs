//! Archive construction: stage, pack, checksum.

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};

use bk_config::SourceConfig;

use crate::checksum::sha256_file;
use crate::collect::collect_sources;
use crate::naming::generate_archive_name;
use crate::staging::StagingDir;

/// A built archive, still living in its staging directory.
///
/// Dropping the result removes the staging directory and the archive with
/// it; callers replicate the archive to its destinations first.
#[derive(Debug)]
pub struct ArchiveResult {
    /// Temporary archive path inside the staging directory.
    pub archive_path: PathBuf,
    pub filename: String,
    /// SHA-256 of the archive, lowercase hex.
    pub checksum: String,
    pub size_bytes: u64,
    pub files_count: u32,
    /// Roots of the sources that contributed files.
    pub source_paths: Vec<String>,
    staging: StagingDir,
}

impl ArchiveResult {
    /// Remove the staging directory now instead of waiting for drop.
    pub fn cleanup(self) -> crate::Result<()> {
        self.staging.cleanup()
    }
}

/// Builds file-kind archives from configured sources.
pub struct ArchiveBuilder {
    prefix: String,
    compression: u32,
}

impl ArchiveBuilder {
    pub fn new(prefix: &str, compression: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            compression,
        }
    }

    /// Collect, stage, and pack the given sources into a gzip-compressed
    /// tar. Fails with [`crate::Error::EmptyArchive`] when no files match.
    pub fn build(
        &self,
        schedule: &str,
        sources: &[(String, SourceConfig)],
    ) -> crate::Result<ArchiveResult> {
        let files = collect_sources(sources)?;
        if files.is_empty() {
            return Err(crate::Error::EmptyArchive);
        }
        let files_count = files.len() as u32;
        tracing::debug!(schedule, files = files_count, "collected files for archive");

        let staging = StagingDir::create()?;
        let stage_root = staging.materialize(&files)?;

        let source_names: Vec<String> = sources.iter().map(|(name, _)| name.clone()).collect();
        let filename = generate_archive_name(&self.prefix, schedule, &source_names, Utc::now());
        let archive_path = staging.path().join(&filename);

        pack_tree(&stage_root, &archive_path, self.compression)?;

        let checksum = sha256_file(&archive_path)?;
        let size_bytes = std::fs::metadata(&archive_path)?.len();
        let source_paths = sources
            .iter()
            .map(|(_, s)| s.path.to_string_lossy().into_owned())
            .collect();

        tracing::info!(schedule, %filename, size_bytes, files = files_count, "archive built");

        Ok(ArchiveResult {
            archive_path,
            filename,
            checksum,
            size_bytes,
            files_count,
            source_paths,
            staging,
        })
    }
}

/// Pack a directory tree as a gzip-compressed tar at the given level.
fn pack_tree(root: &Path, dest: &Path, compression: u32) -> crate::Result<()> {
    let file = std::fs::File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::new(compression));
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all("", root)?;
    builder.into_inner()?.finish()?;
    Ok(())
}
