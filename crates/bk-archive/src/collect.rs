//! File collection with include/exclude glob composition.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use bk_config::SourceConfig;

/// One file admitted by the collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    /// Absolute path of the file on disk.
    pub absolute: PathBuf,
    /// Archive-relative path, prefixed with the source basename.
    pub relative: PathBuf,
    pub size: u64,
}

/// Compiled include/exclude pattern sets for one source.
pub struct PatternSet {
    includes: GlobSet,
    excludes: GlobSet,
}

impl PatternSet {
    /// Compile a pattern list. Patterns prefixed with `!` become excludes;
    /// an empty include list defaults to `**/*`.
    pub fn compile(patterns: &[String]) -> crate::Result<Self> {
        let mut includes = GlobSetBuilder::new();
        let mut excludes = GlobSetBuilder::new();
        let mut any_include = false;

        for pattern in patterns {
            let (builder, raw) = match pattern.strip_prefix('!') {
                Some(stripped) => (&mut excludes, stripped),
                None => {
                    any_include = true;
                    (&mut includes, pattern.as_str())
                }
            };
            let glob = GlobBuilder::new(raw)
                .literal_separator(true)
                .build()
                .map_err(|e| crate::Error::pattern(pattern.clone(), e.to_string()))?;
            builder.add(glob);
        }

        if !any_include {
            let glob = GlobBuilder::new("**/*")
                .literal_separator(true)
                .build()
                .map_err(|e| crate::Error::pattern("**/*", e.to_string()))?;
            includes.add(glob);
        }

        Ok(Self {
            includes: includes
                .build()
                .map_err(|e| crate::Error::pattern("<include set>", e.to_string()))?,
            excludes: excludes
                .build()
                .map_err(|e| crate::Error::pattern("<exclude set>", e.to_string()))?,
        })
    }

    /// Whether a source-relative path is admitted.
    pub fn matches(&self, relative: &Path) -> bool {
        self.includes.is_match(relative) && !self.excludes.is_match(relative)
    }
}

/// Collect files from every given source, in order. Duplicate absolute
/// paths are admitted once; missing source paths warn and contribute
/// nothing.
pub fn collect_sources(sources: &[(String, SourceConfig)]) -> crate::Result<Vec<CollectedFile>> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut collected = Vec::new();

    for (name, source) in sources {
        if !source.path.exists() {
            tracing::warn!(source = %name, path = %source.path.display(), "source path missing, skipping");
            continue;
        }
        let patterns = PatternSet::compile(&source.patterns)?;
        collect_source(name, source, &patterns, &mut seen, &mut collected)?;
    }

    Ok(collected)
}

fn collect_source(
    name: &str,
    source: &SourceConfig,
    patterns: &PatternSet,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<CollectedFile>,
) -> crate::Result<()> {
    let root = &source.path;
    let basename = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(source = %name, error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        if !patterns.matches(relative) {
            continue;
        }

        let absolute = entry.path().to_path_buf();
        if !seen.insert(absolute.clone()) {
            continue;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        out.push(CollectedFile {
            absolute,
            relative: Path::new(&basename).join(relative),
            size,
        });
    }

    Ok(())
}
