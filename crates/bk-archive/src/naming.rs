//! Archive filename generation and parsing.
//!
//! Filenames are a contract: the cleanup safety validator refuses to delete
//! anything whose name does not parse back to one of the two formats below
//! with the configured prefix.
//!
//! File kind:   `<prefix>_<sources>_<schedule>_YYYY-MM-DD_HHMMSS_<shortId>.tar.gz`
//! Volume kind: `<prefix>-volume-<sanitizedName>-<schedule>-YYYY-MM-DDTHH-MM-SS-mmmZ.tar.gz`

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

const SHORT_ID_LEN: usize = 6;
const SHORT_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Which filename format a parsed archive name matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveNameKind {
    Files,
    Volume,
}

/// Structured fields recovered from an archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArchiveName {
    pub kind: ArchiveNameKind,
    pub prefix: String,
    /// Source grouping for file-kind names, volume name for volume-kind.
    pub sources: String,
    pub schedule: String,
}

fn file_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-z]+)_([a-z0-9-]+)_([a-z]+)_(\d{4}-\d{2}-\d{2})_(\d{6})_([a-z0-9]+)\.tar\.gz$")
            .expect("file archive name regex")
    })
}

fn volume_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^([a-z]+)-volume-([A-Za-z0-9_-]+)-([a-z]+)-(\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}-\d{3}Z)\.tar\.gz$",
        )
        .expect("volume archive name regex")
    })
}

/// A short random identifier, lowercase alphanumeric.
pub fn short_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_ID_LEN)
        .map(|_| SHORT_ID_ALPHABET[rng.gen_range(0..SHORT_ID_ALPHABET.len())] as char)
        .collect()
}

/// Generate a file-kind archive name. `source_names` empty means the
/// schedule covers all sources; the grouping segment then reads `all`.
pub fn generate_archive_name(
    prefix: &str,
    schedule: &str,
    source_names: &[String],
    now: DateTime<Utc>,
) -> String {
    let sources = if source_names.is_empty() {
        "all".to_string()
    } else {
        source_names.join("-")
    };
    format!(
        "{}_{}_{}_{}_{}_{}.tar.gz",
        prefix,
        sources,
        schedule,
        now.format("%Y-%m-%d"),
        now.format("%H%M%S"),
        short_id()
    )
}

/// Generate a volume-kind archive name.
pub fn generate_volume_archive_name(
    prefix: &str,
    volume_name: &str,
    schedule: &str,
    now: DateTime<Utc>,
) -> String {
    format!(
        "{}-volume-{}-{}-{}Z.tar.gz",
        prefix,
        sanitize_volume_name(volume_name),
        schedule,
        now.format("%Y-%m-%dT%H-%M-%S-%3f"),
    )
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_volume_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Parse an archive filename back into its structured fields. Returns
/// `None` when the name matches neither format.
pub fn parse_archive_name(filename: &str) -> Option<ParsedArchiveName> {
    if let Some(captures) = file_name_regex().captures(filename) {
        return Some(ParsedArchiveName {
            kind: ArchiveNameKind::Files,
            prefix: captures[1].to_string(),
            sources: captures[2].to_string(),
            schedule: captures[3].to_string(),
        });
    }
    if let Some(captures) = volume_name_regex().captures(filename) {
        return Some(ParsedArchiveName {
            kind: ArchiveNameKind::Volume,
            prefix: captures[1].to_string(),
            sources: captures[2].to_string(),
            schedule: captures[3].to_string(),
        });
    }
    None
}
