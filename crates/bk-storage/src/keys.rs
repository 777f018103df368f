//! Remote object key composition.

/// Build a remote key `<globalPrefix>/<grouping>/<archiveName>`.
///
/// Each segment contributes only when non-empty; trailing slashes are
/// stripped before joining, so the result is stable under adding or
/// removing a trailing slash on either prefix segment.
pub fn build_remote_key(global_prefix: &str, grouping: &str, archive_name: &str) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    for segment in [global_prefix, grouping] {
        let trimmed = segment.trim_end_matches('/');
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }
    parts.push(archive_name);
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_all_segments() {
        assert_eq!(
            build_remote_key("backups", "app", "a.tar.gz"),
            "backups/app/a.tar.gz"
        );
    }

    #[test]
    fn skips_empty_segments() {
        assert_eq!(build_remote_key("", "app", "a.tar.gz"), "app/a.tar.gz");
        assert_eq!(build_remote_key("backups", "", "a.tar.gz"), "backups/a.tar.gz");
        assert_eq!(build_remote_key("", "", "a.tar.gz"), "a.tar.gz");
    }

    #[test]
    fn stable_under_trailing_slashes() {
        let canonical = build_remote_key("backups", "app", "a.tar.gz");
        assert_eq!(build_remote_key("backups/", "app", "a.tar.gz"), canonical);
        assert_eq!(build_remote_key("backups", "app/", "a.tar.gz"), canonical);
        assert_eq!(build_remote_key("backups/", "app/", "a.tar.gz"), canonical);
    }

    #[test]
    fn volume_grouping_nests_under_volumes() {
        assert_eq!(
            build_remote_key("backups", "volumes/pgdata", "v.tar.gz"),
            "backups/volumes/pgdata/v.tar.gz"
        );
    }
}
