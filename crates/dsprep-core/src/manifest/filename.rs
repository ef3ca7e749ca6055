//! File names for manifest targets.

/// Derive the local file name for a download URL.
///
/// Prefers the `file=` query parameter (dataset mirrors serve everything from
/// one script path), otherwise the last path segment. Returns `None` when
/// neither yields a usable name.
pub fn download_filename(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let from_query = parsed
        .query_pairs()
        .filter(|(k, _)| k == "file")
        .map(|(_, v)| v.into_owned())
        .last();
    let candidate = from_query.or_else(|| {
        parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string)
    })?;
    sanitize_filename(&candidate)
}

/// Reduce a name to a single path component that stays inside the save dir.
///
/// Anything before the last `/` or `\` is dropped, control characters are
/// replaced with `_`, and empty, `.` and `..` results are rejected.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let last = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(name);
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_control() { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameter_wins() {
        assert_eq!(
            download_filename("https://cn01.mmai.io/download/voxceleb?key=abc&file=vox2_dev_mp4_partaa")
                .as_deref(),
            Some("vox2_dev_mp4_partaa")
        );
    }

    #[test]
    fn falls_back_to_path_segment() {
        assert_eq!(
            download_filename("https://example.com/lists/vox2_meta.csv").as_deref(),
            Some("vox2_meta.csv")
        );
        assert_eq!(download_filename("https://example.com/"), None);
        assert_eq!(download_filename("not a url"), None);
    }

    #[test]
    fn traversal_is_stripped() {
        assert_eq!(
            download_filename("https://example.com/get?file=../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(download_filename("https://example.com/get?file=.."), None);
    }

    #[test]
    fn sanitize_rejects_dots_and_controls() {
        assert_eq!(sanitize_filename("a\tb.zip").as_deref(), Some("a_b.zip"));
        assert_eq!(sanitize_filename("dir/out.zip").as_deref(), Some("out.zip"));
        assert_eq!(sanitize_filename("."), None);
        assert_eq!(sanitize_filename("x/"), None);
    }
}
