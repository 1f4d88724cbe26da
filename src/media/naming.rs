//! Local file names for downloaded media

use url::Url;

/// Extension used when a URL's own suffix looks implausible
pub const DEFAULT_IMAGE_SUFFIX: &str = ".jpg";

/// Extension every video is saved with
pub const VIDEO_SUFFIX: &str = ".mp4";

/// Longest suffix, dot included, kept for a lone URL (`.jpeg` survives)
pub const MAX_SINGLE_SUFFIX_LEN: usize = 5;

/// Longest suffix, dot included, kept inside a comma-joined group
pub const MAX_GROUP_SUFFIX_LEN: usize = 4;

/// Trailing path segment of a URL, without query or fragment
///
/// Falls back to plain string handling for values that are not absolute URLs.
pub fn trailing_segment(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(last) = parsed.path_segments().and_then(|mut s| s.next_back()) {
            return last.to_string();
        }
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Infers a file extension from the URL, or returns `default`
///
/// A suffix longer than `max_len` (dot included), or a missing dot, falls back.
pub fn infer_suffix(url: &str, default: &str, max_len: usize) -> String {
    let segment = trailing_segment(url);
    match segment.rfind('.') {
        Some(index) if segment.len() - index <= max_len && segment.len() - index > 1 => {
            segment[index..].to_string()
        }
        _ => default.to_string(),
    }
}

/// File names for one media group
///
/// A single URL gets `<prefix><suffix>`; several get `<prefix>_1<suffix>`,
/// `<prefix>_2<suffix>`, ... in URL order. A fixed suffix overrides inference.
/// Group members only keep suffixes of up to three letters.
pub fn group_file_names(prefix: &str, urls: &[&str], fixed_suffix: Option<&str>) -> Vec<String> {
    let max_len = if urls.len() == 1 {
        MAX_SINGLE_SUFFIX_LEN
    } else {
        MAX_GROUP_SUFFIX_LEN
    };
    let suffix_for = |url: &str| match fixed_suffix {
        Some(suffix) => suffix.to_string(),
        None => infer_suffix(url, DEFAULT_IMAGE_SUFFIX, max_len),
    };

    if urls.len() == 1 {
        return vec![format!("{}{}", prefix, suffix_for(urls[0]))];
    }

    urls.iter()
        .enumerate()
        .map(|(i, url)| format!("{}_{}{}", prefix, i + 1, suffix_for(url)))
        .collect()
}

/// Avatars keep the remote file name
pub fn avatar_file_name(url: &str) -> String {
    let segment = trailing_segment(url);
    if segment.is_empty() {
        format!("avatar{}", DEFAULT_IMAGE_SUFFIX)
    } else {
        segment
    }
}
