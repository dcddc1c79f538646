use unicode_segmentation::UnicodeSegmentation;

pub const MAX_FILENAME_LENGTH: usize = 120;

/// Turn arbitrary text (a song title, a caption) into something usable as a file name.
///
/// Control characters and characters reserved on common filesystems are dropped,
/// runs of whitespace collapse to a single space and the result is cut to
/// `max_len` graphemes. Returns `None` if nothing usable is left.
#[must_use]
pub fn sanitize_file_name(name: &str, max_len: usize) -> Option<String> {
    let cleaned = name
        .graphemes(true)
        .filter(|x| !x.chars().all(char::is_control))
        .filter(|x| !x.contains(['\\', '/', ':', '*', '?', '"', '<', '>', '|']))
        .collect::<String>();

    let trunc = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .graphemes(true)
        .take(max_len)
        .collect::<String>();

    let trunc = trunc.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if trunc.is_empty() {
        None
    } else {
        Some(trunc.to_string())
    }
}
