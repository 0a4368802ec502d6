//! Small string and file helpers shared by the download and web layers.

use mime_guess::{MimeGuess, mime::Mime};
use std::path::Path;

/// Replaces characters that are unsafe in filenames.
///
/// Replaced characters:
/// - `/` and `\` -> `_` (path separators)
/// - `:` `*` `?` `<` `>` `|` -> `_` (reserved on Windows)
/// - `"` -> `'`
/// - control characters -> `_`
///
/// Leading/trailing whitespace and dots are trimmed. An empty result becomes `"unnamed"`.
///
/// # Example
///
/// ```
/// use doraweb::core::utils::escape_filename;
///
/// let safe = escape_filename("song/name*.mp3");
/// assert_eq!(safe, "song_name_.mp3");
/// ```
pub fn escape_filename(filename: &str) -> String {
    let mut result = String::with_capacity(filename.len());

    for c in filename.chars() {
        match c {
            '/' | '\\' => result.push('_'),
            ':' | '*' | '?' | '<' | '>' | '|' => result.push('_'),
            '"' => result.push('\''),
            c if c.is_control() => result.push('_'),
            _ => result.push(c),
        }
    }

    let result = result.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result.to_string()
    }
}

/// Builds a `Content-Disposition` value for an attachment.
///
/// Always carries an ASCII `filename` fallback; non-ASCII names additionally get
/// an RFC 5987 `filename*` parameter so browsers keep the original title.
pub fn content_disposition(display_name: &str) -> String {
    let ascii_fallback: String = display_name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' { c } else { '_' })
        .collect();

    if display_name.is_ascii() {
        format!("attachment; filename=\"{}\"", ascii_fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii_fallback,
            urlencoding::encode(display_name)
        )
    }
}

/// Guesses a MIME type from the file extension, falling back to `application/octet-stream`.
pub fn mime_for_path(path: &Path) -> Mime {
    MimeGuess::from_path(path).first_or_octet_stream()
}

/// Formats a byte count as a human-readable size (MiB-based, like yt-dlp prints them).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Returns at most `max_chars` characters from the end of `text`, respecting char boundaries.
pub fn truncate_tail_utf8(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
