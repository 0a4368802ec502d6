//! Parsing of yt-dlp `--newline` output.
//!
//! Two kinds of lines matter to the task registry: `[download]` progress lines
//! and post-processor lines, which mean the transfer is over and the library is
//! converting or merging.

use serde::Serialize;

/// Progress parsed from one `[download]` line.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressInfo {
    /// Download progress in percent (0-100)
    pub percent: u8,
    /// Download speed in bytes per second
    pub speed_bytes_per_sec: Option<f64>,
    /// Estimated time remaining in seconds
    pub eta_seconds: Option<u64>,
    /// Bytes downloaded so far (derived from percent and total)
    pub downloaded_bytes: Option<u64>,
    /// Total bytes expected
    pub total_bytes: Option<u64>,
}

/// A line of extractor output that changes task state.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorLine {
    Progress(ProgressInfo),
    /// A post-processor started; carries its tag, e.g. `Merger`
    PostProcessing(String),
}

/// Post-processor tags yt-dlp prints while converting, merging or tagging.
const POSTPROCESSOR_TAGS: &[&str] = &[
    "Merger",
    "ExtractAudio",
    "VideoConvertor",
    "VideoRemuxer",
    "Metadata",
    "EmbedThumbnail",
    "ThumbnailsConvertor",
    "MoveFiles",
    "SplitChapters",
];

/// Classifies one line of yt-dlp output.
pub fn parse_line(line: &str) -> Option<ExtractorLine> {
    let line = line.trim();
    if let Some(progress) = parse_progress(line) {
        return Some(ExtractorLine::Progress(progress));
    }

    let tag = line.strip_prefix('[')?.split(']').next()?;
    if POSTPROCESSOR_TAGS.contains(&tag) || tag.starts_with("Fixup") {
        return Some(ExtractorLine::PostProcessing(tag.to_string()));
    }
    None
}

/// Parses a progress line such as
/// `[download]  42.0% of ~10.00MiB at  1.20MiB/s ETA 00:07 (frag 3/10)`.
///
/// Returns `None` for `[download]` lines without a percentage
/// (`Destination: ...`, `has already been downloaded`, ...).
pub fn parse_progress(line: &str) -> Option<ProgressInfo> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut speed_bytes_per_sec = None;
    let mut eta_seconds = None;
    let mut total_bytes = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if percent.is_none() && part.ends_with('%') {
            if let Ok(p) = part.trim_end_matches('%').parse::<f32>() {
                // Clamp so garbage never jumps the bar past 100
                percent = Some(p.clamp(0.0, 100.0) as u8);
            }
        }

        let next = parts.get(i + 1).copied();
        match (*part, next) {
            ("of", Some(size)) => total_bytes = parse_size(size),
            ("at", Some(speed)) => speed_bytes_per_sec = parse_size(speed).map(|b| b as f64),
            ("ETA", Some(eta)) => eta_seconds = parse_eta(eta),
            _ => {}
        }
    }

    let percent = percent?;
    let downloaded_bytes = total_bytes.map(|total| (total as f64 * (percent as f64 / 100.0)) as u64);

    Some(ProgressInfo {
        percent,
        speed_bytes_per_sec,
        eta_seconds,
        downloaded_bytes,
        total_bytes,
    })
}

/// Parses a size like `10.00MiB`, `~1.5GiB`, `500.00KiB/s` or `812B` into bytes.
pub fn parse_size(size_str: &str) -> Option<u64> {
    let s = size_str.trim().trim_start_matches('~').trim_end_matches("/s");

    const UNITS: &[(&str, f64)] = &[
        ("TiB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
        ("GB", 1_000_000_000.0),
        ("MB", 1_000_000.0),
        ("KB", 1_000.0),
        ("kB", 1_000.0),
        ("B", 1.0),
    ];

    for (suffix, multiplier) in UNITS {
        if let Some(number) = s.strip_suffix(suffix) {
            return number
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| (n * multiplier) as u64);
        }
    }
    None
}

/// Parses an ETA like `00:10`, `1:23` or `1:02:03` into seconds.
pub fn parse_eta(eta_str: &str) -> Option<u64> {
    let parts = eta_str
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    match parts.as_slice() {
        [minutes, seconds] => Some(minutes * 60 + seconds),
        [hours, minutes, seconds] => Some(hours * 3600 + minutes * 60 + seconds),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_progress_full_line() {
        let line = "[download]  42.0% of 10.00MiB at  1.00MiB/s ETA 00:07";
        let info = parse_progress(line).unwrap();
        assert_eq!(info.percent, 42);
        assert_eq!(info.total_bytes, Some(10 * 1024 * 1024));
        assert_eq!(info.speed_bytes_per_sec, Some(1024.0 * 1024.0));
        assert_eq!(info.eta_seconds, Some(7));
        assert_eq!(info.downloaded_bytes, Some((10.0 * 1024.0 * 1024.0 * 0.42) as u64));
    }

    #[test]
    fn test_parse_progress_approximate_size_and_fragments() {
        let line = "[download]   5.3% of ~ 120.50MiB at  2.10MiB/s ETA 01:02:03 (frag 3/120)";
        let info = parse_progress(line).unwrap();
        assert_eq!(info.percent, 5);
        // "of ~ 120.50MiB" splits into "~" and the size, so the total is unknown
        assert_eq!(info.total_bytes, None);
        assert_eq!(info.eta_seconds, Some(3723));

        let line = "[download]   5.3% of ~120.50MiB at  2.10MiB/s ETA 00:50";
        let info = parse_progress(line).unwrap();
        assert_eq!(info.total_bytes, Some((120.5 * 1024.0 * 1024.0) as u64));
    }

    #[test]
    fn test_parse_progress_final_line() {
        let line = "[download] 100% of   10.00MiB in 00:00:03 at 3.20MiB/s";
        let info = parse_progress(line).unwrap();
        assert_eq!(info.percent, 100);
        assert_eq!(info.eta_seconds, None);
        assert!(info.speed_bytes_per_sec.is_some());
    }

    #[test]
    fn test_parse_progress_unknown_eta() {
        let line = "[download]  10.0% of 1.00GiB at Unknown B/s ETA Unknown";
        let info = parse_progress(line).unwrap();
        assert_eq!(info.percent, 10);
        assert_eq!(info.speed_bytes_per_sec, None);
        assert_eq!(info.eta_seconds, None);
        assert_eq!(info.total_bytes, Some(1024 * 1024 * 1024));
    }

    #[test]
    fn test_parse_progress_ignores_other_lines() {
        assert_eq!(parse_progress("[download] Destination: /tmp/x/video.mp4"), None);
        assert_eq!(parse_progress("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress("random 50% text"), None);
    }

    #[test]
    fn test_parse_line_postprocessors() {
        assert_eq!(
            parse_line("[Merger] Merging formats into \"/tmp/a.mp4\""),
            Some(ExtractorLine::PostProcessing("Merger".to_string()))
        );
        assert_eq!(
            parse_line("[ExtractAudio] Destination: /tmp/a.mp3"),
            Some(ExtractorLine::PostProcessing("ExtractAudio".to_string()))
        );
        assert_eq!(
            parse_line("[FixupM3u8] Fixing MPEG-TS in MP4 container"),
            Some(ExtractorLine::PostProcessing("FixupM3u8".to_string()))
        );
        assert_eq!(parse_line("[info] abc: Downloading 1 format(s): 22"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_parse_line_progress() {
        assert!(matches!(
            parse_line("[download]  50.0% of 2.00MiB at 1.00MiB/s ETA 00:01"),
            Some(ExtractorLine::Progress(ProgressInfo { percent: 50, .. }))
        ));
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("10.00MiB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("500.00KiB/s"), Some(500 * 1024));
        assert_eq!(parse_size("~1.00GiB"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("812B"), Some(812));
        assert_eq!(parse_size("2MB"), Some(2_000_000));
        assert_eq!(parse_size("Unknown"), None);
        assert_eq!(parse_size("fastMiB"), None);
    }

    #[test]
    fn test_parse_eta() {
        assert_eq!(parse_eta("00:10"), Some(10));
        assert_eq!(parse_eta("1:23"), Some(83));
        assert_eq!(parse_eta("1:00:00"), Some(3600));
        assert_eq!(parse_eta("Unknown"), None);
        assert_eq!(parse_eta("1:2:3:4"), None);
    }
}
