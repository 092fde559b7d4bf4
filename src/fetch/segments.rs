//! Segment partitioning and `H:MM:SS` time labels.

use crate::models::Segment;

/// Split `[0, duration_seconds)` into contiguous segments of
/// `segment_seconds`; the last one is truncated to the remainder.
pub fn build_segments(duration_seconds: u64, segment_seconds: u64) -> Vec<Segment> {
    if segment_seconds == 0 {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut start = 0;
    while start < duration_seconds {
        let end = duration_seconds.min(start + segment_seconds);
        segments.push(Segment::new(start, Some(end)));
        start = end;
    }
    segments
}

/// `H:MM:SS` with unpadded hours.
pub fn format_seconds(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Parse `H:MM:SS`, `M:SS` or plain seconds.
pub fn parse_time_label(label: &str) -> Option<f64> {
    let parts: Vec<&str> = label.trim().split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut total = 0.0;
    for part in &parts {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        total = total * 60.0 + value;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_segments_truncates_last() {
        let segments = build_segments(2000, 900);
        assert_eq!(
            segments,
            vec![
                Segment::new(0, Some(900)),
                Segment::new(900, Some(1800)),
                Segment::new(1800, Some(2000)),
            ]
        );
    }

    #[test]
    fn test_build_segments_exact_multiple() {
        let segments = build_segments(1800, 900);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], Segment::new(900, Some(1800)));
    }

    #[test]
    fn test_build_segments_count_is_ceil() {
        for (duration, segment) in [(901, 900), (3601, 600), (7200, 7199), (10, 3)] {
            let segments = build_segments(duration, segment);
            assert_eq!(segments.len() as u64, duration.div_ceil(segment));

            let covered: u64 = segments.iter().filter_map(|s| s.len_seconds()).sum();
            assert_eq!(covered, duration);
            for pair in segments.windows(2) {
                assert_eq!(pair[0].end_seconds, Some(pair[1].start_seconds));
            }
        }
    }

    #[test]
    fn test_build_segments_degenerate() {
        assert!(build_segments(0, 900).is_empty());
        assert!(build_segments(900, 0).is_empty());
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "0:00:00");
        assert_eq!(format_seconds(59), "0:00:59");
        assert_eq!(format_seconds(900), "0:15:00");
        assert_eq!(format_seconds(3723), "1:02:03");
        assert_eq!(format_seconds(36_000), "10:00:00");
    }

    #[test]
    fn test_parse_time_label() {
        assert_eq!(parse_time_label("1:02:03"), Some(3723.0));
        assert_eq!(parse_time_label("15:00"), Some(900.0));
        assert_eq!(parse_time_label("42"), Some(42.0));
        assert_eq!(parse_time_label(&format_seconds(5025)), Some(5025.0));
        assert_eq!(parse_time_label("1:xx:00"), None);
        assert_eq!(parse_time_label("1:2:3:4"), None);
        assert_eq!(parse_time_label(""), None);
    }
}
