//! yt-dlp progress line parsing
//!
//! Best-effort: a line either matches the `[download] NN.N% of SIZE` shape or it
//! is noise. Nothing here returns an error.

use lazy_regex::regex;

/// Fields pulled out of one `[download]` progress line.
///
/// `total_size`, `speed` and `eta` are copied verbatim; they are presentation
/// strings for the UI, not parsed units.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProgress {
    /// Phase-local percentage, clamped to 0..=100
    pub percent: f64,
    /// Size token such as `124.56MiB`, without the `~` estimate marker
    pub total_size: String,
    /// Speed token such as `2.95MiB/s`; absent on the final summary line
    pub speed: Option<String>,
    /// ETA token such as `00:18`; absent on the final summary line
    pub eta: Option<String>,
}

/// Parses progress from one yt-dlp output line
///
/// Examples:
/// - `"[download]  45.2% of  124.56MiB at  2.95MiB/s ETA 00:18"` → 45.2, speed and ETA set
/// - `"[download] 100% of   54.24MiB in 00:41"` → 100.0, speed and ETA `None`
/// - `"[download]  12.0% of ~  1.02GiB at 3.1MiB/s ETA 05:12 (frag 3/90)"` → 12.0
/// - `"[download] Destination: /tmp/x.f137.mp4"` → `None`
pub fn parse_line(line: &str) -> Option<ParsedProgress> {
    let line = line.trim();

    let caps = regex!(r"\[download\]\s+(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\d+(?:\.\d+)?\s?[KMGTP]?i?B)\b").captures(line)?;

    let percent = caps.get(1)?.as_str().parse::<f64>().ok()?;
    if !percent.is_finite() {
        return None;
    }
    let total_size = caps.get(2)?.as_str().to_string();

    let speed = regex!(r"\bat\s+(Unknown B/s|\S+)")
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let eta = regex!(r"\bETA\s+(\S+)")
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    tracing::trace!(percent, ?speed, ?eta, "Progress line parsed");

    Some(ParsedProgress {
        percent: percent.clamp(0.0, 100.0),
        total_size,
        speed,
        eta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_active_transfer_line() {
        let parsed = parse_line("[download]  45.2% of  124.56MiB at  2.95MiB/s ETA 00:18").unwrap();
        assert_eq!(
            parsed,
            ParsedProgress {
                percent: 45.2,
                total_size: "124.56MiB".to_string(),
                speed: Some("2.95MiB/s".to_string()),
                eta: Some("00:18".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_final_summary_line_has_no_speed_or_eta() {
        let parsed = parse_line("[download] 100% of   54.24MiB in 00:41").unwrap();
        assert_eq!(parsed.percent, 100.0);
        assert_eq!(parsed.total_size, "54.24MiB");
        assert_eq!(parsed.speed, None);
        assert_eq!(parsed.eta, None);
    }

    #[test]
    fn test_parse_approximate_size_and_fragments() {
        let parsed = parse_line("[download]  12.0% of ~  1.02GiB at  3.10MiB/s ETA 05:12 (frag 3/90)").unwrap();
        assert_eq!(parsed.percent, 12.0);
        assert_eq!(parsed.total_size, "1.02GiB");
        assert_eq!(parsed.speed.as_deref(), Some("3.10MiB/s"));
        assert_eq!(parsed.eta.as_deref(), Some("05:12"));
    }

    #[test]
    fn test_parse_unknown_speed_and_eta_are_kept_verbatim() {
        let parsed = parse_line("[download]   0.0% of  10.00MiB at Unknown B/s ETA Unknown").unwrap();
        assert_eq!(parsed.percent, 0.0);
        assert_eq!(parsed.speed.as_deref(), Some("Unknown B/s"));
        assert_eq!(parsed.eta.as_deref(), Some("Unknown"));
    }

    #[test]
    fn test_parse_integer_percent_and_kib() {
        let parsed = parse_line("[download]  7% of 512.00KiB at 100.00KiB/s ETA 00:04").unwrap();
        assert_eq!(parsed.percent, 7.0);
        assert_eq!(parsed.total_size, "512.00KiB");
    }

    #[test]
    fn test_parse_percent_is_clamped() {
        let parsed = parse_line("[download] 130.0% of 1.00MiB").unwrap();
        assert_eq!(parsed.percent, 100.0);
    }

    #[test]
    fn test_non_progress_lines_are_ignored() {
        let noise = [
            "",
            "   ",
            "[youtube] Extracting URL: https://www.youtube.com/watch?v=abc",
            "[info] abc: Downloading 1 format(s): 137+140",
            "[download] Destination: /tmp/clipgrab-x/My Video.f137.mp4",
            "[download] /tmp/x.mp4 has already been downloaded",
            "[Merger] Merging formats into \"/tmp/x.mp4\"",
            "[download]  12.3% of Unknown size",
            "[download] abc% of 10.00MiB",
            "Deleting original file /tmp/x.f137.mp4 (pass -k to keep)",
            "45.2% of 124.56MiB at 2.95MiB/s",
        ];
        for line in noise {
            assert_eq!(parse_line(line), None, "line should not match: {:?}", line);
        }
    }

    #[test]
    fn test_surrounding_whitespace_is_tolerated() {
        assert!(parse_line("\r[download]  50.0% of 2.00MiB at 1.00MiB/s ETA 00:01\r").is_some());
    }
}
