//! LRC line grammar
//!
//! Only the plain single-timestamp form is recognised:
//! [mm:ss.fff]Lyrics line here
//!
//! Anything else (metadata tags, multi-timestamp lines, bare text) is dropped.

use regex::Regex;
use std::sync::LazyLock;

static TIMED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([0-9]{2}):([0-9]{2})\.([0-9]*)\](.*)$").unwrap());

/// Exact position of a lyric line.
///
/// `sub_ms` holds the fraction digits past the millisecond, with trailing
/// zeros removed, so `[00:01.0005]` is `1000` ms plus `"5"`. Comparing
/// `(ms, sub_ms)` in field order compares the full decimal value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LyricTime {
    pub ms: u64,
    pub sub_ms: String,
}

impl LyricTime {
    pub fn from_ms(ms: u64) -> Self {
        Self {
            ms,
            sub_ms: String::new(),
        }
    }

    fn parse(min: u64, sec: u64, fraction: &str) -> Self {
        let (head, tail) = fraction.split_at(fraction.len().min(3));
        let mut ms = 0;
        let mut scale = 100;
        for d in head.bytes() {
            ms += u64::from(d - b'0') * scale;
            scale /= 10;
        }
        Self {
            ms: min * 60_000 + sec * 1000 + ms,
            sub_ms: tail.trim_end_matches('0').to_string(),
        }
    }
}

/// A single line of lyrics with timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedLine {
    pub time: LyricTime,
    /// The lyrics text, verbatim after the closing bracket
    pub text: String,
}

impl TimedLine {
    pub fn new(time: LyricTime, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
        }
    }

    /// Serialize back to `[MM:SS.mmm]text`. Digits past the millisecond are
    /// dropped here and only here.
    pub fn render(&self) -> String {
        let ms = self.time.ms;
        format!(
            "[{:02}:{:02}.{:03}]{}",
            ms / 60_000,
            (ms % 60_000) / 1000,
            ms % 1000,
            self.text
        )
    }
}

/// Parse a raw LRC block into a track sorted by timestamp.
///
/// The sort is stable, so lines sharing a timestamp keep their input order.
pub fn parse_track(raw: &str) -> Vec<TimedLine> {
    let mut lines: Vec<TimedLine> = raw
        .split('\n')
        .filter_map(|line| {
            let caps = TIMED_LINE.captures(line)?;
            let min: u64 = caps[1].parse().ok()?;
            let sec: u64 = caps[2].parse().ok()?;
            Some(TimedLine::new(LyricTime::parse(min, sec, &caps[3]), &caps[4]))
        })
        .collect();

    lines.sort_by(|a, b| a.time.cmp(&b.time));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> LyricTime {
        LyricTime::from_ms(ms)
    }

    #[test]
    fn test_fraction_digits() {
        assert_eq!(LyricTime::parse(0, 0, ""), at(0));
        assert_eq!(LyricTime::parse(0, 0, "5"), at(500));
        assert_eq!(LyricTime::parse(0, 0, "34"), at(340));
        assert_eq!(LyricTime::parse(0, 0, "340"), at(340));
        assert_eq!(LyricTime::parse(0, 0, "3400"), at(340));
        let fine = LyricTime::parse(0, 1, "0349");
        assert_eq!(fine.ms, 1034);
        assert_eq!(fine.sub_ms, "9");
        assert_ne!(fine, at(1034));
    }

    #[test]
    fn test_fraction_ordering_past_millisecond() {
        let a = LyricTime::parse(0, 1, "0005");
        let b = LyricTime::parse(0, 1, "00049");
        assert!(at(1000) < b);
        assert!(b < a);
        assert!(a < at(1001));
    }

    #[test]
    fn test_parse_track() {
        let lrc = "[ti:Test Song]\n[ar:Test Artist]\n[00:15.00]Second line\n[00:12.34]First line\nplain text";
        let track = parse_track(lrc);
        assert_eq!(track.len(), 2);
        assert_eq!(track[0], TimedLine::new(at(12_340), "First line"));
        assert_eq!(track[1], TimedLine::new(at(15_000), "Second line"));
    }

    #[test]
    fn test_sorts_by_full_fraction() {
        let track = parse_track("[00:01.0009]x\n[00:01.0001]y");
        let texts: Vec<_> = track.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["y", "x"]);
    }

    #[test]
    fn test_parse_keeps_text_verbatim() {
        let track = parse_track("[01:02.5]  spaced out \r");
        assert_eq!(track[0].time, at(62_500));
        assert_eq!(track[0].text, "  spaced out \r");
    }

    #[test]
    fn test_parse_rejects_one_digit_fields() {
        assert!(parse_track("[1:02.50]short minute").is_empty());
        assert!(parse_track("[01:2.50]short second").is_empty());
        assert!(parse_track("[01:02]no fraction").is_empty());
    }

    #[test]
    fn test_stable_on_equal_timestamps() {
        let track = parse_track("[00:03.00]c\n[00:01.00]a\n[00:01.000]b\n[00:01.0000]d");
        let texts: Vec<_> = track.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["a", "b", "d", "c"]);
    }

    #[test]
    fn test_render() {
        assert_eq!(TimedLine::new(at(0), "x").render(), "[00:00.000]x");
        assert_eq!(TimedLine::new(at(62_507), "y").render(), "[01:02.507]y");
        assert_eq!(TimedLine::new(at(6_000_000), "").render(), "[100:00.000]");
        let fine = parse_track("[00:01.0009]z");
        assert_eq!(fine[0].render(), "[00:01.000]z");
    }
}
