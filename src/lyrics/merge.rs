//! Bilingual lyric alignment.

use super::parser::{parse_track, TimedLine};

/// Merge a translation track into a primary track.
///
/// A primary line gains `" (translation)"` when a translation line carries the
/// exact same timestamp. The translation cursor only moves forward, so after
/// sorting both tracks each translation line is considered at most once per
/// primary position.
///
/// If the translation has no timed lines the primary text is returned as is.
pub fn merge(primary: &str, translation: &str) -> String {
    let lines = parse_track(primary);
    let trans = parse_track(translation);
    if trans.is_empty() {
        return primary.to_string();
    }

    let mut j = 0;
    lines
        .into_iter()
        .map(|line| {
            while line.time > trans[j].time && j + 1 < trans.len() {
                j += 1;
            }
            let text = if line.time == trans[j].time && !trans[j].text.is_empty() {
                format!("{} ({})", line.text, trans[j].text)
            } else {
                line.text
            };
            TimedLine::new(line.time, text).render()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
