//! # Text
//!
//! Whitespace handling for text runs and greedy line wrapping for the PDF
//! canvas.
//!
//! Wrapping uses UAX#14 break opportunities. The first line of a run may
//! have less room than the rest (it continues a line opened by an earlier
//! run); when not even the first word fits there, that first line is left
//! empty and the word moves down.

use unicode_linebreak::{linebreaks, BreakOpportunity};

/// One wrapped line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrokenLine {
    pub text: String,
    /// Width without trailing spaces, used for alignment.
    pub width: f64,
    /// Full advance of the pen, trailing spaces included.
    pub advance: f64,
}

/// Collapse runs of whitespace (newlines included) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Strip leading whitespace from every line. Whitespace-only lines vanish
/// with it, since the strip runs across line terminators.
pub fn trim_line_starts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_line_start = true;
    for ch in text.chars() {
        if at_line_start && ch.is_whitespace() {
            continue;
        }
        out.push(ch);
        at_line_start = matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}');
    }
    out
}

/// Where a line may break, indexed by char: `true` at `i` allows a break before `chars[i]`.
fn break_opportunities(text: &str) -> Vec<bool> {
    let char_count = text.chars().count();
    let mut result = vec![false; char_count];

    let mut byte_to_char = vec![0usize; text.len() + 1];
    for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
        byte_to_char[byte_idx] = char_idx;
    }
    byte_to_char[text.len()] = char_count;

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx < char_count && matches!(opp, BreakOpportunity::Allowed | BreakOpportunity::Mandatory) {
            result[char_idx] = true;
        }
    }
    result
}

/// Greedily wrap one paragraph (no `\n`) into lines.
///
/// `first_width` is the room left on the first line, `max_width` the room
/// on every following line. Trailing whitespace may hang past the edge.
/// A word wider than a whole line is split where it overflows.
pub fn break_into_lines<F>(text: &str, first_width: f64, max_width: f64, measure: F) -> Vec<BrokenLine>
where
    F: Fn(char) -> f64,
{
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![BrokenLine::default()];
    }
    let widths: Vec<f64> = chars.iter().map(|&c| measure(c)).collect();
    let breaks = break_opportunities(text);

    let mut lines = Vec::new();
    let mut start = 0;
    let mut width = 0.0;
    let mut last_break: Option<usize> = None;
    let mut i = 0;

    while i < chars.len() {
        let limit = if lines.is_empty() { first_width } else { max_width };
        if i > start && breaks[i] {
            last_break = Some(i);
        }

        if width + widths[i] > limit && !chars[i].is_whitespace() {
            if let Some(bp) = last_break.filter(|&bp| bp > start) {
                lines.push(make_line(&chars[start..bp], &widths[start..bp]));
                start = bp;
                width = widths[start..i].iter().sum();
                last_break = None;
                continue;
            }
            if lines.is_empty() && first_width < max_width {
                // Nothing fits after the open line; start on a fresh one.
                lines.push(BrokenLine::default());
                continue;
            }
            if i > start {
                lines.push(make_line(&chars[start..i], &widths[start..i]));
                start = i;
                width = 0.0;
                last_break = None;
                continue;
            }
        }

        width += widths[i];
        i += 1;
    }

    lines.push(make_line(&chars[start..], &widths[start..]));
    lines
}

fn make_line(chars: &[char], widths: &[f64]) -> BrokenLine {
    let advance: f64 = widths.iter().sum();
    let trailing: f64 = chars
        .iter()
        .zip(widths)
        .rev()
        .take_while(|(c, _)| c.is_whitespace())
        .map(|(_, w)| w)
        .sum();
    BrokenLine {
        text: chars.iter().collect(),
        width: advance - trailing,
        advance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(_: char) -> f64 {
        1.0
    }

    fn texts(lines: &[BrokenLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a \n\t b  c\n"), "a b c ");
        assert_eq!(collapse_whitespace("plain"), "plain");
    }

    #[test]
    fn test_trim_line_starts() {
        assert_eq!(trim_line_starts("  a\n   b"), "a\nb");
        assert_eq!(trim_line_starts(" \n  \n x"), "x");
        assert_eq!(trim_line_starts("a  b"), "a  b");
    }

    #[test]
    fn test_single_line() {
        let lines = break_into_lines("hello world", 100.0, 100.0, unit);
        assert_eq!(texts(&lines), vec!["hello world"]);
        assert_eq!(lines[0].width, 11.0);
    }

    #[test]
    fn test_break_at_space() {
        let lines = break_into_lines("hello world again", 12.0, 12.0, unit);
        assert_eq!(texts(&lines), vec!["hello world ", "again"]);
        assert_eq!(lines[0].width, 11.0);
        assert_eq!(lines[0].advance, 12.0);
    }

    #[test]
    fn test_long_word_is_split() {
        let lines = break_into_lines("abcdefgh", 3.0, 3.0, unit);
        assert_eq!(texts(&lines), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_continuation_moves_first_word_down() {
        let lines = break_into_lines("hello there", 3.0, 20.0, unit);
        assert_eq!(texts(&lines), vec!["", "hello there"]);
    }

    #[test]
    fn test_continuation_uses_remaining_room() {
        let lines = break_into_lines("ab cdef", 4.0, 20.0, unit);
        assert_eq!(texts(&lines), vec!["ab ", "cdef"]);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(break_into_lines("", 10.0, 10.0, unit), vec![BrokenLine::default()]);
    }
}
