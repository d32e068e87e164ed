use std::sync::LazyLock;

use encoding_rs::{Encoding, WINDOWS_1252};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::cue::Cue;
use crate::error::{DubError, DubResult};

static TIMING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s*-->\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})",
    )
    .expect("valid timing regex")
});

/// Decodes subtitle bytes.
///
/// A byte-order mark picks the encoding (UTF-8, UTF-16 LE/BE or UTF-32 LE/BE).
/// Without one the file is read as UTF-8, falling back to Windows-1252 for
/// legacy files.
pub fn decode_srt(bytes: &[u8]) -> String {
    if let Some(text) = decode_utf32(bytes) {
        debug!("Detected UTF-32 byte-order mark");
        return text;
    }
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        debug!("Detected {} byte-order mark", encoding.name());
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors {
            warn!("Subtitle file has invalid {} sequences", encoding.name());
        }
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) => {
            warn!(
                "Subtitle file is not valid UTF-8 (at byte {}); reading it as Windows-1252",
                e.valid_up_to()
            );
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

fn decode_utf32(bytes: &[u8]) -> Option<String> {
    let (body, word): (&[u8], fn([u8; 4]) -> u32) = if bytes.starts_with(&[0xFF, 0xFE, 0, 0]) {
        (&bytes[4..], u32::from_le_bytes)
    } else if bytes.starts_with(&[0, 0, 0xFE, 0xFF]) {
        (&bytes[4..], u32::from_be_bytes)
    } else {
        return None;
    };
    let text = body
        .chunks_exact(4)
        .map(|c| {
            char::from_u32(word([c[0], c[1], c[2], c[3]])).unwrap_or(char::REPLACEMENT_CHARACTER)
        })
        .collect();
    Some(text)
}

/// Parses SRT text into cues ordered by start time.
///
/// Blocks without any text after normalisation are kept as blank cues; the
/// synchronizer skips them. Malformed timing, `end < start` and a start earlier
/// than the previous cue's start are rejected with the offending line number.
pub fn parse_srt(input: &str) -> DubResult<Vec<Cue>> {
    let mut cues: Vec<Cue> = Vec::new();
    for (first_line, block) in blocks(input) {
        let mut lines = block.iter().peekable();
        let mut line_no = first_line;

        if let Some(first) = lines.peek() {
            let is_counter = first.trim().chars().all(|c| c.is_ascii_digit());
            if is_counter && block.len() > 1 {
                lines.next();
                line_no += 1;
            }
        }

        let timing = lines.next().copied().unwrap_or_default();
        let caps = TIMING_LINE.captures(timing).ok_or_else(|| DubError::InputParse {
            line: line_no,
            message: format!("expected `HH:MM:SS,mmm --> HH:MM:SS,mmm`, found {:?}", timing),
        })?;
        let start = timestamp(&caps, 1);
        let end = timestamp(&caps, 5);

        if end < start {
            return Err(DubError::InputParse {
                line: line_no,
                message: format!(
                    "cue ends ({}) before it starts ({})",
                    format_srt_time(end),
                    format_srt_time(start)
                ),
            });
        }
        if let Some(prev) = cues.last() {
            if start < prev.start() {
                return Err(DubError::InputParse {
                    line: line_no,
                    message: format!(
                        "cue starts at {} which is before the previous cue ({})",
                        format_srt_time(start),
                        format_srt_time(prev.start())
                    ),
                });
            }
        }

        let text = lines.copied().collect::<Vec<_>>().join("\n");
        cues.push(Cue::new(cues.len(), start, Some(end), &text));
    }
    debug!("Parsed {} cues", cues.len());
    Ok(cues)
}

/// Groups non-blank lines into blocks, remembering each block's 1-based first line.
fn blocks(input: &str) -> Vec<(usize, Vec<&str>)> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start_line = 0;
    for (i, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push((start_line, std::mem::take(&mut current)));
            }
            continue;
        }
        if current.is_empty() {
            start_line = i + 1;
        }
        current.push(line.trim_end());
    }
    if !current.is_empty() {
        out.push((start_line, current));
    }
    out
}

/// Seconds from a captured `H:M:S,ms` group; the last field is whole milliseconds.
fn timestamp(caps: &Captures, first: usize) -> f64 {
    let field = |i: usize| caps[first + i].parse::<u64>().unwrap_or(0);
    let total_ms = ((field(0) * 60 + field(1)) * 60 + field(2)) * 1000 + field(3);
    total_ms as f64 / 1000.0
}

pub fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = "1
00:00:01,000 --> 00:00:02,500
Hello <i>there</i>

2
00:00:05,250 --> 00:00:07,000
Second line
continues here

3
00:00:08,000 --> 00:00:09,000
<b></b>
";

    #[test]
    fn parses_blocks_in_order() {
        let cues = parse_srt(SAMPLE).unwrap();
        assert_eq!(cues.len(), 3);
        assert_relative_eq!(cues[0].start(), 1.0);
        assert_relative_eq!(cues[0].end().unwrap(), 2.5);
        assert_eq!(cues[0].text(), "Hello there");
        assert_relative_eq!(cues[1].start(), 5.25);
        assert_eq!(cues[1].text(), "Second line continues here");
        assert!(cues[2].is_blank());
        assert_eq!(cues[2].index(), 2);
    }

    #[test]
    fn accepts_dot_separator_and_missing_counter() {
        let cues = parse_srt("01:02:03.040 --> 01:02:04.000\nhi\n").unwrap();
        assert_eq!(cues.len(), 1);
        assert_relative_eq!(cues[0].start(), 3723.04, epsilon = 1e-9);
    }

    #[test]
    fn strips_bom_and_handles_crlf() {
        let raw = "\u{feff}1\r\n00:00:00,000 --> 00:00:01,000\r\nhi\r\n".as_bytes();
        let cues = parse_srt(&decode_srt(raw)).unwrap();
        assert_eq!(cues[0].text(), "hi");
    }

    #[test]
    fn legacy_bytes_fall_back_to_windows_1252() {
        let raw = b"00:00:00,000 --> 00:00:01,000\ncaf\xe9\n";
        let cues = parse_srt(&decode_srt(raw)).unwrap();
        assert_eq!(cues[0].text(), "caf\u{e9}");
    }

    fn with_bom(bom: &[u8], units: impl Iterator<Item = Vec<u8>>) -> Vec<u8> {
        let mut bytes = bom.to_vec();
        units.for_each(|u| bytes.extend(u));
        bytes
    }

    const UNICODE_SRT: &str = "1\r\n00:00:01,000 --> 00:00:02,000\r\nxin chào\r\n";

    #[test]
    fn decodes_utf16_with_bom() {
        let le = with_bom(
            &[0xFF, 0xFE],
            UNICODE_SRT.encode_utf16().map(|u| u.to_le_bytes().to_vec()),
        );
        let be = with_bom(
            &[0xFE, 0xFF],
            UNICODE_SRT.encode_utf16().map(|u| u.to_be_bytes().to_vec()),
        );
        for bytes in [le, be] {
            let cues = parse_srt(&decode_srt(&bytes)).unwrap();
            assert_eq!(cues.len(), 1);
            assert_eq!(cues[0].text(), "xin chào");
            assert_relative_eq!(cues[0].start(), 1.0);
        }
    }

    #[test]
    fn decodes_utf32_with_bom() {
        let le = with_bom(
            &[0xFF, 0xFE, 0, 0],
            UNICODE_SRT.chars().map(|c| (c as u32).to_le_bytes().to_vec()),
        );
        let be = with_bom(
            &[0, 0, 0xFE, 0xFF],
            UNICODE_SRT.chars().map(|c| (c as u32).to_be_bytes().to_vec()),
        );
        for bytes in [le, be] {
            let cues = parse_srt(&decode_srt(&bytes)).unwrap();
            assert_eq!(cues[0].text(), "xin chào");
        }
    }

    #[test]
    fn short_millisecond_field_counts_milliseconds() {
        let cues = parse_srt("00:00:01,5 --> 00:00:02,50\nhi\n").unwrap();
        assert_relative_eq!(cues[0].start(), 1.005, epsilon = 1e-9);
        assert_relative_eq!(cues[0].end().unwrap(), 2.05, epsilon = 1e-9);
    }

    #[test]
    fn malformed_timing_reports_line() {
        let err = parse_srt("1\n00:00:01 -> 00:00:02\nhi\n").unwrap_err();
        match err {
            DubError::InputParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn end_before_start_is_rejected() {
        let err = parse_srt("00:00:03,000 --> 00:00:02,000\nhi\n").unwrap_err();
        assert!(matches!(err, DubError::InputParse { line: 1, .. }));
    }

    #[test]
    fn decreasing_start_is_rejected() {
        let input = "00:00:05,000 --> 00:00:06,000\na\n\n00:00:04,000 --> 00:00:07,000\nb\n";
        let err = parse_srt(input).unwrap_err();
        assert!(matches!(err, DubError::InputParse { line: 4, .. }));
    }

    #[test]
    fn formats_srt_time() {
        assert_eq!(format_srt_time(3723.04), "01:02:03,040");
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
    }
}
