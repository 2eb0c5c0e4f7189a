use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::ocr::Detection;

/// Splits text into wrap units. Whitespace runs are returned as a single `" "`
/// token and an explicit newline as `"\n"`.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Word tokenizer for scripts with spaces. CJK ideographs, kana and Thai are
/// split per grapheme cluster, so combining marks stay with their base. For
/// Thai this is a coarse stand-in for dictionary segmentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();

        for grapheme in text.graphemes(true) {
            if grapheme == "\n" || grapheme == "\r\n" {
                flush(&mut tokens, &mut current);
                tokens.push("\n".to_string());
                continue;
            }
            if grapheme.chars().all(char::is_whitespace) {
                flush(&mut tokens, &mut current);
                if tokens.last().map(|last| last != " ").unwrap_or(true) {
                    tokens.push(" ".to_string());
                }
                continue;
            }
            let base = grapheme.chars().next().unwrap_or(' ');
            if is_cjk(base) || is_thai(base) {
                flush(&mut tokens, &mut current);
                tokens.push(grapheme.to_string());
                continue;
            }
            current.push_str(grapheme);
        }
        flush(&mut tokens, &mut current);
        tokens
    }
}

fn flush(tokens: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0x3400..=0x4DBF
    )
}

fn is_thai(ch: char) -> bool {
    matches!(ch as u32, 0x0E01..=0x0E5B)
}

/// Strips `;` and `:` from every token and joins a token ending in `-` with the
/// one after it. A trailing dash with nothing after it is dropped.
pub fn merge_trailing_dash_tokens(tokens: &[String]) -> Vec<String> {
    let clean = |token: &str| token.replace([';', ':'], "");
    let mut merged = Vec::with_capacity(tokens.len());
    let mut iter = tokens.iter().peekable();
    while let Some(token) = iter.next() {
        let token = clean(token);
        match token.strip_suffix('-') {
            Some(head) => match iter.next() {
                Some(next) => merged.push(format!("{}{}", head, clean(next))),
                None => merged.push(head.to_string()),
            },
            None => merged.push(token),
        }
    }
    merged
}

/// Orders detections into rows (top to bottom) and, within a row, left to right.
/// A detection joins the current row when its center lies within the row's
/// vertical span.
pub(crate) fn reading_order<'a>(detections: &[&'a Detection]) -> Vec<&'a Detection> {
    let mut by_y: Vec<&Detection> = detections.to_vec();
    by_y.sort_by(|a, b| a.center.y.total_cmp(&b.center.y));

    let mut rows: Vec<(f32, f32, Vec<&Detection>)> = Vec::new();
    for det in by_y {
        match rows.last_mut() {
            Some((top, bottom, row)) if det.center.y >= *top && det.center.y <= *bottom => {
                *top = top.min(det.bbox.y_min);
                *bottom = bottom.max(det.bbox.y_max);
                row.push(det);
            }
            _ => rows.push((det.bbox.y_min, det.bbox.y_max, vec![det])),
        }
    }

    rows.into_iter()
        .flat_map(|(_, _, mut row)| {
            row.sort_by(|a, b| a.bbox.x_min.total_cmp(&b.bbox.x_min));
            row
        })
        .collect()
}

/// Builds the source text for one region from its member detections.
pub fn aggregate_group_text(members: &[&Detection], confidence_threshold: f32) -> String {
    let mut tokens = Vec::new();
    for det in reading_order(members) {
        if det.confidence < confidence_threshold {
            debug!(
                "skip \"{}\": confidence {:.2} below {:.2}",
                det.text, det.confidence, confidence_threshold
            );
            continue;
        }
        let text = det.text.trim();
        if !text.is_empty() {
            tokens.push(text.to_string());
        }
    }
    merge_trailing_dash_tokens(&tokens)
        .into_iter()
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{EngineId, Rect};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn tokenize_words_and_spaces() {
        let tokens = SimpleTokenizer.tokenize("HELLO  WORLD\nnext");
        assert_eq!(tokens, strings(&["HELLO", " ", "WORLD", "\n", "next"]));
    }

    #[test]
    fn tokenize_cjk_per_character() {
        let tokens = SimpleTokenizer.tokenize("日本語 ok");
        assert_eq!(tokens, strings(&["日", "本", "語", " ", "ok"]));
    }

    #[test]
    fn tokenize_thai_keeps_marks_with_base() {
        // กิน: ก + sara i (mark) + น
        let tokens = SimpleTokenizer.tokenize("กิน");
        assert_eq!(tokens, strings(&["กิ", "น"]));
    }

    #[test]
    fn tokenize_keeps_combining_marks_with_base() {
        // か + combining voiced sound mark, as in NFD text.
        let tokens = SimpleTokenizer.tokenize("か\u{3099}か\u{3099}");
        assert_eq!(tokens, strings(&["か\u{3099}", "か\u{3099}"]));
        let tokens = SimpleTokenizer.tokenize("cafe\u{301} 漢\u{FE00}");
        assert_eq!(tokens, strings(&["cafe\u{301}", " ", "漢\u{FE00}"]));
    }

    #[test]
    fn narrow_wrap_never_starts_a_line_with_a_mark() {
        let lines = crate::ocr::wrap_text(
            "か\u{3099}か\u{3099}",
            &SimpleTokenizer,
            &crate::test_util::StubMeasure,
            &10,
            6.0,
            crate::ocr::WrapPolicy::Greedy,
        );
        assert_eq!(lines, strings(&["か\u{3099}", "か\u{3099}"]));
        assert!(lines.iter().all(|line| !line.starts_with('\u{3099}')));
    }

    #[test]
    fn dash_continuation_is_merged() {
        let merged = merge_trailing_dash_tokens(&strings(&["inter-", "national;", "note:", "end-"]));
        assert_eq!(merged, strings(&["international", "note", "end"]));
    }

    #[test]
    fn dash_merge_cleans_next_token() {
        let merged = merge_trailing_dash_tokens(&strings(&["co-", ":op", "x"]));
        assert_eq!(merged, strings(&["coop", "x"]));
    }

    fn det(text: &str, bbox: (f32, f32, f32, f32), conf: f32) -> Detection {
        Detection::new(
            text,
            Rect::new(bbox.0, bbox.1, bbox.2, bbox.3),
            conf,
            EngineId::EasyOcr,
        )
    }

    #[test]
    fn aggregate_reads_rows_left_to_right() {
        let world = det("WORLD", (60.0, 1.0, 110.0, 21.0), 0.9);
        let hello = det("HELLO", (0.0, 0.0, 50.0, 20.0), 0.9);
        let second = det("again", (0.0, 30.0, 50.0, 50.0), 0.9);
        let members = vec![&second, &world, &hello];
        assert_eq!(aggregate_group_text(&members, 0.6), "HELLO WORLD again");
    }

    #[test]
    fn aggregate_drops_low_confidence_and_merges_dashes() {
        let a = det("trans-", (0.0, 0.0, 50.0, 20.0), 0.9);
        let noise = det("~~", (52.0, 0.0, 60.0, 20.0), 0.2);
        let b = det("lation", (0.0, 30.0, 50.0, 50.0), 0.7);
        let members = vec![&a, &noise, &b];
        assert_eq!(aggregate_group_text(&members, 0.6), "translation");
    }

    #[test]
    fn aggregate_skips_tokens_left_empty_by_cleaning() {
        let a = det("Total", (0.0, 0.0, 50.0, 20.0), 0.9);
        let colon = det(":", (52.0, 0.0, 56.0, 20.0), 0.9);
        let b = det("12", (60.0, 0.0, 80.0, 20.0), 0.9);
        assert_eq!(aggregate_group_text(&[&a, &colon, &b], 0.6), "Total 12");
    }
}
