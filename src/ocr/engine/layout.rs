use serde::{Deserialize, Serialize};

use crate::ocr::{Layout, Rect};

use super::text::Tokenizer;

/// Text-metrics collaborator. `font` builds the handle for one size; `measure`
/// returns the extent of a single line in box units.
pub trait TextMeasure {
    type Font;

    fn font(&self, size: u32) -> Self::Font;
    fn measure(&self, text: &str, font: &Self::Font) -> (f32, f32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapPolicy {
    /// Append tokens until the line overflows, then break before the token.
    /// No lookahead and no hyphenation.
    #[default]
    Greedy,
    /// Only explicit newlines break lines.
    SingleLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    /// Binary search over sizes. Assumes a larger size never makes the wrapped
    /// block smaller; when wrap decisions are not monotonic near the boundary
    /// a larger fitting size can be missed.
    #[default]
    Binary,
    /// Tries every size from the top down. Exact but O(range).
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypesetOptions {
    pub min_size: u32,
    pub max_size: u32,
    pub line_spacing: f32,
    pub wrap: WrapPolicy,
    pub strategy: FitStrategy,
}

impl Default for TypesetOptions {
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 60,
            line_spacing: 4.0,
            wrap: WrapPolicy::Greedy,
            strategy: FitStrategy::Binary,
        }
    }
}

pub fn wrap_text<M: TextMeasure>(
    text: &str,
    tokenizer: &dyn Tokenizer,
    measure: &M,
    font: &M::Font,
    box_w: f32,
    policy: WrapPolicy,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for token in tokenizer.tokenize(text) {
        if token == "\n" {
            push_line(&mut lines, &current);
            current.clear();
            continue;
        }
        let blank = token.trim().is_empty();
        if blank && current.is_empty() {
            continue;
        }
        let candidate = format!("{}{}", current, token);
        let overflow = policy == WrapPolicy::Greedy
            && !current.is_empty()
            && measure.measure(&candidate, font).0 > box_w;
        if overflow {
            push_line(&mut lines, &current);
            current.clear();
            if !blank {
                current.push_str(&token);
            }
        } else {
            current = candidate;
        }
    }
    push_line(&mut lines, &current);
    lines
}

fn push_line(lines: &mut Vec<String>, line: &str) {
    let line = line.trim_end();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
}

/// Width is the widest line; height sums line heights with `line_spacing`
/// between lines but not after the last.
pub fn measure_multiline<M: TextMeasure>(
    lines: &[String],
    measure: &M,
    font: &M::Font,
    line_spacing: f32,
) -> (f32, f32) {
    let mut width: f32 = 0.0;
    let mut height: f32 = 0.0;
    for (idx, line) in lines.iter().enumerate() {
        let (w, h) = measure.measure(line, font);
        width = width.max(w);
        if idx > 0 {
            height += line_spacing;
        }
        height += h;
    }
    (width, height)
}

/// Largest size in `[min_size, max_size]` whose wrapped block fits the box.
/// When nothing fits, the minimum size is committed with `overflow` set.
pub fn find_best_font_size<M: TextMeasure>(
    text: &str,
    tokenizer: &dyn Tokenizer,
    measure: &M,
    box_w: f32,
    box_h: f32,
    options: &TypesetOptions,
) -> Layout {
    let min_size = options.min_size.min(options.max_size);
    let max_size = options.min_size.max(options.max_size);
    let attempt = |size: u32| {
        let font = measure.font(size);
        let lines = wrap_text(text, tokenizer, measure, &font, box_w, options.wrap);
        let (width, height) = measure_multiline(&lines, measure, &font, options.line_spacing);
        Layout {
            lines,
            font_size: size,
            measured_width: width,
            measured_height: height,
            line_spacing: options.line_spacing,
            overflow: width > box_w || height > box_h,
        }
    };

    let best = match options.strategy {
        FitStrategy::Binary => {
            let mut best = None;
            let mut low = min_size as i64;
            let mut high = max_size as i64;
            while low <= high {
                let mid = (low + high) / 2;
                let layout = attempt(mid as u32);
                if layout.overflow {
                    high = mid - 1;
                } else {
                    best = Some(layout);
                    low = mid + 1;
                }
            }
            best
        }
        FitStrategy::Linear => (min_size..=max_size)
            .rev()
            .map(&attempt)
            .find(|layout| !layout.overflow),
    };

    best.unwrap_or_else(|| {
        let mut layout = attempt(min_size);
        layout.overflow = true;
        layout
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Centers the block vertically in `rect` and every line horizontally.
/// `y` is the top of each line.
pub fn layout_positions<M: TextMeasure>(
    layout: &Layout,
    rect: &Rect,
    measure: &M,
) -> Vec<PlacedLine> {
    let font = measure.font(layout.font_size);
    let mut y = rect.y_min + (rect.height() - layout.measured_height) / 2.0;
    let mut placed = Vec::with_capacity(layout.lines.len());
    for line in &layout.lines {
        let (width, height) = measure.measure(line, &font);
        placed.push(PlacedLine {
            text: line.clone(),
            x: rect.x_min + (rect.width() - width) / 2.0,
            y,
            width,
            height,
        });
        y += height + layout.line_spacing;
    }
    placed
}
