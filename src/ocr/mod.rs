mod engine;
mod font;
mod render;

pub use engine::{
    DetectionFileEngine, FitStrategy, Grouping, OcrEngine, PlacedLine, SimpleTokenizer,
    Suppressed, TesseractEngine, TextMeasure, Tokenizer, TypesetOptions, WrapPolicy,
    aggregate_group_text, boxes_close_or_overlap, build_groups, collect_detections,
    find_best_font_size, find_groups, fuse_detections, layout_positions,
    list_tesseract_languages, measure_multiline, merge_trailing_dash_tokens, point_in_box,
    recognize_region, rect_from_polygon, wrap_text,
};
pub use font::{FontMetrics, HeuristicMeasure, load_font_metrics, resolve_overlay_font};
pub use render::{
    Canvas, OverlayStyle, SvgCanvas, origin_color, render_fusion_svg, render_svg_bytes,
};
pub(crate) use render::{draw_lines, mime_from_path};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in image pixels. `x_min <= x_max` and `y_min <= y_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl Rect {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.x_min + self.x_max) / 2.0,
            y: (self.y_min + self.y_max) / 2.0,
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Shrinks the rect by `margin` on every side. The result may be inverted
    /// (negative width or height) when the margin exceeds half the size.
    pub fn inset(&self, margin: f32) -> Rect {
        Rect {
            x_min: self.x_min + margin,
            y_min: self.y_min + margin,
            x_max: self.x_max - margin,
            y_max: self.y_max - margin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineId {
    EasyOcr,
    DocTr,
    PaddleOcr,
    Tesseract,
    External,
}

impl EngineId {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineId::EasyOcr => "easyocr",
            EngineId::DocTr => "doctr",
            EngineId::PaddleOcr => "paddleocr",
            EngineId::Tesseract => "tesseract",
            EngineId::External => "external",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "easyocr" | "easy" => Some(EngineId::EasyOcr),
            "doctr" => Some(EngineId::DocTr),
            "paddleocr" | "paddle" => Some(EngineId::PaddleOcr),
            "tesseract" => Some(EngineId::Tesseract),
            "external" => Some(EngineId::External),
            _ => None,
        }
    }
}

/// What an OCR engine hands back before the polygon is reduced to a rect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub polygon: Vec<Point>,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub text: String,
    pub bbox: Rect,
    pub center: Point,
    pub confidence: f32,
    pub origin: EngineId,
}

impl Detection {
    pub fn new(text: impl Into<String>, bbox: Rect, confidence: f32, origin: EngineId) -> Self {
        Self {
            text: text.into(),
            center: bbox.center(),
            bbox,
            confidence,
            origin,
        }
    }

    /// Returns `None` for a detection without vertices.
    pub fn from_raw(raw: RawDetection, origin: EngineId) -> Option<Self> {
        let bbox = rect_from_polygon(&raw.polygon)?;
        Some(Self::new(raw.text, bbox, raw.confidence, origin))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: usize,
    pub members: Vec<usize>,
    pub envelope: Rect,
}

/// Committed typesetting result for one (text, box) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub lines: Vec<String>,
    pub font_size: u32,
    pub measured_width: f32,
    pub measured_height: f32,
    pub line_spacing: f32,
    /// Set when no size in range fit and the minimum size was used anyway.
    pub overflow: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FusionReport {
    pub shown: Vec<Detection>,
    pub hidden: Vec<Suppressed>,
}
