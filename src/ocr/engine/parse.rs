use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, GenericImageView};
use serde::Deserialize;
use std::path::Path;

use crate::ocr::{EngineId, Point, RawDetection};

use super::OcrEngine;

/// Word rows (level 5) of tesseract TSV output. Confidence is rescaled to 0..1.
pub(super) fn parse_tsv_words(tsv: &str) -> Vec<RawDetection> {
    let mut words = Vec::new();
    for row in tsv.lines().skip(1) {
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 || cols[0].trim() != "5" {
            continue;
        }
        let text = cols[11].trim();
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let number = |idx: usize| cols[idx].trim().parse::<f32>().unwrap_or(0.0);
        let (left, top, width, height) = (number(6), number(7), number(8), number(9));
        words.push(RawDetection {
            polygon: vec![
                Point::new(left, top),
                Point::new(left + width, top),
                Point::new(left + width, top + height),
                Point::new(left, top + height),
            ],
            text: text.to_string(),
            confidence: (conf / 100.0).clamp(0.0, 1.0),
        });
    }
    words
}

/// Pre-computed detections written by an external engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DetectionFile {
    Native {
        engine: Option<String>,
        detections: Vec<RawDetection>,
    },
    DocTr {
        pages: Vec<DocTrPage>,
    },
    Rows(Vec<ListEntry>),
}

/// EasyOCR rows are `[polygon, text, conf]`; PaddleOCR rows are
/// `[polygon, [text, conf]]`, nested one level per page (`null` for an empty page).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ListEntry {
    Easy(Vec<[f32; 2]>, String, f32),
    Paddle(Vec<[f32; 2]>, (String, f32)),
    Page(Option<Vec<ListEntry>>),
}

#[derive(Debug, Clone, Deserialize)]
struct DocTrPage {
    #[serde(default)]
    dimensions: Option<(f32, f32)>,
    #[serde(default)]
    blocks: Vec<DocTrBlock>,
}

#[derive(Debug, Clone, Deserialize)]
struct DocTrBlock {
    #[serde(default)]
    lines: Vec<DocTrLine>,
}

#[derive(Debug, Clone, Deserialize)]
struct DocTrLine {
    #[serde(default)]
    words: Vec<DocTrWord>,
}

#[derive(Debug, Clone, Deserialize)]
struct DocTrWord {
    value: String,
    #[serde(default = "full_confidence")]
    confidence: f32,
    /// Relative `[[x_min, y_min], [x_max, y_max]]`.
    geometry: Vec<[f32; 2]>,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone)]
pub struct DetectionFileEngine {
    file: DetectionFile,
    engine: EngineId,
}

impl DetectionFileEngine {
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detections: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("failed to parse detections: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: DetectionFile = serde_json::from_str(content)
            .map_err(|_| anyhow!("unrecognized detection layout (expected native, EasyOCR, PaddleOCR or docTR JSON)"))?;
        let engine = match &file {
            DetectionFile::Native { engine, .. } => engine
                .as_deref()
                .and_then(EngineId::from_name)
                .unwrap_or(EngineId::External),
            DetectionFile::DocTr { .. } => EngineId::DocTr,
            DetectionFile::Rows(rows) => rows_engine(rows),
        };
        Ok(Self { file, engine })
    }

    pub fn with_engine(mut self, engine: EngineId) -> Self {
        self.engine = engine;
        self
    }
}

impl OcrEngine for DetectionFileEngine {
    fn id(&self) -> EngineId {
        self.engine
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>> {
        let (width, height) = image.dimensions();
        let mut out = Vec::new();
        match &self.file {
            DetectionFile::Native { detections, .. } => out.extend(detections.iter().cloned()),
            DetectionFile::DocTr { pages } => {
                for page in pages {
                    let (page_w, page_h) = if width > 0 && height > 0 {
                        (width as f32, height as f32)
                    } else {
                        // docTR stores (height, width).
                        page.dimensions.map(|(h, w)| (w, h)).unwrap_or((1.0, 1.0))
                    };
                    for word in page.blocks.iter().flat_map(|block| &block.lines).flat_map(|line| &line.words) {
                        out.push(RawDetection {
                            polygon: word
                                .geometry
                                .iter()
                                .map(|[x, y]| Point::new((x * page_w).trunc(), (y * page_h).trunc()))
                                .collect(),
                            text: word.value.clone(),
                            confidence: word.confidence,
                        });
                    }
                }
            }
            DetectionFile::Rows(rows) => flatten_rows(rows, &mut out),
        }
        Ok(out)
    }
}

fn to_polygon(points: &[[f32; 2]]) -> Vec<Point> {
    points.iter().map(|[x, y]| Point::new(*x, *y)).collect()
}

fn flatten_rows(rows: &[ListEntry], out: &mut Vec<RawDetection>) {
    for row in rows {
        match row {
            ListEntry::Easy(polygon, text, confidence) => out.push(RawDetection {
                polygon: to_polygon(polygon),
                text: text.clone(),
                confidence: *confidence,
            }),
            ListEntry::Paddle(polygon, (text, confidence)) => out.push(RawDetection {
                polygon: to_polygon(polygon),
                text: text.clone(),
                confidence: *confidence,
            }),
            ListEntry::Page(Some(entries)) => flatten_rows(entries, out),
            ListEntry::Page(None) => {}
        }
    }
}

fn rows_engine(rows: &[ListEntry]) -> EngineId {
    for row in rows {
        match row {
            ListEntry::Easy(..) => return EngineId::EasyOcr,
            ListEntry::Paddle(..) => return EngineId::PaddleOcr,
            ListEntry::Page(Some(entries)) => {
                let engine = rows_engine(entries);
                if engine != EngineId::External {
                    return engine;
                }
            }
            ListEntry::Page(None) => {}
        }
    }
    EngineId::External
}
