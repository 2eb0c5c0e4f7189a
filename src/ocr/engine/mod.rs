mod fusion;
mod geom;
mod grouping;
mod layout;
mod parse;
mod preprocess;
mod tesseract;
mod text;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::ocr::{Detection, EngineId, Point, RawDetection, Rect};

pub use fusion::{Suppressed, fuse_detections};
pub use geom::{boxes_close_or_overlap, point_in_box, rect_from_polygon};
pub use grouping::{Grouping, build_groups, find_groups};
pub use layout::{
    FitStrategy, PlacedLine, TextMeasure, TypesetOptions, WrapPolicy, find_best_font_size,
    layout_positions, measure_multiline, wrap_text,
};
pub use parse::DetectionFileEngine;
pub use tesseract::{TesseractEngine, list_tesseract_languages};
pub use text::{SimpleTokenizer, Tokenizer, aggregate_group_text, merge_trailing_dash_tokens};

/// OCR collaborator. Implementations are constructed once per run and passed in.
pub trait OcrEngine {
    fn id(&self) -> EngineId;
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>>;
}

/// Runs `engine` and reduces each polygon to its bounding rect.
pub fn collect_detections(engine: &dyn OcrEngine, image: &DynamicImage) -> Result<Vec<Detection>> {
    let origin = engine.id();
    let raw = engine
        .detect(image)
        .with_context(|| format!("{} failed to detect text", origin.as_str()))?;
    let detections: Vec<Detection> = raw
        .into_iter()
        .filter_map(|raw| Detection::from_raw(raw, origin))
        .collect();
    debug!("{}: {} detections", origin.as_str(), detections.len());
    Ok(detections)
}

/// Re-recognizes the part of `image` under `region`. Returned boxes are in
/// full-image coordinates.
pub fn recognize_region(
    engine: &dyn OcrEngine,
    image: &DynamicImage,
    region: &Rect,
) -> Result<Vec<Detection>> {
    let (width, height) = image.dimensions();
    let x = region.x_min.max(0.0).floor() as u32;
    let y = region.y_min.max(0.0).floor() as u32;
    let x2 = (region.x_max.ceil().max(0.0) as u32).min(width);
    let y2 = (region.y_max.ceil().max(0.0) as u32).min(height);
    if x2 <= x || y2 <= y {
        return Ok(Vec::new());
    }
    let crop = image.crop_imm(x, y, x2 - x, y2 - y);
    let offset = Point::new(x as f32, y as f32);
    let shifted = collect_detections(engine, &crop)?
        .into_iter()
        .map(|det| {
            let bbox = Rect {
                x_min: det.bbox.x_min + offset.x,
                y_min: det.bbox.y_min + offset.y,
                x_max: det.bbox.x_max + offset.x,
                y_max: det.bbox.y_max + offset.y,
            };
            Detection::new(det.text, bbox, det.confidence, det.origin)
        })
        .collect();
    Ok(shifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct FixedEngine {
        raw: Vec<RawDetection>,
    }

    impl OcrEngine for FixedEngine {
        fn id(&self) -> EngineId {
            EngineId::PaddleOcr
        }

        fn detect(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
            Ok(self.raw.clone())
        }
    }

    struct BrokenEngine;

    impl OcrEngine for BrokenEngine {
        fn id(&self) -> EngineId {
            EngineId::EasyOcr
        }

        fn detect(&self, _image: &DynamicImage) -> Result<Vec<RawDetection>> {
            Err(anyhow!("model missing"))
        }
    }

    fn raw(points: &[(f32, f32)], text: &str) -> RawDetection {
        RawDetection {
            polygon: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            text: text.to_string(),
            confidence: 0.8,
        }
    }

    #[test]
    fn collect_reduces_polygons_and_tags_origin() {
        let engine = FixedEngine {
            raw: vec![
                raw(&[(10.0, 5.0), (50.0, 0.0), (55.0, 20.0), (8.0, 25.0)], "tilted"),
                raw(&[], "empty"),
            ],
        };
        let image = DynamicImage::new_rgb8(100, 100);
        let detections = collect_detections(&engine, &image).expect("detections");
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, Rect::new(8.0, 0.0, 55.0, 25.0));
        assert_eq!(detections[0].origin, EngineId::PaddleOcr);
    }

    #[test]
    fn collect_adds_engine_context_to_errors() {
        let image = DynamicImage::new_rgb8(10, 10);
        let err = collect_detections(&BrokenEngine, &image).unwrap_err();
        assert!(format!("{:#}", err).contains("easyocr failed to detect text"));
    }

    #[test]
    fn region_detections_are_shifted_back() {
        let engine = FixedEngine {
            raw: vec![raw(&[(1.0, 2.0), (11.0, 12.0)], "word")],
        };
        let image = DynamicImage::new_rgb8(200, 200);
        let region = Rect::new(40.0, 60.0, 120.0, 90.0);
        let detections = recognize_region(&engine, &image, &region).expect("detections");
        assert_eq!(detections[0].bbox, Rect::new(41.0, 62.0, 51.0, 72.0));
    }

    #[test]
    fn region_outside_image_is_empty() {
        let engine = FixedEngine {
            raw: vec![raw(&[(1.0, 2.0), (11.0, 12.0)], "word")],
        };
        let image = DynamicImage::new_rgb8(50, 50);
        let region = Rect::new(60.0, 60.0, 90.0, 90.0);
        assert!(recognize_region(&engine, &image, &region).expect("ok").is_empty());
    }
}
