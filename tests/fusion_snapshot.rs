use std::fmt::Write;
use std::path::Path;

use image::DynamicImage;
use ocr_overlay_rust::ocr::{
    DetectionFileEngine, FusionReport, OcrEngine, Rect, build_groups, find_groups,
};
use ocr_overlay_rust::pipeline::fuse_engines;

fn fixture(name: &str) -> DetectionFileEngine {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    DetectionFileEngine::open(&path).unwrap()
}

fn rect(rect: &Rect) -> String {
    format!(
        "[{:.0}, {:.0}, {:.0}, {:.0}]",
        rect.x_min, rect.y_min, rect.x_max, rect.y_max
    )
}

fn describe(report: &FusionReport, threshold: f32) -> String {
    let mut out = String::new();
    writeln!(out, "shown").unwrap();
    for (idx, det) in report.shown.iter().enumerate() {
        writeln!(
            out,
            "{} {} {:?} {:.0}% {}",
            idx,
            det.origin.as_str(),
            det.text,
            det.confidence * 100.0,
            rect(&det.bbox)
        )
        .unwrap();
    }
    writeln!(out, "hidden").unwrap();
    for hidden in &report.hidden {
        let det = &hidden.detection;
        writeln!(
            out,
            "{} {:?} {:.0}% by {}",
            det.origin.as_str(),
            det.text,
            det.confidence * 100.0,
            hidden.suppressed_by
        )
        .unwrap();
    }

    let rects: Vec<Rect> = report.shown.iter().map(|det| det.bbox).collect();
    let grouping = find_groups(&rects, threshold);
    writeln!(out, "groups (threshold {})", threshold).unwrap();
    for group in build_groups(&rects, &grouping) {
        writeln!(
            out,
            "{} members {:?} envelope {}",
            group.id,
            group.members,
            rect(&group.envelope)
        )
        .unwrap();
    }
    out
}

#[test]
fn receipt_fusion_snapshot() {
    let easy = fixture("receipt_easyocr.json");
    let paddle = fixture("receipt_paddleocr.json");
    let doctr = fixture("receipt_doctr.json");
    let engines: [&dyn OcrEngine; 3] = [&easy, &paddle, &doctr];
    let image = DynamicImage::new_rgb8(400, 200);

    let report = fuse_engines(&engines, &image).unwrap();
    let summary = describe(&report, 10.0);
    insta::assert_snapshot!("receipt_fusion", summary);
}

#[test]
fn fused_output_is_stable_when_fused_again() {
    let easy = fixture("receipt_easyocr.json");
    let paddle = fixture("receipt_paddleocr.json");
    let image = DynamicImage::new_rgb8(400, 200);
    let first = fuse_engines(&[&easy, &paddle], &image).unwrap();
    let again = ocr_overlay_rust::ocr::fuse_detections(first.shown.clone());
    assert_eq!(again.shown, first.shown);
    assert!(again.hidden.is_empty());
}
