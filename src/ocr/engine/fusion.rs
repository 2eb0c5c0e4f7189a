use serde::Serialize;
use tracing::{debug, info};

use crate::ocr::{Detection, FusionReport};

use super::geom::point_in_box;

#[derive(Debug, Clone, Serialize)]
pub struct Suppressed {
    pub detection: Detection,
    /// Index into `FusionReport::shown` of the detection whose box holds this center.
    pub suppressed_by: usize,
}

/// Keeps detections in descending confidence order, hiding any detection whose
/// center falls inside an already accepted box. Ties keep input order and a
/// NaN confidence ranks below every number.
pub fn fuse_detections(detections: Vec<Detection>) -> FusionReport {
    let mut sorted = detections;
    sorted.sort_by(|a, b| rank(b.confidence).total_cmp(&rank(a.confidence)));

    let mut shown: Vec<Detection> = Vec::new();
    let mut hidden = Vec::new();
    for det in sorted {
        let holder = shown
            .iter()
            .position(|accepted| point_in_box(det.center, &accepted.bbox));
        match holder {
            Some(idx) => {
                let by = &shown[idx];
                info!(
                    "hide \"{}\" ({:.1}%) inside \"{}\" ({:.1}%)",
                    det.text,
                    det.confidence * 100.0,
                    by.text,
                    by.confidence * 100.0
                );
                hidden.push(Suppressed {
                    detection: det,
                    suppressed_by: idx,
                });
            }
            None => {
                info!(
                    "show \"{}\" ({:.1}%) from {}",
                    det.text,
                    det.confidence * 100.0,
                    det.origin.as_str()
                );
                shown.push(det);
            }
        }
    }
    debug!("fusion: {} shown, {} hidden", shown.len(), hidden.len());
    FusionReport { shown, hidden }
}

fn rank(confidence: f32) -> f32 {
    if confidence.is_nan() {
        f32::NEG_INFINITY
    } else {
        confidence
    }
}
