use anyhow::Result;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ocr::{
    Canvas, Detection, FusionReport, Layout, OcrEngine, OverlayStyle, Rect, TextMeasure,
    Tokenizer, TypesetOptions, aggregate_group_text, build_groups, collect_detections,
    draw_lines, find_best_font_size, find_groups, fuse_detections, layout_positions,
    recognize_region,
};
use crate::providers::TranslationProvider;

/// Runs every engine over `image` and fuses the combined detections.
pub fn fuse_engines(engines: &[&dyn OcrEngine], image: &DynamicImage) -> Result<FusionReport> {
    let mut detections = Vec::new();
    for engine in engines {
        detections.extend(collect_detections(*engine, image)?);
    }
    info!(
        "fusing {} detections from {} engine(s)",
        detections.len(),
        engines.len()
    );
    Ok(fuse_detections(detections))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionOptions {
    pub group_threshold: f32,
    pub confidence_threshold: f32,
    pub margin: f32,
    pub min_box: f32,
    pub target_lang: String,
    pub typeset: TypesetOptions,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            group_threshold: 10.0,
            confidence_threshold: 0.60,
            margin: 10.0,
            min_box: 10.0,
            target_lang: "th".to_string(),
            typeset: TypesetOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No member text survived the confidence filter.
    EmptyText,
    /// The inset box is narrower or shorter than `min_box`.
    BoxTooSmall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionOutcome {
    Rendered {
        text: String,
        /// False when the source text was drawn, either because the provider
        /// failed or because it does not translate.
        translated: bool,
        layout: Layout,
    },
    Skipped {
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    pub group_id: usize,
    pub members: Vec<usize>,
    pub envelope: Rect,
    pub source_text: String,
    pub outcome: RegionOutcome,
}

/// Collaborators for one overlay run.
pub struct RegionRun<'a, M: TextMeasure> {
    pub provider: &'a dyn TranslationProvider,
    pub measure: &'a M,
    pub tokenizer: &'a dyn Tokenizer,
    /// When set, each region is cropped and recognized again instead of
    /// reusing the member detections' text.
    pub recognizer: Option<&'a dyn OcrEngine>,
    pub options: RegionOptions,
}

impl<M: TextMeasure> RegionRun<'_, M> {
    /// Groups `detections`, blanks every region on `canvas`, then translates
    /// and typesets the regions that have room and text. A failed
    /// translation keeps the source text.
    pub async fn render(
        &self,
        image: &DynamicImage,
        detections: &[Detection],
        canvas: &mut dyn Canvas,
        style: &OverlayStyle,
    ) -> Vec<RegionReport> {
        if detections.is_empty() {
            warn!("no detections; nothing to overlay");
            return Vec::new();
        }
        let rects: Vec<Rect> = detections.iter().map(|det| det.bbox).collect();
        let grouping = find_groups(&rects, self.options.group_threshold);
        let groups = build_groups(&rects, &grouping);
        info!("{} detections -> {} regions", detections.len(), groups.len());

        let mut reports = Vec::with_capacity(groups.len());
        for group in groups {
            let members: Vec<&Detection> = group.members.iter().map(|&idx| &detections[idx]).collect();
            canvas.fill_rect(&group.envelope, &style.fill_color);

            let inner = group.envelope.inset(self.options.margin);
            let (source_text, outcome) =
                if inner.width() < self.options.min_box || inner.height() < self.options.min_box {
                    let text = aggregate_group_text(&members, self.options.confidence_threshold);
                    let skipped = RegionOutcome::Skipped {
                        reason: SkipReason::BoxTooSmall,
                    };
                    (text, skipped)
                } else {
                    let text = self.region_text(image, &group.envelope, &members);
                    let outcome = self.render_region(&inner, &text, canvas, style).await;
                    (text, outcome)
                };
            if let RegionOutcome::Skipped { reason } = &outcome {
                debug!("region {} skipped: {:?}", group.id, reason);
            }
            reports.push(RegionReport {
                group_id: group.id,
                members: group.members,
                envelope: group.envelope,
                source_text,
                outcome,
            });
        }
        reports
    }

    fn region_text(&self, image: &DynamicImage, envelope: &Rect, members: &[&Detection]) -> String {
        let threshold = self.options.confidence_threshold;
        if let Some(engine) = self.recognizer {
            match recognize_region(engine, image, envelope) {
                Ok(found) if !found.is_empty() => {
                    let refs: Vec<&Detection> = found.iter().collect();
                    let text = aggregate_group_text(&refs, threshold);
                    if !text.is_empty() {
                        return text;
                    }
                }
                Ok(_) => debug!("re-recognition found nothing; using detection text"),
                Err(err) => warn!("re-recognition failed: {:#}", err),
            }
        }
        aggregate_group_text(members, threshold)
    }

    /// Translates `source_text` and draws it inside `inner`, which is the
    /// region envelope already inset by the margin.
    async fn render_region(
        &self,
        inner: &Rect,
        source_text: &str,
        canvas: &mut dyn Canvas,
        style: &OverlayStyle,
    ) -> RegionOutcome {
        if source_text.is_empty() {
            return RegionOutcome::Skipped {
                reason: SkipReason::EmptyText,
            };
        }

        let (text, translated) = match self
            .provider
            .translate(source_text, &self.options.target_lang)
            .await
        {
            Ok(text) if !text.trim().is_empty() => (text, self.provider.translates()),
            Ok(_) => {
                warn!(
                    "{} returned an empty translation for \"{}\"; keeping source text",
                    self.provider.name(),
                    source_text
                );
                (source_text.to_string(), false)
            }
            Err(err) => {
                warn!(
                    "{} failed for \"{}\": {:#}; keeping source text",
                    self.provider.name(),
                    source_text,
                    err
                );
                (source_text.to_string(), false)
            }
        };

        let layout = find_best_font_size(
            &text,
            self.tokenizer,
            self.measure,
            inner.width(),
            inner.height(),
            &self.options.typeset,
        );
        if layout.overflow {
            warn!(
                "\"{}\" does not fit {:.0}x{:.0}; drawing at {}px",
                text,
                inner.width(),
                inner.height(),
                layout.font_size
            );
        } else {
            info!("\"{}\" -> \"{}\" at {}px", source_text, text, layout.font_size);
        }
        let placed = layout_positions(&layout, inner, self.measure);
        draw_lines(canvas, &layout, &placed, style);
        RegionOutcome::Rendered {
            text,
            translated,
            layout,
        }
    }
}
