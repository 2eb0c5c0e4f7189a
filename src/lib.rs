use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod providers;
pub mod settings;
#[cfg(test)]
mod test_util;

use ocr::{
    Canvas, DetectionFileEngine, EngineId, FontMetrics, HeuristicMeasure, OcrEngine,
    OverlayStyle, SimpleTokenizer, SvgCanvas, TesseractEngine, TextMeasure, collect_detections,
    render_fusion_svg, render_svg_bytes, resolve_overlay_font,
};
use pipeline::{RegionOptions, RegionOutcome, RegionReport, RegionRun, fuse_engines};
use providers::{GoogleTranslate, PassthroughTranslator, TranslationProvider};

const FALLBACK_FONTS: &[&str] = &["Noto Sans Thai", "Noto Sans", "DejaVu Sans", "sans-serif"];

#[derive(Debug, Clone)]
pub struct FuseConfig {
    pub image: PathBuf,
    /// `path` or `engine=path`.
    pub detections: Vec<String>,
    pub tesseract: bool,
    pub output: PathBuf,
    pub report: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub image: PathBuf,
    pub detections: Option<String>,
    pub tesseract: bool,
    /// Re-run tesseract on each region crop for its text.
    pub reread: bool,
    pub output: PathBuf,
    pub lang: Option<String>,
    pub threshold: Option<f32>,
    pub no_translate: bool,
    pub report: Option<PathBuf>,
    pub settings_path: Option<PathBuf>,
}

struct SourceImage {
    image: DynamicImage,
    bytes: Vec<u8>,
    mime: &'static str,
}

impl SourceImage {
    fn open(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))?;
        let format = image::guess_format(&bytes)
            .with_context(|| format!("unrecognized image format: {}", path.display()))?;
        let image = image::load_from_memory_with_format(&bytes, format)
            .with_context(|| format!("failed to decode image: {}", path.display()))?;
        Ok(Self {
            image,
            bytes,
            mime: format.to_mime_type(),
        })
    }

    fn canvas(&self) -> SvgCanvas {
        let (width, height) = self.image.dimensions();
        SvgCanvas::new(&self.bytes, self.mime, width, height)
    }
}

pub fn run_fuse(config: FuseConfig) -> Result<String> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    let source = SourceImage::open(&config.image)?;

    let mut engines: Vec<Box<dyn OcrEngine>> = Vec::new();
    for arg in &config.detections {
        engines.push(Box::new(open_detection_file(arg)?));
    }
    let tesseract_from_settings = config.detections.is_empty()
        && settings
            .engines
            .iter()
            .any(|name| EngineId::from_name(name) == Some(EngineId::Tesseract));
    if config.tesseract || tesseract_from_settings {
        engines.push(Box::new(TesseractEngine::new(&settings.tesseract_languages)?));
    }
    if engines.is_empty() {
        return Err(anyhow!("no OCR engines selected (use --detections or --tesseract)"));
    }

    let refs: Vec<&dyn OcrEngine> = engines.iter().map(|engine| engine.as_ref()).collect();
    let report = fuse_engines(&refs, &source.image)?;
    let (width, height) = source.image.dimensions();
    let svg = render_fusion_svg(&source.bytes, source.mime, width, height, &report);
    write_output(&config.output, &svg, None)?;
    if let Some(path) = &config.report {
        write_report(path, &report)?;
    }
    Ok(format!(
        "{} shown, {} hidden -> {}",
        report.shown.len(),
        report.hidden.len(),
        config.output.display()
    ))
}

pub async fn run_translate(config: TranslateConfig) -> Result<String> {
    let settings = settings::load_settings(config.settings_path.as_deref())?;
    let source = SourceImage::open(&config.image)?;

    let engine: Box<dyn OcrEngine> = match (&config.detections, config.tesseract) {
        (Some(arg), false) => Box::new(open_detection_file(arg)?),
        (None, true) => Box::new(TesseractEngine::new(&settings.tesseract_languages)?),
        (Some(_), true) => return Err(anyhow!("use either --detections or --tesseract, not both")),
        (None, false) => return Err(anyhow!("--detections or --tesseract is required")),
    };
    let detections = collect_detections(engine.as_ref(), &source.image)?;
    let recognizer = if config.reread {
        Some(TesseractEngine::new(&settings.tesseract_languages)?)
    } else {
        None
    };

    let provider: Box<dyn TranslationProvider> = if config.no_translate {
        Box::new(PassthroughTranslator)
    } else {
        Box::new(
            GoogleTranslate::new()
                .with_endpoint(settings.endpoint.clone())
                .with_source_lang(settings.source_lang.clone()),
        )
    };

    let options = RegionOptions {
        group_threshold: config.threshold.unwrap_or(settings.group_threshold),
        confidence_threshold: settings.confidence_threshold,
        margin: settings.margin,
        min_box: settings.min_box,
        target_lang: config
            .lang
            .clone()
            .filter(|lang| !lang.trim().is_empty())
            .unwrap_or_else(|| settings.target_lang.clone()),
        typeset: settings.typeset_options(),
    };
    let mut style = OverlayStyle {
        text_color: settings.overlay_text_color.clone(),
        fill_color: settings.overlay_fill_color.clone(),
        font_family: settings.overlay_font_family.clone(),
    };

    let font = resolve_overlay_font(
        settings.overlay_font_path.as_deref().map(Path::new),
        settings.overlay_font_family.as_deref(),
        FALLBACK_FONTS,
    );
    let (reports, svg, font_data) = match font {
        Ok(metrics) => {
            info!("measuring with font {:?}", metrics.family());
            if let Some(family) = metrics.family() {
                style.font_family = Some(family.to_string());
            }
            let mut canvas = source
                .canvas()
                .with_font_family(style.font_family.clone())
                .with_ascent_ratio(metrics.ascent_ratio());
            let reports = overlay_regions(
                &metrics,
                provider.as_ref(),
                recognizer.as_ref(),
                options,
                &source,
                &detections,
                &mut canvas,
                &style,
            )
            .await;
            (reports, canvas.finish(), Some(font_bytes(&metrics)))
        }
        Err(err) => {
            warn!("no overlay font available ({:#}); estimating text widths", err);
            let mut canvas = source.canvas().with_font_family(style.font_family.clone());
            let reports = overlay_regions(
                &HeuristicMeasure,
                provider.as_ref(),
                recognizer.as_ref(),
                options,
                &source,
                &detections,
                &mut canvas,
                &style,
            )
            .await;
            (reports, canvas.finish(), None)
        }
    };

    write_output(&config.output, &svg, font_data.as_deref())?;
    if let Some(path) = &config.report {
        write_report(path, &reports)?;
    }
    Ok(summarize_regions(&reports, &config.output))
}

#[allow(clippy::too_many_arguments)]
async fn overlay_regions<M: TextMeasure>(
    measure: &M,
    provider: &dyn TranslationProvider,
    recognizer: Option<&TesseractEngine>,
    options: RegionOptions,
    source: &SourceImage,
    detections: &[ocr::Detection],
    canvas: &mut dyn Canvas,
    style: &OverlayStyle,
) -> Vec<RegionReport> {
    let run = RegionRun {
        provider,
        measure,
        tokenizer: &SimpleTokenizer,
        recognizer: recognizer.map(|engine| engine as &dyn OcrEngine),
        options,
    };
    run.render(&source.image, detections, canvas, style).await
}

fn font_bytes(metrics: &FontMetrics) -> Vec<u8> {
    metrics.data().to_vec()
}

fn summarize_regions(reports: &[RegionReport], output: &Path) -> String {
    let mut rendered = 0usize;
    let mut fallback = 0usize;
    let mut skipped = 0usize;
    for report in reports {
        match &report.outcome {
            RegionOutcome::Rendered { translated, .. } => {
                rendered += 1;
                if !translated {
                    fallback += 1;
                }
            }
            RegionOutcome::Skipped { .. } => skipped += 1,
        }
    }
    let mut summary = format!(
        "{} regions rendered, {} skipped -> {}",
        rendered,
        skipped,
        output.display()
    );
    if fallback > 0 {
        summary.push_str(&format!(" ({} kept source text)", fallback));
    }
    summary
}

/// `engine=path` overrides the engine id the file format implies.
fn parse_detection_arg(arg: &str) -> (Option<EngineId>, PathBuf) {
    if let Some((name, path)) = arg.split_once('=')
        && let Some(engine) = EngineId::from_name(name)
    {
        return (Some(engine), PathBuf::from(path));
    }
    (None, PathBuf::from(arg))
}

fn open_detection_file(arg: &str) -> Result<DetectionFileEngine> {
    let (engine, path) = parse_detection_arg(arg);
    let file = DetectionFileEngine::open(&path)?;
    Ok(match engine {
        Some(engine) => file.with_engine(engine),
        None => file,
    })
}

fn write_output(path: &Path, svg: &str, font_data: Option<&[u8]>) -> Result<()> {
    let is_svg = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
    let bytes = if is_svg {
        svg.as_bytes().to_vec()
    } else {
        let mime = ocr::mime_from_path(path)
            .ok_or_else(|| anyhow!("unsupported output extension: {}", path.display()))?;
        render_svg_bytes(svg, mime, font_data)?
    };
    fs::write(path, bytes).with_context(|| format!("failed to write output: {}", path.display()))
}

fn write_report<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).with_context(|| "failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("failed to write report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbImage::from_pixel(width, height, image::Rgb([240, 240, 240]))
            .save(path)
            .expect("png");
    }

    #[test]
    fn detection_arg_engine_prefix() {
        assert_eq!(
            parse_detection_arg("paddle=out/page.json"),
            (Some(EngineId::PaddleOcr), PathBuf::from("out/page.json"))
        );
        assert_eq!(
            parse_detection_arg("weird=name.json"),
            (None, PathBuf::from("weird=name.json"))
        );
        assert_eq!(parse_detection_arg("a.json"), (None, PathBuf::from("a.json")));
    }

    #[test]
    fn unknown_output_extension_is_rejected() {
        let err = write_output(Path::new("/tmp/out.xyz"), "<svg/>", None).unwrap_err();
        assert!(err.to_string().contains("unsupported output extension"));
    }

    #[test]
    fn fuse_writes_overlay_and_report() {
        with_temp_home(|home| {
            let image = home.join("page.png");
            write_png(&image, 200, 100);
            let easy = home.join("easy.json");
            fs::write(&easy, r#"[[[[0,0],[100,0],[100,40],[0,40]], "Total", 0.95]]"#).unwrap();
            let doctr = home.join("doctr.json");
            fs::write(
                &doctr,
                r#"[[[[40,10],[60,10],[60,30],[40,30]], "Tot", 0.5]]"#,
            )
            .unwrap();
            let output = home.join("fused.svg");
            let report = home.join("fused.json");

            let summary = run_fuse(FuseConfig {
                image,
                detections: vec![
                    easy.display().to_string(),
                    format!("doctr={}", doctr.display()),
                ],
                tesseract: false,
                output: output.clone(),
                report: Some(report.clone()),
                settings_path: None,
            })
            .expect("fuse");

            assert!(summary.starts_with("1 shown, 1 hidden"));
            let svg = fs::read_to_string(&output).unwrap();
            assert!(svg.contains("Total 95.0% (easyocr)"));
            let json = fs::read_to_string(&report).unwrap();
            assert!(json.contains("\"suppressed_by\": 0"));
            assert!(json.contains("\"origin\": \"doctr\""));
        });
    }

    #[test]
    fn translate_without_provider_draws_source_text() {
        with_temp_home(|home| {
            let image = home.join("page.png");
            write_png(&image, 300, 120);
            let detections = home.join("det.json");
            fs::write(
                &detections,
                r#"[[[[10,10],[150,10],[150,60],[10,60]], "HELLO", 0.9],
                   [[[155,10],[290,10],[290,60],[155,60]], "WORLD", 0.9]]"#,
            )
            .unwrap();
            let output = home.join("overlay.svg");
            let report = home.join("overlay.json");

            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            let summary = runtime
                .block_on(run_translate(TranslateConfig {
                    image,
                    detections: Some(detections.display().to_string()),
                    tesseract: false,
                    reread: false,
                    output: output.clone(),
                    lang: Some("ja".to_string()),
                    threshold: None,
                    no_translate: true,
                    report: Some(report.clone()),
                    settings_path: None,
                }))
                .expect("translate");

            assert!(summary.starts_with("1 regions rendered, 0 skipped"));
            let svg = fs::read_to_string(&output).unwrap();
            assert!(svg.contains(">HELLO WORLD</text>"));
            assert!(svg.contains(r##"fill="#ffffff""##));
            let json = fs::read_to_string(&report).unwrap();
            assert!(json.contains("\"status\": \"rendered\""));
            assert!(json.contains("\"translated\": false"));
        });
    }

    #[test]
    fn translate_requires_a_detection_source() {
        with_temp_home(|home| {
            let image = home.join("page.png");
            write_png(&image, 10, 10);
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            let err = runtime
                .block_on(run_translate(TranslateConfig {
                    image,
                    detections: None,
                    tesseract: false,
                    reread: false,
                    output: home.join("out.svg"),
                    lang: None,
                    threshold: None,
                    no_translate: true,
                    report: None,
                    settings_path: None,
                }))
                .unwrap_err();
            assert!(err.to_string().contains("--detections or --tesseract"));
        });
    }
}
